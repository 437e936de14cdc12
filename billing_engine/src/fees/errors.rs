use billing_common::{CurrencyCode, MoneyError, RoundingPrecisionError};
use thiserror::Error;

use crate::{
    db_types::{CostTableKind, MerchantId, OrderId, OrderStatus},
    fees::rates::RateType,
};

/// How the caller should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry with backoff. Nothing was written.
    Transient,
    /// A cost table or merchant record needs fixing. Flag the order for manual review; retrying won't help.
    Configuration,
    /// The requested state change is not allowed. State is untouched.
    Workflow,
    /// The request itself is invalid.
    Caller,
    /// The system is misconfigured in a way that must never be papered over.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostResolutionError {
    #[error("No active {kind} rule matches {criteria}")]
    RuleNotFound { kind: CostTableKind, criteria: String },
    #[error("{} {kind} rules are equally specific for {criteria}: {}", .rule_ids.len(), .rule_ids.join(", "))]
    AmbiguousRule { kind: CostTableKind, criteria: String, rule_ids: Vec<String> },
    #[error("The cost store did not answer a {0} lookup in time")]
    Timeout(CostTableKind),
    #[error("Cost store error: {0}")]
    StoreError(String),
}

impl CostResolutionError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RuleNotFound { .. } | Self::AmbiguousRule { .. } => ErrorClass::Configuration,
            Self::Timeout(_) | Self::StoreError(_) => ErrorClass::Transient,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum FeeCalculationError {
    #[error(transparent)]
    CostResolution(#[from] CostResolutionError),
    #[error("The {rate_type} rate for {from}/{to} is currently unavailable: {reason}")]
    RateUnavailable { from: CurrencyCode, to: CurrencyCode, rate_type: RateType, reason: String },
    #[error("There is no {rate_type} rate for {from}/{to}")]
    UnsupportedCurrencyPair { from: CurrencyCode, to: CurrencyCode, rate_type: RateType },
    #[error("The rate oracle did not answer within {0}ms")]
    RateTimeout(u64),
    #[error("Merchant {0} does not exist")]
    MerchantNotFound(MerchantId),
    #[error("Merchant {0} has no payout currency configured")]
    MissingPayoutCurrency(MerchantId),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} has not been paid, so it has no fees")]
    OrderNotPaid(OrderId),
    #[error("Invalid refund for order {order_id}: {reason}")]
    InvalidRefund { order_id: OrderId, reason: String },
    #[error("Order {order_id} cannot go from {from} to {to}")]
    InvalidStatusChange { order_id: OrderId, from: OrderStatus, to: OrderStatus },
    #[error("Another fee computation for order {0} is still running")]
    OrderBusy(OrderId),
    #[error(transparent)]
    RoundingPrecision(#[from] RoundingPrecisionError),
    #[error("Inconsistent amounts: {0}")]
    Arithmetic(#[from] MoneyError),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl FeeCalculationError {
    pub fn class(&self) -> ErrorClass {
        use FeeCalculationError::*;
        match self {
            CostResolution(e) => e.class(),
            RateUnavailable { .. } | RateTimeout(_) | OrderBusy(_) | DatabaseError(_) => ErrorClass::Transient,
            UnsupportedCurrencyPair { .. } | MerchantNotFound(_) | MissingPayoutCurrency(_) => ErrorClass::Configuration,
            OrderNotFound(_) | OrderNotPaid(_) | InvalidRefund { .. } => ErrorClass::Caller,
            InvalidStatusChange { .. } => ErrorClass::Workflow,
            RoundingPrecision(_) | Arithmetic(_) => ErrorClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification() {
        let missing = FeeCalculationError::from(CostResolutionError::RuleNotFound {
            kind: CostTableKind::PaymentChannelMerchant,
            criteria: "method=VISA".into(),
        });
        assert_eq!(missing.class(), ErrorClass::Configuration);
        assert!(!missing.is_retryable());
        assert!(FeeCalculationError::RateTimeout(500).is_retryable());
        let fatal = FeeCalculationError::from(RoundingPrecisionError(CurrencyCode::USD));
        assert_eq!(fatal.class(), ErrorClass::Fatal);
        let ambiguous = CostResolutionError::AmbiguousRule {
            kind: CostTableKind::MoneyBackSystem,
            criteria: "method=VISA".into(),
            rule_ids: vec!["a".into(), "b".into()],
        };
        let backwards = FeeCalculationError::InvalidStatusChange {
            order_id: "o-1".into(),
            from: OrderStatus::ProjectComplete,
            to: OrderStatus::PaymentSystemComplete,
        };
        assert_eq!(backwards.class(), ErrorClass::Workflow);
        assert!(!backwards.is_retryable());
        assert_eq!(ambiguous.to_string(), "2 money_back_system rules are equally specific for method=VISA: a, b");
    }
}
