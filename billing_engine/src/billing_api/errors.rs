use billing_common::CurrencyCode;
use thiserror::Error;

use crate::db_types::{MerchantId, PayoutId, PayoutStatus, ReportId, ReportStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Royalty report {0} does not exist")]
    NotFound(ReportId),
    #[error("Merchant {0} does not exist")]
    MerchantNotFound(MerchantId),
    #[error("Merchant {0} has no payout currency configured")]
    MissingPayoutCurrency(MerchantId),
    #[error("A royalty report cannot move from {from} to {to}")]
    InvalidTransition { from: ReportStatus, to: ReportStatus },
    #[error("Royalty report {id} is {status} and can no longer be recalculated")]
    Immutable { id: ReportId, status: ReportStatus },
    #[error("Royalty report {id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict { id: ReportId, expected: i64, found: i64 },
    #[error("Royalty report {0} is locked by another operation")]
    Busy(ReportId),
    #[error("Order {order} is in {found}, but the report is in {expected}")]
    CurrencyMismatch { order: String, expected: CurrencyCode, found: CurrencyCode },
    #[error("A dispute must give a reason")]
    MissingDisputeReason,
    #[error("Could not compute report totals: {0}")]
    Arithmetic(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Payout document {0} does not exist")]
    NotFound(PayoutId),
    #[error("Merchant {0} does not exist")]
    MerchantNotFound(MerchantId),
    #[error("The reports are not eligible for a payout: {0}")]
    PayoutPrecondition(String),
    #[error("A payout document cannot move from {from} to {to}")]
    InvalidTransition { from: PayoutStatus, to: PayoutStatus },
    #[error("Payout document {id} was modified concurrently (expected version {expected}, found {found})")]
    VersionConflict { id: PayoutId, expected: i64, found: i64 },
    #[error("Payout document {0} is locked by another operation")]
    Busy(PayoutId),
    #[error("Could not compute the payout balance: {0}")]
    Arithmetic(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Merchant {0} does not exist")]
    MerchantNotFound(MerchantId),
    #[error("{0} entries are posted by the billing engine and cannot be entered manually")]
    NotManualEntry(crate::db_types::EntryType),
    #[error("A manual entry must carry a reason")]
    MissingReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostTableApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid cost rule: {0}")]
    InvalidRule(String),
}

impl ReportApiError {
    pub fn class(&self) -> crate::fees::ErrorClass {
        use crate::fees::ErrorClass;
        match self {
            Self::DatabaseError(_) | Self::VersionConflict { .. } | Self::Busy(_) => ErrorClass::Transient,
            Self::MerchantNotFound(_) | Self::MissingPayoutCurrency(_) => ErrorClass::Configuration,
            Self::InvalidTransition { .. } | Self::Immutable { .. } => ErrorClass::Workflow,
            Self::NotFound(_) | Self::MissingDisputeReason => ErrorClass::Caller,
            Self::CurrencyMismatch { .. } | Self::Arithmetic(_) => ErrorClass::Fatal,
        }
    }
}

impl PayoutApiError {
    pub fn class(&self) -> crate::fees::ErrorClass {
        use crate::fees::ErrorClass;
        match self {
            Self::DatabaseError(_) | Self::VersionConflict { .. } | Self::Busy(_) => ErrorClass::Transient,
            Self::MerchantNotFound(_) => ErrorClass::Configuration,
            Self::InvalidTransition { .. } => ErrorClass::Workflow,
            Self::NotFound(_) | Self::PayoutPrecondition(_) => ErrorClass::Caller,
            Self::Arithmetic(_) => ErrorClass::Fatal,
        }
    }
}
