use std::fmt::Display;

use billing_common::{CurrencyCode, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChangeSource, MerchantBanking, MerchantId, PayoutId, ReportId, ReportPeriod};

/// Payout document states: `draft -> pending -> paid | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Draft,
    Pending,
    Paid,
    Failed,
}

impl PayoutStatus {
    pub fn changes_available(&self, next: PayoutStatus) -> bool {
        use PayoutStatus::*;
        matches!((self, next), (Draft, Pending) | (Pending, Paid) | (Pending, Failed))
    }

    pub fn is_final(&self) -> bool {
        matches!(self, PayoutStatus::Paid | PayoutStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Draft => "draft",
            PayoutStatus::Pending => "pending",
            PayoutStatus::Paid => "paid",
            PayoutStatus::Failed => "failed",
        }
    }
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDocument {
    pub id: PayoutId,
    pub merchant_id: MerchantId,
    pub source_reports: Vec<ReportId>,
    pub total_fees: Money,
    pub balance: Money,
    pub currency: CurrencyCode,
    /// Spans the earliest and latest source report periods.
    pub period: ReportPeriod,
    pub total_transactions: i64,
    pub description: String,
    pub destination: MerchantBanking,
    pub status: PayoutStatus,
    pub transaction_reference: Option<String>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDocumentChange {
    pub payout_id: PayoutId,
    pub source: ChangeSource,
    pub ip: String,
    pub from_status: Option<PayoutStatus>,
    pub to_status: PayoutStatus,
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::PayoutStatus::*;

    #[test]
    fn payout_transitions() {
        assert!(Draft.changes_available(Pending));
        assert!(Pending.changes_available(Paid));
        assert!(Pending.changes_available(Failed));
        assert!(!Draft.changes_available(Paid));
        assert!(!Paid.changes_available(Failed));
        assert!(!Failed.changes_available(Pending));
        assert!(Paid.is_final() && Failed.is_final());
    }
}
