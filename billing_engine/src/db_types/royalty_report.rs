use std::{fmt::Display, str::FromStr};

use billing_common::{CurrencyCode, Money};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountingEntry, MerchantId, PayoutId, ReportId};

//--------------------------------------    ReportStatus    --------------------------------------------------------
/// Royalty report states.
///
/// ```text
///  new ──> pending ──> accepted
///   │  ▲      ▲  │
///   ▼  │      │  ▼
/// canceled    dispute
/// ```
/// `accepted` is terminal. A canceled report can be re-opened (back to `new`) so a corrected version can be issued
/// for the same period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    New,
    Pending,
    Accepted,
    Dispute,
    Canceled,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 5] =
        [ReportStatus::New, ReportStatus::Pending, ReportStatus::Accepted, ReportStatus::Dispute, ReportStatus::Canceled];

    /// Whether a report in this status may move to `next`.
    pub fn changes_available(&self, next: ReportStatus) -> bool {
        use ReportStatus::*;
        matches!(
            (self, next),
            (New, Pending) | (New, Canceled) | (Pending, Accepted) | (Pending, Dispute) | (Dispute, Pending) |
                (Canceled, New)
        )
    }

    /// Totals may only be recomputed while the merchant has not seen the report yet, or while it is disputed.
    pub fn allows_recompute(&self) -> bool {
        matches!(self, ReportStatus::New | ReportStatus::Dispute)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::New => "new",
            ReportStatus::Pending => "pending",
            ReportStatus::Accepted => "accepted",
            ReportStatus::Dispute => "dispute",
            ReportStatus::Canceled => "canceled",
        }
    }
}

impl Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ReportStatus::New),
            "pending" => Ok(ReportStatus::Pending),
            "accepted" => Ok(ReportStatus::Accepted),
            "dispute" => Ok(ReportStatus::Dispute),
            "canceled" => Ok(ReportStatus::Canceled),
            _ => Err(format!("Invalid royalty report status: {s}")),
        }
    }
}

//--------------------------------------    ReportPeriod    --------------------------------------------------------
/// A half-open reporting window `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportPeriod {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// The last complete Monday-to-Monday (UTC) week before `now`.
    pub fn previous_week(now: DateTime<Utc>) -> Self {
        let days_since_monday = i64::from(now.weekday().num_days_from_monday());
        let today = now.date_naive() - Duration::days(days_since_monday);
        let this_monday = Utc.from_utc_datetime(&today.and_hms_opt(0, 0, 0).unwrap_or_default());
        Self { from: this_monday - Duration::weeks(1), to: this_monday }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.from <= ts && ts < self.to
    }
}

impl Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.from.format("%Y-%m-%d"), self.to.format("%Y-%m-%d"))
    }
}

//--------------------------------------   Totals/Summary   --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    pub transactions_count: i64,
    pub gross_amount: Money,
    pub fee_amount: Money,
    pub vat_amount: Money,
    pub correction_amount: Money,
    pub rolling_reserve_amount: Money,
    /// What the period contributes to the merchant's payable balance.
    pub payout_amount: Money,
}

impl ReportTotals {
    pub fn zero(currency: CurrencyCode) -> Self {
        Self {
            transactions_count: 0,
            gross_amount: Money::zero(currency),
            fee_amount: Money::zero(currency),
            vat_amount: Money::zero(currency),
            correction_amount: Money::zero(currency),
            rolling_reserve_amount: Money::zero(currency),
            payout_amount: Money::zero(currency),
        }
    }
}

/// One line of a report summary: all sales and returns of a single product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryItem {
    pub product: String,
    pub sales_count: i64,
    pub returns_count: i64,
    pub gross_sales: Money,
    pub gross_returns: Money,
    pub gross_total: Money,
    pub fees: Money,
    pub vat: Money,
    pub payout: Money,
}

impl SummaryItem {
    pub fn new(product: &str, currency: CurrencyCode) -> Self {
        Self {
            product: product.to_string(),
            sales_count: 0,
            returns_count: 0,
            gross_sales: Money::zero(currency),
            gross_returns: Money::zero(currency),
            gross_total: Money::zero(currency),
            fees: Money::zero(currency),
            vat: Money::zero(currency),
            payout: Money::zero(currency),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub products: Vec<SummaryItem>,
    pub corrections: Vec<AccountingEntry>,
    pub rolling_reserves: Vec<AccountingEntry>,
    pub total: SummaryItem,
}

//--------------------------------------   RoyaltyReport    --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoyaltyReport {
    pub id: ReportId,
    pub merchant_id: MerchantId,
    pub currency: CurrencyCode,
    pub period: ReportPeriod,
    pub status: ReportStatus,
    pub totals: ReportTotals,
    pub summary: ReportSummary,
    pub dispute_reason: Option<String>,
    pub dispute_started_at: Option<DateTime<Utc>>,
    pub dispute_closed_at: Option<DateTime<Utc>>,
    /// While pending, the merchant must accept or dispute the report before this deadline.
    pub accept_expire_at: Option<DateTime<Utc>>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub is_auto_accepted: bool,
    pub payout_document_id: Option<PayoutId>,
    /// Incremented on every write. Updates must present the version they read.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    Audit trail     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Admin,
    Merchant,
    Auto,
}

impl Display for ChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeSource::Admin => write!(f, "admin"),
            ChangeSource::Merchant => write!(f, "merchant"),
            ChangeSource::Auto => write!(f, "auto"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoyaltyReportChange {
    pub report_id: ReportId,
    pub source: ChangeSource,
    pub ip: String,
    pub from_status: ReportStatus,
    pub to_status: ReportStatus,
    /// Blake2b digest of the report as it was written.
    pub hash: String,
    pub created_at: DateTime<Utc>,
}
