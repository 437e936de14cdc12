use chrono::{DateTime, Utc};

use crate::db_types::{EntryType, MerchantBalance, MerchantId, OrderStatus, PayoutId, ReportId, ReportStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOrderResult {
    Inserted,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertReportResult {
    Inserted,
    /// A report for the same merchant and period already exists.
    AlreadyExists(ReportId),
}

/// Outcome of a versioned update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult<T> {
    /// The record was written. The returned value carries the new version.
    Updated(T),
    /// Somebody else wrote the record since it was read.
    VersionConflict { expected: i64, found: i64 },
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatePayoutResult {
    Created,
    /// The report is already attached to another payout document, or is no longer accepted.
    ReportUnavailable(ReportId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostEntryResult {
    Posted(MerchantBalance),
    /// An entry of the same type was already posted for the same source.
    AlreadyPosted,
}

//--------------------------------------   Query filters   ---------------------------------------------------------
/// Selects order views. Date windows are half-open, `[from, to)`.
#[derive(Debug, Clone, Default)]
pub struct OrderViewFilter {
    pub merchant_id: Option<MerchantId>,
    pub transaction_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub refund_window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub statuses: Vec<OrderStatus>,
}

impl OrderViewFilter {
    pub fn with_merchant_id(mut self, merchant_id: MerchantId) -> Self {
        self.merchant_id = Some(merchant_id);
        self
    }

    pub fn with_transaction_window(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.transaction_window = Some((from, to));
        self
    }

    pub fn with_refund_window(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.refund_window = Some((from, to));
        self
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.merchant_id.is_none() &&
            self.transaction_window.is_none() &&
            self.refund_window.is_none() &&
            self.statuses.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub merchant_id: Option<MerchantId>,
    pub statuses: Vec<ReportStatus>,
    pub accept_expire_before: Option<DateTime<Utc>>,
    pub period_from: Option<DateTime<Utc>>,
    pub payout_document_id: Option<PayoutId>,
}

impl ReportFilter {
    pub fn with_merchant_id(mut self, merchant_id: MerchantId) -> Self {
        self.merchant_id = Some(merchant_id);
        self
    }

    pub fn with_status(mut self, status: ReportStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_accept_expire_before(mut self, deadline: DateTime<Utc>) -> Self {
        self.accept_expire_before = Some(deadline);
        self
    }

    pub fn with_period_from(mut self, from: DateTime<Utc>) -> Self {
        self.period_from = Some(from);
        self
    }

    pub fn with_payout_document_id(mut self, id: PayoutId) -> Self {
        self.payout_document_id = Some(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.merchant_id.is_none() &&
            self.statuses.is_empty() &&
            self.accept_expire_before.is_none() &&
            self.period_from.is_none() &&
            self.payout_document_id.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub merchant_id: Option<MerchantId>,
    pub entry_types: Vec<EntryType>,
    pub window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl EntryFilter {
    pub fn with_merchant_id(mut self, merchant_id: MerchantId) -> Self {
        self.merchant_id = Some(merchant_id);
        self
    }

    pub fn with_entry_type(mut self, entry_type: EntryType) -> Self {
        self.entry_types.push(entry_type);
        self
    }

    pub fn with_window(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.window = Some((from, to));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.merchant_id.is_none() && self.entry_types.is_empty() && self.window.is_none()
    }
}
