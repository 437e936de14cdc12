use billing_common::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{ChangeSource, OrderView, PayoutDocument, PayoutStatus, ReportStatus, RoyaltyReport};

/// Emitted every time an order view is (re)computed, i.e. on payment completion and on refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderViewComputedEvent {
    pub view: OrderView,
}

impl OrderViewComputedEvent {
    pub fn new(view: OrderView) -> Self {
        Self { view }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportStatusChangedEvent {
    pub report: RoyaltyReport,
    /// `None` when the report was just created.
    pub from: Option<ReportStatus>,
    pub to: ReportStatus,
    pub source: ChangeSource,
    pub timestamp: DateTime<Utc>,
}

impl ReportStatusChangedEvent {
    pub fn new(report: RoyaltyReport, from: Option<ReportStatus>, source: ChangeSource) -> Self {
        let to = report.status;
        let timestamp = report.updated_at;
        Self { report, from, to, source, timestamp }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDocumentCreatedEvent {
    pub document: PayoutDocument,
}

impl PayoutDocumentCreatedEvent {
    pub fn new(document: PayoutDocument) -> Self {
        Self { document }
    }

    pub fn amount(&self) -> Money {
        self.document.balance
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutStatusChangedEvent {
    pub document: PayoutDocument,
    pub from: PayoutStatus,
    pub to: PayoutStatus,
}

impl PayoutStatusChangedEvent {
    pub fn new(document: PayoutDocument, from: PayoutStatus) -> Self {
        let to = document.status;
        Self { document, from, to }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderViewComputed(OrderViewComputedEvent),
    ReportStatusChanged(ReportStatusChangedEvent),
    PayoutDocumentCreated(PayoutDocumentCreatedEvent),
    PayoutStatusChanged(PayoutStatusChangedEvent),
}
