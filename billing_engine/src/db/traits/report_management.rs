use chrono::{DateTime, Utc};

use crate::{
    db::traits::{InsertReportResult, ReportFilter, UpdateResult},
    db_types::{MerchantId, ReportId, RoyaltyReport, RoyaltyReportChange},
};

#[allow(async_fn_in_trait)]
pub trait ReportManagement {
    type Error: std::error::Error;

    /// Stores a new report. There is at most one report per merchant and period; if one exists, its id is returned
    /// and nothing is written.
    async fn insert_report(&self, report: &RoyaltyReport) -> Result<InsertReportResult, Self::Error>;

    /// Writes `report` if the stored version still equals `expected_version`. The stored version is incremented, and
    /// the audit `change` (if any) is written in the same transaction.
    async fn update_report(
        &self,
        report: &RoyaltyReport,
        expected_version: i64,
        change: Option<&RoyaltyReportChange>,
    ) -> Result<UpdateResult<RoyaltyReport>, Self::Error>;

    async fn fetch_report(&self, id: &ReportId) -> Result<Option<RoyaltyReport>, Self::Error>;

    async fn fetch_report_for_period(
        &self,
        merchant_id: &MerchantId,
        period_from: DateTime<Utc>,
    ) -> Result<Option<RoyaltyReport>, Self::Error>;

    /// Reports matching the filter, oldest period first.
    async fn fetch_reports(&self, filter: ReportFilter) -> Result<Vec<RoyaltyReport>, Self::Error>;

    async fn fetch_report_changes(&self, id: &ReportId) -> Result<Vec<RoyaltyReportChange>, Self::Error>;
}
