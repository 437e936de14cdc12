use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    billing_api::{config::BillingConfig, errors::ReportApiError},
    db::traits::{
        BillingDatabase,
        EntryFilter,
        InsertReportResult,
        OrderViewFilter,
        ReportFilter,
        UpdateResult,
    },
    db_types::{
        ChangeSource,
        EntryType,
        Merchant,
        MerchantId,
        ReportId,
        ReportPeriod,
        ReportStatus,
        RoyaltyReport,
        RoyaltyReportChange,
    },
    events::{EventProducers, ReportStatusChangedEvent},
    helpers::{KeyedGuard, KeyedLocks},
    reports::{aggregate, apply_transition, audit_change, PeriodActivity, TransitionRequest},
};

/// What [`RoyaltyReportApi::generate_for_merchant`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportGeneration {
    Created(RoyaltyReport),
    /// The report existed in `new` or `dispute`, and its totals were refreshed.
    Recomputed(RoyaltyReport),
    /// The report existed in a status that no longer allows recalculation. It was left alone.
    Skipped(RoyaltyReport),
}

impl ReportGeneration {
    pub fn report(&self) -> &RoyaltyReport {
        match self {
            ReportGeneration::Created(r) | ReportGeneration::Recomputed(r) | ReportGeneration::Skipped(r) => r,
        }
    }
}

/// `RoyaltyReportApi` builds royalty reports from order views and drives them through their status lifecycle.
///
/// Every write to a report happens under that report's lock and presents the version that was read, so concurrent
/// callers cannot both move the same report (one of them gets [`ReportApiError::VersionConflict`] or
/// [`ReportApiError::InvalidTransition`]).
pub struct RoyaltyReportApi<B> {
    db: B,
    config: BillingConfig,
    locks: KeyedLocks<ReportId>,
    producers: EventProducers,
}

impl<B> Debug for RoyaltyReportApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RoyaltyReportApi")
    }
}

impl<B> RoyaltyReportApi<B> {
    pub fn new(db: B, config: BillingConfig, producers: EventProducers) -> Self {
        Self { db, config, locks: KeyedLocks::new(), producers }
    }
}

impl<B> RoyaltyReportApi<B>
where B: BillingDatabase
{
    /// Generates, or refreshes, the report of every merchant with banking details for `period`.
    ///
    /// A failure for one merchant is logged and does not stop the others.
    pub async fn generate_all(
        &self,
        period: ReportPeriod,
        now: DateTime<Utc>,
    ) -> Result<Vec<ReportGeneration>, ReportApiError> {
        let merchants = self.db.fetch_merchants().await.map_err(|e| ReportApiError::DatabaseError(e.to_string()))?;
        let mut results = Vec::with_capacity(merchants.len());
        for merchant in merchants.iter().filter(|m| m.payout_currency().is_some()) {
            match self.generate(merchant, period, now).await {
                Ok(result) => results.push(result),
                Err(e) => error!("📋️ Could not generate the {period} report for merchant {}. {e}", merchant.id),
            }
        }
        info!("📋️ {} royalty reports generated for {period}", results.len());
        Ok(results)
    }

    pub async fn generate_for_merchant(
        &self,
        merchant_id: &MerchantId,
        period: ReportPeriod,
        now: DateTime<Utc>,
    ) -> Result<ReportGeneration, ReportApiError> {
        let merchant = self
            .db
            .fetch_merchant(merchant_id)
            .await
            .map_err(|e| ReportApiError::DatabaseError(e.to_string()))?
            .ok_or_else(|| ReportApiError::MerchantNotFound(merchant_id.clone()))?;
        self.generate(&merchant, period, now).await
    }

    /// Refreshes the totals of a report from the current order views and ledger entries.
    ///
    /// Only reports in `new` or `dispute` can be recomputed. Others fail with [`ReportApiError::Immutable`].
    pub async fn recompute(&self, report_id: &ReportId, now: DateTime<Utc>) -> Result<RoyaltyReport, ReportApiError> {
        let _guard = self.lock(report_id).await?;
        let report = self.fetch_existing(report_id).await?;
        if !report.status.allows_recompute() {
            return Err(ReportApiError::Immutable { id: report.id, status: report.status });
        }
        let activity = self.collect_activity(&report.merchant_id, report.currency, report.period).await?;
        self.write_totals(report, &activity, now).await
    }

    /// Moves a report to another status.
    pub async fn change_status(
        &self,
        report_id: &ReportId,
        request: TransitionRequest,
    ) -> Result<RoyaltyReport, ReportApiError> {
        let _guard = self.lock(report_id).await?;
        let report = self.fetch_existing(report_id).await?;
        let from = report.status;
        let mut next = apply_transition(&report, &request, self.config.accept_window)?;
        next.version = report.version + 1;
        let change = audit_change(&next, from, request.source, &request.ip, request.now)?;
        let updated = self.write(&next, report.version, Some(&change)).await?;
        info!("📋️ Report {report_id} moved from {from} to {} by {}", updated.status, request.source);
        let event = ReportStatusChangedEvent::new(updated.clone(), Some(from), request.source);
        self.producers.report_status_changed(event).await;
        Ok(updated)
    }

    /// Sends a new report to the merchant for review.
    pub async fn send_to_merchant(&self, report_id: &ReportId, now: DateTime<Utc>) -> Result<RoyaltyReport, ReportApiError> {
        self.change_status(report_id, TransitionRequest::new(ReportStatus::Pending, ChangeSource::Admin, now)).await
    }

    pub async fn accept(
        &self,
        report_id: &ReportId,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<RoyaltyReport, ReportApiError> {
        let request = TransitionRequest::new(ReportStatus::Accepted, ChangeSource::Merchant, now).with_ip(ip);
        self.change_status(report_id, request).await
    }

    pub async fn dispute(
        &self,
        report_id: &ReportId,
        reason: &str,
        ip: &str,
        now: DateTime<Utc>,
    ) -> Result<RoyaltyReport, ReportApiError> {
        let request =
            TransitionRequest::new(ReportStatus::Dispute, ChangeSource::Merchant, now).with_ip(ip).with_reason(reason);
        self.change_status(report_id, request).await
    }

    /// Accepts every pending report whose acceptance deadline has passed, on the merchant's behalf.
    ///
    /// Reports that a merchant acted on in the meantime are skipped.
    pub async fn auto_accept_expired(&self, now: DateTime<Utc>) -> Result<Vec<RoyaltyReport>, ReportApiError> {
        let filter = ReportFilter::default().with_status(ReportStatus::Pending).with_accept_expire_before(now);
        let expired = self.db.fetch_reports(filter).await.map_err(|e| ReportApiError::DatabaseError(e.to_string()))?;
        let mut accepted = Vec::with_capacity(expired.len());
        for report in expired {
            let request = TransitionRequest::new(ReportStatus::Accepted, ChangeSource::Auto, now);
            match self.change_status(&report.id, request).await {
                Ok(r) => accepted.push(r),
                Err(
                    e @ (ReportApiError::InvalidTransition { .. } |
                    ReportApiError::VersionConflict { .. } |
                    ReportApiError::Busy(_)),
                ) => {
                    debug!("📋️ Report {} changed while it was being auto-accepted. {e}", report.id);
                },
                Err(e) => return Err(e),
            }
        }
        if !accepted.is_empty() {
            info!("📋️ {} reports were auto-accepted", accepted.len());
        }
        Ok(accepted)
    }

    pub async fn fetch_report(&self, report_id: &ReportId) -> Result<Option<RoyaltyReport>, ReportApiError> {
        self.db.fetch_report(report_id).await.map_err(|e| ReportApiError::DatabaseError(e.to_string()))
    }

    pub async fn fetch_reports(&self, filter: ReportFilter) -> Result<Vec<RoyaltyReport>, ReportApiError> {
        self.db.fetch_reports(filter).await.map_err(|e| ReportApiError::DatabaseError(e.to_string()))
    }

    pub async fn fetch_changes(&self, report_id: &ReportId) -> Result<Vec<RoyaltyReportChange>, ReportApiError> {
        self.db.fetch_report_changes(report_id).await.map_err(|e| ReportApiError::DatabaseError(e.to_string()))
    }

    //------------------------------------------   Internals   ------------------------------------------------------
    async fn lock(&self, report_id: &ReportId) -> Result<KeyedGuard<ReportId>, ReportApiError> {
        self.locks
            .lock_with_timeout(report_id, self.config.lock_timeout)
            .await
            .ok_or_else(|| ReportApiError::Busy(report_id.clone()))
    }

    async fn fetch_existing(&self, report_id: &ReportId) -> Result<RoyaltyReport, ReportApiError> {
        self.fetch_report(report_id).await?.ok_or_else(|| ReportApiError::NotFound(report_id.clone()))
    }

    async fn generate(
        &self,
        merchant: &Merchant,
        period: ReportPeriod,
        now: DateTime<Utc>,
    ) -> Result<ReportGeneration, ReportApiError> {
        let currency =
            merchant.payout_currency().ok_or_else(|| ReportApiError::MissingPayoutCurrency(merchant.id.clone()))?;
        let existing = self
            .db
            .fetch_report_for_period(&merchant.id, period.from)
            .await
            .map_err(|e| ReportApiError::DatabaseError(e.to_string()))?;
        let existing = match existing {
            Some(report) => report,
            None => {
                let activity = self.collect_activity(&merchant.id, currency, period).await?;
                let (totals, summary) = aggregate(&activity)?;
                let report = RoyaltyReport {
                    id: ReportId::random(),
                    merchant_id: merchant.id.clone(),
                    currency,
                    period,
                    status: ReportStatus::New,
                    totals,
                    summary,
                    dispute_reason: None,
                    dispute_started_at: None,
                    dispute_closed_at: None,
                    accept_expire_at: None,
                    accepted_at: None,
                    is_auto_accepted: false,
                    payout_document_id: None,
                    version: 0,
                    created_at: now,
                    updated_at: now,
                };
                let inserted =
                    self.db.insert_report(&report).await.map_err(|e| ReportApiError::DatabaseError(e.to_string()))?;
                match inserted {
                    InsertReportResult::Inserted => {
                        debug!("📋️ Report {} created for merchant {} ({period})", report.id, merchant.id);
                        let event = ReportStatusChangedEvent::new(report.clone(), None, ChangeSource::Auto);
                        self.producers.report_status_changed(event).await;
                        return Ok(ReportGeneration::Created(report));
                    },
                    InsertReportResult::AlreadyExists(id) => self.fetch_existing(&id).await?,
                }
            },
        };
        let _guard = self.lock(&existing.id).await?;
        // Re-read under the lock, and only then collect the period's activity
        let existing = self.fetch_existing(&existing.id).await?;
        if !existing.status.allows_recompute() {
            trace!("📋️ Report {} is {}. Not recomputing it.", existing.id, existing.status);
            return Ok(ReportGeneration::Skipped(existing));
        }
        let activity = self.collect_activity(&existing.merchant_id, existing.currency, existing.period).await?;
        let report = self.write_totals(existing, &activity, now).await?;
        Ok(ReportGeneration::Recomputed(report))
    }

    async fn collect_activity(
        &self,
        merchant_id: &MerchantId,
        currency: billing_common::CurrencyCode,
        period: ReportPeriod,
    ) -> Result<PeriodActivity, ReportApiError> {
        let sales_filter =
            OrderViewFilter::default().with_merchant_id(merchant_id.clone()).with_transaction_window(period.from, period.to);
        let refund_filter =
            OrderViewFilter::default().with_merchant_id(merchant_id.clone()).with_refund_window(period.from, period.to);
        let entry_filter = EntryFilter::default()
            .with_merchant_id(merchant_id.clone())
            .with_entry_type(EntryType::Correction)
            .with_entry_type(EntryType::RollingReserveHold)
            .with_entry_type(EntryType::RollingReserveRelease)
            .with_window(period.from, period.to);
        let sales =
            self.db.fetch_order_views(sales_filter).await.map_err(|e| ReportApiError::DatabaseError(e.to_string()))?;
        let refunds =
            self.db.fetch_order_views(refund_filter).await.map_err(|e| ReportApiError::DatabaseError(e.to_string()))?;
        let entries =
            self.db.fetch_entries(entry_filter).await.map_err(|e| ReportApiError::DatabaseError(e.to_string()))?;
        let sales = sales.into_iter().filter(|v| v.status.is_paid()).collect::<Vec<_>>();
        let refunds = refunds.into_iter().filter(|v| v.refund_breakdown.is_some()).collect::<Vec<_>>();
        trace!(
            "📋️ Merchant {merchant_id} had {} sales, {} refunds and {} ledger adjustments in {period}",
            sales.len(),
            refunds.len(),
            entries.len()
        );
        let entries = entries.into_iter().filter(|e| e.amount.currency == currency).collect();
        Ok(PeriodActivity::new(currency, period).with_sales(sales).with_refunds(refunds).with_entries(entries))
    }

    async fn write_totals(
        &self,
        mut report: RoyaltyReport,
        activity: &PeriodActivity,
        now: DateTime<Utc>,
    ) -> Result<RoyaltyReport, ReportApiError> {
        let (totals, summary) = aggregate(activity)?;
        let expected_version = report.version;
        report.totals = totals;
        report.summary = summary;
        report.updated_at = now;
        let updated = self.write(&report, expected_version, None).await?;
        debug!("📋️ Report {} recomputed. Payout amount: {}", updated.id, updated.totals.payout_amount);
        Ok(updated)
    }

    async fn write(
        &self,
        report: &RoyaltyReport,
        expected_version: i64,
        change: Option<&RoyaltyReportChange>,
    ) -> Result<RoyaltyReport, ReportApiError> {
        let result = self
            .db
            .update_report(report, expected_version, change)
            .await
            .map_err(|e| ReportApiError::DatabaseError(e.to_string()))?;
        match result {
            UpdateResult::Updated(r) => Ok(r),
            UpdateResult::VersionConflict { expected, found } => {
                warn!("📋️ Report {} was modified concurrently", report.id);
                Err(ReportApiError::VersionConflict { id: report.id.clone(), expected, found })
            },
            UpdateResult::NotFound => Err(ReportApiError::NotFound(report.id.clone())),
        }
    }
}
