use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    billing_api::ReportApiError,
    db_types::{ChangeSource, ReportStatus, RoyaltyReport, RoyaltyReportChange},
    helpers::digest_json,
};

/// A requested status change, with who asked for it and when.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub to: ReportStatus,
    pub source: ChangeSource,
    pub ip: String,
    pub reason: Option<String>,
    pub now: DateTime<Utc>,
}

impl TransitionRequest {
    pub fn new(to: ReportStatus, source: ChangeSource, now: DateTime<Utc>) -> Self {
        Self { to, source, ip: String::default(), reason: None, now }
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip = ip.to_string();
        self
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }
}

/// Returns a copy of `report` in the requested status, with the fields that go with entering that status filled in.
///
/// The input report is never modified. A transition that [`ReportStatus::changes_available`] does not allow fails
/// with [`ReportApiError::InvalidTransition`].
pub fn apply_transition(
    report: &RoyaltyReport,
    request: &TransitionRequest,
    accept_window: Duration,
) -> Result<RoyaltyReport, ReportApiError> {
    let from = report.status;
    let to = request.to;
    if !from.changes_available(to) {
        debug!("📋️ Report {} cannot move from {from} to {to}", report.id);
        return Err(ReportApiError::InvalidTransition { from, to });
    }
    let now = request.now;
    let mut next = report.clone();
    match to {
        ReportStatus::Pending => {
            next.accept_expire_at = Some(now + accept_window);
            if from == ReportStatus::Dispute {
                next.dispute_closed_at = Some(now);
            }
        },
        ReportStatus::Dispute => {
            let reason = request.reason.as_deref().map(str::trim).unwrap_or_default();
            if reason.is_empty() {
                return Err(ReportApiError::MissingDisputeReason);
            }
            next.dispute_reason = Some(reason.to_string());
            next.dispute_started_at = Some(now);
            next.dispute_closed_at = None;
            next.accept_expire_at = None;
        },
        ReportStatus::Accepted => {
            next.accepted_at = Some(now);
            next.is_auto_accepted = request.source == ChangeSource::Auto;
        },
        ReportStatus::Canceled => {
            next.accept_expire_at = None;
        },
        ReportStatus::New => {},
    }
    next.status = to;
    next.updated_at = now;
    Ok(next)
}

/// Builds the audit row for a report that was just written in `report.status`.
pub fn audit_change(
    report: &RoyaltyReport,
    from: ReportStatus,
    source: ChangeSource,
    ip: &str,
    now: DateTime<Utc>,
) -> Result<RoyaltyReportChange, ReportApiError> {
    let hash = digest_json(report).map_err(|e| ReportApiError::DatabaseError(e.to_string()))?;
    Ok(RoyaltyReportChange {
        report_id: report.id.clone(),
        source,
        ip: ip.to_string(),
        from_status: from,
        to_status: report.status,
        hash,
        created_at: now,
    })
}

#[cfg(test)]
mod test {
    use billing_common::CurrencyCode;
    use chrono::TimeZone;

    use super::*;
    use crate::db_types::{ReportPeriod, ReportSummary, ReportTotals, SummaryItem};

    fn report(status: ReportStatus) -> RoyaltyReport {
        let now = Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap();
        RoyaltyReport {
            id: "r1".into(),
            merchant_id: "m1".into(),
            currency: CurrencyCode::EUR,
            period: ReportPeriod::previous_week(now),
            status,
            totals: ReportTotals::zero(CurrencyCode::EUR),
            summary: ReportSummary {
                products: vec![],
                corrections: vec![],
                rolling_reserves: vec![],
                total: SummaryItem::new("Total", CurrencyCode::EUR),
            },
            dispute_reason: None,
            dispute_started_at: None,
            dispute_closed_at: None,
            accept_expire_at: None,
            accepted_at: None,
            is_auto_accepted: false,
            payout_document_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, 9, 0, 0).unwrap()
    }

    #[test]
    fn pending_sets_the_acceptance_deadline() {
        let request = TransitionRequest::new(ReportStatus::Pending, ChangeSource::Admin, now());
        let next = apply_transition(&report(ReportStatus::New), &request, Duration::days(7)).unwrap();
        assert_eq!(next.status, ReportStatus::Pending);
        assert_eq!(next.accept_expire_at, Some(now() + Duration::days(7)));
        assert_eq!(next.updated_at, now());
    }

    #[test]
    fn dispute_needs_a_reason() {
        let request = TransitionRequest::new(ReportStatus::Dispute, ChangeSource::Merchant, now());
        let err = apply_transition(&report(ReportStatus::Pending), &request, Duration::days(7)).unwrap_err();
        assert_eq!(err, ReportApiError::MissingDisputeReason);

        let request = request.with_reason("Sales for May 7 are missing");
        let next = apply_transition(&report(ReportStatus::Pending), &request, Duration::days(7)).unwrap();
        assert_eq!(next.dispute_reason.as_deref(), Some("Sales for May 7 are missing"));
        assert_eq!(next.dispute_started_at, Some(now()));
        assert!(next.accept_expire_at.is_none());
    }

    #[test]
    fn closing_a_dispute_records_the_time() {
        let mut disputed = report(ReportStatus::Dispute);
        disputed.dispute_started_at = Some(now() - Duration::days(1));
        let request = TransitionRequest::new(ReportStatus::Pending, ChangeSource::Admin, now());
        let next = apply_transition(&disputed, &request, Duration::hours(48)).unwrap();
        assert_eq!(next.dispute_closed_at, Some(now()));
        assert_eq!(next.accept_expire_at, Some(now() + Duration::hours(48)));
    }

    #[test]
    fn auto_acceptance_is_flagged() {
        let request = TransitionRequest::new(ReportStatus::Accepted, ChangeSource::Auto, now());
        let next = apply_transition(&report(ReportStatus::Pending), &request, Duration::days(7)).unwrap();
        assert!(next.is_auto_accepted);
        assert_eq!(next.accepted_at, Some(now()));

        let request = TransitionRequest::new(ReportStatus::Accepted, ChangeSource::Merchant, now());
        let next = apply_transition(&report(ReportStatus::Pending), &request, Duration::days(7)).unwrap();
        assert!(!next.is_auto_accepted);
    }

    #[test]
    fn accepted_reports_reject_every_transition() {
        let accepted = report(ReportStatus::Accepted);
        for to in ReportStatus::ALL {
            let request = TransitionRequest::new(to, ChangeSource::Admin, now()).with_reason("x");
            let err = apply_transition(&accepted, &request, Duration::days(7)).unwrap_err();
            assert_eq!(err, ReportApiError::InvalidTransition { from: ReportStatus::Accepted, to });
        }
    }

    #[test]
    fn audit_rows_hash_the_written_report() {
        let r = report(ReportStatus::Pending);
        let change = audit_change(&r, ReportStatus::New, ChangeSource::Admin, "10.0.0.1", now()).unwrap();
        assert_eq!(change.from_status, ReportStatus::New);
        assert_eq!(change.to_status, ReportStatus::Pending);
        assert_eq!(change.hash.len(), 128);
        let again = audit_change(&r, ReportStatus::New, ChangeSource::Admin, "10.0.0.1", now()).unwrap();
        assert_eq!(change.hash, again.hash);
    }
}
