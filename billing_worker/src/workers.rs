use std::{sync::Arc, time::Duration};

use billing_engine::{
    db_types::{ReportPeriod, RoyaltyReport},
    events::EventProducers,
    BillingDatabase,
    ReportApiError,
    ReportGeneration,
    RoyaltyReportApi,
    SqliteDatabase,
};
use chrono::{DateTime, Utc};
use log::*;
use tokio::task::JoinHandle;

use crate::{config::WorkerConfig, errors::WorkerError};

/// Connects to the database, starts the workers, and runs until the process receives Ctrl-C.
pub async fn run_workers(config: WorkerConfig) -> Result<(), WorkerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 5).await?;
    // Both workers go through the same API so that they share its report locks
    let api = Arc::new(RoyaltyReportApi::new(db, config.billing, EventProducers::default()));
    let mut handles = vec![start_auto_accept_worker(Arc::clone(&api), config.auto_accept_interval)];
    if config.generate_reports {
        handles.push(start_report_worker(api, config.report_interval));
    } else {
        warn!("🕰️ Report generation is disabled");
    }
    tokio::signal::ctrl_c().await?;
    info!("🕰️ Shutting down {} workers", handles.len());
    handles.iter().for_each(JoinHandle::abort);
    Ok(())
}

/// Starts the auto-acceptance worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_auto_accept_worker(api: Arc<RoyaltyReportApi<SqliteDatabase>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Report auto-acceptance worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running report auto-acceptance job");
            match auto_accept_job(&api, Utc::now()).await {
                Ok(accepted) if accepted.is_empty() => trace!("🕰️ No reports were due for auto-acceptance"),
                Ok(accepted) => info!("🕰️ {} reports auto-accepted: {}", accepted.len(), report_list(&accepted)),
                Err(e) => error!("🕰️ Error running report auto-acceptance job: {e}"),
            }
        }
    })
}

/// Starts the report generation worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_report_worker(api: Arc<RoyaltyReportApi<SqliteDatabase>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Royalty report worker started");
        loop {
            timer.tick().await;
            let now = Utc::now();
            let period = ReportPeriod::previous_week(now);
            debug!("🕰️ Running royalty report job for {period}");
            match report_job(&api, period, now).await {
                Ok(summary) => info!("🕰️ Royalty reports for {period}: {summary}"),
                Err(e) => error!("🕰️ Error running royalty report job: {e}"),
            }
        }
    })
}

/// Accepts every pending report whose acceptance window closed before `now`.
pub async fn auto_accept_job<B: BillingDatabase>(
    api: &RoyaltyReportApi<B>,
    now: DateTime<Utc>,
) -> Result<Vec<RoyaltyReport>, ReportApiError> {
    api.auto_accept_expired(now).await
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportJobSummary {
    pub created: usize,
    pub recomputed: usize,
    pub skipped: usize,
}

impl std::fmt::Display for ReportJobSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} created, {} recomputed, {} unchanged", self.created, self.recomputed, self.skipped)
    }
}

/// Generates or refreshes the reports of every merchant for `period`.
pub async fn report_job<B: BillingDatabase>(
    api: &RoyaltyReportApi<B>,
    period: ReportPeriod,
    now: DateTime<Utc>,
) -> Result<ReportJobSummary, ReportApiError> {
    let results = api.generate_all(period, now).await?;
    let summary = results.iter().fold(ReportJobSummary::default(), |mut acc, r| {
        match r {
            ReportGeneration::Created(_) => acc.created += 1,
            ReportGeneration::Recomputed(_) => acc.recomputed += 1,
            ReportGeneration::Skipped(_) => acc.skipped += 1,
        }
        acc
    });
    Ok(summary)
}

fn report_list(reports: &[RoyaltyReport]) -> String {
    reports.iter().map(|r| format!("[{}] merchant: {}", r.id, r.merchant_id)).collect::<Vec<String>>().join(", ")
}
