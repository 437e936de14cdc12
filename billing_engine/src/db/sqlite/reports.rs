use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{
    codec::{decode, decode_all, encode, ts},
    SqliteDatabaseError,
};
use crate::{
    db::traits::{InsertReportResult, ReportFilter, UpdateResult},
    db_types::{MerchantId, PayoutId, ReportId, ReportStatus, RoyaltyReport, RoyaltyReportChange},
};

pub async fn idempotent_insert(
    report: &RoyaltyReport,
    conn: &mut SqliteConnection,
) -> Result<InsertReportResult, SqliteDatabaseError> {
    if let Some(existing) = fetch_report_for_period(&report.merchant_id, report.period.from, conn).await? {
        return Ok(InsertReportResult::AlreadyExists(existing.id));
    }
    write_new_report(report, conn).await?;
    Ok(InsertReportResult::Inserted)
}

async fn write_new_report(report: &RoyaltyReport, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let data = encode(report)?;
    sqlx::query(
        r#"
            INSERT INTO royalty_reports (
                id,
                merchant_id,
                currency,
                period_from,
                period_to,
                status,
                accept_expire_at,
                payout_document_id,
                version,
                data,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12);
        "#,
    )
    .bind(report.id.as_str())
    .bind(report.merchant_id.as_str())
    .bind(report.currency.as_str())
    .bind(ts(report.period.from))
    .bind(ts(report.period.to))
    .bind(report.status.as_str())
    .bind(report.accept_expire_at.map(ts))
    .bind(report.payout_document_id.as_ref().map(|p| p.as_str()))
    .bind(report.version)
    .bind(data)
    .bind(ts(report.created_at))
    .bind(ts(report.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

async fn stored_version(id: &ReportId, conn: &mut SqliteConnection) -> Result<Option<i64>, SqliteDatabaseError> {
    let version = sqlx::query_scalar("SELECT version FROM royalty_reports WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(version)
}

/// Overwrites the report with version `expected_version`. The new version number is `expected_version + 1`.
pub async fn update_report(
    report: &RoyaltyReport,
    expected_version: i64,
    conn: &mut SqliteConnection,
) -> Result<UpdateResult<RoyaltyReport>, SqliteDatabaseError> {
    let found = match stored_version(&report.id, conn).await? {
        None => return Ok(UpdateResult::NotFound),
        Some(v) => v,
    };
    if found != expected_version {
        debug!("🗃️ Report {} is at version {found}, but the update was based on {expected_version}", report.id);
        return Ok(UpdateResult::VersionConflict { expected: expected_version, found });
    }
    let mut updated = report.clone();
    updated.version = expected_version + 1;
    let data = encode(&updated)?;
    let result = sqlx::query(
        r#"
            UPDATE royalty_reports SET
                status = $1,
                accept_expire_at = $2,
                payout_document_id = $3,
                version = $4,
                data = $5,
                updated_at = $6
            WHERE id = $7 AND version = $8;
        "#,
    )
    .bind(updated.status.as_str())
    .bind(updated.accept_expire_at.map(ts))
    .bind(updated.payout_document_id.as_ref().map(|p| p.as_str()))
    .bind(updated.version)
    .bind(data)
    .bind(ts(updated.updated_at))
    .bind(updated.id.as_str())
    .bind(expected_version)
    .execute(conn)
    .await?;
    if result.rows_affected() == 1 {
        Ok(UpdateResult::Updated(updated))
    } else {
        Ok(UpdateResult::VersionConflict { expected: expected_version, found: expected_version + 1 })
    }
}

pub async fn fetch_report(id: &ReportId, conn: &mut SqliteConnection) -> Result<Option<RoyaltyReport>, SqliteDatabaseError> {
    let data: Option<String> = sqlx::query_scalar("SELECT data FROM royalty_reports WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?;
    data.map(|d| decode(&d)).transpose()
}

pub async fn fetch_report_for_period(
    merchant_id: &MerchantId,
    period_from: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<RoyaltyReport>, SqliteDatabaseError> {
    let data: Option<String> =
        sqlx::query_scalar("SELECT data FROM royalty_reports WHERE merchant_id = $1 AND period_from = $2")
            .bind(merchant_id.as_str())
            .bind(ts(period_from))
            .fetch_optional(conn)
            .await?;
    data.map(|d| decode(&d)).transpose()
}

pub async fn fetch_reports(
    filter: ReportFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<RoyaltyReport>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT data FROM royalty_reports ");
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(merchant_id) = filter.merchant_id {
        where_clause.push("merchant_id = ");
        where_clause.push_bind_unseparated(merchant_id.0);
    }
    if !filter.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in filter.statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.as_str());
        }
        where_clause.push_unseparated(")");
    }
    if let Some(deadline) = filter.accept_expire_before {
        where_clause.push("accept_expire_at IS NOT NULL AND accept_expire_at < ");
        where_clause.push_bind_unseparated(ts(deadline));
    }
    if let Some(from) = filter.period_from {
        where_clause.push("period_from = ");
        where_clause.push_bind_unseparated(ts(from));
    }
    if let Some(payout_id) = filter.payout_document_id {
        where_clause.push("payout_document_id = ");
        where_clause.push_bind_unseparated(payout_id.0);
    }
    builder.push(" ORDER BY period_from ASC, merchant_id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows: Vec<String> = builder.build_query_scalar::<String>().fetch_all(conn).await?;
    decode_all(rows)
}

pub async fn insert_change(change: &RoyaltyReportChange, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let data = encode(change)?;
    sqlx::query("INSERT INTO royalty_report_changes (report_id, data, created_at) VALUES ($1, $2, $3)")
        .bind(change.report_id.as_str())
        .bind(data)
        .bind(ts(change.created_at))
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_changes(
    id: &ReportId,
    conn: &mut SqliteConnection,
) -> Result<Vec<RoyaltyReportChange>, SqliteDatabaseError> {
    let rows: Vec<String> = sqlx::query_scalar("SELECT data FROM royalty_report_changes WHERE report_id = $1 ORDER BY id")
        .bind(id.as_str())
        .fetch_all(conn)
        .await?;
    decode_all(rows)
}

/// Attaches an accepted, unclaimed report to a payout document. Returns false, and writes nothing, if the report
/// does not exist, is not accepted, or already belongs to a payout document.
pub async fn claim_for_payout(
    id: &ReportId,
    payout_id: &PayoutId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let Some(mut report) = fetch_report(id, conn).await? else {
        return Ok(false);
    };
    if report.status != ReportStatus::Accepted || report.payout_document_id.is_some() {
        return Ok(false);
    }
    let expected_version = report.version;
    report.payout_document_id = Some(payout_id.clone());
    report.updated_at = now;
    let claimed = matches!(update_report(&report, expected_version, conn).await?, UpdateResult::Updated(_));
    Ok(claimed)
}

/// Detaches every report from the given payout document.
pub async fn release_from_payout(payout_id: &PayoutId, conn: &mut SqliteConnection) -> Result<usize, SqliteDatabaseError> {
    let reports = fetch_reports(ReportFilter::default().with_payout_document_id(payout_id.clone()), conn).await?;
    let mut released = 0;
    for mut report in reports {
        let expected_version = report.version;
        report.payout_document_id = None;
        if let UpdateResult::Updated(_) = update_report(&report, expected_version, conn).await? {
            released += 1;
        }
    }
    Ok(released)
}
