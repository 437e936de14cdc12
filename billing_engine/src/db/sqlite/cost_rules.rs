use chrono::Utc;
use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{
    codec::{decode, decode_all, encode, ts},
    SqliteDatabaseError,
};
use crate::db_types::{CostCriteria, CostRule, CostTableKind};

/// Inserts a single rule. This is not atomic; wrap calls in a transaction when inserting a batch.
pub async fn insert_rule<R: CostRule>(rule: &R, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let data = encode(rule)?;
    sqlx::query(
        r#"
            INSERT INTO cost_rules (id, kind, name, mcc_code, merchant_id, is_active, data, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
        "#,
    )
    .bind(rule.id())
    .bind(R::KIND.as_str())
    .bind(rule.name())
    .bind(rule.mcc_code())
    .bind(rule.merchant_id().map(|m| m.as_str()))
    .bind(rule.is_active())
    .bind(data)
    .bind(ts(Utc::now()))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_rule<R: CostRule>(rule: &R, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let data = encode(rule)?;
    let result = sqlx::query(
        r#"
            UPDATE cost_rules SET name = $1, mcc_code = $2, merchant_id = $3, is_active = $4, data = $5, updated_at = $6
            WHERE id = $7 AND kind = $8;
        "#,
    )
    .bind(rule.name())
    .bind(rule.mcc_code())
    .bind(rule.merchant_id().map(|m| m.as_str()))
    .bind(rule.is_active())
    .bind(data)
    .bind(ts(Utc::now()))
    .bind(rule.id())
    .bind(R::KIND.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn delete_rule(kind: CostTableKind, id: &str, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query("DELETE FROM cost_rules WHERE id = $1 AND kind = $2")
        .bind(id)
        .bind(kind.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn fetch_rule<R: CostRule>(id: &str, conn: &mut SqliteConnection) -> Result<Option<R>, SqliteDatabaseError> {
    let data: Option<String> = sqlx::query_scalar("SELECT data FROM cost_rules WHERE id = $1 AND kind = $2")
        .bind(id)
        .bind(R::KIND.as_str())
        .fetch_optional(conn)
        .await?;
    data.map(|d| decode(&d)).transpose()
}

pub async fn fetch_rules<R: CostRule>(conn: &mut SqliteConnection) -> Result<Vec<R>, SqliteDatabaseError> {
    let rows: Vec<String> = sqlx::query_scalar("SELECT data FROM cost_rules WHERE kind = $1 ORDER BY name, id")
        .bind(R::KIND.as_str())
        .fetch_all(conn)
        .await?;
    decode_all(rows)
}

/// Fetches the active candidate rules for a lookup. Only the indexed keys are filtered here.
pub async fn find_rules<R: CostRule>(
    criteria: &CostCriteria,
    conn: &mut SqliteConnection,
) -> Result<Vec<R>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT data FROM cost_rules WHERE is_active = 1 AND kind = ");
    builder.push_bind(R::KIND.as_str());
    builder.push(" AND name = ");
    builder.push_bind(criteria.method.as_str());
    builder.push(" AND mcc_code = ");
    builder.push_bind(criteria.mcc_code.as_str());
    if matches!(R::KIND, CostTableKind::PaymentChannelMerchant | CostTableKind::MoneyBackMerchant) {
        builder.push(" AND merchant_id = ");
        builder.push_bind(criteria.merchant_id.as_ref().map(|m| m.as_str()).unwrap_or_default());
    }
    builder.push(" ORDER BY id");
    let rows: Vec<String> = builder.build_query_scalar::<String>().fetch_all(conn).await?;
    trace!("🗃️ {} candidate {} rules for {criteria}", rows.len(), R::KIND);
    decode_all(rows)
}
