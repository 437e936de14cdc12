use log::debug;
use sqlx::SqliteConnection;

use super::{
    codec::{decode, decode_all, encode, ts},
    SqliteDatabaseError,
};
use crate::{
    db::traits::UpdateResult,
    db_types::{MerchantId, PayoutDocument, PayoutDocumentChange, PayoutId},
};

pub async fn insert_document(document: &PayoutDocument, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let data = encode(document)?;
    sqlx::query(
        r#"
            INSERT INTO payout_documents (id, merchant_id, currency, status, version, data, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
        "#,
    )
    .bind(document.id.as_str())
    .bind(document.merchant_id.as_str())
    .bind(document.currency.as_str())
    .bind(document.status.as_str())
    .bind(document.version)
    .bind(data)
    .bind(ts(document.created_at))
    .bind(ts(document.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_document(
    document: &PayoutDocument,
    expected_version: i64,
    conn: &mut SqliteConnection,
) -> Result<UpdateResult<PayoutDocument>, SqliteDatabaseError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT version FROM payout_documents WHERE id = $1")
        .bind(document.id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    let found = match found {
        None => return Ok(UpdateResult::NotFound),
        Some(v) => v,
    };
    if found != expected_version {
        debug!("🗃️ Payout {} is at version {found}, but the update was based on {expected_version}", document.id);
        return Ok(UpdateResult::VersionConflict { expected: expected_version, found });
    }
    let mut updated = document.clone();
    updated.version = expected_version + 1;
    let data = encode(&updated)?;
    let result = sqlx::query(
        r#"
            UPDATE payout_documents SET status = $1, version = $2, data = $3, updated_at = $4
            WHERE id = $5 AND version = $6;
        "#,
    )
    .bind(updated.status.as_str())
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

pub async fn fetch_document(
    id: &PayoutId,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutDocument>, SqliteDatabaseError> {
    let data: Option<String> = sqlx::query_scalar("SELECT data FROM payout_documents WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?;
    data.map(|d| decode(&d)).transpose()
}

pub async fn fetch_documents_for_merchant(
    merchant_id: &MerchantId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PayoutDocument>, SqliteDatabaseError> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT data FROM payout_documents WHERE merchant_id = $1 ORDER BY created_at, id")
            .bind(merchant_id.as_str())
            .fetch_all(conn)
            .await?;
    decode_all(rows)
}

pub async fn insert_change(change: &PayoutDocumentChange, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let data = encode(change)?;
    sqlx::query("INSERT INTO payout_document_changes (payout_id, data, created_at) VALUES ($1, $2, $3)")
        .bind(change.payout_id.as_str())
        .bind(data)
        .bind(ts(change.created_at))
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_changes(
    id: &PayoutId,
    conn: &mut SqliteConnection,
) -> Result<Vec<PayoutDocumentChange>, SqliteDatabaseError> {
    let rows: Vec<String> =
        sqlx::query_scalar("SELECT data FROM payout_document_changes WHERE payout_id = $1 ORDER BY id")
            .bind(id.as_str())
            .fetch_all(conn)
            .await?;
    decode_all(rows)
}
