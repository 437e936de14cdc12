use sqlx::SqliteConnection;

use super::{
    codec::{decode, decode_all, encode, ts},
    SqliteDatabaseError,
};
use crate::db_types::{Merchant, MerchantId};

pub async fn upsert_merchant(merchant: &Merchant, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let data = encode(merchant)?;
    sqlx::query(
        r#"
            INSERT INTO merchants (id, data, updated_at) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at;
        "#,
    )
    .bind(merchant.id.as_str())
    .bind(data)
    .bind(ts(merchant.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_merchant(
    id: &MerchantId,
    conn: &mut SqliteConnection,
) -> Result<Option<Merchant>, SqliteDatabaseError> {
    let data: Option<String> = sqlx::query_scalar("SELECT data FROM merchants WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?;
    data.map(|d| decode(&d)).transpose()
}

pub async fn fetch_merchants(conn: &mut SqliteConnection) -> Result<Vec<Merchant>, SqliteDatabaseError> {
    let rows: Vec<String> = sqlx::query_scalar("SELECT data FROM merchants ORDER BY id").fetch_all(conn).await?;
    decode_all(rows)
}
