use billing_common::CurrencyCode;
use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{
    codec::{decode, decode_all, encode, ts},
    SqliteDatabaseError,
};
use crate::{
    db::traits::EntryFilter,
    db_types::{AccountingEntry, EntryType, EntrySource, MerchantBalance, MerchantId},
};

pub async fn entry_exists(
    entry_type: EntryType,
    source: &EntrySource,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM accounting_entries WHERE entry_type = $1 AND source_type = $2 AND source_id = $3",
    )
    .bind(entry_type.as_str())
    .bind(source.kind.as_str())
    .bind(source.id.as_str())
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

/// Entries of the given type posted for the source, including its numbered adjustments (`<id>/<n>`), oldest first.
pub async fn fetch_source_entries(
    entry_type: EntryType,
    source: &EntrySource,
    conn: &mut SqliteConnection,
) -> Result<Vec<AccountingEntry>, SqliteDatabaseError> {
    let rows: Vec<String> = sqlx::query_scalar(
        r#"
            SELECT data FROM accounting_entries
            WHERE entry_type = $1 AND source_type = $2
              AND (source_id = $3 OR substr(source_id, 1, length($3) + 1) = $3 || '/')
            ORDER BY created_at, id;
        "#,
    )
    .bind(entry_type.as_str())
    .bind(source.kind.as_str())
    .bind(source.id.as_str())
    .fetch_all(conn)
    .await?;
    decode_all(rows)
}

pub async fn insert_entry(entry: &AccountingEntry, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let data = encode(entry)?;
    sqlx::query(
        r#"
            INSERT INTO accounting_entries (
                id,
                merchant_id,
                currency,
                entry_type,
                source_type,
                source_id,
                data,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8);
        "#,
    )
    .bind(entry.id.as_str())
    .bind(entry.merchant_id.as_str())
    .bind(entry.amount.currency.as_str())
    .bind(entry.entry_type.as_str())
    .bind(entry.source.kind.as_str())
    .bind(entry.source.id.as_str())
    .bind(data)
    .bind(ts(entry.created_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_balance(
    merchant_id: &MerchantId,
    currency: CurrencyCode,
    conn: &mut SqliteConnection,
) -> Result<Option<MerchantBalance>, SqliteDatabaseError> {
    let data: Option<String> =
        sqlx::query_scalar("SELECT data FROM merchant_balances WHERE merchant_id = $1 AND currency = $2")
            .bind(merchant_id.as_str())
            .bind(currency.as_str())
            .fetch_optional(conn)
            .await?;
    data.map(|d| decode(&d)).transpose()
}

pub async fn save_balance(balance: &MerchantBalance, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let data = encode(balance)?;
    sqlx::query(
        r#"
            INSERT INTO merchant_balances (merchant_id, currency, data, updated_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (merchant_id, currency) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at;
        "#,
    )
    .bind(balance.merchant_id.as_str())
    .bind(balance.currency.as_str())
    .bind(data)
    .bind(ts(balance.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

/// Applies the entry to the merchant's balance in its currency, creating the balance if necessary.
pub async fn apply_to_balance(
    entry: &AccountingEntry,
    conn: &mut SqliteConnection,
) -> Result<MerchantBalance, SqliteDatabaseError> {
    let currency = entry.amount.currency;
    let mut balance = fetch_balance(&entry.merchant_id, currency, conn)
        .await?
        .unwrap_or_else(|| MerchantBalance::new(entry.merchant_id.clone(), currency));
    balance.apply(entry).map_err(|e| SqliteDatabaseError::BalanceError(e.to_string()))?;
    save_balance(&balance, conn).await?;
    trace!("🗃️ Balance for merchant {} is now {}", balance.merchant_id, balance.total);
    Ok(balance)
}

/// Fetches entries according to the filter, oldest first.
pub async fn fetch_entries(
    filter: EntryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<AccountingEntry>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT data FROM accounting_entries ");
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(merchant_id) = filter.merchant_id {
        where_clause.push("merchant_id = ");
        where_clause.push_bind_unseparated(merchant_id.0);
    }
    if !filter.entry_types.is_empty() {
        where_clause.push("entry_type IN (");
        for (i, entry_type) in filter.entry_types.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(entry_type.as_str());
        }
        where_clause.push_unseparated(")");
    }
    if let Some((from, to)) = filter.window {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(ts(from));
        where_clause.push("created_at < ");
        where_clause.push_bind_unseparated(ts(to));
    }
    builder.push(" ORDER BY created_at ASC, id ASC");
    let rows: Vec<String> = builder.build_query_scalar::<String>().fetch_all(conn).await?;
    decode_all(rows)
}
