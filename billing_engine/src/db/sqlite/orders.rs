use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::{
    codec::{decode, decode_all, encode, ts},
    SqliteDatabaseError,
};
use crate::{
    db::traits::{InsertOrderResult, OrderViewFilter},
    db_types::{Order, OrderId, OrderView},
};

pub async fn idempotent_insert(order: &Order, conn: &mut SqliteConnection) -> Result<InsertOrderResult, SqliteDatabaseError> {
    let result = if order_exists(&order.id, conn).await? {
        InsertOrderResult::AlreadyExists
    } else {
        insert_order(order, conn).await?;
        InsertOrderResult::Inserted
    };
    Ok(result)
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
async fn insert_order(order: &Order, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let data = encode(order)?;
    sqlx::query(
        r#"
            INSERT INTO orders (id, merchant_id, status, transaction_date, data, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6);
        "#,
    )
    .bind(order.id.as_str())
    .bind(order.merchant_id.as_str())
    .bind(order.status.to_string())
    .bind(order.transaction_date.map(ts))
    .bind(data)
    .bind(ts(order.updated_at))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_order(order: &Order, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let data = encode(order)?;
    let result = sqlx::query(
        r#"
            UPDATE orders SET merchant_id = $1, status = $2, transaction_date = $3, data = $4, updated_at = $5
            WHERE id = $6;
        "#,
    )
    .bind(order.merchant_id.as_str())
    .bind(order.status.to_string())
    .bind(order.transaction_date.map(ts))
    .bind(data)
    .bind(ts(order.updated_at))
    .bind(order.id.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn fetch_order(id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, SqliteDatabaseError> {
    let data = sqlx::query_scalar::<_, String>("SELECT data FROM orders WHERE id = $1")
        .bind(id.as_str())
        .fetch_one(conn)
        .await;
    match data {
        Err(sqlx::Error::RowNotFound) => Ok(None),
        Err(e) => Err(e.into()),
        Ok(d) => Ok(Some(decode(&d)?)),
    }
}

/// Checks whether the order with the given `OrderId` already exists in the database.
pub async fn order_exists(id: &OrderId, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE id = $1").bind(id.as_str()).fetch_one(conn).await?;
    Ok(count > 0)
}

pub async fn upsert_order_view(view: &OrderView, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    let data = encode(view)?;
    sqlx::query(
        r#"
            INSERT INTO order_views (order_id, merchant_id, status, transaction_date, refund_date, data, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (order_id) DO UPDATE SET
                merchant_id = excluded.merchant_id,
                status = excluded.status,
                transaction_date = excluded.transaction_date,
                refund_date = excluded.refund_date,
                data = excluded.data,
                updated_at = excluded.updated_at;
        "#,
    )
    .bind(view.order_id.as_str())
    .bind(view.merchant_id.as_str())
    .bind(view.status.to_string())
    .bind(ts(view.transaction_date))
    .bind(view.refund_date().map(ts))
    .bind(data)
    .bind(ts(view.updated_at))
    .execute(conn)
    .await?;
    trace!("🗃️ Order view for {} saved", view.order_id);
    Ok(())
}

pub async fn fetch_order_view(
    id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderView>, SqliteDatabaseError> {
    let data: Option<String> = sqlx::query_scalar("SELECT data FROM order_views WHERE order_id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?;
    data.map(|d| decode(&d)).transpose()
}

/// Fetches order views according to criteria specified in the `OrderViewFilter`
///
/// Resulting views are ordered by `transaction_date` in ascending order
pub async fn fetch_order_views(
    filter: OrderViewFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderView>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT data FROM order_views ");
    if !filter.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(merchant_id) = filter.merchant_id {
        where_clause.push("merchant_id = ");
        where_clause.push_bind_unseparated(merchant_id.0);
    }
    match (filter.transaction_window, filter.refund_window) {
        (Some((from, to)), Some((refund_from, refund_to))) => {
            where_clause.push("((transaction_date >= ");
            where_clause.push_bind_unseparated(ts(from));
            where_clause.push_unseparated(" AND transaction_date < ");
            where_clause.push_bind_unseparated(ts(to));
            where_clause.push_unseparated(") OR (refund_date >= ");
            where_clause.push_bind_unseparated(ts(refund_from));
            where_clause.push_unseparated(" AND refund_date < ");
            where_clause.push_bind_unseparated(ts(refund_to));
            where_clause.push_unseparated("))");
        },
        (Some((from, to)), None) => {
            where_clause.push("transaction_date >= ");
            where_clause.push_bind_unseparated(ts(from));
            where_clause.push("transaction_date < ");
            where_clause.push_bind_unseparated(ts(to));
        },
        (None, Some((from, to))) => {
            where_clause.push("refund_date >= ");
            where_clause.push_bind_unseparated(ts(from));
            where_clause.push("refund_date < ");
            where_clause.push_bind_unseparated(ts(to));
        },
        (None, None) => {},
    }
    if !filter.statuses.is_empty() {
        where_clause.push("status IN (");
        for (i, status) in filter.statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.to_string());
        }
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY transaction_date ASC, order_id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows: Vec<String> = builder.build_query_scalar::<String>().fetch_all(conn).await?;
    trace!("🗃️ Result of fetch_order_views: {}", rows.len());
    decode_all(rows)
}
