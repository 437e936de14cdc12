pub mod db;
mod errors;

mod codec;
pub mod cost_rules;
pub mod ledger;
pub mod merchants;
pub mod orders;
pub mod payouts;
pub mod reports;

use std::env;

pub use errors::SqliteDatabaseError;
use log::info;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

const SQLITE_DB_URL: &str = "sqlite://data/billing_store.db";

pub fn db_url() -> String {
    let result = env::var("BILLING_DATABASE_URL").unwrap_or_else(|_| {
        info!("BILLING_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
