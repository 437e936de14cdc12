use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Database query error: {0}")]
    QueryError(String),
    #[error("Could not encode record for storage: {0}")]
    EncodingError(String),
    #[error("Stored record could not be decoded: {0}")]
    DecodingError(String),
    #[error("Could not update merchant balance: {0}")]
    BalanceError(String),
}
