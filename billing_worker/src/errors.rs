use billing_engine::SqliteDatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Could not initialize the worker. {0}")]
    InitializeError(String),
    #[error("Invalid worker configuration. {0}")]
    ConfigurationError(String),
    #[error("Database error. {0}")]
    DatabaseError(#[from] SqliteDatabaseError),
    #[error("An I/O error happened in the worker. {0}")]
    IOError(#[from] std::io::Error),
}
