//! The storage adapter: the only place that knows how domain records look on disk.
//!
//! Records are stored as JSON documents. Decimal amounts are written as strings so that no precision is lost, and
//! index columns hold timestamps as unix milliseconds.
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

use super::SqliteDatabaseError;

pub fn encode<T: Serialize>(record: &T) -> Result<String, SqliteDatabaseError> {
    serde_json::to_string(record).map_err(|e| SqliteDatabaseError::EncodingError(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(data: &str) -> Result<T, SqliteDatabaseError> {
    serde_json::from_str(data).map_err(|e| SqliteDatabaseError::DecodingError(e.to_string()))
}

pub fn decode_all<T: DeserializeOwned>(rows: Vec<String>) -> Result<Vec<T>, SqliteDatabaseError> {
    rows.iter().map(|data| decode(data)).collect()
}

pub fn ts(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}
