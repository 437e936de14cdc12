//! Helpers for tests: a throwaway SQLite database, a scripted rate oracle and a set of ready-made domain fixtures.
pub mod fixtures;
pub mod prepare_env;
pub mod rate_oracle;

pub use rate_oracle::StaticRateOracle;
