//! Royalty reports: aggregation of a merchant's period activity, and the report status lifecycle.
//!
//! Both halves are pure. [`crate::RoyaltyReportApi`] collects the inputs, holds the per-report locks and writes the
//! results.
pub mod aggregator;
pub mod lifecycle;

pub use aggregator::{aggregate, PeriodActivity};
pub use lifecycle::{apply_transition, audit_change, TransitionRequest};
