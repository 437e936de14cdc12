//! # Billing worker
//! Runs the scheduled side of the royalty billing engine:
//! * Generating the royalty reports of the last closed week for every merchant with banking details.
//! * Accepting pending reports on the merchant's behalf once their acceptance window has passed.
//!
//! There is no network surface. All other operations are driven through the `billing_engine` APIs directly.
//!
//! ## Configuration
//! The worker is configured via environment variables. See [config](config/index.html) for more information.

pub mod cli;
pub mod config;
pub mod errors;
pub mod workers;
