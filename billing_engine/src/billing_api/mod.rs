//! # Billing engine public API
//!
//! The `billing_api` module exposes the programmatic API of the billing engine. Each API covers one area, so that
//! clients can pick the functionality they need.
//!
//! * [`order_fee_api`] computes the fee breakdown of paid and refunded orders, stores the resulting order views and
//!   posts the merchant's revenue to the ledger.
//! * [`report_api`] aggregates order views into weekly royalty reports and drives the report status lifecycle,
//!   including automatic acceptance.
//! * [`payout_api`] builds payout documents from accepted reports and tracks them until the money is sent.
//! * [`ledger_api`] gives operators manual corrections, reserve releases and merchant balances.
//! * [`cost_table_api`] maintains the cost tables the fee computations draw on.
//!
//! # API usage
//!
//! Every API is created from a database backend that implements the storage traits it needs.
//!
//! ```rust,ignore
//! use billing_engine::{events::EventProducers, BillingConfig, OrderFeeApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://billing.db", 5).await?;
//! let api = OrderFeeApi::new(db, my_rate_oracle, BillingConfig::default(), EventProducers::default());
//! let view = api.process_paid_order(&order, api.config().calculation_options()).await?;
//! ```
pub mod config;
pub mod cost_table_api;
pub mod errors;
pub mod ledger_api;
pub mod order_fee_api;
pub mod payout_api;
pub mod report_api;

pub use config::{BillingConfig, CalculationOptions};
pub use errors::{CostTableApiError, LedgerApiError, PayoutApiError, ReportApiError};
