//! Royalty billing engine
//!
//! The billing engine computes what each party earns on every sale made through the payment platform, and turns
//! those earnings into merchant royalty reports and payout documents. It is storage- and transport-agnostic.
//!
//! The library is divided into these sections:
//! 1. Storage ([`mod@db`]). The storage traits that a backend must implement, and the SQLite backend. The domain
//!    types stored by the backends live in [`mod@db_types`] and are public.
//! 2. Fee computation ([`mod@fees`]). The cost rule resolver, the currency converter and the pure sale and refund
//!    fee calculators.
//! 3. Royalty reports ([`mod@reports`]). Period aggregation and the report status lifecycle.
//! 4. The public API ([`mod@billing_api`]). [`OrderFeeApi`], [`RoyaltyReportApi`], [`PayoutApi`], [`LedgerApi`] and
//!    [`CostTableApi`] tie the pieces together, and handle locking, versioning and persistence.
//!
//! The engine also emits events when order views are computed, reports change status, and payout documents are
//! created or change status. See [`mod@events`] for how to hook into them.
pub mod db;

pub mod billing_api;
pub mod db_types;
pub mod events;
pub mod fees;
pub mod helpers;
pub mod reports;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use billing_api::{
    config::{BillingConfig, CalculationOptions},
    cost_table_api::CostTableApi,
    errors::{CostTableApiError, LedgerApiError, PayoutApiError, ReportApiError},
    ledger_api::LedgerApi,
    order_fee_api::OrderFeeApi,
    payout_api::{PayoutApi, PayoutOutcome, PayoutStatusUpdate},
    report_api::{ReportGeneration, RoyaltyReportApi},
};
#[cfg(feature = "sqlite")]
pub use db::sqlite::{db::SqliteDatabase, SqliteDatabaseError};
pub use db::traits::{
    BillingDatabase,
    CostTableManagement,
    CreatePayoutResult,
    EntryFilter,
    InsertOrderResult,
    InsertReportResult,
    LedgerManagement,
    MerchantManagement,
    OrderManagement,
    OrderViewFilter,
    PayoutManagement,
    PostEntryResult,
    ReportFilter,
    ReportManagement,
    UpdateResult,
};
pub use fees::{CostResolutionError, ErrorClass, FeeCalculationError, RateOracle, RateOracleError, RateType};
