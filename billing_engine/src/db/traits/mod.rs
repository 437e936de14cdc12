//! #  Storage interfaces.
//!
//! This module defines the contracts that database backends must satisfy to support the billing engine.
//!
//! * [`BillingDatabase`] is the top-level trait. It bundles all the others.
//! * [`MerchantManagement`] stores merchant records.
//! * [`OrderManagement`] stores orders and their derived order views, and answers the period-range queries used by
//!   the report aggregator.
//! * [`CostTableManagement`] provides CRUD and criteria queries for the four cost tables.
//! * [`ReportManagement`] stores royalty reports with optimistic versioning, and their audit trail.
//! * [`PayoutManagement`] stores payout documents, and atomically attaches reports to them.
//! * [`LedgerManagement`] posts accounting entries and maintains merchant balances.
mod billing_database;
mod cost_table_management;
mod data_objects;
mod ledger_management;
mod merchant_management;
mod order_management;
mod payout_management;
mod report_management;

pub use billing_database::BillingDatabase;
pub use cost_table_management::CostTableManagement;
pub use data_objects::{
    CreatePayoutResult,
    EntryFilter,
    InsertOrderResult,
    InsertReportResult,
    OrderViewFilter,
    PostEntryResult,
    ReportFilter,
    UpdateResult,
};
pub use ledger_management::LedgerManagement;
pub use merchant_management::MerchantManagement;
pub use order_management::OrderManagement;
pub use payout_management::PayoutManagement;
pub use report_management::ReportManagement;
