use crate::db::traits::{
    CostTableManagement,
    LedgerManagement,
    MerchantManagement,
    OrderManagement,
    PayoutManagement,
    ReportManagement,
};

/// This trait defines the highest level of behaviour for backends supporting the billing engine.
///
/// A backend stores merchants, orders and their fee breakdowns, the four cost tables, royalty reports, payout
/// documents and the merchant ledger. The API types in this crate are generic over it, and clone it freely, so
/// implementations should be cheap handles over a shared connection pool.
#[allow(async_fn_in_trait)]
pub trait BillingDatabase:
    Clone +
    MerchantManagement +
    OrderManagement +
    CostTableManagement +
    ReportManagement +
    PayoutManagement +
    LedgerManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the underlying connection pool.
    async fn close(&mut self);
}
