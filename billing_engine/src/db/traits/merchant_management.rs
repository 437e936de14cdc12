use crate::db_types::{Merchant, MerchantId};

/// Storage for merchant records. The billing core only reads merchants; onboarding writes them.
#[allow(async_fn_in_trait)]
pub trait MerchantManagement {
    type Error: std::error::Error;

    /// Inserts the merchant, or replaces the stored record if it already exists.
    async fn upsert_merchant(&self, merchant: &Merchant) -> Result<(), Self::Error>;

    async fn fetch_merchant(&self, id: &MerchantId) -> Result<Option<Merchant>, Self::Error>;

    async fn fetch_merchants(&self) -> Result<Vec<Merchant>, Self::Error>;
}
