use billing_common::CurrencyCode;

use crate::{
    db::traits::{EntryFilter, PostEntryResult},
    db_types::{AccountingEntry, MerchantBalance, MerchantId},
};

#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    type Error: std::error::Error;

    /// Takes a new accounting entry, and in a single atomic transaction,
    /// * stores the entry. If an entry of the same type has already been posted for the same source, nothing further
    ///   is done and `AlreadyPosted` is returned.
    /// * creates the merchant's balance for the entry currency if it does not exist yet
    /// * applies the entry to the balance
    async fn post_entry(&self, entry: &AccountingEntry) -> Result<PostEntryResult, Self::Error>;

    async fn fetch_balance(
        &self,
        merchant_id: &MerchantId,
        currency: CurrencyCode,
    ) -> Result<Option<MerchantBalance>, Self::Error>;

    /// Entries matching the filter, oldest first.
    async fn fetch_entries(&self, filter: EntryFilter) -> Result<Vec<AccountingEntry>, Self::Error>;
}
