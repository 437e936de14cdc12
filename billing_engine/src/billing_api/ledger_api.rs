use std::fmt::Debug;

use billing_common::{CurrencyCode, Money};
use chrono::{DateTime, Utc};
use log::*;

use crate::{
    billing_api::errors::LedgerApiError,
    db::traits::{BillingDatabase, EntryFilter, PostEntryResult},
    db_types::{AccountingEntry, EntrySource, EntryType, MerchantBalance, MerchantId},
};

/// `LedgerApi` is the operator's view of the merchant ledger: manual corrections, reserve releases, balances and
/// entry history. Entries for sales, refunds and payouts are posted by the other APIs.
pub struct LedgerApi<B> {
    db: B,
}

impl<B> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi")
    }
}

impl<B> LedgerApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> LedgerApi<B>
where B: BillingDatabase
{
    /// Posts a manual adjustment. Positive amounts credit the merchant, negative amounts debit them.
    ///
    /// `reference` identifies the adjustment. Posting the same reference twice is a no-op that returns
    /// [`PostEntryResult::AlreadyPosted`].
    pub async fn post_correction(
        &self,
        merchant_id: &MerchantId,
        amount: Money,
        reason: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<PostEntryResult, LedgerApiError> {
        self.post_manual(merchant_id, EntryType::Correction, amount, reason, reference, now).await
    }

    /// Returns part of the withheld rolling reserve to the merchant's payable balance.
    pub async fn release_reserve(
        &self,
        merchant_id: &MerchantId,
        amount: Money,
        reason: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<PostEntryResult, LedgerApiError> {
        self.post_manual(merchant_id, EntryType::RollingReserveRelease, amount.abs(), reason, reference, now).await
    }

    /// Posts an operator entry. Only corrections and reserve releases can be entered by hand.
    pub async fn post_manual(
        &self,
        merchant_id: &MerchantId,
        entry_type: EntryType,
        amount: Money,
        reason: &str,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<PostEntryResult, LedgerApiError> {
        if !matches!(entry_type, EntryType::Correction | EntryType::RollingReserveRelease) {
            return Err(LedgerApiError::NotManualEntry(entry_type));
        }
        if reason.trim().is_empty() {
            return Err(LedgerApiError::MissingReason);
        }
        let merchant = self.db.fetch_merchant(merchant_id).await.map_err(|e| LedgerApiError::DatabaseError(e.to_string()))?;
        if merchant.is_none() {
            return Err(LedgerApiError::MerchantNotFound(merchant_id.clone()));
        }
        let entry = AccountingEntry::new(merchant_id.clone(), entry_type, EntrySource::manual(reference), amount, now)
            .with_reason(reason.trim());
        let result = self.db.post_entry(&entry).await.map_err(|e| LedgerApiError::DatabaseError(e.to_string()))?;
        match &result {
            PostEntryResult::Posted(balance) => {
                info!("📒️ {entry_type} of {amount} posted for merchant {merchant_id}. Balance: {}", balance.total)
            },
            PostEntryResult::AlreadyPosted => debug!("📒️ {entry_type} {reference} was already posted"),
        }
        Ok(result)
    }

    /// The merchant's balance in `currency`. A merchant with no entries has a zero balance.
    pub async fn balance(&self, merchant_id: &MerchantId, currency: CurrencyCode) -> Result<MerchantBalance, LedgerApiError> {
        let balance =
            self.db.fetch_balance(merchant_id, currency).await.map_err(|e| LedgerApiError::DatabaseError(e.to_string()))?;
        Ok(balance.unwrap_or_else(|| MerchantBalance::new(merchant_id.clone(), currency)))
    }

    pub async fn entries(&self, filter: EntryFilter) -> Result<Vec<AccountingEntry>, LedgerApiError> {
        self.db.fetch_entries(filter).await.map_err(|e| LedgerApiError::DatabaseError(e.to_string()))
    }
}
