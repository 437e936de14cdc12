use std::fmt::Display;

use billing_common::{CurrencyCode, Money, MoneyError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::MerchantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Net revenue of a sale, credited to the merchant.
    MerchantNetRevenue,
    /// Net revenue clawed back by a refund or chargeback.
    MerchantReverseRevenue,
    /// Refund tariff charged to the merchant.
    MerchantRefundCost,
    /// Manual adjustment by an operator. May be positive or negative.
    Correction,
    RollingReserveHold,
    RollingReserveRelease,
    /// Money paid out to the merchant's bank.
    Payout,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::MerchantNetRevenue => "merchant_net_revenue",
            EntryType::MerchantReverseRevenue => "merchant_reverse_revenue",
            EntryType::MerchantRefundCost => "merchant_refund_cost",
            EntryType::Correction => "correction",
            EntryType::RollingReserveHold => "rolling_reserve_hold",
            EntryType::RollingReserveRelease => "rolling_reserve_release",
            EntryType::Payout => "payout",
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The business object an entry was posted for. An entry type can be posted at most once per source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntrySource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl EntrySource {
    pub fn order(id: &str) -> Self {
        Self { kind: "order".into(), id: id.into() }
    }

    pub fn refund(order_id: &str) -> Self {
        Self { kind: "refund".into(), id: order_id.into() }
    }

    pub fn payout(id: &str) -> Self {
        Self { kind: "payout".into(), id: id.into() }
    }

    pub fn manual(reference: &str) -> Self {
        Self { kind: "manual".into(), id: reference.into() }
    }

    /// The source of the `n`th adjustment to entries posted for this source, e.g. `order:o-1/2`.
    pub fn adjustment(&self, n: usize) -> Self {
        Self { kind: self.kind.clone(), id: format!("{}/{n}", self.id) }
    }
}

impl Display for EntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountingEntry {
    pub id: String,
    pub merchant_id: MerchantId,
    pub entry_type: EntryType,
    pub source: EntrySource,
    /// Signed: credits to the merchant are positive, debits negative. Reserve holds and releases are positive, except
    /// for hold adjustments, which are negative when a recalculation lowered the hold.
    pub amount: Money,
    #[serde(default)]
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl AccountingEntry {
    pub fn new(
        merchant_id: MerchantId,
        entry_type: EntryType,
        source: EntrySource,
        amount: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            merchant_id,
            entry_type,
            source,
            amount,
            reason: String::default(),
            created_at,
        }
    }

    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = reason.to_string();
        self
    }
}

/// Compares the entry an order should have in the ledger with the entries already posted for the same type and
/// source, and returns the entry that makes up the difference, if any.
///
/// The first posting for a source carries the source itself. Later differences are posted against
/// [`EntrySource::adjustment`] sources, numbered by how many entries were posted before.
pub fn ledger_adjustment(
    expected: &AccountingEntry,
    posted: &[AccountingEntry],
) -> Result<Option<AccountingEntry>, MoneyError> {
    if posted.is_empty() {
        return Ok((!expected.amount.is_zero()).then(|| expected.clone()));
    }
    let already = Money::sum(expected.amount.currency, posted.iter().map(|e| &e.amount))?;
    let delta = expected.amount.checked_sub(&already)?;
    if delta.is_zero() {
        return Ok(None);
    }
    let entry = AccountingEntry::new(
        expected.merchant_id.clone(),
        expected.entry_type,
        expected.source.adjustment(posted.len()),
        delta,
        expected.created_at,
    )
    .with_reason("Recalculated");
    Ok(Some(entry))
}

//--------------------------------------  MerchantBalance  ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantBalance {
    pub merchant_id: MerchantId,
    pub currency: CurrencyCode,
    pub debit: Money,
    pub credit: Money,
    pub rolling_reserve: Money,
    /// `credit - debit - rolling_reserve`
    pub total: Money,
    pub updated_at: DateTime<Utc>,
}

impl MerchantBalance {
    pub fn new(merchant_id: MerchantId, currency: CurrencyCode) -> Self {
        Self {
            merchant_id,
            currency,
            debit: Money::zero(currency),
            credit: Money::zero(currency),
            rolling_reserve: Money::zero(currency),
            total: Money::zero(currency),
            updated_at: Utc::now(),
        }
    }

    /// Applies an entry's effect to the running totals.
    pub fn apply(&mut self, entry: &AccountingEntry) -> Result<(), MoneyError> {
        let amount = entry.amount;
        match entry.entry_type {
            EntryType::RollingReserveHold => self.rolling_reserve = self.rolling_reserve.checked_add(&amount)?,
            EntryType::RollingReserveRelease => {
                self.rolling_reserve = self.rolling_reserve.checked_sub(&amount.abs())?
            },
            _ if amount.is_negative() => self.debit = self.debit.checked_add(&amount.abs())?,
            _ => self.credit = self.credit.checked_add(&amount)?,
        }
        self.total = self.credit.checked_sub(&self.debit)?.checked_sub(&self.rolling_reserve)?;
        self.updated_at = entry.created_at;
        Ok(())
    }
}
