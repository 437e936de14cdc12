//! The four cost tables and the shared [`CostRule`] capability the resolver works against.
//!
//! Every rule row carries a geography (`region`, `country`), a merchant category code and an activation flag. The
//! remaining keys differ per table: system tables are scoped to an operating company, merchant tables to a single
//! merchant and payout currency, and the money-back tables add the undo reason, payment stage and a `days_from`
//! discriminator.
use std::fmt::Display;

use billing_common::{CurrencyCode, Money, Percent};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{MerchantId, UndoReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTableKind {
    PaymentChannelSystem,
    PaymentChannelMerchant,
    MoneyBackSystem,
    MoneyBackMerchant,
}

impl CostTableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostTableKind::PaymentChannelSystem => "payment_channel_system",
            CostTableKind::PaymentChannelMerchant => "payment_channel_merchant",
            CostTableKind::MoneyBackSystem => "money_back_system",
            CostTableKind::MoneyBackMerchant => "money_back_merchant",
        }
    }
}

impl Display for CostTableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//--------------------------------------    Geography     ----------------------------------------------------------
/// How specifically a rule's geography matches a lookup. Higher is more specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeoSpecificity {
    /// The rule names neither a region nor a country.
    Any,
    /// The rule names the lookup's region and no country.
    Region,
    /// The rule names the lookup's country.
    Country,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGeography {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
}

impl RuleGeography {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn region(region: &str) -> Self {
        Self { region: region.to_string(), country: String::default() }
    }

    pub fn country(country: &str) -> Self {
        Self { region: String::default(), country: country.to_string() }
    }

    /// Returns `None` when the rule names a different country or region than the lookup.
    pub fn specificity(&self, region: &str, country: &str) -> Option<GeoSpecificity> {
        match (self.region.is_empty(), self.country.is_empty()) {
            (_, false) if self.country.eq_ignore_ascii_case(country) => Some(GeoSpecificity::Country),
            (_, false) => None,
            (false, true) if self.region.eq_ignore_ascii_case(region) => Some(GeoSpecificity::Region),
            (false, true) => None,
            (true, true) => Some(GeoSpecificity::Any),
        }
    }
}

//--------------------------------------   CostCriteria   -----------------------------------------------------------
/// The lookup key for a cost rule. Only the fields relevant to the table being queried are consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CostCriteria {
    pub method: String,
    pub region: String,
    pub country: String,
    pub mcc_code: String,
    pub operating_company_id: Option<String>,
    pub merchant_id: Option<MerchantId>,
    pub payout_currency: Option<CurrencyCode>,
    pub undo_reason: Option<UndoReason>,
    pub payment_stage: Option<i32>,
    pub days_since_payment: Option<i64>,
    pub amount: Option<Decimal>,
}

impl CostCriteria {
    pub fn new(method: &str, region: &str, country: &str, mcc_code: &str) -> Self {
        Self {
            method: method.to_string(),
            region: region.to_string(),
            country: country.to_string(),
            mcc_code: mcc_code.to_string(),
            operating_company_id: None,
            merchant_id: None,
            payout_currency: None,
            undo_reason: None,
            payment_stage: None,
            days_since_payment: None,
            amount: None,
        }
    }

    pub fn with_operating_company(mut self, operating_company_id: &str) -> Self {
        self.operating_company_id = Some(operating_company_id.to_string());
        self
    }

    pub fn with_merchant(mut self, merchant_id: MerchantId, payout_currency: CurrencyCode) -> Self {
        self.merchant_id = Some(merchant_id);
        self.payout_currency = Some(payout_currency);
        self
    }

    pub fn with_payout_currency(mut self, payout_currency: CurrencyCode) -> Self {
        self.payout_currency = Some(payout_currency);
        self
    }

    pub fn with_undo_reason(mut self, reason: UndoReason, payment_stage: i32, days_since_payment: i64) -> Self {
        self.undo_reason = Some(reason);
        self.payment_stage = Some(payment_stage);
        self.days_since_payment = Some(days_since_payment);
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    /// A stable key for caching candidate lists: every field the store filters on.
    pub fn store_key(&self, kind: CostTableKind) -> String {
        format!(
            "{kind}|{}|{}|{}",
            self.method,
            self.mcc_code,
            self.merchant_id.as_ref().map(|m| m.as_str()).unwrap_or_default()
        )
    }
}

impl Display for CostCriteria {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "method={} region={} country={} mcc={}", self.method, self.region, self.country, self.mcc_code)?;
        if let Some(opco) = &self.operating_company_id {
            write!(f, " operating_company={opco}")?;
        }
        if let Some(m) = &self.merchant_id {
            write!(f, " merchant={m}")?;
        }
        if let Some(c) = &self.payout_currency {
            write!(f, " payout_currency={c}")?;
        }
        if let Some(r) = &self.undo_reason {
            write!(f, " undo_reason={r}")?;
        }
        if let Some(d) = &self.days_since_payment {
            write!(f, " days={d}")?;
        }
        Ok(())
    }
}

//--------------------------------------     CostRule      ----------------------------------------------------------
/// Behaviour shared by all four cost tables.
///
/// The resolver never inspects table-specific fields itself. It asks each candidate whether it applies to the
/// criteria ([`CostRule::applies_to`]), how specific its geography is, and for its discriminator value
/// ([`CostRule::discriminator`]); the rule with the highest `(specificity, discriminator)` wins.
pub trait CostRule: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: CostTableKind;

    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn mcc_code(&self) -> &str;
    fn is_active(&self) -> bool;
    fn geography(&self) -> &RuleGeography;

    fn merchant_id(&self) -> Option<&MerchantId> {
        None
    }

    /// Exact-match filters on the non-geographic keys.
    fn applies_to(&self, criteria: &CostCriteria) -> bool;

    /// The secondary ranking value, or `None` if the rule is out of range for the criteria.
    fn discriminator(&self, _criteria: &CostCriteria) -> Option<Decimal> {
        Some(Decimal::ZERO)
    }
}

fn same_currency(rule: CurrencyCode, criteria: Option<CurrencyCode>) -> bool {
    criteria.map(|c| c == rule).unwrap_or(false)
}

fn days_discriminator(days_from: i64, criteria: &CostCriteria) -> Option<Decimal> {
    let days = criteria.days_since_payment?;
    (days_from <= days).then(|| Decimal::from(days_from))
}

/// The platform's own cost for processing a payment through a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannelCostSystem {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub geography: RuleGeography,
    pub mcc_code: String,
    pub operating_company_id: String,
    pub percent: Percent,
    pub fix_amount: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CostRule for PaymentChannelCostSystem {
    const KIND: CostTableKind = CostTableKind::PaymentChannelSystem;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn mcc_code(&self) -> &str {
        &self.mcc_code
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn geography(&self) -> &RuleGeography {
        &self.geography
    }

    fn applies_to(&self, criteria: &CostCriteria) -> bool {
        self.name == criteria.method &&
            self.mcc_code == criteria.mcc_code &&
            criteria.operating_company_id.as_deref() == Some(self.operating_company_id.as_str())
    }
}

/// The tariff a merchant is charged for a payment channel. Tariffs are banded by order amount: the band with the
/// largest `min_amount` not exceeding the order amount applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannelCostMerchant {
    pub id: String,
    pub merchant_id: MerchantId,
    pub name: String,
    pub payout_currency: CurrencyCode,
    pub min_amount: Decimal,
    #[serde(flatten)]
    pub geography: RuleGeography,
    pub mcc_code: String,
    pub method_percent: Percent,
    pub method_fix_amount: Money,
    pub ps_percent: Percent,
    pub ps_fixed_fee: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CostRule for PaymentChannelCostMerchant {
    const KIND: CostTableKind = CostTableKind::PaymentChannelMerchant;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn mcc_code(&self) -> &str {
        &self.mcc_code
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn geography(&self) -> &RuleGeography {
        &self.geography
    }

    fn merchant_id(&self) -> Option<&MerchantId> {
        Some(&self.merchant_id)
    }

    fn applies_to(&self, criteria: &CostCriteria) -> bool {
        self.name == criteria.method &&
            self.mcc_code == criteria.mcc_code &&
            criteria.merchant_id.as_ref() == Some(&self.merchant_id) &&
            same_currency(self.payout_currency, criteria.payout_currency)
    }

    fn discriminator(&self, criteria: &CostCriteria) -> Option<Decimal> {
        let amount = criteria.amount.unwrap_or(Decimal::ZERO);
        (self.min_amount <= amount).then_some(self.min_amount)
    }
}

/// The platform's own cost for reversing a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyBackCostSystem {
    pub id: String,
    pub name: String,
    pub payout_currency: CurrencyCode,
    pub undo_reason: UndoReason,
    #[serde(flatten)]
    pub geography: RuleGeography,
    pub days_from: i64,
    pub payment_stage: i32,
    pub mcc_code: String,
    pub operating_company_id: String,
    pub percent: Percent,
    /// Always in the payout currency.
    pub fix_amount: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CostRule for MoneyBackCostSystem {
    const KIND: CostTableKind = CostTableKind::MoneyBackSystem;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn mcc_code(&self) -> &str {
        &self.mcc_code
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn geography(&self) -> &RuleGeography {
        &self.geography
    }

    fn applies_to(&self, criteria: &CostCriteria) -> bool {
        self.name == criteria.method &&
            self.mcc_code == criteria.mcc_code &&
            criteria.operating_company_id.as_deref() == Some(self.operating_company_id.as_str()) &&
            same_currency(self.payout_currency, criteria.payout_currency) &&
            criteria.undo_reason == Some(self.undo_reason) &&
            criteria.payment_stage == Some(self.payment_stage)
    }

    fn discriminator(&self, criteria: &CostCriteria) -> Option<Decimal> {
        days_discriminator(self.days_from, criteria)
    }
}

/// The tariff charged to a merchant for a refund or chargeback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyBackCostMerchant {
    pub id: String,
    pub merchant_id: MerchantId,
    pub name: String,
    pub payout_currency: CurrencyCode,
    pub undo_reason: UndoReason,
    #[serde(flatten)]
    pub geography: RuleGeography,
    pub days_from: i64,
    pub payment_stage: i32,
    pub mcc_code: String,
    pub percent: Percent,
    pub fix_amount: Money,
    /// When false the platform absorbs the refund cost.
    pub is_paid_by_merchant: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CostRule for MoneyBackCostMerchant {
    const KIND: CostTableKind = CostTableKind::MoneyBackMerchant;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn mcc_code(&self) -> &str {
        &self.mcc_code
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn geography(&self) -> &RuleGeography {
        &self.geography
    }

    fn merchant_id(&self) -> Option<&MerchantId> {
        Some(&self.merchant_id)
    }

    fn applies_to(&self, criteria: &CostCriteria) -> bool {
        self.name == criteria.method &&
            self.mcc_code == criteria.mcc_code &&
            criteria.merchant_id.as_ref() == Some(&self.merchant_id) &&
            same_currency(self.payout_currency, criteria.payout_currency) &&
            criteria.undo_reason == Some(self.undo_reason) &&
            criteria.payment_stage == Some(self.payment_stage)
    }

    fn discriminator(&self, criteria: &CostCriteria) -> Option<Decimal> {
        days_discriminator(self.days_from, criteria)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn geography_specificity() {
        assert_eq!(RuleGeography::country("DE").specificity("EU", "DE"), Some(GeoSpecificity::Country));
        assert_eq!(RuleGeography::country("FR").specificity("EU", "DE"), None);
        assert_eq!(RuleGeography::region("EU").specificity("EU", "DE"), Some(GeoSpecificity::Region));
        assert_eq!(RuleGeography::region("CIS").specificity("EU", "DE"), None);
        assert_eq!(RuleGeography::any().specificity("EU", "DE"), Some(GeoSpecificity::Any));
        assert!(GeoSpecificity::Country > GeoSpecificity::Region);
        assert!(GeoSpecificity::Region > GeoSpecificity::Any);
    }
}
