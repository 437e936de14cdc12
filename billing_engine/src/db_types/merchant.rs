use billing_common::{CurrencyCode, Percent};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::MerchantId;

/// Bank details used as the destination of payout documents. The banking currency is the merchant's payout
/// currency: royalty reports, balances and payouts for this merchant are all kept in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantBanking {
    pub currency: CurrencyCode,
    pub account_holder: String,
    pub account_number: String,
    pub swift: String,
    pub bank_name: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    pub id: MerchantId,
    pub name: String,
    /// Merchant category code. Selects the cost rules that apply to this merchant's transactions.
    pub mcc_code: String,
    /// The platform's legal entity responsible for this merchant.
    pub operating_company_id: String,
    pub banking: Option<MerchantBanking>,
    /// Payouts below this amount (in the payout currency) are deferred to a later cycle.
    pub min_payout_amount: Decimal,
    /// Share of each sale's net revenue that is withheld against chargeback risk.
    pub rolling_reserve: Percent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Merchant {
    pub fn new<S: Into<String>>(id: MerchantId, name: S, mcc_code: S, operating_company_id: S) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            mcc_code: mcc_code.into(),
            operating_company_id: operating_company_id.into(),
            banking: None,
            min_payout_amount: Decimal::ZERO,
            rolling_reserve: Percent::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_banking(mut self, banking: MerchantBanking) -> Self {
        self.banking = Some(banking);
        self
    }

    pub fn with_min_payout_amount(mut self, amount: Decimal) -> Self {
        self.min_payout_amount = amount;
        self
    }

    pub fn with_rolling_reserve(mut self, reserve: Percent) -> Self {
        self.rolling_reserve = reserve;
        self
    }

    pub fn payout_currency(&self) -> Option<CurrencyCode> {
        self.banking.as_ref().map(|b| b.currency)
    }
}

impl MerchantBanking {
    pub fn new(currency: CurrencyCode, account_holder: &str, account_number: &str) -> Self {
        Self {
            currency,
            account_holder: account_holder.to_string(),
            account_number: account_number.to_string(),
            swift: String::default(),
            bank_name: String::default(),
            details: String::default(),
        }
    }
}
