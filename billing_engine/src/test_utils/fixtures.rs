//! Ready-made merchants, cost rules and orders. The tariffs reproduce the reference scenario: a 100 USD card payment
//! at 2.5% + 0.30 leaves the merchant 97.20.
use billing_common::{CurrencyCode, Decimal, Money, Percent};
use chrono::{DateTime, Utc};

use crate::{
    db::traits::{CostTableManagement, MerchantManagement},
    db_types::{
        Merchant,
        MerchantBanking,
        MerchantId,
        MoneyBackCostMerchant,
        MoneyBackCostSystem,
        Order,
        OrderId,
        PaymentChannelCostMerchant,
        PaymentChannelCostSystem,
        PaymentMethod,
        RuleGeography,
        UndoReason,
    },
    fees::refund_fees::REFUND_PAYMENT_STAGE,
};

pub const METHOD: &str = "VISA";
pub const MCC_CODE: &str = "5816";
pub const OPERATING_COMPANY: &str = "opco-1";

pub fn money(amount: Decimal, currency: CurrencyCode) -> Money {
    Money::new(amount, currency).expect("Invalid amount")
}

pub fn merchant(id: &str, currency: CurrencyCode) -> Merchant {
    Merchant::new(MerchantId::from(id), format!("Merchant {id}"), MCC_CODE.to_string(), OPERATING_COMPANY.to_string())
        .with_banking(MerchantBanking::new(currency, "Studio Ltd", "DE89370400440532013000"))
}

pub fn channel_tariffs(merchant_id: &str, currency: CurrencyCode) -> (PaymentChannelCostMerchant, PaymentChannelCostSystem) {
    let now = Utc::now();
    let merchant = PaymentChannelCostMerchant {
        id: format!("pcm-{merchant_id}-{currency}"),
        merchant_id: MerchantId::from(merchant_id),
        name: METHOD.into(),
        payout_currency: currency,
        min_amount: Decimal::ZERO,
        geography: RuleGeography::any(),
        mcc_code: MCC_CODE.into(),
        method_percent: Percent::from_percentage(Decimal::new(25, 1)),
        method_fix_amount: money(Decimal::new(30, 2), currency),
        ps_percent: Percent::ZERO,
        ps_fixed_fee: Money::zero(currency),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let system = PaymentChannelCostSystem {
        id: format!("pcs-{currency}"),
        name: METHOD.into(),
        geography: RuleGeography::any(),
        mcc_code: MCC_CODE.into(),
        operating_company_id: OPERATING_COMPANY.into(),
        percent: Percent::from_percentage(Decimal::new(18, 1)),
        fix_amount: money(Decimal::new(20, 2), currency),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    (merchant, system)
}

pub fn money_back_tariffs(
    merchant_id: &str,
    currency: CurrencyCode,
    reason: UndoReason,
    paid_by_merchant: bool,
) -> (MoneyBackCostMerchant, MoneyBackCostSystem) {
    let now = Utc::now();
    let merchant = MoneyBackCostMerchant {
        id: format!("mbm-{merchant_id}-{currency}-{reason}"),
        merchant_id: MerchantId::from(merchant_id),
        name: METHOD.into(),
        payout_currency: currency,
        undo_reason: reason,
        geography: RuleGeography::any(),
        days_from: 0,
        payment_stage: REFUND_PAYMENT_STAGE,
        mcc_code: MCC_CODE.into(),
        percent: Percent::from_percentage(Decimal::ONE),
        fix_amount: money(Decimal::new(50, 2), currency),
        is_paid_by_merchant: paid_by_merchant,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let system = MoneyBackCostSystem {
        id: format!("mbs-{currency}-{reason}"),
        name: METHOD.into(),
        payout_currency: currency,
        undo_reason: reason,
        geography: RuleGeography::any(),
        days_from: 0,
        payment_stage: REFUND_PAYMENT_STAGE,
        mcc_code: MCC_CODE.into(),
        operating_company_id: OPERATING_COMPANY.into(),
        percent: Percent::from_percentage(Decimal::new(5, 1)),
        fix_amount: Decimal::new(25, 2),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    (merchant, system)
}

/// Stores a merchant paid in `currency`, and every cost rule needed to sell and refund through [`METHOD`].
pub async fn seed_merchant<B>(db: &B, id: &str, currency: CurrencyCode) -> Merchant
where B: MerchantManagement + CostTableManagement {
    let merchant = merchant(id, currency);
    db.upsert_merchant(&merchant).await.expect("Error storing merchant");
    let (pcm, pcs) = channel_tariffs(id, currency);
    db.insert_cost_rules(&[pcm]).await.expect("Error storing tariff");
    // System rules are shared between merchants
    if db.fetch_cost_rule::<PaymentChannelCostSystem>(&pcs.id).await.expect("Error fetching rule").is_none() {
        db.insert_cost_rules(&[pcs]).await.expect("Error storing tariff");
    }
    for reason in [UndoReason::Refund, UndoReason::Chargeback] {
        let (mbm, mbs) = money_back_tariffs(id, currency, reason, true);
        db.insert_cost_rules(&[mbm]).await.expect("Error storing tariff");
        if db.fetch_cost_rule::<MoneyBackCostSystem>(&mbs.id).await.expect("Error fetching rule").is_none() {
            db.insert_cost_rules(&[mbs]).await.expect("Error storing tariff");
        }
    }
    merchant
}

pub fn paid_order(id: &str, merchant_id: &str, total: Money, paid_at: DateTime<Utc>) -> Order {
    Order::new(OrderId::from(id), MerchantId::from(merchant_id), total, PaymentMethod::new(METHOD))
        .with_project("project-1")
        .with_location("NA", "US")
        .with_item("sku-1", "Sword of Truth", total)
        .completed_at(paid_at)
}
