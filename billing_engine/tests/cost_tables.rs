use billing_common::{CurrencyCode, Percent};
use billing_engine::{
    db_types::{CostCriteria, CostTableKind, MerchantId, PaymentChannelCostMerchant, PaymentChannelCostSystem},
    test_utils::{
        fixtures::{channel_tariffs, MCC_CODE, METHOD},
        prepare_env::fresh_database,
    },
    CostTableApi,
    CostTableApiError,
    CostTableManagement,
    SqliteDatabase,
};
use rust_decimal_macros::dec;

async fn setup() -> (SqliteDatabase, CostTableApi<SqliteDatabase>) {
    let db = fresh_database().await;
    let api = CostTableApi::new(db.clone());
    (db, api)
}

#[tokio::test]
async fn rules_can_be_added_edited_and_removed() {
    let (_db, api) = setup().await;
    let (pcm, pcs) = channel_tariffs("studio", CurrencyCode::USD);
    assert_eq!(api.add_rules(&[pcm.clone()]).await.unwrap(), 1);
    assert_eq!(api.add_rules(&[pcs.clone()]).await.unwrap(), 1);

    let stored = api.fetch_rule::<PaymentChannelCostMerchant>(&pcm.id).await.unwrap().unwrap();
    assert_eq!(stored.merchant_id, pcm.merchant_id);
    assert_eq!(stored.method_fix_amount, pcm.method_fix_amount);
    // Ids are scoped to their table
    assert!(api.fetch_rule::<PaymentChannelCostSystem>(&pcm.id).await.unwrap().is_none());

    let mut edited = pcm.clone();
    edited.method_percent = Percent::from_percentage(dec!(2.9));
    assert!(api.update_rule(&edited).await.unwrap());
    let stored = api.fetch_rule::<PaymentChannelCostMerchant>(&pcm.id).await.unwrap().unwrap();
    assert_eq!(stored.method_percent, Percent::from_percentage(dec!(2.9)));

    assert!(api.delete_rule(CostTableKind::PaymentChannelMerchant, &pcm.id).await.unwrap());
    assert!(!api.delete_rule(CostTableKind::PaymentChannelMerchant, &pcm.id).await.unwrap());
    assert!(api.fetch_rules::<PaymentChannelCostMerchant>().await.unwrap().is_empty());
    assert_eq!(api.fetch_rules::<PaymentChannelCostSystem>().await.unwrap().len(), 1);
}

#[tokio::test]
async fn updating_a_missing_rule_changes_nothing() {
    let (_db, api) = setup().await;
    let (pcm, _) = channel_tariffs("studio", CurrencyCode::USD);
    assert!(!api.update_rule(&pcm).await.unwrap());
    assert!(api.fetch_rules::<PaymentChannelCostMerchant>().await.unwrap().is_empty());
}

#[tokio::test]
async fn incomplete_rules_are_rejected() {
    let (_db, api) = setup().await;
    let (pcm, pcs) = channel_tariffs("studio", CurrencyCode::USD);

    let mut no_id = pcs.clone();
    no_id.id = String::new();
    let mut no_method = pcs.clone();
    no_method.name = " ".into();
    let mut no_mcc = pcs;
    no_mcc.mcc_code = String::new();
    for rule in [no_id, no_method, no_mcc] {
        let err = api.add_rules(&[rule]).await.unwrap_err();
        assert!(matches!(err, CostTableApiError::InvalidRule(_)), "{err}");
    }

    let mut no_merchant = pcm;
    no_merchant.merchant_id = MerchantId::from("");
    let err = api.update_rule(&no_merchant).await.unwrap_err();
    assert!(matches!(err, CostTableApiError::InvalidRule(_)));
    assert!(api.fetch_rules::<PaymentChannelCostSystem>().await.unwrap().is_empty());
}

#[tokio::test]
async fn a_failed_batch_stores_nothing() {
    let (_db, api) = setup().await;
    let (first, _) = channel_tariffs("studio", CurrencyCode::USD);
    let mut second = first.clone();
    second.payout_currency = CurrencyCode::EUR;
    // Same id twice
    let err = api.add_rules(&[second, first]).await.unwrap_err();
    assert!(matches!(err, CostTableApiError::DatabaseError(_)));
    assert!(api.fetch_rules::<PaymentChannelCostMerchant>().await.unwrap().is_empty());
}

#[tokio::test]
async fn lookups_skip_inactive_and_foreign_rules() {
    let (db, api) = setup().await;
    let (studio, _) = channel_tariffs("studio", CurrencyCode::USD);
    let (other, _) = channel_tariffs("other", CurrencyCode::USD);
    let mut retired = studio.clone();
    retired.id = "pcm-studio-retired".into();
    retired.is_active = false;
    api.add_rules(&[studio.clone(), other, retired]).await.unwrap();

    let criteria = CostCriteria::new(METHOD, "NA", "US", MCC_CODE)
        .with_merchant(MerchantId::from("studio"), CurrencyCode::USD);
    let found = db.find_cost_rules::<PaymentChannelCostMerchant>(&criteria).await.unwrap();
    let ids = found.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec![studio.id.as_str()]);
}
