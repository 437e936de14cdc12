use billing_common::{CurrencyCode, Money};
use billing_engine::{
    db_types::{EntryType, MerchantId},
    test_utils::{fixtures::merchant, prepare_env::fresh_database},
    EntryFilter,
    LedgerApi,
    LedgerApiError,
    MerchantManagement,
    PostEntryResult,
    SqliteDatabase,
};
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;

fn eur(v: rust_decimal::Decimal) -> Money {
    Money::new(v, CurrencyCode::EUR).unwrap()
}

async fn setup() -> (SqliteDatabase, LedgerApi<SqliteDatabase>, MerchantId) {
    let db = fresh_database().await;
    let studio = merchant("studio", CurrencyCode::EUR);
    db.upsert_merchant(&studio).await.unwrap();
    let api = LedgerApi::new(db.clone());
    (db, api, studio.id)
}

#[tokio::test]
async fn corrections_move_the_balance_both_ways() {
    let (_db, api, id) = setup().await;
    let now = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
    let result = api.post_correction(&id, eur(dec!(40)), "Missed sale", "ticket-1", now).await.unwrap();
    let PostEntryResult::Posted(balance) = result else { panic!("Correction was not posted") };
    assert_eq!(balance.total.amount, dec!(40));
    let later = now + chrono::Duration::hours(1);
    api.post_correction(&id, eur(dec!(-15.50)), "Duplicate payout", "ticket-2", later).await.unwrap();
    let balance = api.balance(&id, CurrencyCode::EUR).await.unwrap();
    assert_eq!(balance.credit.amount, dec!(40));
    assert_eq!(balance.debit.amount, dec!(15.50));
    assert_eq!(balance.total.amount, dec!(24.50));
    let entries = api.entries(EntryFilter::default().with_merchant_id(id.clone())).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.entry_type == EntryType::Correction));
    assert_eq!(entries[1].reason, "Duplicate payout");
}

#[tokio::test]
async fn a_reference_is_only_posted_once() {
    let (_db, api, id) = setup().await;
    let now = Utc::now();
    let first = api.post_correction(&id, eur(dec!(10)), "Goodwill", "ticket-7", now).await.unwrap();
    assert!(matches!(first, PostEntryResult::Posted(_)));
    let second = api.post_correction(&id, eur(dec!(10)), "Goodwill", "ticket-7", now).await.unwrap();
    assert!(matches!(second, PostEntryResult::AlreadyPosted));
    let balance = api.balance(&id, CurrencyCode::EUR).await.unwrap();
    assert_eq!(balance.total.amount, dec!(10));
}

#[tokio::test]
async fn releasing_the_reserve_lowers_the_withheld_amount() {
    let (_db, api, id) = setup().await;
    let now = Utc::now();
    api.post_correction(&id, eur(dec!(100)), "Opening balance", "open", now).await.unwrap();
    // The sign of a release is ignored
    let result = api.release_reserve(&id, eur(dec!(-5)), "Reserve period over", "release-1", now).await.unwrap();
    let PostEntryResult::Posted(balance) = result else { panic!("Release was not posted") };
    assert_eq!(balance.rolling_reserve.amount, dec!(-5));
    assert_eq!(balance.total.amount, dec!(105));
}

#[tokio::test]
async fn only_corrections_and_releases_are_manual() {
    let (_db, api, id) = setup().await;
    let now = Utc::now();
    for entry_type in [EntryType::MerchantNetRevenue, EntryType::Payout, EntryType::RollingReserveHold] {
        let err = api.post_manual(&id, entry_type, eur(dec!(1)), "Because", "r", now).await.unwrap_err();
        assert_eq!(err, LedgerApiError::NotManualEntry(entry_type));
    }
    let entries = api.entries(EntryFilter::default()).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn manual_entries_need_a_reason_and_a_merchant() {
    let (_db, api, id) = setup().await;
    let now = Utc::now();
    let err = api.post_correction(&id, eur(dec!(1)), "   ", "r1", now).await.unwrap_err();
    assert_eq!(err, LedgerApiError::MissingReason);
    let ghost = MerchantId::from("ghost");
    let err = api.post_correction(&ghost, eur(dec!(1)), "Typo", "r2", now).await.unwrap_err();
    assert_eq!(err, LedgerApiError::MerchantNotFound(ghost));
}

#[tokio::test]
async fn merchants_without_entries_have_a_zero_balance() {
    let (_db, api, id) = setup().await;
    let balance = api.balance(&id, CurrencyCode::USD).await.unwrap();
    assert_eq!(balance.currency, CurrencyCode::USD);
    assert!(balance.total.is_zero());
}
