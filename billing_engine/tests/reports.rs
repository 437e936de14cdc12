use billing_common::{CurrencyCode, Money};
use billing_engine::{
    db_types::{ChangeSource, Merchant, MerchantId, ReportPeriod, ReportStatus, RoyaltyReport},
    events::EventProducers,
    test_utils::{
        fixtures::{paid_order, seed_merchant, OPERATING_COMPANY},
        prepare_env::fresh_database,
        StaticRateOracle,
    },
    BillingConfig,
    CalculationOptions,
    LedgerApi,
    MerchantManagement,
    OrderFeeApi,
    ReportApiError,
    ReportGeneration,
    RoyaltyReportApi,
    SqliteDatabase,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;

fn usd(v: rust_decimal::Decimal) -> Money {
    Money::new(v, CurrencyCode::USD).unwrap()
}

fn week() -> ReportPeriod {
    ReportPeriod::new(Utc.with_ymd_and_hms(2024, 5, 6, 0, 0, 0).unwrap(), Utc.with_ymd_and_hms(2024, 5, 13, 0, 0, 0).unwrap())
}

fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 13, 1, 0, 0).unwrap()
}

/// A merchant with a single 100 USD sale in [`week`], and the report API over the same database.
async fn merchant_with_sale(id: &str) -> (SqliteDatabase, RoyaltyReportApi<SqliteDatabase>) {
    let db = fresh_database().await;
    seed_merchant(&db, id, CurrencyCode::USD).await;
    let oracle = StaticRateOracle::new().with_flat_rate(CurrencyCode::USD, CurrencyCode::EUR, dec!(0.9));
    let orders = OrderFeeApi::new(db.clone(), oracle, BillingConfig::default(), EventProducers::default());
    let paid_at = Utc.with_ymd_and_hms(2024, 5, 7, 10, 15, 0).unwrap();
    let order = paid_order(&format!("{id}-order-1"), id, usd(dec!(100)), paid_at);
    orders.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    let api = RoyaltyReportApi::new(db.clone(), BillingConfig::default(), EventProducers::default());
    (db, api)
}

async fn new_report(api: &RoyaltyReportApi<SqliteDatabase>, id: &str) -> RoyaltyReport {
    match api.generate_for_merchant(&MerchantId::from(id), week(), monday()).await.unwrap() {
        ReportGeneration::Created(r) => r,
        other => panic!("Expected a new report, got {other:?}"),
    }
}

#[tokio::test]
async fn weekly_report_totals_match_the_ledger() {
    let (db, api) = merchant_with_sale("studio").await;
    let report = new_report(&api, "studio").await;
    assert_eq!(report.status, ReportStatus::New);
    assert_eq!(report.currency, CurrencyCode::USD);
    assert_eq!(report.totals.transactions_count, 1);
    assert_eq!(report.totals.gross_amount, usd(dec!(100)));
    assert_eq!(report.totals.fee_amount, usd(dec!(2.80)));
    assert_eq!(report.totals.payout_amount, usd(dec!(97.20)));
    assert_eq!(report.summary.products.len(), 1);
    assert_eq!(report.summary.products[0].product, "Sword of Truth");

    let ledger = LedgerApi::new(db);
    let balance = ledger.balance(&MerchantId::from("studio"), CurrencyCode::USD).await.unwrap();
    assert_eq!(balance.total, report.totals.payout_amount);
}

#[tokio::test]
async fn regenerating_a_new_report_refreshes_it_in_place() {
    let (db, api) = merchant_with_sale("studio").await;
    let report = new_report(&api, "studio").await;
    let ledger = LedgerApi::new(db);
    ledger
        .post_correction(&MerchantId::from("studio"), usd(dec!(-5)), "Duplicate key refund", "corr-1", Utc.with_ymd_and_hms(2024, 5, 8, 9, 0, 0).unwrap())
        .await
        .unwrap();

    let again = api.generate_for_merchant(&MerchantId::from("studio"), week(), monday()).await.unwrap();
    let refreshed = match again {
        ReportGeneration::Recomputed(r) => r,
        other => panic!("Expected a recomputed report, got {other:?}"),
    };
    assert_eq!(refreshed.id, report.id);
    assert_eq!(refreshed.version, report.version + 1);
    assert_eq!(refreshed.totals.correction_amount, usd(dec!(-5)));
    assert_eq!(refreshed.totals.payout_amount, usd(dec!(92.20)));
    assert_eq!(api.fetch_reports(Default::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reports_go_through_review_and_acceptance() {
    let (_, api) = merchant_with_sale("studio").await;
    let report = new_report(&api, "studio").await;
    let sent_at = monday() + Duration::hours(1);
    let pending = api.send_to_merchant(&report.id, sent_at).await.unwrap();
    assert_eq!(pending.status, ReportStatus::Pending);
    assert_eq!(pending.accept_expire_at, Some(sent_at + BillingConfig::default().accept_window));

    let accepted = api.accept(&report.id, "10.0.0.7", sent_at + Duration::hours(2)).await.unwrap();
    assert_eq!(accepted.status, ReportStatus::Accepted);
    assert!(!accepted.is_auto_accepted);
    assert_eq!(accepted.accepted_at, Some(sent_at + Duration::hours(2)));

    let changes = api.fetch_changes(&report.id).await.unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].from_status, ReportStatus::New);
    assert_eq!(changes[0].to_status, ReportStatus::Pending);
    assert_eq!(changes[1].to_status, ReportStatus::Accepted);
    assert_eq!(changes[1].source, ChangeSource::Merchant);
    assert_eq!(changes[1].ip, "10.0.0.7");
    assert_ne!(changes[0].hash, changes[1].hash);

    let err = api.accept(&report.id, "10.0.0.7", sent_at + Duration::hours(3)).await.unwrap_err();
    assert!(matches!(err, ReportApiError::InvalidTransition { from: ReportStatus::Accepted, to: ReportStatus::Accepted }));
    let err = api.recompute(&report.id, sent_at + Duration::hours(3)).await.unwrap_err();
    assert!(matches!(err, ReportApiError::Immutable { .. }));
}

#[tokio::test]
async fn disputes_need_a_reason_and_reopen_the_report() {
    let (_, api) = merchant_with_sale("studio").await;
    let report = new_report(&api, "studio").await;
    let t0 = monday() + Duration::hours(1);
    api.send_to_merchant(&report.id, t0).await.unwrap();

    let err = api.dispute(&report.id, "  ", "10.0.0.7", t0 + Duration::hours(1)).await.unwrap_err();
    assert_eq!(err, ReportApiError::MissingDisputeReason);

    let disputed = api.dispute(&report.id, "Missing sales from Friday", "10.0.0.7", t0 + Duration::hours(1)).await.unwrap();
    assert_eq!(disputed.status, ReportStatus::Dispute);
    assert_eq!(disputed.dispute_reason.as_deref(), Some("Missing sales from Friday"));
    assert!(disputed.accept_expire_at.is_none());

    let recomputed = api.recompute(&report.id, t0 + Duration::hours(2)).await.unwrap();
    assert_eq!(recomputed.status, ReportStatus::Dispute);

    let resent = api.send_to_merchant(&report.id, t0 + Duration::hours(3)).await.unwrap();
    assert_eq!(resent.status, ReportStatus::Pending);
    assert_eq!(resent.dispute_closed_at, Some(t0 + Duration::hours(3)));
    assert!(resent.accept_expire_at.is_some());
}

#[tokio::test]
async fn expired_reports_are_accepted_automatically() {
    let (_, api) = merchant_with_sale("studio").await;
    let report = new_report(&api, "studio").await;
    let sent_at = monday() + Duration::hours(1);
    api.send_to_merchant(&report.id, sent_at).await.unwrap();
    let window = BillingConfig::default().accept_window;

    let early = api.auto_accept_expired(sent_at + window - Duration::minutes(1)).await.unwrap();
    assert!(early.is_empty());

    let accepted = api.auto_accept_expired(sent_at + window + Duration::minutes(1)).await.unwrap();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].status, ReportStatus::Accepted);
    assert!(accepted[0].is_auto_accepted);
    let changes = api.fetch_changes(&report.id).await.unwrap();
    assert_eq!(changes.last().unwrap().source, ChangeSource::Auto);

    // Nothing left to do on a second pass
    let again = api.auto_accept_expired(sent_at + window + Duration::hours(1)).await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn accepted_reports_are_not_regenerated() {
    let (_, api) = merchant_with_sale("studio").await;
    let report = new_report(&api, "studio").await;
    api.send_to_merchant(&report.id, monday()).await.unwrap();
    let accepted = api.accept(&report.id, "", monday() + Duration::hours(1)).await.unwrap();
    let result = api.generate_for_merchant(&MerchantId::from("studio"), week(), monday() + Duration::hours(2)).await.unwrap();
    assert_eq!(result, ReportGeneration::Skipped(accepted));
}

#[tokio::test]
async fn racing_accept_and_dispute_have_one_winner() {
    let (_, api) = merchant_with_sale("studio").await;
    let report = new_report(&api, "studio").await;
    api.send_to_merchant(&report.id, monday()).await.unwrap();
    let t = monday() + Duration::hours(1);
    let (accepted, disputed) =
        tokio::join!(api.accept(&report.id, "1.1.1.1", t), api.dispute(&report.id, "Wrong totals", "2.2.2.2", t));
    assert!(accepted.is_ok() ^ disputed.is_ok(), "exactly one transition must win");
    let stored = api.fetch_report(&report.id).await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(api.fetch_changes(&report.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn regeneration_racing_a_status_change_never_conflicts() {
    let (_, api) = merchant_with_sale("studio").await;
    let report = new_report(&api, "studio").await;
    let t = monday() + Duration::hours(1);
    let merchant = MerchantId::from("studio");
    let (regenerated, sent) =
        tokio::join!(api.generate_for_merchant(&merchant, week(), t), api.send_to_merchant(&report.id, t));
    assert!(matches!(regenerated, Ok(ReportGeneration::Recomputed(_) | ReportGeneration::Skipped(_))), "{regenerated:?}");
    assert!(sent.is_ok(), "{sent:?}");
    let stored = api.fetch_report(&report.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReportStatus::Pending);
    assert_eq!(stored.totals.payout_amount, usd(dec!(97.20)));
}

#[tokio::test]
async fn generate_all_skips_merchants_without_banking() {
    let (db, api) = merchant_with_sale("studio").await;
    let unbanked = Merchant::new(MerchantId::from("hobbyist"), "Hobbyist", "5816", OPERATING_COMPANY);
    db.upsert_merchant(&unbanked).await.unwrap();
    let results = api.generate_all(week(), monday()).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].report().merchant_id, MerchantId::from("studio"));

    let err = api.generate_for_merchant(&MerchantId::from("hobbyist"), week(), monday()).await.unwrap_err();
    assert_eq!(err, ReportApiError::MissingPayoutCurrency(MerchantId::from("hobbyist")));
}
