use std::time::Duration;

use billing_common::{CurrencyCode, Money, Percent};
use billing_engine::{
    db_types::{EntrySource, EntryType, OrderId, OrderRefund, OrderStatus, PaymentChannelCostMerchant, UndoReason},
    events::{EventHandlers, EventHooks, EventProducers},
    fees::{CostResolutionError, RateOracleError},
    test_utils::{
        fixtures::{merchant, paid_order, seed_merchant},
        prepare_env::fresh_database,
        StaticRateOracle,
    },
    BillingConfig,
    CalculationOptions,
    CostTableApi,
    EntryFilter,
    ErrorClass,
    FeeCalculationError,
    LedgerApi,
    MerchantManagement,
    OrderFeeApi,
    OrderManagement,
    SqliteDatabase,
};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal_macros::dec;

fn usd(v: rust_decimal::Decimal) -> Money {
    Money::new(v, CurrencyCode::USD).unwrap()
}

fn paid_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 7, 10, 15, 0).unwrap()
}

fn oracle() -> StaticRateOracle {
    StaticRateOracle::new().with_flat_rate(CurrencyCode::USD, CurrencyCode::EUR, dec!(0.9))
}

async fn setup(producers: EventProducers) -> (SqliteDatabase, StaticRateOracle, OrderFeeApi<SqliteDatabase, StaticRateOracle>) {
    let db = fresh_database().await;
    seed_merchant(&db, "studio", CurrencyCode::USD).await;
    let oracle = oracle();
    let api = OrderFeeApi::new(db.clone(), oracle.clone(), BillingConfig::default(), producers);
    (db, oracle, api)
}

#[tokio::test]
async fn hundred_dollar_card_payment() {
    let (db, _, api) = setup(EventProducers::default()).await;
    let order = paid_order("o-100", "studio", usd(dec!(100)), paid_at());
    let view = api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();

    assert_eq!(view.sale.method_fee_total, usd(dec!(2.80)));
    assert_eq!(view.sale.fees_total, usd(dec!(2.80)));
    assert_eq!(view.sale.net_revenue, usd(dec!(97.20)));
    assert_eq!(view.sale.platform_total_profit.currency, CurrencyCode::EUR);
    assert_eq!(view.accounting_currency, CurrencyCode::EUR);
    assert_eq!(view.updated_at, order.updated_at);

    let stored = api.fetch_order_view(&order.id).await.unwrap().unwrap();
    assert_eq!(stored, view);

    let ledger = LedgerApi::new(db);
    let balance = ledger.balance(&"studio".into(), CurrencyCode::USD).await.unwrap();
    assert_eq!(balance.total, usd(dec!(97.20)));
}

#[tokio::test]
async fn reprocessing_an_order_changes_nothing() {
    let (db, _, api) = setup(EventProducers::default()).await;
    let order = paid_order("o-101", "studio", usd(dec!(100)), paid_at());
    let first = api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    let second = api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    assert_eq!(first, second);
    let recalculated = api.recalculate_order(&order.id, CalculationOptions::default()).await.unwrap();
    assert_eq!(first, recalculated);

    let ledger = LedgerApi::new(db);
    let entries = ledger.entries(EntryFilter::default().with_merchant_id("studio".into())).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry_type, EntryType::MerchantNetRevenue);
    let balance = ledger.balance(&"studio".into(), CurrencyCode::USD).await.unwrap();
    assert_eq!(balance.total, usd(dec!(97.20)));
}

#[tokio::test]
async fn concurrent_submissions_post_once() {
    let (db, _, api) = setup(EventProducers::default()).await;
    let order = paid_order("o-102", "studio", usd(dec!(100)), paid_at());
    let opts = CalculationOptions::default();
    let (a, b) = tokio::join!(api.process_paid_order(&order, opts), api.process_paid_order(&order, opts));
    assert_eq!(a.unwrap(), b.unwrap());
    let ledger = LedgerApi::new(db);
    let balance = ledger.balance(&"studio".into(), CurrencyCode::USD).await.unwrap();
    assert_eq!(balance.total, usd(dec!(97.20)));
}

#[tokio::test]
async fn full_refund_reverses_the_sale() {
    let (db, _, api) = setup(EventProducers::default()).await;
    let order = paid_order("o-103", "studio", usd(dec!(100)), paid_at());
    let sale = api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    let refund = OrderRefund::new(usd(dec!(100)), UndoReason::Refund, paid_at() + ChronoDuration::days(3));
    let view = api.refund_order(&order.id, refund.clone(), CalculationOptions::default()).await.unwrap();

    let r = view.refund_breakdown.as_ref().unwrap();
    assert_eq!(r.refund_reverse_revenue, -sale.sale.net_revenue);
    assert_eq!(r.refund_fees_total, -sale.sale.fees_total);
    assert_eq!(r.merchant_refund_cost_total, usd(dec!(1.50)));
    assert_eq!(view.sale, sale.sale, "the sale side must not change when a refund is added");

    // The same refund again is a no-op
    let again = api.refund_order(&order.id, refund, CalculationOptions::default()).await.unwrap();
    assert_eq!(again, view);

    let ledger = LedgerApi::new(db);
    let balance = ledger.balance(&"studio".into(), CurrencyCode::USD).await.unwrap();
    assert_eq!(balance.total, usd(dec!(-1.50)));
}

#[tokio::test]
async fn resubmitting_a_refunded_order_keeps_the_refund() {
    let (db, _, api) = setup(EventProducers::default()).await;
    let order = paid_order("o-111", "studio", usd(dec!(100)), paid_at());
    api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    let refund = OrderRefund::new(usd(dec!(100)), UndoReason::Refund, paid_at() + ChronoDuration::days(3));
    let refunded = api.refund_order(&order.id, refund.clone(), CalculationOptions::default()).await.unwrap();

    // The payment system delivers the original notification once more
    let view = api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    assert_eq!(view, refunded);
    let stored = db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Refund);
    assert_eq!(stored.refund, Some(refund));
    let stored_view = api.fetch_order_view(&order.id).await.unwrap().unwrap();
    assert!(stored_view.refund_breakdown.is_some());

    let ledger = LedgerApi::new(db);
    let balance = ledger.balance(&"studio".into(), CurrencyCode::USD).await.unwrap();
    assert_eq!(balance.total, usd(dec!(-1.50)));
}

#[tokio::test]
async fn resubmissions_only_move_orders_forward() {
    let (db, _, api) = setup(EventProducers::default()).await;
    let order = paid_order("o-112", "studio", usd(dec!(100)), paid_at());
    api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();

    let mut complete = order.clone();
    complete.status = OrderStatus::ProjectComplete;
    let view = api.process_paid_order(&complete, CalculationOptions::default()).await.unwrap();
    assert_eq!(view.status, OrderStatus::ProjectComplete);

    let err = api.process_paid_order(&order, CalculationOptions::default()).await.unwrap_err();
    assert!(matches!(
        err,
        FeeCalculationError::InvalidStatusChange {
            from: OrderStatus::ProjectComplete,
            to: OrderStatus::PaymentSystemComplete,
            ..
        }
    ));
    assert_eq!(err.class(), ErrorClass::Workflow);
    let stored = db.fetch_order(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::ProjectComplete);
}

#[tokio::test]
async fn tariff_edits_apply_to_the_next_order() {
    let (db, _, api) = setup(EventProducers::default()).await;
    let first = paid_order("o-113", "studio", usd(dec!(100)), paid_at());
    let view = api.process_paid_order(&first, CalculationOptions::default()).await.unwrap();
    assert_eq!(view.sale.net_revenue, usd(dec!(97.20)));

    let tables = CostTableApi::new(db);
    let mut tariff = tables.fetch_rule::<PaymentChannelCostMerchant>("pcm-studio-USD").await.unwrap().unwrap();
    tariff.method_percent = Percent::from_percentage(dec!(2.9));
    assert!(tables.update_rule(&tariff).await.unwrap());

    let second = paid_order("o-114", "studio", usd(dec!(100)), paid_at());
    let view = api.process_paid_order(&second, CalculationOptions::default()).await.unwrap();
    assert_eq!(view.sale.method_fee_total, usd(dec!(3.20)));
    assert_eq!(view.sale.net_revenue, usd(dec!(96.80)));
}

#[tokio::test]
async fn recalculation_adjusts_the_ledger() {
    let (db, _, api) = setup(EventProducers::default()).await;
    let reserved = merchant("studio", CurrencyCode::USD).with_rolling_reserve(Percent::from_percentage(dec!(10)));
    db.upsert_merchant(&reserved).await.unwrap();
    let order = paid_order("o-115", "studio", usd(dec!(100)), paid_at());
    api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    let ledger = LedgerApi::new(db.clone());
    let balance = ledger.balance(&"studio".into(), CurrencyCode::USD).await.unwrap();
    assert_eq!(balance.total, usd(dec!(87.48)));

    let tables = CostTableApi::new(db);
    let mut tariff = tables.fetch_rule::<PaymentChannelCostMerchant>("pcm-studio-USD").await.unwrap().unwrap();
    tariff.method_percent = Percent::from_percentage(dec!(2.9));
    tables.update_rule(&tariff).await.unwrap();

    let view = api.recalculate_order(&order.id, CalculationOptions::default()).await.unwrap();
    assert_eq!(view.sale.net_revenue, usd(dec!(96.80)));
    let balance = ledger.balance(&"studio".into(), CurrencyCode::USD).await.unwrap();
    assert_eq!(balance.credit.checked_sub(&balance.debit).unwrap(), view.sale.net_revenue);
    assert_eq!(balance.rolling_reserve, usd(dec!(9.68)));
    assert_eq!(balance.total, usd(dec!(87.12)));

    let entries = ledger.entries(EntryFilter::default().with_merchant_id("studio".into())).await.unwrap();
    assert_eq!(entries.len(), 4);
    let adjustment = entries
        .iter()
        .find(|e| e.entry_type == EntryType::MerchantNetRevenue && e.source == EntrySource::order("o-115/1"))
        .expect("an adjustment for the lower net revenue");
    assert_eq!(adjustment.amount, usd(dec!(-0.40)));
    assert_eq!(adjustment.created_at, paid_at());

    // Nothing changed since, so nothing more is posted
    api.recalculate_order(&order.id, CalculationOptions::default()).await.unwrap();
    let entries = ledger.entries(EntryFilter::default().with_merchant_id("studio".into())).await.unwrap();
    assert_eq!(entries.len(), 4);
}

#[tokio::test]
async fn a_second_different_refund_is_rejected() {
    let (_, _, api) = setup(EventProducers::default()).await;
    let order = paid_order("o-104", "studio", usd(dec!(100)), paid_at());
    api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    let later = paid_at() + ChronoDuration::days(1);
    let refund = OrderRefund::new(usd(dec!(20)), UndoReason::Refund, later);
    api.refund_order(&order.id, refund, CalculationOptions::default()).await.unwrap();
    let other = OrderRefund::new(usd(dec!(30)), UndoReason::Refund, later);
    let err = api.refund_order(&order.id, other, CalculationOptions::default()).await.unwrap_err();
    assert!(matches!(err, FeeCalculationError::InvalidRefund { .. }));
    assert_eq!(err.class(), ErrorClass::Caller);
}

#[tokio::test]
async fn refund_above_the_total_is_rejected() {
    let (_, _, api) = setup(EventProducers::default()).await;
    let order = paid_order("o-105", "studio", usd(dec!(100)), paid_at());
    api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    let refund = OrderRefund::new(usd(dec!(100.01)), UndoReason::Refund, paid_at() + ChronoDuration::days(1));
    let err = api.refund_order(&order.id, refund, CalculationOptions::default()).await.unwrap_err();
    assert!(matches!(err, FeeCalculationError::InvalidRefund { .. }));
    let view = api.fetch_order_view(&order.id).await.unwrap().unwrap();
    assert!(view.refund.is_none(), "a rejected refund must not be stored");
}

#[tokio::test]
async fn unknown_orders_cannot_be_refunded() {
    let (_, _, api) = setup(EventProducers::default()).await;
    let refund = OrderRefund::new(usd(dec!(10)), UndoReason::Chargeback, paid_at());
    let err = api.refund_order(&OrderId::from("nope"), refund, CalculationOptions::default()).await.unwrap_err();
    assert!(matches!(err, FeeCalculationError::OrderNotFound(_)));
}

#[tokio::test]
async fn unpaid_orders_have_no_breakdown() {
    let (_, _, api) = setup(EventProducers::default()).await;
    let mut order = paid_order("o-106", "studio", usd(dec!(100)), paid_at());
    order.transaction_date = None;
    let err = api.compute_breakdown(&order, CalculationOptions::default()).await.unwrap_err();
    assert!(matches!(err, FeeCalculationError::OrderNotPaid(_)));
}

#[tokio::test]
async fn slow_oracle_times_out_and_writes_nothing() {
    let (_, oracle, api) = setup(EventProducers::default()).await;
    oracle.set_delay(Some(Duration::from_millis(1500)));
    let order = paid_order("o-107", "studio", usd(dec!(100)), paid_at());
    let opts = CalculationOptions::with_timeout(Duration::from_millis(250));
    let err = api.process_paid_order(&order, opts).await.unwrap_err();
    assert!(matches!(err, FeeCalculationError::RateTimeout(250)));
    assert!(err.is_retryable());
    assert!(api.fetch_order_view(&order.id).await.unwrap().is_none());

    oracle.set_delay(None);
    let view = api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    assert_eq!(view.sale.net_revenue, usd(dec!(97.20)));
}

#[tokio::test]
async fn the_timeout_covers_the_whole_computation() {
    let (_, oracle, api) = setup(EventProducers::default()).await;
    let order = paid_order("o-116", "studio", usd(dec!(100)), paid_at());
    api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();

    // Sale and refund rates are fetched one after the other. Each fits in the budget, both together do not.
    oracle.set_delay(Some(Duration::from_millis(200)));
    let refund = OrderRefund::new(usd(dec!(100)), UndoReason::Refund, paid_at() + ChronoDuration::days(3));
    let opts = CalculationOptions::with_timeout(Duration::from_millis(300));
    let err = api.refund_order(&order.id, refund, opts).await.unwrap_err();
    assert!(matches!(err, FeeCalculationError::RateTimeout(300)), "{err}");
    let view = api.fetch_order_view(&order.id).await.unwrap().unwrap();
    assert!(view.refund.is_none());
}

#[tokio::test]
async fn oracle_outage_is_transient() {
    let (_, oracle, api) = setup(EventProducers::default()).await;
    oracle.set_failure(Some(RateOracleError::Unavailable("maintenance".into())));
    let order = paid_order("o-108", "studio", usd(dec!(100)), paid_at());
    let err = api.process_paid_order(&order, CalculationOptions::default()).await.unwrap_err();
    assert!(matches!(err, FeeCalculationError::RateUnavailable { .. }));
    assert_eq!(err.class(), ErrorClass::Transient);
}

#[tokio::test]
async fn merchant_without_tariffs_is_a_configuration_error() {
    let (db, _, api) = setup(EventProducers::default()).await;
    let mut merchant = merchant("newcomer", CurrencyCode::USD);
    merchant.mcc_code = "9999".into();
    db.upsert_merchant(&merchant).await.unwrap();
    let order = paid_order("o-109", "newcomer", usd(dec!(100)), paid_at());
    let err = api.process_paid_order(&order, CalculationOptions::default()).await.unwrap_err();
    assert!(matches!(err, FeeCalculationError::CostResolution(CostResolutionError::RuleNotFound { .. })));
    assert_eq!(err.class(), ErrorClass::Configuration);
}

#[tokio::test]
async fn computed_views_are_published() {
    let (tx, mut rx) = tokio::sync::mpsc::channel(4);
    let mut hooks = EventHooks::default();
    hooks.on_order_view_computed(move |ev| {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(ev.view.order_id.clone()).await;
        })
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let (_, _, api) = setup(producers).await;
    let order = paid_order("o-110", "studio", usd(dec!(100)), paid_at());
    api.process_paid_order(&order, CalculationOptions::default()).await.unwrap();
    let published = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(published, order.id);
}
