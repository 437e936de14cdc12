use std::str::FromStr;

use billing_common::{CurrencyCode, Money};
use billing_engine::{
    db_types::{MerchantId, PayoutStatus, ReportId, ReportPeriod, ReportStatus},
    test_utils::fixtures::paid_order,
    CalculationOptions,
    PayoutOutcome,
    PayoutStatusUpdate,
    ReportApiError,
    ReportGeneration,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use cucumber::{then, when};
use rust_decimal::Decimal;

use crate::cucumber::BillingWorld;

fn date(s: &str) -> DateTime<Utc> {
    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("Dates are written as YYYY-MM-DD");
    Utc.from_utc_datetime(&day.and_hms_opt(12, 0, 0).expect("Invalid time"))
}

fn money(amount: &str, currency: &str) -> Money {
    let amount = Decimal::from_str(amount).expect("Not a valid amount");
    let currency = CurrencyCode::from_str(currency).expect("Unknown currency");
    Money::new(amount, currency).expect("Invalid amount")
}

#[when(expr = "order {word} from merchant {word} is paid {word} {word} on {word}")]
async fn order_paid(world: &mut BillingWorld, order_id: String, merchant_id: String, amount: String, ccy: String, day: String) {
    let order = paid_order(&order_id, &merchant_id, money(&amount, &ccy), date(&day));
    world.system().orders.process_paid_order(&order, CalculationOptions::default()).await.expect("Error processing order");
}

#[when(expr = "I generate report {word} for merchant {word} for the week starting {word}")]
async fn generate_report(world: &mut BillingWorld, name: String, merchant_id: String, day: String) {
    let from = date(&day) - Duration::hours(12);
    let period = ReportPeriod::new(from, from + Duration::weeks(1));
    let result = world
        .system()
        .reports
        .generate_for_merchant(&MerchantId::from(merchant_id), period, Utc::now())
        .await
        .expect("Error generating report");
    let report = match result {
        ReportGeneration::Created(r) => r,
        other => panic!("Expected a new report, got {other:?}"),
    };
    world.reports.insert(name, report.id);
}

#[when(expr = "report {word} is sent to the merchant")]
async fn send_report(world: &mut BillingWorld, name: String) {
    let id = world.report_id(&name);
    let result = world.system().reports.send_to_merchant(&id, Utc::now()).await;
    record(world, result.map(|_| ()));
}

#[when(expr = "the merchant accepts report {word}")]
async fn accept_report(world: &mut BillingWorld, name: String) {
    let id = world.report_id(&name);
    let result = world.system().reports.accept(&id, "192.168.1.10", Utc::now()).await;
    record(world, result.map(|_| ()));
}

#[when(expr = "the merchant disputes report {word} because {string}")]
async fn dispute_report(world: &mut BillingWorld, name: String, reason: String) {
    let id = world.report_id(&name);
    let result = world.system().reports.dispute(&id, &reason, "192.168.1.10", Utc::now()).await;
    record(world, result.map(|_| ()));
}

#[when(expr = "report {word} is recomputed")]
async fn recompute_report(world: &mut BillingWorld, name: String) {
    let id = world.report_id(&name);
    let result = world.system().reports.recompute(&id, Utc::now()).await;
    record(world, result.map(|_| ()));
}

#[when(expr = "the acceptance deadline of report {word} passes")]
async fn deadline_passes(world: &mut BillingWorld, name: String) {
    let report = world.report(&name).await;
    let deadline = report.accept_expire_at.expect("Report has no acceptance deadline");
    world.system().reports.auto_accept_expired(deadline + Duration::minutes(1)).await.expect("Error auto-accepting reports");
}

#[when(expr = "a payout for merchant {word} is built from reports {word} and paid")]
async fn pay_out(world: &mut BillingWorld, merchant_id: String, names: String) {
    let ids = names.split(',').map(|n| world.report_id(n.trim())).collect::<Vec<ReportId>>();
    let payouts = &world.system().payouts;
    let outcome = payouts.build(&MerchantId::from(merchant_id), &ids, Utc::now()).await.expect("Error building payout");
    let PayoutOutcome::Created(doc) = outcome else { panic!("The payout was deferred: {outcome:?}") };
    payouts
        .change_status(&doc.id, PayoutStatus::Pending, PayoutStatusUpdate::default(), Utc::now())
        .await
        .expect("Error sending payout");
    payouts
        .change_status(&doc.id, PayoutStatus::Paid, PayoutStatusUpdate::paid("BANK-REF-1"), Utc::now())
        .await
        .expect("Error marking payout as paid");
}

fn record(world: &mut BillingWorld, result: Result<(), ReportApiError>) {
    world.last_report_error = result.err();
}

#[then(expr = "report {word} is {word}")]
async fn check_status(world: &mut BillingWorld, name: String, status: String) {
    let expected = ReportStatus::from_str(&status).expect("Unknown report status");
    let report = world.report(&name).await;
    assert_eq!(report.status, expected, "Report {name} has the wrong status");
}

#[then(expr = "report {word} pays out {word} {word}")]
async fn check_payout_amount(world: &mut BillingWorld, name: String, amount: String, ccy: String) {
    let report = world.report(&name).await;
    assert_eq!(report.totals.payout_amount, money(&amount, &ccy), "Payout amount is incorrect");
}

#[then(expr = "report {word} was accepted automatically")]
async fn check_auto_accepted(world: &mut BillingWorld, name: String) {
    let report = world.report(&name).await;
    assert!(report.is_auto_accepted, "Report {name} was not auto-accepted");
}

#[then(expr = "report {word} has {int} audit entries")]
async fn check_audit_trail(world: &mut BillingWorld, name: String, count: usize) {
    let id = world.report_id(&name);
    let changes = world.system().reports.fetch_changes(&id).await.expect("Error fetching changes");
    assert_eq!(changes.len(), count, "Audit trail has the wrong length");
}

#[then("the last report action was rejected as an invalid transition")]
async fn check_invalid_transition(world: &mut BillingWorld) {
    let err = world.last_report_error.as_ref().expect("The last report action succeeded");
    assert!(matches!(err, ReportApiError::InvalidTransition { .. }), "Unexpected error: {err}");
}

#[then("the last report action was rejected because the report is locked")]
async fn check_immutable(world: &mut BillingWorld) {
    let err = world.last_report_error.as_ref().expect("The last report action succeeded");
    assert!(matches!(err, ReportApiError::Immutable { .. }), "Unexpected error: {err}");
}

#[then(expr = "merchant {word} has a balance of {word} {word}")]
async fn check_balance(world: &mut BillingWorld, merchant_id: String, amount: String, ccy: String) {
    let expected = money(&amount, &ccy);
    let balance = world
        .system()
        .ledger
        .balance(&MerchantId::from(merchant_id), expected.currency)
        .await
        .expect("Error fetching balance");
    assert_eq!(balance.total, expected, "Balance is incorrect");
}
