use billing_common::CurrencyCode;
use billing_engine::test_utils::fixtures::seed_merchant;
use cucumber::given;

use crate::cucumber::{billing_world::BillingSystem, BillingWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut BillingWorld) {
    let system = BillingSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "merchant {word} is paid in {word}")]
async fn merchant_paid_in(world: &mut BillingWorld, merchant_id: String, currency: String) {
    let currency = currency.parse::<CurrencyCode>().expect("Unknown currency");
    seed_merchant(&world.system().db, &merchant_id, currency).await;
}
