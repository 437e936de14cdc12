use std::collections::HashMap;

use billing_common::CurrencyCode;
use billing_engine::{
    db_types::{ReportId, RoyaltyReport},
    events::EventProducers,
    test_utils::{
        prepare_env::{create_database, random_db_path, run_migrations},
        StaticRateOracle,
    },
    BillingConfig,
    LedgerApi,
    OrderFeeApi,
    PayoutApi,
    ReportApiError,
    RoyaltyReportApi,
    SqliteDatabase,
};
use cucumber::World;
use log::*;
use rust_decimal::Decimal;

#[derive(Default, Debug, World)]
pub struct BillingWorld {
    pub system: Option<BillingSystem>,
    /// Reports by the name the scenario gave them.
    pub reports: HashMap<String, ReportId>,
    pub last_report_error: Option<ReportApiError>,
}

#[derive(Debug)]
pub struct BillingSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub orders: OrderFeeApi<SqliteDatabase, StaticRateOracle>,
    pub reports: RoyaltyReportApi<SqliteDatabase>,
    pub payouts: PayoutApi<SqliteDatabase>,
    pub ledger: LedgerApi<SqliteDatabase>,
}

impl BillingWorld {
    pub fn system(&self) -> &BillingSystem {
        self.system.as_ref().expect("Billing system not initialised")
    }

    pub fn report_id(&self, name: &str) -> ReportId {
        self.reports.get(name).cloned().unwrap_or_else(|| panic!("No report called {name}"))
    }

    pub async fn report(&self, name: &str) -> RoyaltyReport {
        let id = self.report_id(name);
        self.system().reports.fetch_report(&id).await.expect("Error fetching report").expect("Report does not exist")
    }
}

impl BillingSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        debug!("Created database: {url}");
        let oracle = StaticRateOracle::new().with_flat_rate(CurrencyCode::USD, CurrencyCode::EUR, Decimal::new(9, 1));
        let config = BillingConfig::default();
        let orders = OrderFeeApi::new(db.clone(), oracle, config.clone(), EventProducers::default());
        let reports = RoyaltyReportApi::new(db.clone(), config.clone(), EventProducers::default());
        let payouts = PayoutApi::new(db.clone(), config, EventProducers::default());
        let ledger = LedgerApi::new(db.clone());
        Self { db_path: url, db, orders, reports, payouts, ledger }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}
