use std::fmt::Debug;

use billing_common::CurrencyCode;
use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::{cost_rules, db_url, ledger, merchants, new_pool, orders, payouts, reports, SqliteDatabaseError};
use crate::{
    db::traits::{
        BillingDatabase,
        CostTableManagement,
        CreatePayoutResult,
        EntryFilter,
        InsertOrderResult,
        InsertReportResult,
        LedgerManagement,
        MerchantManagement,
        OrderManagement,
        OrderViewFilter,
        PayoutManagement,
        PostEntryResult,
        ReportFilter,
        ReportManagement,
        UpdateResult,
    },
    db_types::{
        ledger_adjustment,
        AccountingEntry,
        CostCriteria,
        CostRule,
        CostTableKind,
        Merchant,
        MerchantBalance,
        MerchantId,
        Order,
        OrderId,
        OrderView,
        PayoutDocument,
        PayoutDocumentChange,
        PayoutId,
        ReportId,
        RoyaltyReport,
        RoyaltyReportChange,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `BILLING_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let pool = new_pool(url, max_connections).await?;
        trace!("🗃️ Connected to {url}");
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl BillingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) {
        self.pool.close().await;
    }
}

impl MerchantManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn upsert_merchant(&self, merchant: &Merchant) -> Result<(), Self::Error> {
        let mut conn = self.pool.acquire().await?;
        merchants::upsert_merchant(merchant, &mut conn).await
    }

    async fn fetch_merchant(&self, id: &MerchantId) -> Result<Option<Merchant>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        merchants::fetch_merchant(id, &mut conn).await
    }

    async fn fetch_merchants(&self) -> Result<Vec<Merchant>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        merchants::fetch_merchants(&mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn insert_order(&self, order: &Order) -> Result<InsertOrderResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        if result == InsertOrderResult::Inserted {
            debug!("🗃️ Order {} has been saved in the DB", order.id);
        }
        Ok(result)
    }

    async fn update_order(&self, order: &Order) -> Result<bool, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order(order, &mut conn).await
    }

    async fn fetch_order(&self, id: &OrderId) -> Result<Option<Order>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(id, &mut conn).await
    }

    async fn save_order_view(
        &self,
        view: &OrderView,
        entries: &[AccountingEntry],
    ) -> Result<Vec<AccountingEntry>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        orders::upsert_order_view(view, &mut tx).await?;
        let mut posted = Vec::new();
        for expected in entries {
            let existing = ledger::fetch_source_entries(expected.entry_type, &expected.source, &mut tx).await?;
            let adjustment = ledger_adjustment(expected, &existing)
                .map_err(|e| SqliteDatabaseError::BalanceError(e.to_string()))?;
            if let Some(entry) = adjustment {
                ledger::insert_entry(&entry, &mut tx).await?;
                ledger::apply_to_balance(&entry, &mut tx).await?;
                posted.push(entry);
            }
        }
        tx.commit().await?;
        debug!("🗃️ View for order {} saved with {} new ledger entries", view.order_id, posted.len());
        Ok(posted)
    }

    async fn fetch_order_view(&self, id: &OrderId) -> Result<Option<OrderView>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_view(id, &mut conn).await
    }

    async fn fetch_order_views(&self, filter: OrderViewFilter) -> Result<Vec<OrderView>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_views(filter, &mut conn).await
    }
}

impl CostTableManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn insert_cost_rules<R: CostRule>(&self, rules: &[R]) -> Result<usize, Self::Error> {
        let mut tx = self.pool.begin().await?;
        for rule in rules {
            cost_rules::insert_rule(rule, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ {} {} rules inserted", rules.len(), R::KIND);
        Ok(rules.len())
    }

    async fn update_cost_rule<R: CostRule>(&self, rule: &R) -> Result<bool, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        cost_rules::update_rule(rule, &mut conn).await
    }

    async fn delete_cost_rule(&self, kind: CostTableKind, id: &str) -> Result<bool, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        cost_rules::delete_rule(kind, id, &mut conn).await
    }

    async fn fetch_cost_rule<R: CostRule>(&self, id: &str) -> Result<Option<R>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        cost_rules::fetch_rule(id, &mut conn).await
    }

    async fn fetch_cost_rules<R: CostRule>(&self) -> Result<Vec<R>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        cost_rules::fetch_rules(&mut conn).await
    }

    async fn find_cost_rules<R: CostRule>(&self, criteria: &CostCriteria) -> Result<Vec<R>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        cost_rules::find_rules(criteria, &mut conn).await
    }
}

impl ReportManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn insert_report(&self, report: &RoyaltyReport) -> Result<InsertReportResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let result = reports::idempotent_insert(report, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn update_report(
        &self,
        report: &RoyaltyReport,
        expected_version: i64,
        change: Option<&RoyaltyReportChange>,
    ) -> Result<UpdateResult<RoyaltyReport>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let result = reports::update_report(report, expected_version, &mut tx).await?;
        if let (UpdateResult::Updated(_), Some(change)) = (&result, change) {
            reports::insert_change(change, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_report(&self, id: &ReportId) -> Result<Option<RoyaltyReport>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        reports::fetch_report(id, &mut conn).await
    }

    async fn fetch_report_for_period(
        &self,
        merchant_id: &MerchantId,
        period_from: DateTime<Utc>,
    ) -> Result<Option<RoyaltyReport>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        reports::fetch_report_for_period(merchant_id, period_from, &mut conn).await
    }

    async fn fetch_reports(&self, filter: ReportFilter) -> Result<Vec<RoyaltyReport>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        reports::fetch_reports(filter, &mut conn).await
    }

    async fn fetch_report_changes(&self, id: &ReportId) -> Result<Vec<RoyaltyReportChange>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        reports::fetch_changes(id, &mut conn).await
    }
}

impl PayoutManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn create_payout_document(
        &self,
        document: &PayoutDocument,
        change: &PayoutDocumentChange,
    ) -> Result<CreatePayoutResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        for report_id in &document.source_reports {
            if !reports::claim_for_payout(report_id, &document.id, document.created_at, &mut tx).await? {
                debug!("🗃️ Report {report_id} cannot be attached to payout {}. Rolling back.", document.id);
                tx.rollback().await?;
                return Ok(CreatePayoutResult::ReportUnavailable(report_id.clone()));
            }
        }
        payouts::insert_document(document, &mut tx).await?;
        payouts::insert_change(change, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payout document {} created for {} reports", document.id, document.source_reports.len());
        Ok(CreatePayoutResult::Created)
    }

    async fn update_payout_document(
        &self,
        document: &PayoutDocument,
        expected_version: i64,
        change: &PayoutDocumentChange,
        release_reports: bool,
    ) -> Result<UpdateResult<PayoutDocument>, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let result = payouts::update_document(document, expected_version, &mut tx).await?;
        if let UpdateResult::Updated(_) = &result {
            payouts::insert_change(change, &mut tx).await?;
            if release_reports {
                let released = reports::release_from_payout(&document.id, &mut tx).await?;
                debug!("🗃️ {released} reports released from payout {}", document.id);
            }
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_payout_document(&self, id: &PayoutId) -> Result<Option<PayoutDocument>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payouts::fetch_document(id, &mut conn).await
    }

    async fn fetch_payout_documents(&self, merchant_id: &MerchantId) -> Result<Vec<PayoutDocument>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payouts::fetch_documents_for_merchant(merchant_id, &mut conn).await
    }

    async fn fetch_payout_changes(&self, id: &PayoutId) -> Result<Vec<PayoutDocumentChange>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        payouts::fetch_changes(id, &mut conn).await
    }
}

impl LedgerManagement for SqliteDatabase {
    type Error = SqliteDatabaseError;

    async fn post_entry(&self, entry: &AccountingEntry) -> Result<PostEntryResult, Self::Error> {
        let mut tx = self.pool.begin().await?;
        if ledger::entry_exists(entry.entry_type, &entry.source, &mut tx).await? {
            trace!("🗃️ {} entry for {} was already posted", entry.entry_type, entry.source);
            tx.rollback().await?;
            return Ok(PostEntryResult::AlreadyPosted);
        }
        ledger::insert_entry(entry, &mut tx).await?;
        let balance = ledger::apply_to_balance(entry, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ {} entry of {} posted for {}", entry.entry_type, entry.amount, entry.source);
        Ok(PostEntryResult::Posted(balance))
    }

    async fn fetch_balance(
        &self,
        merchant_id: &MerchantId,
        currency: CurrencyCode,
    ) -> Result<Option<MerchantBalance>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_balance(merchant_id, currency, &mut conn).await
    }

    async fn fetch_entries(&self, filter: EntryFilter) -> Result<Vec<AccountingEntry>, Self::Error> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_entries(filter, &mut conn).await
    }
}
