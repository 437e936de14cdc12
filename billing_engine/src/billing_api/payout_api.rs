use std::fmt::Debug;

use billing_common::Money;
use chrono::{DateTime, Utc};
use log::*;

use crate::{
    billing_api::{config::BillingConfig, errors::PayoutApiError},
    db::traits::{BillingDatabase, CreatePayoutResult, PostEntryResult, UpdateResult},
    db_types::{
        AccountingEntry,
        ChangeSource,
        EntrySource,
        EntryType,
        MerchantId,
        PayoutDocument,
        PayoutDocumentChange,
        PayoutId,
        PayoutStatus,
        ReportId,
        ReportPeriod,
        ReportStatus,
        RoyaltyReport,
    },
    events::{EventProducers, PayoutDocumentCreatedEvent, PayoutStatusChangedEvent},
    helpers::{digest_json, KeyedGuard, KeyedLocks},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutOutcome {
    Created(PayoutDocument),
    /// The payable balance does not reach the merchant's minimum payout. Nothing was written; the reports stay
    /// available for a later payout.
    BelowMinimum { balance: Money, minimum: Money },
}

/// Details that accompany a payout status change, typically reported back by the bank.
#[derive(Debug, Clone, Default)]
pub struct PayoutStatusUpdate {
    pub transaction_reference: Option<String>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub ip: String,
}

impl PayoutStatusUpdate {
    pub fn paid(transaction_reference: &str) -> Self {
        Self { transaction_reference: Some(transaction_reference.to_string()), ..Default::default() }
    }

    pub fn failed(code: &str, message: &str) -> Self {
        Self { failure_code: Some(code.to_string()), failure_message: Some(message.to_string()), ..Default::default() }
    }
}

/// `PayoutApi` turns accepted royalty reports into payout documents and tracks the documents until the money has
/// been sent.
pub struct PayoutApi<B> {
    db: B,
    config: BillingConfig,
    locks: KeyedLocks<PayoutId>,
    producers: EventProducers,
}

impl<B> Debug for PayoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B> PayoutApi<B> {
    pub fn new(db: B, config: BillingConfig, producers: EventProducers) -> Self {
        Self { db, config, locks: KeyedLocks::new(), producers }
    }
}

impl<B> PayoutApi<B>
where B: BillingDatabase
{
    /// Builds a payout document for a merchant from a set of accepted reports.
    ///
    /// All reports must belong to the merchant, be `accepted`, share the merchant's payout currency and not be
    /// attached to another payout document. The payable balance is the sum of the reports' payout amounts, less the
    /// rolling reserve those same reports withheld. Reserve released during a report's period is paid out with it.
    ///
    /// The document is written and the reports are claimed in one atomic step. If another payout claims any of the
    /// reports first, nothing is written and the call fails with [`PayoutApiError::PayoutPrecondition`].
    pub async fn build(
        &self,
        merchant_id: &MerchantId,
        report_ids: &[ReportId],
        now: DateTime<Utc>,
    ) -> Result<PayoutOutcome, PayoutApiError> {
        let merchant = self
            .db
            .fetch_merchant(merchant_id)
            .await
            .map_err(|e| PayoutApiError::DatabaseError(e.to_string()))?
            .ok_or_else(|| PayoutApiError::MerchantNotFound(merchant_id.clone()))?;
        let banking = merchant.banking.clone().ok_or_else(|| {
            PayoutApiError::PayoutPrecondition(format!("merchant {merchant_id} has no banking details"))
        })?;
        if report_ids.is_empty() {
            return Err(PayoutApiError::PayoutPrecondition("no reports were given".into()));
        }
        let mut reports = Vec::with_capacity(report_ids.len());
        for id in report_ids {
            let report = self
                .db
                .fetch_report(id)
                .await
                .map_err(|e| PayoutApiError::DatabaseError(e.to_string()))?
                .ok_or_else(|| PayoutApiError::PayoutPrecondition(format!("report {id} does not exist")))?;
            check_payable(&report, merchant_id, &banking.currency)?;
            reports.push(report);
        }
        let currency = banking.currency;

        let payout_total = Money::sum(currency, reports.iter().map(|r| &r.totals.payout_amount)).map_err(arithmetic)?;
        let total_fees = Money::sum(currency, reports.iter().map(|r| &r.totals.fee_amount)).map_err(arithmetic)?;
        let reserve =
            Money::sum(currency, reports.iter().map(|r| &r.totals.rolling_reserve_amount)).map_err(arithmetic)?;
        let balance = payout_total.checked_sub(&reserve).map_err(arithmetic)?;
        let minimum = Money::new(merchant.min_payout_amount, currency)
            .map_err(|e| PayoutApiError::Arithmetic(e.to_string()))?;
        if !balance.amount.is_sign_positive() || balance.is_zero() || balance.amount < minimum.amount {
            info!("🏦️ Payout for merchant {merchant_id} deferred. Balance {balance} is below the minimum of {minimum}");
            return Ok(PayoutOutcome::BelowMinimum { balance, minimum });
        }

        let from = reports.iter().map(|r| r.period.from).min().unwrap_or(now);
        let to = reports.iter().map(|r| r.period.to).max().unwrap_or(now);
        let period = ReportPeriod::new(from, to);
        let document = PayoutDocument {
            id: PayoutId::random(),
            merchant_id: merchant_id.clone(),
            source_reports: reports.iter().map(|r| r.id.clone()).collect(),
            total_fees,
            balance,
            currency,
            period,
            total_transactions: reports.iter().map(|r| r.totals.transactions_count).sum(),
            description: format!("Royalty payout for {period}"),
            destination: banking,
            status: PayoutStatus::Draft,
            transaction_reference: None,
            failure_code: None,
            failure_message: None,
            paid_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let change = payout_change(&document, None, ChangeSource::Admin, "", now)?;
        let result = self
            .db
            .create_payout_document(&document, &change)
            .await
            .map_err(|e| PayoutApiError::DatabaseError(e.to_string()))?;
        if let CreatePayoutResult::ReportUnavailable(id) = result {
            warn!("🏦️ Report {id} was claimed by another payout while building a payout for {merchant_id}");
            return Err(PayoutApiError::PayoutPrecondition(format!("report {id} is no longer available for payout")));
        }
        info!("🏦️ Payout document {} created for merchant {merchant_id}. Balance: {balance}", document.id);
        self.producers.payout_created(PayoutDocumentCreatedEvent::new(document.clone())).await;
        Ok(PayoutOutcome::Created(document))
    }

    /// Moves a payout document along `draft -> pending -> paid | failed`.
    ///
    /// Marking a document as paid posts a `Payout` entry against the merchant's balance. Marking it as failed
    /// releases its reports so they can be included in a new payout.
    pub async fn change_status(
        &self,
        payout_id: &PayoutId,
        to: PayoutStatus,
        update: PayoutStatusUpdate,
        now: DateTime<Utc>,
    ) -> Result<PayoutDocument, PayoutApiError> {
        let _guard = self.lock(payout_id).await?;
        let document = self
            .fetch_document(payout_id)
            .await?
            .ok_or_else(|| PayoutApiError::NotFound(payout_id.clone()))?;
        let from = document.status;
        if !from.changes_available(to) {
            return Err(PayoutApiError::InvalidTransition { from, to });
        }
        let mut next = document.clone();
        next.status = to;
        next.updated_at = now;
        next.version = document.version + 1;
        match to {
            PayoutStatus::Paid => {
                next.paid_at = Some(now);
                next.transaction_reference = update.transaction_reference.clone();
            },
            PayoutStatus::Failed => {
                next.failure_code = update.failure_code.clone();
                next.failure_message = update.failure_message.clone();
            },
            PayoutStatus::Draft | PayoutStatus::Pending => {},
        }
        let change = payout_change(&next, Some(from), ChangeSource::Admin, &update.ip, now)?;
        let release = to == PayoutStatus::Failed;
        let result = self
            .db
            .update_payout_document(&next, document.version, &change, release)
            .await
            .map_err(|e| PayoutApiError::DatabaseError(e.to_string()))?;
        let updated = match result {
            UpdateResult::Updated(d) => d,
            UpdateResult::VersionConflict { expected, found } => {
                return Err(PayoutApiError::VersionConflict { id: payout_id.clone(), expected, found });
            },
            UpdateResult::NotFound => return Err(PayoutApiError::NotFound(payout_id.clone())),
        };
        if to == PayoutStatus::Paid {
            self.post_payout_entry(&updated, now).await?;
        }
        info!("🏦️ Payout document {payout_id} moved from {from} to {to}");
        self.producers.payout_status_changed(PayoutStatusChangedEvent::new(updated.clone(), from)).await;
        Ok(updated)
    }

    pub async fn fetch_document(&self, payout_id: &PayoutId) -> Result<Option<PayoutDocument>, PayoutApiError> {
        self.db.fetch_payout_document(payout_id).await.map_err(|e| PayoutApiError::DatabaseError(e.to_string()))
    }

    pub async fn fetch_documents(&self, merchant_id: &MerchantId) -> Result<Vec<PayoutDocument>, PayoutApiError> {
        self.db.fetch_payout_documents(merchant_id).await.map_err(|e| PayoutApiError::DatabaseError(e.to_string()))
    }

    pub async fn fetch_changes(&self, payout_id: &PayoutId) -> Result<Vec<PayoutDocumentChange>, PayoutApiError> {
        self.db.fetch_payout_changes(payout_id).await.map_err(|e| PayoutApiError::DatabaseError(e.to_string()))
    }

    async fn lock(&self, payout_id: &PayoutId) -> Result<KeyedGuard<PayoutId>, PayoutApiError> {
        self.locks
            .lock_with_timeout(payout_id, self.config.lock_timeout)
            .await
            .ok_or_else(|| PayoutApiError::Busy(payout_id.clone()))
    }

    async fn post_payout_entry(&self, document: &PayoutDocument, now: DateTime<Utc>) -> Result<(), PayoutApiError> {
        let entry = AccountingEntry::new(
            document.merchant_id.clone(),
            EntryType::Payout,
            EntrySource::payout(document.id.as_str()),
            -document.balance,
            now,
        );
        let result = self.db.post_entry(&entry).await.map_err(|e| PayoutApiError::DatabaseError(e.to_string()))?;
        match result {
            PostEntryResult::Posted(balance) => {
                debug!("🏦️ Payout {} debited. Merchant balance is now {}", document.id, balance.total)
            },
            PostEntryResult::AlreadyPosted => warn!("🏦️ Payout {} had already been debited", document.id),
        }
        Ok(())
    }
}

fn arithmetic(e: billing_common::MoneyError) -> PayoutApiError {
    PayoutApiError::Arithmetic(e.to_string())
}

fn check_payable(
    report: &RoyaltyReport,
    merchant_id: &MerchantId,
    currency: &billing_common::CurrencyCode,
) -> Result<(), PayoutApiError> {
    let id = &report.id;
    if report.merchant_id != *merchant_id {
        return Err(PayoutApiError::PayoutPrecondition(format!("report {id} belongs to another merchant")));
    }
    if report.status != ReportStatus::Accepted {
        return Err(PayoutApiError::PayoutPrecondition(format!("report {id} is {}, not accepted", report.status)));
    }
    if report.currency != *currency {
        return Err(PayoutApiError::PayoutPrecondition(format!(
            "report {id} is in {}, but the merchant is paid in {currency}",
            report.currency
        )));
    }
    if let Some(payout_id) = &report.payout_document_id {
        return Err(PayoutApiError::PayoutPrecondition(format!("report {id} is already part of payout {payout_id}")));
    }
    Ok(())
}

fn payout_change(
    document: &PayoutDocument,
    from: Option<PayoutStatus>,
    source: ChangeSource,
    ip: &str,
    now: DateTime<Utc>,
) -> Result<PayoutDocumentChange, PayoutApiError> {
    let hash = digest_json(document).map_err(|e| PayoutApiError::DatabaseError(e.to_string()))?;
    Ok(PayoutDocumentChange {
        payout_id: document.id.clone(),
        source,
        ip: ip.to_string(),
        from_status: from,
        to_status: document.status,
        hash,
        created_at: now,
    })
}
