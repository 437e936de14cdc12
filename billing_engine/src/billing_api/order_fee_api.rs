//! Orchestrates fee computation for orders: locking, rule and rate lookups, persistence and ledger postings.
use std::{fmt::Debug, time::Duration};

use billing_common::Money;
use log::*;
use tokio::time::Instant;

use crate::{
    billing_api::config::{BillingConfig, CalculationOptions},
    db::traits::{BillingDatabase, InsertOrderResult},
    db_types::{
        AccountingEntry,
        CostCriteria,
        EntrySource,
        EntryType,
        Merchant,
        MerchantId,
        MoneyBackCostMerchant,
        MoneyBackCostSystem,
        Order,
        OrderId,
        OrderRefund,
        OrderStatus,
        OrderView,
        PaymentChannelCostMerchant,
        PaymentChannelCostSystem,
        UndoReason,
    },
    events::{EventProducers, OrderViewComputedEvent},
    fees::{
        compute_refund,
        compute_sale,
        refund_fees::{days_since_payment, REFUND_PAYMENT_STAGE},
        refund_rate_plan,
        sale_rate_plan,
        CostResolver,
        CurrencyConverter,
        CurrencyFrames,
        FeeCalculationError,
        RateOracle,
        RefundTariffs,
        SaleTariffs,
    },
    helpers::KeyedLocks,
};

/// `OrderFeeApi` computes and stores the fee breakdown ([`OrderView`]) of paid and refunded orders.
///
/// Computation happens in two phases. First every cost rule and exchange rate the breakdown needs is fetched, all of
/// it within the caller's timeout. Then the breakdown is computed without further I/O. Nothing is written unless both
/// phases succeed, so any failure can simply be retried.
///
/// Cost rules are read through a [`CostResolver`] that lives for one computation, so every computation sees the cost
/// tables as they were when it started.
///
/// At most one computation per order id runs at a time. Computations for different orders run fully in parallel.
pub struct OrderFeeApi<B, O> {
    db: B,
    converter: CurrencyConverter<O>,
    config: BillingConfig,
    locks: KeyedLocks<OrderId>,
    producers: EventProducers,
}

impl<B, O> Debug for OrderFeeApi<B, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFeeApi")
    }
}

impl<B, O> OrderFeeApi<B, O>
where
    B: BillingDatabase,
    O: RateOracle,
{
    pub fn new(db: B, oracle: O, config: BillingConfig, producers: EventProducers) -> Self {
        let converter = CurrencyConverter::new(oracle, config.rate_corrections.clone());
        Self { db, converter, config, locks: KeyedLocks::new(), producers }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Computes the breakdown for an order without storing anything.
    ///
    /// Calling this twice for the same order state yields identical views, including `updated_at`, which is taken from
    /// the order.
    pub async fn compute_breakdown(
        &self,
        order: &Order,
        options: CalculationOptions,
    ) -> Result<OrderView, FeeCalculationError> {
        let deadline = Instant::now() + options.timeout;
        self.breakdown_by(order, deadline).await.map_err(|e| match e {
            // Report the budget the caller gave, not what was left of it for the last call
            FeeCalculationError::RateTimeout(_) => FeeCalculationError::RateTimeout(options.timeout.as_millis() as u64),
            e => e,
        })
    }

    async fn breakdown_by(&self, order: &Order, deadline: Instant) -> Result<OrderView, FeeCalculationError> {
        let paid_at = match order.transaction_date {
            Some(ts) if order.status.is_paid() => ts,
            _ => return Err(FeeCalculationError::OrderNotPaid(order.id.clone())),
        };
        let merchant = self.fetch_merchant(&order.merchant_id).await?;
        let merchant_currency =
            merchant.payout_currency().ok_or_else(|| FeeCalculationError::MissingPayoutCurrency(merchant.id.clone()))?;
        let frames = CurrencyFrames {
            payment: order.currency(),
            merchant: merchant_currency,
            accounting: self.config.accounting_currency,
        };

        let resolver = CostResolver::new(self.db.clone());
        let tariffs = sale_tariffs(&resolver, order, &merchant, &frames, deadline).await?;
        let plan = sale_rate_plan(&frames, &tariffs);
        let rates = self.converter.fetch_sheet(&plan, paid_at, Some(&merchant.id), remaining(deadline)).await?;
        let sale = compute_sale(order, &frames, &tariffs, &rates)?;

        let refund_breakdown = match &order.refund {
            Some(refund) => {
                let refund_tariffs = refund_tariffs(&resolver, order, refund, &merchant, &frames, deadline).await?;
                let plan = refund_rate_plan(&frames, &refund_tariffs);
                let rates =
                    self.converter.fetch_sheet(&plan, refund.created_at, Some(&merchant.id), remaining(deadline)).await?;
                Some(compute_refund(order, refund, &sale, &frames, &refund_tariffs, &rates)?)
            },
            None => None,
        };
        trace!("🔄️💸️ Breakdown for order {} computed. Net revenue: {}", order.id, sale.net_revenue);

        Ok(OrderView {
            order_id: order.id.clone(),
            merchant_id: order.merchant_id.clone(),
            project_id: order.project_id.clone(),
            status: order.status,
            payment_method: order.payment_method.name.clone(),
            country: order.country.clone(),
            region: order.region.clone(),
            items: order.items.clone(),
            currency: frames.payment,
            merchant_currency: frames.merchant,
            accounting_currency: frames.accounting,
            transaction_date: paid_at,
            refund: order.refund.clone(),
            sale,
            refund_breakdown,
            updated_at: order.updated_at,
        })
    }

    /// Stores a paid order, computes its breakdown, and posts the merchant's revenue to the ledger.
    ///
    /// Re-submitting an order is safe: the view is recomputed, and the ledger only receives whatever the new figures
    /// add to the entries already posted. A re-submission may move the order forward in its lifecycle, but never back.
    /// Once an order has been refunded, re-submissions leave the stored order alone and just recompute it.
    pub async fn process_paid_order(
        &self,
        order: &Order,
        options: CalculationOptions,
    ) -> Result<OrderView, FeeCalculationError> {
        let _guard = self.lock(&order.id).await?;
        let stored =
            self.db.fetch_order(&order.id).await.map_err(|e| FeeCalculationError::DatabaseError(e.to_string()))?;
        let target = match &stored {
            None => order,
            Some(s) if s.refund.is_some() => {
                debug!("🔄️💸️ Order {} was already {}. Recomputing the stored order", order.id, s.status);
                s
            },
            Some(s) if s.status == order.status || s.status.can_transition_to(order.status) => order,
            Some(s) => {
                return Err(FeeCalculationError::InvalidStatusChange {
                    order_id: order.id.clone(),
                    from: s.status,
                    to: order.status,
                })
            },
        };
        let view = self.compute_breakdown(target, options).await?;
        match &stored {
            None => {
                let inserted =
                    self.db.insert_order(target).await.map_err(|e| FeeCalculationError::DatabaseError(e.to_string()))?;
                if inserted == InsertOrderResult::AlreadyExists {
                    // Stored by someone that does not hold our lock. Nothing was written, so let the caller retry.
                    return Err(FeeCalculationError::OrderBusy(order.id.clone()));
                }
            },
            Some(s) if s != target => {
                debug!("🔄️💸️ Order {} was already stored. Updating it", order.id);
                self.db.update_order(target).await.map_err(|e| FeeCalculationError::DatabaseError(e.to_string()))?;
            },
            Some(_) => {},
        }
        self.store_view(&view).await?;
        info!("🔄️💸️ Order {} processed. Net revenue for merchant {}: {}", order.id, view.merchant_id, view.sale.net_revenue);
        Ok(view)
    }

    /// Records a refund or chargeback against a stored order and computes the reversal.
    ///
    /// Submitting the same refund again recomputes and returns the same view. A different refund on an order that was
    /// already refunded is rejected.
    pub async fn refund_order(
        &self,
        order_id: &OrderId,
        refund: OrderRefund,
        options: CalculationOptions,
    ) -> Result<OrderView, FeeCalculationError> {
        let _guard = self.lock(order_id).await?;
        let mut order = self.fetch_order(order_id).await?;
        match &order.refund {
            Some(existing) if *existing == refund => {
                debug!("🔄️↩️ Refund for order {order_id} was already recorded. Recomputing.");
            },
            Some(existing) => {
                return Err(FeeCalculationError::InvalidRefund {
                    order_id: order_id.clone(),
                    reason: format!("the order was already refunded ({})", existing.amount),
                });
            },
            None if !order.status.refund_allowed() => {
                return Err(FeeCalculationError::InvalidRefund {
                    order_id: order_id.clone(),
                    reason: format!("orders in status {} cannot be refunded", order.status),
                });
            },
            None => {
                order.status = match refund.reason {
                    UndoReason::Refund => OrderStatus::Refund,
                    UndoReason::Chargeback => OrderStatus::Chargeback,
                };
                order.updated_at = refund.created_at;
                order.refund = Some(refund);
            },
        }
        let view = self.compute_breakdown(&order, options).await?;
        self.db.update_order(&order).await.map_err(|e| FeeCalculationError::DatabaseError(e.to_string()))?;
        self.store_view(&view).await?;
        if let Some(r) = &view.refund_breakdown {
            info!("🔄️↩️ {} of order {order_id} processed. Reverse revenue: {}", r.reason, r.refund_reverse_revenue);
        }
        Ok(view)
    }

    /// Recomputes and stores the view of a stored order, e.g. after a cost table correction. The ledger is adjusted by
    /// the difference between the new and the previously posted amounts.
    pub async fn recalculate_order(
        &self,
        order_id: &OrderId,
        options: CalculationOptions,
    ) -> Result<OrderView, FeeCalculationError> {
        let _guard = self.lock(order_id).await?;
        let order = self.fetch_order(order_id).await?;
        let view = self.compute_breakdown(&order, options).await?;
        self.store_view(&view).await?;
        Ok(view)
    }

    pub async fn fetch_order_view(&self, order_id: &OrderId) -> Result<Option<OrderView>, FeeCalculationError> {
        self.db.fetch_order_view(order_id).await.map_err(|e| FeeCalculationError::DatabaseError(e.to_string()))
    }

    async fn lock(&self, order_id: &OrderId) -> Result<crate::helpers::KeyedGuard<OrderId>, FeeCalculationError> {
        self.locks
            .lock_with_timeout(order_id, self.config.lock_timeout)
            .await
            .ok_or_else(|| FeeCalculationError::OrderBusy(order_id.clone()))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, FeeCalculationError> {
        self.db
            .fetch_order(order_id)
            .await
            .map_err(|e| FeeCalculationError::DatabaseError(e.to_string()))?
            .ok_or_else(|| FeeCalculationError::OrderNotFound(order_id.clone()))
    }

    async fn fetch_merchant(&self, merchant_id: &MerchantId) -> Result<Merchant, FeeCalculationError> {
        self.db
            .fetch_merchant(merchant_id)
            .await
            .map_err(|e| FeeCalculationError::DatabaseError(e.to_string()))?
            .ok_or_else(|| FeeCalculationError::MerchantNotFound(merchant_id.clone()))
    }

    async fn store_view(&self, view: &OrderView) -> Result<(), FeeCalculationError> {
        let merchant = self.fetch_merchant(&view.merchant_id).await?;
        let entries = ledger_entries(view, &merchant)?;
        let posted = self
            .db
            .save_order_view(view, &entries)
            .await
            .map_err(|e| FeeCalculationError::DatabaseError(e.to_string()))?;
        for entry in &posted {
            trace!("🔄️📒️ {} of {} posted for {}", entry.entry_type, entry.amount, entry.source);
        }
        self.producers.order_view_computed(OrderViewComputedEvent::new(view.clone())).await;
        Ok(())
    }
}

fn remaining(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}

async fn sale_tariffs<B: BillingDatabase>(
    resolver: &CostResolver<B>,
    order: &Order,
    merchant: &Merchant,
    frames: &CurrencyFrames,
    deadline: Instant,
) -> Result<SaleTariffs, FeeCalculationError> {
    let criteria = CostCriteria::new(&order.payment_method.name, &order.region, &order.country, &merchant.mcc_code);
    let merchant_criteria =
        criteria.clone().with_merchant(merchant.id.clone(), frames.merchant).with_amount(order.total.amount);
    let system_criteria = criteria.with_operating_company(&merchant.operating_company_id);
    let (merchant_tariff, system_cost) = futures_util::try_join!(
        resolver.resolve::<PaymentChannelCostMerchant>(&merchant_criteria, remaining(deadline)),
        resolver.resolve::<PaymentChannelCostSystem>(&system_criteria, remaining(deadline)),
    )?;
    Ok(SaleTariffs { merchant: merchant_tariff, system: system_cost })
}

async fn refund_tariffs<B: BillingDatabase>(
    resolver: &CostResolver<B>,
    order: &Order,
    refund: &OrderRefund,
    merchant: &Merchant,
    frames: &CurrencyFrames,
    deadline: Instant,
) -> Result<RefundTariffs, FeeCalculationError> {
    let paid_at = order.transaction_date.unwrap_or(order.created_at);
    let days = days_since_payment(paid_at, refund.created_at);
    let criteria = CostCriteria::new(&order.payment_method.name, &order.region, &order.country, &merchant.mcc_code)
        .with_payout_currency(frames.merchant)
        .with_undo_reason(refund.reason, REFUND_PAYMENT_STAGE, days);
    let merchant_criteria = criteria.clone().with_merchant(merchant.id.clone(), frames.merchant);
    let system_criteria = criteria.with_operating_company(&merchant.operating_company_id);
    let (merchant_tariff, system_cost) = futures_util::try_join!(
        resolver.resolve::<MoneyBackCostMerchant>(&merchant_criteria, remaining(deadline)),
        resolver.resolve::<MoneyBackCostSystem>(&system_criteria, remaining(deadline)),
    )?;
    Ok(RefundTariffs { merchant: merchant_tariff, system: system_cost })
}

/// The ledger entries implied by an order view, keyed on the order id. Entries that come out as zero are still listed
/// so that a recalculation can bring earlier postings back to zero.
pub fn ledger_entries(view: &OrderView, merchant: &Merchant) -> Result<Vec<AccountingEntry>, FeeCalculationError> {
    let order_id = view.order_id.as_str();
    let net = view.sale.net_revenue;
    let hold = if merchant.rolling_reserve.is_zero() || !net.amount.is_sign_positive() {
        Money::zero(net.currency)
    } else {
        net.scale(merchant.rolling_reserve.fraction())?
    };
    let entry = |entry_type, source, amount, created_at| {
        AccountingEntry::new(view.merchant_id.clone(), entry_type, source, amount, created_at)
    };
    let mut entries = vec![
        entry(EntryType::MerchantNetRevenue, EntrySource::order(order_id), net, view.transaction_date),
        entry(EntryType::RollingReserveHold, EntrySource::order(order_id), hold, view.transaction_date),
    ];
    if let (Some(refund), Some(breakdown)) = (&view.refund, &view.refund_breakdown) {
        let cost: Money = -breakdown.merchant_refund_cost_total;
        entries.push(entry(
            EntryType::MerchantReverseRevenue,
            EntrySource::refund(order_id),
            breakdown.refund_reverse_revenue,
            refund.created_at,
        ));
        entries.push(entry(EntryType::MerchantRefundCost, EntrySource::refund(order_id), cost, refund.created_at));
    }
    Ok(entries)
}
