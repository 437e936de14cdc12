//! Folds a merchant's order views and ledger entries for one period into royalty report totals and a per-product
//! summary. Everything here is pure; the caller collects the inputs.
use std::collections::BTreeMap;

use billing_common::{CurrencyCode, Money, MoneyError};

use crate::{
    billing_api::ReportApiError,
    db_types::{AccountingEntry, EntryType, OrderView, ReportPeriod, ReportSummary, ReportTotals, SummaryItem},
};

/// Everything that happened to a merchant's balance during one report period.
#[derive(Debug, Clone)]
pub struct PeriodActivity {
    pub currency: CurrencyCode,
    pub period: ReportPeriod,
    /// Views of orders paid inside the period.
    pub sales: Vec<OrderView>,
    /// Views of orders refunded inside the period. The sale itself may belong to an earlier period.
    pub refunds: Vec<OrderView>,
    pub corrections: Vec<AccountingEntry>,
    pub reserve_holds: Vec<AccountingEntry>,
    pub reserve_releases: Vec<AccountingEntry>,
}

impl PeriodActivity {
    pub fn new(currency: CurrencyCode, period: ReportPeriod) -> Self {
        Self {
            currency,
            period,
            sales: vec![],
            refunds: vec![],
            corrections: vec![],
            reserve_holds: vec![],
            reserve_releases: vec![],
        }
    }

    pub fn with_sales(mut self, sales: Vec<OrderView>) -> Self {
        self.sales = sales;
        self
    }

    pub fn with_refunds(mut self, refunds: Vec<OrderView>) -> Self {
        self.refunds = refunds;
        self
    }

    pub fn with_entries(mut self, entries: Vec<AccountingEntry>) -> Self {
        for entry in entries {
            match entry.entry_type {
                EntryType::Correction => self.corrections.push(entry),
                EntryType::RollingReserveHold => self.reserve_holds.push(entry),
                EntryType::RollingReserveRelease => self.reserve_releases.push(entry),
                _ => {},
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sales.is_empty() &&
            self.refunds.is_empty() &&
            self.corrections.is_empty() &&
            self.reserve_holds.is_empty() &&
            self.reserve_releases.is_empty()
    }
}

fn add(a: Money, b: Money) -> Result<Money, ReportApiError> {
    a.checked_add(&b).map_err(arithmetic)
}

fn sub(a: Money, b: Money) -> Result<Money, ReportApiError> {
    a.checked_sub(&b).map_err(arithmetic)
}

fn arithmetic(e: MoneyError) -> ReportApiError {
    ReportApiError::Arithmetic(e.to_string())
}

fn check_currency(view: &OrderView, currency: CurrencyCode) -> Result<(), ReportApiError> {
    if view.merchant_currency != currency {
        return Err(ReportApiError::CurrencyMismatch {
            order: view.order_id.to_string(),
            expected: currency,
            found: view.merchant_currency,
        });
    }
    Ok(())
}

fn record_sale(item: &mut SummaryItem, view: &OrderView) -> Result<(), ReportApiError> {
    let sale = &view.sale;
    item.sales_count += 1;
    item.gross_sales = add(item.gross_sales, sale.gross_revenue)?;
    item.gross_total = add(item.gross_total, sale.gross_revenue)?;
    item.fees = add(item.fees, sale.fees_total)?;
    item.vat = add(item.vat, sale.tax_fee_total)?;
    item.payout = add(item.payout, sale.net_revenue)?;
    Ok(())
}

fn record_refund(item: &mut SummaryItem, view: &OrderView) -> Result<(), ReportApiError> {
    let Some(refund) = &view.refund_breakdown else {
        return Ok(());
    };
    item.returns_count += 1;
    // Reversal amounts are negative
    item.gross_returns = add(item.gross_returns, refund.refund_gross_revenue.abs())?;
    item.gross_total = add(item.gross_total, refund.refund_gross_revenue)?;
    item.fees = add(item.fees, refund.refund_fees_total)?;
    item.vat = add(item.vat, refund.refund_tax_fee_total)?;
    item.payout = add(item.payout, refund.refund_reverse_revenue)?;
    item.payout = sub(item.payout, refund.merchant_refund_cost_total)?;
    Ok(())
}

fn merge_into(total: &mut SummaryItem, item: &SummaryItem) -> Result<(), ReportApiError> {
    total.sales_count += item.sales_count;
    total.returns_count += item.returns_count;
    total.gross_sales = add(total.gross_sales, item.gross_sales)?;
    total.gross_returns = add(total.gross_returns, item.gross_returns)?;
    total.gross_total = add(total.gross_total, item.gross_total)?;
    total.fees = add(total.fees, item.fees)?;
    total.vat = add(total.vat, item.vat)?;
    total.payout = add(total.payout, item.payout)?;
    Ok(())
}

fn sum_entries(currency: CurrencyCode, entries: &[AccountingEntry]) -> Result<Money, ReportApiError> {
    Money::sum(currency, entries.iter().map(|e| &e.amount)).map_err(arithmetic)
}

/// Releases are posted as positive amounts and lower the reserve.
fn net_reserve(activity: &PeriodActivity) -> Result<Money, ReportApiError> {
    let held = sum_entries(activity.currency, &activity.reserve_holds)?;
    let released = activity.reserve_releases.iter().map(|e| e.amount.abs()).collect::<Vec<_>>();
    let released = Money::sum(activity.currency, &released).map_err(arithmetic)?;
    sub(held, released)
}

/// Computes the totals and summary of a report.
///
/// All order views must be in the report currency, i.e. the merchant's payout currency. A view in any other currency
/// fails the whole aggregation with [`ReportApiError::CurrencyMismatch`].
pub fn aggregate(activity: &PeriodActivity) -> Result<(ReportTotals, ReportSummary), ReportApiError> {
    let currency = activity.currency;
    let mut products = BTreeMap::<String, SummaryItem>::new();
    for view in &activity.sales {
        check_currency(view, currency)?;
        let name = view.product_name();
        let item = products.entry(name.clone()).or_insert_with(|| SummaryItem::new(&name, currency));
        record_sale(item, view)?;
    }
    for view in &activity.refunds {
        check_currency(view, currency)?;
        let name = view.product_name();
        let item = products.entry(name.clone()).or_insert_with(|| SummaryItem::new(&name, currency));
        record_refund(item, view)?;
    }

    let mut total = SummaryItem::new("Total", currency);
    for item in products.values() {
        merge_into(&mut total, item)?;
    }
    let correction_amount = sum_entries(currency, &activity.corrections)?;
    let rolling_reserve_amount = net_reserve(activity)?;

    let totals = ReportTotals {
        transactions_count: total.sales_count + total.returns_count,
        gross_amount: total.gross_total,
        fee_amount: total.fees,
        vat_amount: total.vat,
        correction_amount,
        rolling_reserve_amount,
        payout_amount: add(total.payout, correction_amount)?,
    };
    let summary = ReportSummary {
        products: products.into_values().collect(),
        corrections: activity.corrections.clone(),
        rolling_reserves: activity.reserve_holds.iter().chain(&activity.reserve_releases).cloned().collect(),
        total,
    };
    Ok((totals, summary))
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        db_types::{EntrySource, OrderItem, OrderRefund, OrderStatus, RefundBreakdown, SaleBreakdown, UndoReason},
        fees::ErrorClass,
    };

    fn eur(v: Decimal) -> Money {
        Money::new(v, CurrencyCode::EUR).unwrap()
    }

    fn sale(gross: Decimal, fees: Decimal, vat: Decimal) -> SaleBreakdown {
        let z = eur(Decimal::ZERO);
        SaleBreakdown {
            payment_gross_revenue: eur(gross),
            payment_gross_revenue_local: eur(gross),
            payment_gross_revenue_origin: eur(gross),
            payment_gross_revenue_fx: z,
            payment_gross_revenue_fx_tax_fee: z,
            payment_gross_revenue_fx_profit: z,
            gross_revenue: eur(gross),
            payment_tax_fee: eur(vat),
            payment_tax_fee_local: eur(vat),
            payment_tax_fee_origin: eur(vat),
            tax_fee: eur(vat),
            tax_fee_currency_exchange_fee: z,
            tax_fee_total: eur(vat),
            method_fee_tariff: eur(fees - vat),
            method_fixed_fee_tariff: z,
            method_fee_total: eur(fees - vat),
            platform_method_fee_tariff_self_cost: z,
            platform_method_fee_profit: z,
            platform_method_fixed_fee_tariff_self_cost: z,
            platform_method_fixed_fee_tariff_fx_profit: z,
            platform_method_fixed_fee_tariff_total_profit: z,
            platform_method_total_profit: z,
            platform_fixed_fee: z,
            platform_fixed_fee_fx_profit: z,
            fees_total: eur(fees),
            fees_total_local: eur(fees),
            net_revenue: eur(gross - fees),
            platform_total_profit: z,
        }
    }

    fn refund(gross: Decimal, fees: Decimal, cost: Decimal) -> RefundBreakdown {
        let z = eur(Decimal::ZERO);
        RefundBreakdown {
            reason: UndoReason::Refund,
            fraction: Decimal::ONE,
            payment_refund_gross_revenue: eur(-gross),
            payment_refund_gross_revenue_local: eur(-gross),
            payment_refund_gross_revenue_origin: eur(-gross),
            refund_gross_revenue: eur(-gross),
            refund_gross_revenue_fx: z,
            payment_refund_tax_fee: z,
            refund_tax_fee: z,
            refund_tax_fee_total: z,
            refund_fees_total: eur(-fees),
            refund_reverse_revenue: eur(-(gross - fees)),
            method_refund_fee_tariff: eur(cost),
            method_refund_fixed_fee_tariff: z,
            merchant_refund_fixed_fee_tariff: z,
            platform_method_refund_fee_tariff_self_cost: z,
            platform_method_refund_fee_tariff_profit: z,
            platform_method_refund_fixed_fee_tariff_self_cost: z,
            platform_method_refund_fixed_fee_tariff_profit: z,
            merchant_refund_cost_total: eur(cost),
            platform_refund_total_profit: z,
        }
    }

    fn view(id: &str, product: &str, sale: SaleBreakdown) -> OrderView {
        let ts = Utc.with_ymd_and_hms(2024, 5, 7, 12, 0, 0).unwrap();
        OrderView {
            order_id: id.into(),
            merchant_id: "m1".into(),
            project_id: "p1".into(),
            status: OrderStatus::ProjectComplete,
            payment_method: "VISA".into(),
            country: "DE".into(),
            region: "EU".into(),
            items: vec![OrderItem { id: "i1".into(), name: product.into(), amount: sale.payment_gross_revenue }],
            currency: CurrencyCode::EUR,
            merchant_currency: CurrencyCode::EUR,
            accounting_currency: CurrencyCode::EUR,
            transaction_date: ts,
            refund: None,
            sale,
            refund_breakdown: None,
            updated_at: ts,
        }
    }

    fn refunded(mut v: OrderView, breakdown: RefundBreakdown) -> OrderView {
        let ts = Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap();
        v.status = OrderStatus::Refund;
        v.refund = Some(OrderRefund::new(breakdown.refund_gross_revenue.abs(), UndoReason::Refund, ts));
        v.refund_breakdown = Some(breakdown);
        v
    }

    fn period() -> ReportPeriod {
        ReportPeriod::previous_week(Utc.with_ymd_and_hms(2024, 5, 15, 0, 0, 0).unwrap())
    }

    fn entry(entry_type: EntryType, amount: Decimal) -> AccountingEntry {
        let ts = Utc.with_ymd_and_hms(2024, 5, 9, 0, 0, 0).unwrap();
        AccountingEntry::new("m1".into(), entry_type, EntrySource::manual("c1"), eur(amount), ts)
    }

    #[test]
    fn empty_period_has_zero_totals() {
        let activity = PeriodActivity::new(CurrencyCode::EUR, period());
        assert!(activity.is_empty());
        let (totals, summary) = aggregate(&activity).unwrap();
        assert_eq!(totals, ReportTotals::zero(CurrencyCode::EUR));
        assert!(summary.products.is_empty());
        assert_eq!(summary.total.sales_count, 0);
    }

    #[test]
    fn sales_refunds_and_corrections() {
        let a = view("o1", "Sword", sale(dec!(100), dec!(2.80), dec!(0)));
        let b = view("o2", "Shield", sale(dec!(50), dec!(1.60), dec!(0.50)));
        let c = refunded(view("o3", "Sword", sale(dec!(20), dec!(1.00), dec!(0))), refund(dec!(20), dec!(1.00), dec!(1.50)));
        let activity = PeriodActivity::new(CurrencyCode::EUR, period())
            .with_sales(vec![a, b])
            .with_refunds(vec![c])
            .with_entries(vec![
                entry(EntryType::Correction, dec!(5)),
                entry(EntryType::RollingReserveHold, dec!(9.72)),
                entry(EntryType::MerchantNetRevenue, dec!(1000)),
            ]);
        let (totals, summary) = aggregate(&activity).unwrap();
        assert_eq!(totals.transactions_count, 3);
        assert_eq!(totals.gross_amount.amount, dec!(130));
        assert_eq!(totals.fee_amount.amount, dec!(3.40));
        assert_eq!(totals.vat_amount.amount, dec!(0.50));
        assert_eq!(totals.correction_amount.amount, dec!(5));
        assert_eq!(totals.rolling_reserve_amount.amount, dec!(9.72));
        // 97.20 + 48.40 - 19.00 - 1.50 + 5
        assert_eq!(totals.payout_amount.amount, dec!(130.10));

        assert_eq!(summary.products.len(), 2);
        let sword = summary.products.iter().find(|p| p.product == "Sword").unwrap();
        assert_eq!(sword.sales_count, 1);
        assert_eq!(sword.returns_count, 1);
        assert_eq!(sword.gross_sales.amount, dec!(100));
        assert_eq!(sword.gross_returns.amount, dec!(20));
        assert_eq!(sword.gross_total.amount, dec!(80));
        assert_eq!(summary.total.payout.amount, dec!(125.10));
        assert_eq!(summary.corrections.len(), 1);
        assert_eq!(summary.rolling_reserves.len(), 1);
    }

    #[test]
    fn releases_lower_the_period_reserve() {
        let activity = PeriodActivity::new(CurrencyCode::EUR, period()).with_entries(vec![
            entry(EntryType::RollingReserveHold, dec!(9.72)),
            entry(EntryType::RollingReserveRelease, dec!(20)),
        ]);
        assert!(!activity.is_empty());
        let (totals, summary) = aggregate(&activity).unwrap();
        assert_eq!(totals.rolling_reserve_amount.amount, dec!(-10.28));
        assert!(totals.payout_amount.is_zero());
        assert_eq!(summary.rolling_reserves.len(), 2);
    }

    #[test]
    fn foreign_currency_views_are_rejected() {
        let mut v = view("o1", "Sword", sale(dec!(100), dec!(2.80), dec!(0)));
        v.merchant_currency = CurrencyCode::USD;
        let activity = PeriodActivity::new(CurrencyCode::EUR, period()).with_sales(vec![v]);
        let err = aggregate(&activity).unwrap_err();
        assert!(matches!(err, ReportApiError::CurrencyMismatch { found: CurrencyCode::USD, .. }));
        assert_eq!(err.class(), ErrorClass::Fatal);
    }
}
