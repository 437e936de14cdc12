use billing_common::{CurrencyCode, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MerchantId, OrderId, OrderItem, OrderRefund, OrderStatus};

/// The financial breakdown of a sale.
///
/// Unless noted otherwise, amounts are in the merchant's payout currency. `payment_*` amounts without a
/// `_local`/`_origin` suffix are in the payment currency. "Local" values use the platform rate at transaction time,
/// "origin" values use the central-bank rate at booking time; the difference between them is FX spread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleBreakdown {
    pub payment_gross_revenue: Money,
    pub payment_gross_revenue_local: Money,
    pub payment_gross_revenue_origin: Money,
    pub payment_gross_revenue_fx: Money,
    pub payment_gross_revenue_fx_tax_fee: Money,
    pub payment_gross_revenue_fx_profit: Money,
    pub gross_revenue: Money,

    pub payment_tax_fee: Money,
    pub payment_tax_fee_local: Money,
    pub payment_tax_fee_origin: Money,
    pub tax_fee: Money,
    pub tax_fee_currency_exchange_fee: Money,
    pub tax_fee_total: Money,

    pub method_fee_tariff: Money,
    pub method_fixed_fee_tariff: Money,
    pub method_fee_total: Money,
    pub platform_method_fee_tariff_self_cost: Money,
    pub platform_method_fee_profit: Money,
    pub platform_method_fixed_fee_tariff_self_cost: Money,
    pub platform_method_fixed_fee_tariff_fx_profit: Money,
    pub platform_method_fixed_fee_tariff_total_profit: Money,
    pub platform_method_total_profit: Money,

    pub platform_fixed_fee: Money,
    pub platform_fixed_fee_fx_profit: Money,

    pub fees_total: Money,
    /// `fees_total` expressed in the payment currency.
    pub fees_total_local: Money,
    pub net_revenue: Money,
    /// The platform's total profit on the sale, in the accounting currency.
    pub platform_total_profit: Money,
}

/// The reversal of a sale. Reversal amounts are negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundBreakdown {
    pub reason: super::UndoReason,
    /// Refunded share of the original order, between 0 and 1.
    pub fraction: rust_decimal::Decimal,
    pub payment_refund_gross_revenue: Money,
    pub payment_refund_gross_revenue_local: Money,
    pub payment_refund_gross_revenue_origin: Money,
    pub refund_gross_revenue: Money,
    pub refund_gross_revenue_fx: Money,

    pub payment_refund_tax_fee: Money,
    pub refund_tax_fee: Money,
    pub refund_tax_fee_total: Money,
    pub refund_fees_total: Money,
    pub refund_reverse_revenue: Money,

    pub method_refund_fee_tariff: Money,
    pub method_refund_fixed_fee_tariff: Money,
    pub merchant_refund_fixed_fee_tariff: Money,
    pub platform_method_refund_fee_tariff_self_cost: Money,
    pub platform_method_refund_fee_tariff_profit: Money,
    pub platform_method_refund_fixed_fee_tariff_self_cost: Money,
    pub platform_method_refund_fixed_fee_tariff_profit: Money,
    /// The refund tariff the merchant pays. Zero when the platform absorbs refund costs.
    pub merchant_refund_cost_total: Money,
    pub platform_refund_total_profit: Money,
}

//--------------------------------------      OrderView     ---------------------------------------------------------
/// The private projection of an order and its full fee breakdown.
///
/// Views are derived data. They are regenerated from the order whenever the order or its refund changes, and are
/// never edited directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub merchant_id: MerchantId,
    pub project_id: String,
    pub status: OrderStatus,
    pub payment_method: String,
    pub country: String,
    pub region: String,
    pub items: Vec<OrderItem>,
    pub currency: CurrencyCode,
    pub merchant_currency: CurrencyCode,
    pub accounting_currency: CurrencyCode,
    pub transaction_date: DateTime<Utc>,
    pub refund: Option<OrderRefund>,
    pub sale: SaleBreakdown,
    pub refund_breakdown: Option<RefundBreakdown>,
    /// Taken from the order, so recomputing an unchanged order yields an identical view.
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    pub fn product_name(&self) -> String {
        self.items.first().map(|i| i.name.clone()).unwrap_or_else(|| self.project_id.clone())
    }

    pub fn refund_date(&self) -> Option<DateTime<Utc>> {
        self.refund.as_ref().map(|r| r.created_at)
    }

    /// Strips platform-internal profit and self-cost figures.
    pub fn public(&self) -> OrderViewPublic {
        let refund = self.refund_breakdown.as_ref();
        OrderViewPublic {
            order_id: self.order_id.clone(),
            merchant_id: self.merchant_id.clone(),
            project_id: self.project_id.clone(),
            status: self.status.public_status(),
            payment_method: self.payment_method.clone(),
            country: self.country.clone(),
            transaction_date: self.transaction_date,
            payment_gross_revenue: self.sale.payment_gross_revenue,
            gross_revenue: self.sale.gross_revenue,
            tax_fee_total: self.sale.tax_fee_total,
            method_fee_total: self.sale.method_fee_total,
            platform_fixed_fee: self.sale.platform_fixed_fee,
            fees_total: self.sale.fees_total,
            net_revenue: self.sale.net_revenue,
            refund_gross_revenue: refund.map(|r| r.refund_gross_revenue),
            refund_fees_total: refund.map(|r| r.refund_fees_total),
            refund_reverse_revenue: refund.map(|r| r.refund_reverse_revenue),
            merchant_refund_cost_total: refund.map(|r| r.merchant_refund_cost_total),
        }
    }
}

/// What a merchant is allowed to see of an [`OrderView`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderViewPublic {
    pub order_id: OrderId,
    pub merchant_id: MerchantId,
    pub project_id: String,
    pub status: super::PublicOrderStatus,
    pub payment_method: String,
    pub country: String,
    pub transaction_date: DateTime<Utc>,
    pub payment_gross_revenue: Money,
    pub gross_revenue: Money,
    pub tax_fee_total: Money,
    pub method_fee_total: Money,
    pub platform_fixed_fee: Money,
    pub fees_total: Money,
    pub net_revenue: Money,
    pub refund_gross_revenue: Option<Money>,
    pub refund_fees_total: Option<Money>,
    pub refund_reverse_revenue: Option<Money>,
    pub merchant_refund_cost_total: Option<Money>,
}
