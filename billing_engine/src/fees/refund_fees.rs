//! The reversal side of an order's fee breakdown.
//!
//! Partial refunds are prorated linearly: with `f = refund / order total`, every clawed-back figure is the original
//! figure scaled by `f`. A full refund therefore reverses the sale exactly, and the merchant's reverse revenue
//! cancels the original net revenue to the minor unit.
use billing_common::{Decimal, Money};
use chrono::{DateTime, Utc};

use crate::{
    db_types::{MoneyBackCostMerchant, MoneyBackCostSystem, Order, OrderRefund, RefundBreakdown, SaleBreakdown},
    fees::{
        order_fees::{add, sub, CurrencyFrames},
        rates::{RatePlan, RateSheet, RateType},
        FeeCalculationError,
    },
};

/// Money-back rules are always looked up for the first payment stage.
pub const REFUND_PAYMENT_STAGE: i32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundTariffs {
    pub merchant: MoneyBackCostMerchant,
    pub system: MoneyBackCostSystem,
}

/// Whole days between the payment and the refund. Refunds dated before the payment count as day zero.
pub fn days_since_payment(paid_at: DateTime<Utc>, refunded_at: DateTime<Utc>) -> i64 {
    (refunded_at - paid_at).num_days().max(0)
}

/// Checks the refund against the order and returns the refunded fraction of the order total.
pub fn refund_fraction(order: &Order, refund: &OrderRefund) -> Result<Decimal, FeeCalculationError> {
    let invalid = |reason: String| FeeCalculationError::InvalidRefund { order_id: order.id.clone(), reason };
    if refund.amount.currency != order.currency() {
        return Err(invalid(format!(
            "the refund is in {} but the order was paid in {}",
            refund.amount.currency,
            order.currency()
        )));
    }
    if !refund.amount.amount.is_sign_positive() || refund.amount.is_zero() {
        return Err(invalid(format!("the refund amount must be positive, not {}", refund.amount)));
    }
    if refund.amount.amount > order.total.amount {
        return Err(invalid(format!("{} exceeds the order total of {}", refund.amount, order.total)));
    }
    Ok(refund.amount.amount / order.total.amount)
}

/// Every rate [`compute_refund`] will ask the sheet for. The sheet must be fetched at the refund date.
pub fn refund_rate_plan(frames: &CurrencyFrames, tariffs: &RefundTariffs) -> RatePlan {
    let mut plan = RatePlan::new();
    plan.need_local_and_origin(frames.payment, frames.merchant)
        .need(tariffs.merchant.fix_amount.currency, frames.merchant, RateType::Platform)
        .need(frames.merchant, frames.accounting, RateType::CentralBanks);
    plan
}

pub fn compute_refund(
    order: &Order,
    refund: &OrderRefund,
    sale: &SaleBreakdown,
    frames: &CurrencyFrames,
    tariffs: &RefundTariffs,
    rates: &RateSheet,
) -> Result<RefundBreakdown, FeeCalculationError> {
    let m = frames.merchant;
    let f = refund_fraction(order, refund)?;
    let prorate = |x: &Money| -> Result<Money, FeeCalculationError> {
        if f == Decimal::ONE {
            Ok(*x)
        } else {
            Ok(x.scale(f)?)
        }
    };

    // What the customer gets back, valued at refund time
    let payment_refund_gross_revenue = refund.amount;
    let payment_refund_gross_revenue_local = rates.convert(&refund.amount, m, RateType::Platform)?;
    let payment_refund_gross_revenue_origin = rates.convert(&refund.amount, m, RateType::CentralBanks)?;
    let refund_gross_revenue_fx = sub(&payment_refund_gross_revenue_origin, &payment_refund_gross_revenue_local)?;

    // Clawback of the original allocation
    let refund_gross_revenue = -prorate(&sale.gross_revenue)?;
    let payment_refund_tax_fee = prorate(&sale.payment_tax_fee)?;
    let refund_tax_fee = -prorate(&sale.tax_fee_total)?;
    let refund_tax_fee_total = refund_tax_fee;
    let refund_fees_total = -prorate(&sale.fees_total)?;
    let refund_reverse_revenue = -sub(&refund_gross_revenue.abs(), &refund_fees_total.abs())?;

    // The refund tariff
    let refunded = refund_gross_revenue.abs();
    let method_refund_fee_tariff = refunded.scale(tariffs.merchant.percent.fraction())?;
    let method_refund_fixed_fee_tariff = rates.convert(&tariffs.merchant.fix_amount, m, RateType::Platform)?;
    let platform_method_refund_fee_tariff_self_cost = refunded.scale(tariffs.system.percent.fraction())?;
    let platform_method_refund_fixed_fee_tariff_self_cost = Money::new(tariffs.system.fix_amount, m)?;

    let (merchant_refund_fixed_fee_tariff, merchant_refund_cost_total, fee_profit, fixed_profit) =
        if tariffs.merchant.is_paid_by_merchant {
            (
                method_refund_fixed_fee_tariff,
                add(&method_refund_fee_tariff, &method_refund_fixed_fee_tariff)?,
                sub(&method_refund_fee_tariff, &platform_method_refund_fee_tariff_self_cost)?,
                sub(&method_refund_fixed_fee_tariff, &platform_method_refund_fixed_fee_tariff_self_cost)?,
            )
        } else {
            // The platform absorbs the whole refund cost
            (
                Money::zero(m),
                Money::zero(m),
                -platform_method_refund_fee_tariff_self_cost,
                -platform_method_refund_fixed_fee_tariff_self_cost,
            )
        };
    let profit = add(&fee_profit, &fixed_profit)?;
    let platform_refund_total_profit = rates.convert(&profit, frames.accounting, RateType::CentralBanks)?;

    Ok(RefundBreakdown {
        reason: refund.reason,
        fraction: f,
        payment_refund_gross_revenue,
        payment_refund_gross_revenue_local,
        payment_refund_gross_revenue_origin,
        refund_gross_revenue,
        refund_gross_revenue_fx,
        payment_refund_tax_fee,
        refund_tax_fee,
        refund_tax_fee_total,
        refund_fees_total,
        refund_reverse_revenue,
        method_refund_fee_tariff,
        method_refund_fixed_fee_tariff,
        merchant_refund_fixed_fee_tariff,
        platform_method_refund_fee_tariff_self_cost,
        platform_method_refund_fee_tariff_profit: fee_profit,
        platform_method_refund_fixed_fee_tariff_self_cost,
        platform_method_refund_fixed_fee_tariff_profit: fixed_profit,
        merchant_refund_cost_total,
        platform_refund_total_profit,
    })
}
