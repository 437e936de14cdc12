//! The sale side of an order's fee breakdown.
//!
//! [`compute_sale`] is pure: it takes the order, the two resolved channel tariffs and a pre-fetched [`RateSheet`],
//! and returns every figure of the [`SaleBreakdown`]. Each figure is rounded to its currency as it is produced and
//! derived figures are computed from the rounded values, so `gross_revenue == net_revenue + fees_total` holds exactly.
use billing_common::{CurrencyCode, Money};

use crate::{
    db_types::{Order, PaymentChannelCostMerchant, PaymentChannelCostSystem, SaleBreakdown},
    fees::{
        rates::{RatePlan, RateSheet, RateType},
        FeeCalculationError,
    },
};

/// The three currency frames a breakdown is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyFrames {
    /// The currency the customer paid in.
    pub payment: CurrencyCode,
    /// The merchant's payout currency.
    pub merchant: CurrencyCode,
    /// The platform's accounting currency.
    pub accounting: CurrencyCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleTariffs {
    pub merchant: PaymentChannelCostMerchant,
    pub system: PaymentChannelCostSystem,
}

/// Every rate [`compute_sale`] will ask the sheet for.
pub fn sale_rate_plan(frames: &CurrencyFrames, tariffs: &SaleTariffs) -> RatePlan {
    let mut plan = RatePlan::new();
    plan.need_local_and_origin(frames.payment, frames.merchant)
        .need_local_and_origin(tariffs.merchant.method_fix_amount.currency, frames.merchant)
        .need_local_and_origin(tariffs.merchant.ps_fixed_fee.currency, frames.merchant)
        .need(tariffs.system.fix_amount.currency, frames.merchant, RateType::Platform)
        .need(frames.merchant, frames.payment, RateType::Platform)
        .need(frames.merchant, frames.accounting, RateType::CentralBanks);
    plan
}

pub(crate) fn add(a: &Money, b: &Money) -> Result<Money, FeeCalculationError> {
    Ok(a.checked_add(b)?)
}

pub(crate) fn sub(a: &Money, b: &Money) -> Result<Money, FeeCalculationError> {
    Ok(a.checked_sub(b)?)
}

pub fn compute_sale(
    order: &Order,
    frames: &CurrencyFrames,
    tariffs: &SaleTariffs,
    rates: &RateSheet,
) -> Result<SaleBreakdown, FeeCalculationError> {
    let m = frames.merchant;
    let local = |x: &Money| rates.convert(x, m, RateType::Platform);
    let origin = |x: &Money| rates.convert(x, m, RateType::CentralBanks);

    // Revenue
    let payment_gross_revenue = order.total;
    let payment_gross_revenue_local = local(&payment_gross_revenue)?;
    let payment_gross_revenue_origin = origin(&payment_gross_revenue)?;
    let payment_gross_revenue_fx = sub(&payment_gross_revenue_origin, &payment_gross_revenue_local)?;
    let gross_revenue = sub(&payment_gross_revenue_origin, &payment_gross_revenue_fx)?;

    // Tax
    let payment_tax_fee = order.tax_amount();
    let payment_tax_fee_local = local(&payment_tax_fee)?;
    let payment_tax_fee_origin = origin(&payment_tax_fee)?;
    let tax_fee = payment_tax_fee_local;
    let tax_fee_currency_exchange_fee = sub(&payment_tax_fee_origin, &payment_tax_fee_local)?;
    let tax_fee_total = add(&tax_fee, &tax_fee_currency_exchange_fee)?;
    let payment_gross_revenue_fx_tax_fee = tax_fee_currency_exchange_fee;
    let payment_gross_revenue_fx_profit = sub(&payment_gross_revenue_fx, &payment_gross_revenue_fx_tax_fee)?;

    // Method fees charged to the merchant, and what they cost the platform
    let tariff = &tariffs.merchant;
    let method_fee_tariff = gross_revenue.scale((tariff.method_percent + tariff.ps_percent).fraction())?;
    let method_fixed_fee_tariff = local(&tariff.method_fix_amount)?;
    let method_fee_total = add(&method_fee_tariff, &method_fixed_fee_tariff)?;

    let platform_method_fee_tariff_self_cost = gross_revenue.scale(tariffs.system.percent.fraction())?;
    let platform_method_fee_profit = sub(&method_fee_tariff, &platform_method_fee_tariff_self_cost)?;
    let platform_method_fixed_fee_tariff_self_cost = local(&tariffs.system.fix_amount)?;
    let method_fixed_fee_tariff_origin = origin(&tariff.method_fix_amount)?;
    let platform_method_fixed_fee_tariff_fx_profit = sub(&method_fixed_fee_tariff, &method_fixed_fee_tariff_origin)?;
    let platform_method_fixed_fee_tariff_total_profit =
        sub(&method_fixed_fee_tariff, &platform_method_fixed_fee_tariff_self_cost)?;
    let platform_method_total_profit = add(&platform_method_fee_profit, &platform_method_fixed_fee_tariff_total_profit)?;

    // The platform's own fixed fee
    let platform_fixed_fee = local(&tariff.ps_fixed_fee)?;
    let platform_fixed_fee_origin = origin(&tariff.ps_fixed_fee)?;
    let platform_fixed_fee_fx_profit = sub(&platform_fixed_fee, &platform_fixed_fee_origin)?;

    // Totals
    let fees_total = Money::sum(m, [&tax_fee_total, &method_fee_total, &platform_fixed_fee])?;
    let fees_total_local = rates.convert(&fees_total, frames.payment, RateType::Platform)?;
    let net_revenue = sub(&gross_revenue, &fees_total)?;
    let profit = Money::sum(m, [&payment_gross_revenue_fx_profit, &platform_method_total_profit, &platform_fixed_fee])?;
    let platform_total_profit = rates.convert(&profit, frames.accounting, RateType::CentralBanks)?;

    Ok(SaleBreakdown {
        payment_gross_revenue,
        payment_gross_revenue_local,
        payment_gross_revenue_origin,
        payment_gross_revenue_fx,
        payment_gross_revenue_fx_tax_fee,
        payment_gross_revenue_fx_profit,
        gross_revenue,
        payment_tax_fee,
        payment_tax_fee_local,
        payment_tax_fee_origin,
        tax_fee,
        tax_fee_currency_exchange_fee,
        tax_fee_total,
        method_fee_tariff,
        method_fixed_fee_tariff,
        method_fee_total,
        platform_method_fee_tariff_self_cost,
        platform_method_fee_profit,
        platform_method_fixed_fee_tariff_self_cost,
        platform_method_fixed_fee_tariff_fx_profit,
        platform_method_fixed_fee_tariff_total_profit,
        platform_method_total_profit,
        platform_fixed_fee,
        platform_fixed_fee_fx_profit,
        fees_total,
        fees_total_local,
        net_revenue,
        platform_total_profit,
    })
}
