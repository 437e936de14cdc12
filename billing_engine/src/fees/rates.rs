//! Currency conversion against the external rate oracle.
//!
//! Fee computation never calls the oracle in the middle of arithmetic. Instead, the calculator first works out every
//! currency pair it will need ([`RatePlan`]), fetches them all concurrently through a [`CurrencyConverter`], and then
//! runs the pure computation against the resulting [`RateSheet`]. This keeps the I/O boundary in one place, makes
//! timeouts all-or-nothing, and lets tests drive the arithmetic with hand-written sheets.
//!
//! Two instants matter for a sale:
//! * the transaction time, at which `Platform` (and `Oxr`/`Stock`) rates are taken, and
//! * the booking time, the start of the transaction's UTC day, at which `CentralBanks` rates are taken.
use std::{
    collections::{BTreeSet, HashMap},
    fmt::Display,
    time::Duration,
};

use billing_common::{CurrencyCode, Decimal, Money, Percent};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use futures_util::future::try_join_all;
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{db_types::MerchantId, fees::FeeCalculationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateType {
    Oxr,
    CentralBanks,
    Stock,
    /// The platform's own rate, used for everything charged at transaction time.
    Platform,
}

impl Display for RateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateType::Oxr => write!(f, "oxr"),
            RateType::CentralBanks => write!(f, "central_banks"),
            RateType::Stock => write!(f, "stock"),
            RateType::Platform => write!(f, "platform"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRequest {
    pub from: CurrencyCode,
    pub to: CurrencyCode,
    pub rate_type: RateType,
    pub as_of: DateTime<Utc>,
    /// Some oracles quote merchant-specific platform rates.
    pub merchant_id: Option<MerchantId>,
}

impl RateRequest {
    pub fn new(from: CurrencyCode, to: CurrencyCode, rate_type: RateType, as_of: DateTime<Utc>) -> Self {
        Self { from, to, rate_type, as_of, merchant_id: None }
    }

    pub fn with_merchant(mut self, merchant_id: MerchantId) -> Self {
        self.merchant_id = Some(merchant_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    /// Units of `to` per unit of `from`.
    pub rate: Decimal,
    pub source: String,
    pub volume: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeResult {
    /// Unrounded.
    pub exchanged_amount: Decimal,
    pub exchange_rate: Decimal,
    pub correction: Percent,
    pub original_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateOracleError {
    #[error("The rate oracle does not quote {from}/{to}")]
    UnsupportedPair { from: CurrencyCode, to: CurrencyCode },
    #[error("The rate oracle is unavailable: {0}")]
    Unavailable(String),
}

/// The rate the platform actually uses: the oracle rate adjusted by the configured correction.
pub fn apply_correction(rate: Decimal, correction: Percent) -> Decimal {
    rate * (Decimal::ONE + correction.fraction())
}

/// The start of the UTC day containing `ts`. Central-bank rates for a transaction are taken at this instant.
pub fn booking_time(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&ts.date_naive().and_time(NaiveTime::MIN))
}

/// An external source of exchange rates.
#[allow(async_fn_in_trait)]
pub trait RateOracle {
    async fn get_rate(&self, request: &RateRequest) -> Result<RateQuote, RateOracleError>;

    /// Converts `amount` using the quoted rate adjusted by `correction`. Same-currency requests never reach the oracle.
    async fn exchange(
        &self,
        request: &RateRequest,
        amount: Decimal,
        correction: Percent,
    ) -> Result<ExchangeResult, RateOracleError> {
        if request.from == request.to {
            return Ok(ExchangeResult {
                exchanged_amount: amount,
                exchange_rate: Decimal::ONE,
                correction: Percent::ZERO,
                original_rate: Decimal::ONE,
            });
        }
        let quote = self.get_rate(request).await?;
        let exchange_rate = apply_correction(quote.rate, correction);
        Ok(ExchangeResult { exchanged_amount: amount * exchange_rate, exchange_rate, correction, original_rate: quote.rate })
    }
}

/// Correction percentages per rate type. Rate types without an entry are used as quoted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateCorrections(HashMap<RateType, Percent>);

impl RateCorrections {
    pub fn with(mut self, rate_type: RateType, correction: Percent) -> Self {
        self.0.insert(rate_type, correction);
        self
    }

    pub fn get(&self, rate_type: RateType) -> Percent {
        self.0.get(&rate_type).copied().unwrap_or(Percent::ZERO)
    }
}

//--------------------------------------     RatePlan      ---------------------------------------------------------
type RateKey = (CurrencyCode, CurrencyCode, RateType);

/// The set of rates a computation will need.
#[derive(Debug, Clone, Default)]
pub struct RatePlan {
    pairs: BTreeSet<RateKey>,
}

impl RatePlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same-currency pairs are ignored since they are always the identity.
    pub fn need(&mut self, from: CurrencyCode, to: CurrencyCode, rate_type: RateType) -> &mut Self {
        if from != to {
            self.pairs.insert((from, to, rate_type));
        }
        self
    }

    /// Adds both the transaction-time and booking-time rate for `from -> to`.
    pub fn need_local_and_origin(&mut self, from: CurrencyCode, to: CurrencyCode) -> &mut Self {
        self.need(from, to, RateType::Platform).need(from, to, RateType::CentralBanks)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RateKey> {
        self.pairs.iter()
    }
}

//--------------------------------------     RateSheet     ---------------------------------------------------------
/// Rates fixed for one computation. Conversions against a sheet are pure and always round to the target currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSheet {
    transaction_time: DateTime<Utc>,
    rates: HashMap<RateKey, Decimal>,
}

impl RateSheet {
    pub fn new(transaction_time: DateTime<Utc>) -> Self {
        Self { transaction_time, rates: HashMap::new() }
    }

    /// Adds an already-corrected rate to the sheet.
    pub fn with_rate(mut self, from: CurrencyCode, to: CurrencyCode, rate_type: RateType, rate: Decimal) -> Self {
        self.rates.insert((from, to, rate_type), rate);
        self
    }

    pub fn transaction_time(&self) -> DateTime<Utc> {
        self.transaction_time
    }

    /// The instant at which rates of the given type are taken.
    pub fn as_of(&self, rate_type: RateType) -> DateTime<Utc> {
        as_of(rate_type, self.transaction_time)
    }

    pub fn rate(&self, from: CurrencyCode, to: CurrencyCode, rate_type: RateType) -> Result<Decimal, FeeCalculationError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        self.rates.get(&(from, to, rate_type)).copied().ok_or_else(|| FeeCalculationError::RateUnavailable {
            from,
            to,
            rate_type,
            reason: "the rate was not fetched for this computation".into(),
        })
    }

    pub fn convert(&self, amount: &Money, to: CurrencyCode, rate_type: RateType) -> Result<Money, FeeCalculationError> {
        if amount.currency == to {
            return Ok(*amount);
        }
        let rate = self.rate(amount.currency, to, rate_type)?;
        Ok(Money::new(amount.amount * rate, to)?)
    }
}

fn as_of(rate_type: RateType, transaction_time: DateTime<Utc>) -> DateTime<Utc> {
    match rate_type {
        RateType::CentralBanks => booking_time(transaction_time),
        _ => transaction_time,
    }
}

//--------------------------------------  CurrencyConverter  -------------------------------------------------------
/// Fetches rates from a [`RateOracle`], applying the configured corrections and the caller's timeout.
#[derive(Debug, Clone)]
pub struct CurrencyConverter<O> {
    oracle: O,
    corrections: RateCorrections,
}

impl<O: RateOracle> CurrencyConverter<O> {
    pub fn new(oracle: O, corrections: RateCorrections) -> Self {
        Self { oracle, corrections }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Converts a single amount, rounding to the target currency.
    pub async fn convert(
        &self,
        amount: &Money,
        to: CurrencyCode,
        rate_type: RateType,
        as_of: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<Money, FeeCalculationError> {
        if amount.currency == to {
            return Ok(*amount);
        }
        let request = RateRequest::new(amount.currency, to, rate_type, as_of);
        let correction = self.corrections.get(rate_type);
        let result = match tokio::time::timeout(timeout, self.oracle.exchange(&request, amount.amount, correction)).await
        {
            Ok(result) => result.map_err(|e| oracle_error(&request, e))?,
            Err(_) => return Err(FeeCalculationError::RateTimeout(timeout.as_millis() as u64)),
        };
        Ok(Money::new(result.exchanged_amount, to)?)
    }

    /// Fetches every rate in `plan` concurrently. Fails if any single rate cannot be fetched in time.
    pub async fn fetch_sheet(
        &self,
        plan: &RatePlan,
        transaction_time: DateTime<Utc>,
        merchant_id: Option<&MerchantId>,
        timeout: Duration,
    ) -> Result<RateSheet, FeeCalculationError> {
        let fetches = plan.iter().map(|&(from, to, rate_type)| {
            let mut request = RateRequest::new(from, to, rate_type, as_of(rate_type, transaction_time));
            request.merchant_id = merchant_id.cloned();
            async move {
                let rate = self.fetch_rate(&request, timeout).await?;
                Ok::<_, FeeCalculationError>(((from, to, rate_type), rate))
            }
        });
        let rates = try_join_all(fetches).await?;
        trace!("💱️ Fetched {} rates for a transaction at {transaction_time}", rates.len());
        let sheet = rates
            .into_iter()
            .fold(RateSheet::new(transaction_time), |sheet, ((from, to, rate_type), rate)| {
                sheet.with_rate(from, to, rate_type, rate)
            });
        Ok(sheet)
    }

    async fn fetch_rate(&self, request: &RateRequest, timeout: Duration) -> Result<Decimal, FeeCalculationError> {
        let quote = match tokio::time::timeout(timeout, self.oracle.get_rate(request)).await {
            Ok(quote) => quote.map_err(|e| oracle_error(request, e))?,
            Err(_) => {
                warn!(
                    "💱️ Rate oracle timed out after {}ms for {}/{} ({})",
                    timeout.as_millis(),
                    request.from,
                    request.to,
                    request.rate_type
                );
                return Err(FeeCalculationError::RateTimeout(timeout.as_millis() as u64));
            },
        };
        if quote.rate <= Decimal::ZERO {
            return Err(FeeCalculationError::RateUnavailable {
                from: request.from,
                to: request.to,
                rate_type: request.rate_type,
                reason: format!("the oracle quoted a non-positive rate ({}) from {}", quote.rate, quote.source),
            });
        }
        Ok(apply_correction(quote.rate, self.corrections.get(request.rate_type)))
    }
}

fn oracle_error(request: &RateRequest, err: RateOracleError) -> FeeCalculationError {
    match err {
        RateOracleError::UnsupportedPair { from, to } => {
            FeeCalculationError::UnsupportedCurrencyPair { from, to, rate_type: request.rate_type }
        },
        RateOracleError::Unavailable(reason) => {
            FeeCalculationError::RateUnavailable { from: request.from, to: request.to, rate_type: request.rate_type, reason }
        },
    }
}
