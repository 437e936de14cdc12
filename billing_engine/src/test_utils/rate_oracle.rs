use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use billing_common::{CurrencyCode, Decimal};

use crate::fees::{RateOracle, RateOracleError, RateQuote, RateRequest, RateType};

#[derive(Debug, Default)]
struct OracleState {
    rates: HashMap<(CurrencyCode, CurrencyCode, RateType), Decimal>,
    failure: Option<RateOracleError>,
    delay: Option<Duration>,
    calls: usize,
}

/// A rate oracle that quotes a fixed table of rates.
///
/// Pairs that are not in the table are quoted as the inverse of the opposite pair if that exists. Failures and
/// delays can be switched on at any time to exercise error paths. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct StaticRateOracle {
    state: Arc<Mutex<OracleState>>,
}

impl StaticRateOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(self, from: CurrencyCode, to: CurrencyCode, rate_type: RateType, rate: Decimal) -> Self {
        self.state.lock().unwrap().rates.insert((from, to, rate_type), rate);
        self
    }

    /// Quotes `rate` for the pair under every rate type.
    pub fn with_flat_rate(self, from: CurrencyCode, to: CurrencyCode, rate: Decimal) -> Self {
        [RateType::Oxr, RateType::CentralBanks, RateType::Stock, RateType::Platform]
            .into_iter()
            .fold(self, |oracle, rate_type| oracle.with_rate(from, to, rate_type, rate))
    }

    /// Every subsequent call fails with `failure`, until cleared with `None`.
    pub fn set_failure(&self, failure: Option<RateOracleError>) {
        self.state.lock().unwrap().failure = failure;
    }

    /// Every subsequent call waits `delay` before answering.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().delay = delay;
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

impl RateOracle for StaticRateOracle {
    async fn get_rate(&self, request: &RateRequest) -> Result<RateQuote, RateOracleError> {
        let (delay, result) = {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            let result = match &state.failure {
                Some(e) => Err(e.clone()),
                None => lookup(&state.rates, request),
            };
            (state.delay, result)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

fn lookup(
    rates: &HashMap<(CurrencyCode, CurrencyCode, RateType), Decimal>,
    request: &RateRequest,
) -> Result<RateQuote, RateOracleError> {
    let quote = |rate| RateQuote { rate, source: "static".into(), volume: Decimal::ONE };
    if let Some(rate) = rates.get(&(request.from, request.to, request.rate_type)) {
        return Ok(quote(*rate));
    }
    match rates.get(&(request.to, request.from, request.rate_type)) {
        Some(inverse) if !inverse.is_zero() => Ok(quote(Decimal::ONE / *inverse)),
        _ => Err(RateOracleError::UnsupportedPair { from: request.from, to: request.to }),
    }
}
