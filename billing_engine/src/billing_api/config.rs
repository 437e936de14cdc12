use std::time::Duration;

use billing_common::CurrencyCode;

use crate::fees::RateCorrections;

pub const DEFAULT_ACCEPT_WINDOW_HOURS: i64 = 7 * 24;
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// Engine-level settings shared by the API objects.
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// The platform's own books are kept in this currency.
    pub accounting_currency: CurrencyCode,
    /// How long a merchant has to accept or dispute a pending royalty report before it is accepted automatically.
    pub accept_window: chrono::Duration,
    pub rate_corrections: RateCorrections,
    /// Bounds the rate-oracle and cost-store lookups of one fee computation unless the caller supplies its own.
    pub default_timeout: Duration,
    /// How long to wait for a per-order or per-report lock before giving up.
    pub lock_timeout: Duration,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            accounting_currency: CurrencyCode::EUR,
            accept_window: chrono::Duration::hours(DEFAULT_ACCEPT_WINDOW_HOURS),
            rate_corrections: RateCorrections::default(),
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            lock_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl BillingConfig {
    pub fn with_accounting_currency(mut self, currency: CurrencyCode) -> Self {
        self.accounting_currency = currency;
        self
    }

    pub fn with_accept_window(mut self, window: chrono::Duration) -> Self {
        self.accept_window = window;
        self
    }

    pub fn with_rate_corrections(mut self, corrections: RateCorrections) -> Self {
        self.rate_corrections = corrections;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn calculation_options(&self) -> CalculationOptions {
        CalculationOptions { timeout: self.default_timeout }
    }
}

/// Per-call knobs for fee computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalculationOptions {
    /// The longest the rate-oracle and cost-store lookups of one computation may take together.
    pub timeout: Duration,
}

impl CalculationOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self { timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS) }
    }
}
