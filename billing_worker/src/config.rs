use std::{env, fmt::Display, str::FromStr, time::Duration};

use billing_common::CurrencyCode;
use billing_engine::{billing_api::config::DEFAULT_ACCEPT_WINDOW_HOURS, BillingConfig};
use log::*;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/billing_store.db";
const DEFAULT_ACCOUNTING_CURRENCY: CurrencyCode = CurrencyCode::EUR;
const DEFAULT_AUTO_ACCEPT_INTERVAL_SECS: u64 = 60;
const DEFAULT_REPORT_INTERVAL_SECS: u64 = 3600;
const DEFAULT_RATE_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Settings handed to the billing engine APIs.
    pub billing: BillingConfig,
    /// How often pending reports are checked for an expired acceptance window.
    pub auto_accept_interval: Duration,
    /// How often the reports of the last closed week are generated or refreshed.
    pub report_interval: Duration,
    pub generate_reports: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            billing: BillingConfig::default(),
            auto_accept_interval: Duration::from_secs(DEFAULT_AUTO_ACCEPT_INTERVAL_SECS),
            report_interval: Duration::from_secs(DEFAULT_REPORT_INTERVAL_SECS),
            generate_reports: true,
        }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("BILLING_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ BILLING_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let accounting_currency =
            env_or_default("BILLING_ACCOUNTING_CURRENCY", DEFAULT_ACCOUNTING_CURRENCY);
        let accept_window_hours = env_or_default("BILLING_ACCEPT_WINDOW_HOURS", DEFAULT_ACCEPT_WINDOW_HOURS);
        let auto_accept_secs = env_or_default("BILLING_AUTO_ACCEPT_INTERVAL_SECS", DEFAULT_AUTO_ACCEPT_INTERVAL_SECS);
        let report_secs = env_or_default("BILLING_REPORT_INTERVAL_SECS", DEFAULT_REPORT_INTERVAL_SECS);
        let rate_timeout_ms = env_or_default("BILLING_RATE_TIMEOUT_MS", DEFAULT_RATE_TIMEOUT_MS);
        let generate_reports = parse_flag("BILLING_GENERATE_REPORTS", env::var("BILLING_GENERATE_REPORTS").ok(), true);
        let billing = BillingConfig::default()
            .with_accounting_currency(accounting_currency)
            .with_accept_window(chrono::Duration::hours(accept_window_hours))
            .with_default_timeout(Duration::from_millis(rate_timeout_ms));
        Self {
            database_url,
            billing,
            auto_accept_interval: Duration::from_secs(auto_accept_secs.max(1)),
            report_interval: Duration::from_secs(report_secs.max(1)),
            generate_reports,
        }
    }
}

fn env_or_default<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    parse_or_default(name, env::var(name).ok(), default)
}

/// Parses `value`, falling back to `default` (with a log message) when it is missing or invalid.
fn parse_or_default<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match value {
        None => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
        Some(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name}: {s}. {e} Using the default, {default}, instead.");
            default
        }),
    }
}

/// Reads an on/off switch. Accepts `1/0`, `true/false`, `yes/no` and `on/off` in any case.
fn parse_flag(name: &str, value: Option<String>, default: bool) -> bool {
    let Some(s) = value else {
        return default;
    };
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        other => {
            warn!("🪛️ {name} should be on or off, not {other}. Using the default, {default}, instead.");
            default
        },
    }
}
