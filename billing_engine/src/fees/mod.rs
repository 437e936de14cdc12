//! Fee computation.
//!
//! * [`resolver`] finds the cost and commission rules that apply to an order.
//! * [`rates`] fetches the exchange rates a computation needs and converts between currency frames.
//! * [`order_fees`] and [`refund_fees`] turn an order, its tariffs and a rate sheet into the sale and refund halves
//!   of an order view. Both are pure functions.
//!
//! The I/O-facing orchestration (locking, fetching, persisting) lives in [`crate::OrderFeeApi`].
mod errors;

pub mod order_fees;
pub mod rates;
pub mod refund_fees;
pub mod resolver;

pub use errors::{CostResolutionError, ErrorClass, FeeCalculationError};
pub use order_fees::{compute_sale, sale_rate_plan, CurrencyFrames, SaleTariffs};
pub use rates::{
    CurrencyConverter,
    ExchangeResult,
    RateCorrections,
    RateOracle,
    RateOracleError,
    RatePlan,
    RateQuote,
    RateRequest,
    RateSheet,
    RateType,
};
pub use refund_fees::{compute_refund, refund_rate_plan, RefundTariffs};
pub use resolver::{select_rule, CostResolver};
