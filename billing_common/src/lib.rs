//! Shared primitives for the royalty billing crates.
//!
//! Every amount that moves between components is a [`Money`] value: a decimal amount tagged with its ISO-4217
//! currency. Amounts are rounded to the minor-unit precision of their currency (see [`round`]) whenever a `Money`
//! value is constructed, so nothing downstream ever sees an amount with more decimals than its currency allows.
mod currency;
mod money;
mod percent;

pub mod op;

pub use currency::{precision, round, CurrencyCode, CurrencyCodeError, RoundingPrecisionError};
pub use money::{Money, MoneyError};
pub use percent::Percent;
pub use rust_decimal::Decimal;
