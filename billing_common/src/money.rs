use std::{fmt::Display, ops::Neg};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{currency::round, CurrencyCode, RoundingPrecisionError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("Cannot combine {left} with {right}: currencies differ")]
    CurrencyMismatch { left: CurrencyCode, right: CurrencyCode },
    #[error(transparent)]
    Precision(#[from] RoundingPrecisionError),
}

//--------------------------------------       Money       ---------------------------------------------------------
/// An amount of money in a specific currency.
///
/// The amount is always rounded to the currency's minor-unit precision. Arithmetic between two `Money` values is only
/// defined when they share a currency; conversion between currencies goes through the rate oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: CurrencyCode,
}

impl Money {
    /// Creates a new `Money` value, rounding `amount` to the precision of `currency`.
    pub fn new(amount: Decimal, currency: CurrencyCode) -> Result<Self, RoundingPrecisionError> {
        let amount = round(amount, currency)?;
        Ok(Self { amount, currency })
    }

    pub fn zero(currency: CurrencyCode) -> Self {
        let amount = round(Decimal::ZERO, currency).unwrap_or(Decimal::ZERO);
        Self { amount, currency }
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    pub fn abs(&self) -> Self {
        Self { amount: self.amount.abs(), currency: self.currency }
    }

    pub fn checked_add(&self, rhs: &Money) -> Result<Money, MoneyError> {
        self.same_currency(rhs)?;
        Ok(Money::new(self.amount + rhs.amount, self.currency)?)
    }

    pub fn checked_sub(&self, rhs: &Money) -> Result<Money, MoneyError> {
        self.same_currency(rhs)?;
        Ok(Money::new(self.amount - rhs.amount, self.currency)?)
    }

    /// Multiplies the amount by `factor` and rounds the result.
    pub fn scale(&self, factor: Decimal) -> Result<Money, RoundingPrecisionError> {
        Money::new(self.amount * factor, self.currency)
    }

    /// Adds up a list of amounts that must all be in `currency`. An empty list sums to zero.
    pub fn sum<'a, I>(currency: CurrencyCode, values: I) -> Result<Money, MoneyError>
    where I: IntoIterator<Item = &'a Money> {
        values.into_iter().try_fold(Money::zero(currency), |acc, m| acc.checked_add(m))
    }

    fn same_currency(&self, rhs: &Money) -> Result<(), MoneyError> {
        if self.currency == rhs.currency {
            Ok(())
        } else {
            Err(MoneyError::CurrencyMismatch { left: self.currency, right: rhs.currency })
        }
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money { amount: -self.amount, currency: self.currency }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
