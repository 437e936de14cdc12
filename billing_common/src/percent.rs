use std::{
    fmt::Display,
    ops::{Add, AddAssign, Neg, Sub},
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::op;

//--------------------------------------      Percent      ---------------------------------------------------------
/// A percentage, stored as a fraction: 2.5% is `Percent(0.025)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(Decimal);

op!(binary Percent, Add, add);
op!(binary Percent, Sub, sub);
op!(inplace Percent, AddAssign, add_assign);
op!(unary Percent, Neg, neg);

impl Percent {
    pub const ZERO: Percent = Percent(Decimal::ZERO);

    pub fn from_fraction(fraction: Decimal) -> Self {
        Self(fraction)
    }

    /// Builds a percentage from its human form, so `from_percentage(2.5)` is 2.5%.
    pub fn from_percentage(value: Decimal) -> Self {
        Self(value / Decimal::ONE_HUNDRED)
    }

    pub fn fraction(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The unrounded share of `amount` this percentage represents.
    pub fn of(&self, amount: Decimal) -> Decimal {
        amount * self.0
    }
}

impl Display for Percent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", (self.0 * Decimal::ONE_HUNDRED).normalize())
    }
}
