use std::{fmt::Display, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

//--------------------------------------   CurrencyCode   ------------------------------------------------------------
/// An upper-case, three-letter ISO-4217 currency code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid ISO-4217 currency code")]
pub struct CurrencyCodeError(pub String);

impl CurrencyCode {
    pub const BHD: Self = Self(*b"BHD");
    pub const EUR: Self = Self(*b"EUR");
    pub const GBP: Self = Self(*b"GBP");
    pub const JPY: Self = Self(*b"JPY");
    pub const KWD: Self = Self(*b"KWD");
    pub const RUB: Self = Self(*b"RUB");
    pub const USD: Self = Self(*b"USD");

    pub fn as_str(&self) -> &str {
        // Only ASCII letters ever make it into the array
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl FromStr for CurrencyCode {
    type Err = CurrencyCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_uppercase) {
            return Err(CurrencyCodeError(s.to_string()));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CurrencyCodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.as_str().to_string()
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//--------------------------------------   Precision   ---------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No rounding precision is defined for currency {0}")]
pub struct RoundingPrecisionError(pub CurrencyCode);

/// Returns the number of minor-unit decimals for the given currency.
///
/// Currencies that are not in the table are an error. Guessing a precision for an unknown currency would silently
/// corrupt every amount computed in it.
pub fn precision(currency: CurrencyCode) -> Result<u32, RoundingPrecisionError> {
    match currency.as_str() {
        "CLP" | "ISK" | "JPY" | "KRW" | "VND" | "UGX" | "PYG" => Ok(0),
        "BHD" | "KWD" | "JOD" | "OMR" | "TND" | "IQD" | "LYD" => Ok(3),
        "AED" | "ARS" | "AUD" | "BGN" | "BRL" | "BYN" | "CAD" | "CHF" | "CNY" | "COP" | "CZK" | "DKK" | "EGP" |
        "EUR" | "GBP" | "GEL" | "HKD" | "HUF" | "IDR" | "ILS" | "INR" | "KZT" | "MXN" | "MYR" | "NOK" | "NZD" |
        "PEN" | "PHP" | "PLN" | "QAR" | "RON" | "RSD" | "RUB" | "SAR" | "SEK" | "SGD" | "THB" | "TRY" | "TWD" |
        "UAH" | "USD" | "UZS" | "ZAR" => Ok(2),
        _ => Err(RoundingPrecisionError(currency)),
    }
}

/// Rounds `amount` to the minor-unit precision of `currency`, rounding midpoints away from zero (half-up on the
/// magnitude). The result always carries exactly `precision(currency)` decimals, so equal amounts serialize
/// identically.
pub fn round(amount: Decimal, currency: CurrencyCode) -> Result<Decimal, RoundingPrecisionError> {
    let dp = precision(currency)?;
    let mut rounded = amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    Ok(rounded)
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    fn ccy(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    #[test]
    fn rounding_follows_currency_precision() {
        assert_eq!(round(dec!(10.005), ccy("USD")).unwrap(), dec!(10.01));
        assert_eq!(round(dec!(10.5), ccy("JPY")).unwrap(), dec!(11));
        assert_eq!(round(dec!(1.0005), ccy("BHD")).unwrap(), dec!(1.001));
        assert_eq!(round(dec!(-10.005), ccy("EUR")).unwrap(), dec!(-10.01));
        assert_eq!(round(dec!(10.004999), ccy("USD")).unwrap(), dec!(10.00));
    }

    #[test]
    fn rounded_amounts_have_a_fixed_scale() {
        let r = round(dec!(97.2), CurrencyCode::USD).unwrap();
        assert_eq!(r.to_string(), "97.20");
        let r = round(dec!(3), CurrencyCode::KWD).unwrap();
        assert_eq!(r.to_string(), "3.000");
    }

    #[test]
    fn unknown_currency_is_an_error() {
        let err = round(dec!(1.23), ccy("XYZ")).unwrap_err();
        assert_eq!(err, RoundingPrecisionError(ccy("XYZ")));
    }

    #[test]
    fn parse_currency_codes() {
        assert_eq!(ccy("usd"), CurrencyCode::USD);
        assert!("US".parse::<CurrencyCode>().is_err());
        assert!("U5D".parse::<CurrencyCode>().is_err());
        let json = serde_json::to_string(&CurrencyCode::EUR).unwrap();
        assert_eq!(json, "\"EUR\"");
        let back: CurrencyCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CurrencyCode::EUR);
    }
}
