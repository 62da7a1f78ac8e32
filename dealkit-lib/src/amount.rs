//! Deal prices as fixed-point decimals.
//!
//! Prices are typed by people, so parsing is lenient about the decimal
//! separator (`99.5` and `99,5` are the same price) and strict about
//! everything else. **Never use f64 for prices.**
//!
//! - Uses `Decimal` internally (28-29 significant digits)
//! - Always strictly positive once constructed
//! - Serializes as string (preserves precision)

use crate::errors::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Strictly positive deal price.
///
/// # Examples
///
/// ```rust
/// use dealkit_lib::Amount;
///
/// let price = Amount::parse_user_input("99,5").unwrap();
/// assert_eq!(price.to_string(), "99.5");
/// assert!(Amount::parse_user_input("-5").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount {
    value: Decimal,
}

impl Amount {
    /// Parse a price typed by a user.
    ///
    /// Surrounding whitespace is ignored and `,` is accepted as the decimal
    /// separator.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NotANumber`] when the text is not a decimal number,
    /// [`ValidationError::NonPositiveAmount`] when it is zero or negative.
    pub fn parse_user_input(input: &str) -> Result<Self, ValidationError> {
        let normalized = input.trim().replace(',', ".");
        let value = Decimal::from_str(&normalized)
            .map_err(|_| ValidationError::NotANumber(input.trim().to_string()))?;
        Self::new(value)
    }

    /// Wrap a decimal, rejecting zero and negative values.
    pub fn new(value: Decimal) -> Result<Self, ValidationError> {
        if value <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(value.to_string()));
        }
        Ok(Self { value })
    }

    pub fn as_decimal(&self) -> Decimal {
        self.value
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = ValidationError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value
    }
}

impl FromStr for Amount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_user_input(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
