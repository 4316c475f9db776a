//! Fixed-point monetary amount.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fractional digits every `Amount` is rescaled to on construction.
pub const SCALE: u32 = 6;

/// An escrow amount: strictly positive, scaled to six fractional digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

/// Rejects amounts that are not strictly positive.
#[derive(Debug, Error)]
#[error("amount must be strictly positive, got {0}")]
pub struct NonPositiveAmount(Decimal);

impl Amount {
    /// Construct an amount, rescaling to [`SCALE`] fractional digits.
    ///
    /// # Errors
    /// Returns [`NonPositiveAmount`] if `value` is zero or negative.
    pub fn new(value: Decimal) -> Result<Self, NonPositiveAmount> {
        if value <= Decimal::ZERO {
            return Err(NonPositiveAmount(value));
        }
        let mut scaled = value;
        scaled.rescale(SCALE);
        Ok(Self(scaled))
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = NonPositiveAmount;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
