use std::{
    fmt,
    ops::{Add, AddAssign, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Money amount represented as **integer minor units** (cents).
///
/// Use this type for **all** monetary values in the engine (prices, line
/// totals, tax, order totals) to avoid floating-point drift.
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount = Money::new(12_34);
/// assert_eq!(amount.cents(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects >
/// 2 decimals):
///
/// ```rust
/// use engine::Money;
///
/// assert_eq!("10".parse::<Money>().unwrap().cents(), 1000);
/// assert_eq!("10,5".parse::<Money>().unwrap().cents(), 1050);
/// assert!("12.345".parse::<Money>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Checked multiplication by a unitless factor, e.g. a quantity.
    #[must_use]
    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let major = abs / 100;
        let cents = abs % 100;
        write!(f, "{sign}{major}.{cents:02}")
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string into cents.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - max 2 fractional digits (rejects `12.345`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || EngineError::InvalidData {
            field: "amount",
            reason: "empty amount".to_string(),
        };
        let invalid = || EngineError::InvalidData {
            field: "amount",
            reason: "invalid amount".to_string(),
        };
        let overflow = || EngineError::InvalidData {
            field: "amount",
            reason: "amount too large".to_string(),
        };

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (sign, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (-1i64, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (1i64, stripped)
        } else {
            (1i64, trimmed)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(empty());
        }

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let major_str = parts.next().ok_or_else(invalid)?;
        let cents_str = parts.next();

        if parts.next().is_some() {
            return Err(invalid());
        }

        if major_str.is_empty() || !major_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let major: i64 = major_str.parse().map_err(|_| invalid())?;

        let cents: i64 = match cents_str {
            None => 0,
            Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                match frac.len() {
                    0 => 0,
                    1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                    2 => frac.parse::<i64>().map_err(|_| invalid())?,
                    _ => {
                        return Err(EngineError::InvalidData {
                            field: "amount",
                            reason: "too many decimals".to_string(),
                        });
                    }
                }
            }
        };

        let total = major
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(overflow)?;

        let signed = if sign < 0 {
            total.checked_neg().ok_or_else(overflow)?
        } else {
            total
        };

        Ok(Money(signed))
    }
}

/// Tax rate expressed in **basis points** (1/100th of a percent).
///
/// Keeping the rate integral lets tax math stay in integer cents throughout.
/// The default rate is 10% (1000 basis points). Applying a rate rounds half-up
/// to whole cents:
///
/// ```rust
/// use engine::{Money, TaxRate};
///
/// assert_eq!(TaxRate::DEFAULT.apply(Money::new(19_99)), Money::new(2_00));
/// assert_eq!(TaxRate::DEFAULT.apply(Money::new(5)), Money::new(1));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    /// 10%, applied when no explicit rate is given.
    pub const DEFAULT: TaxRate = TaxRate(1000);

    /// Creates a rate from basis points. Rejects rates above 100%.
    pub fn from_basis_points(basis_points: u32) -> Result<Self, EngineError> {
        if basis_points > 10_000 {
            return Err(EngineError::InvalidData {
                field: "tax_rate",
                reason: format!("{basis_points} basis points exceeds 100%"),
            });
        }
        Ok(Self(basis_points))
    }

    /// Returns the rate in basis points.
    #[must_use]
    pub const fn basis_points(self) -> u32 {
        self.0
    }

    /// Applies the rate to an amount, rounding half-up to whole cents.
    #[must_use]
    pub fn apply(self, amount: Money) -> Money {
        let cents = i128::from(amount.cents());
        let rate = i128::from(self.0);
        let scaled = cents.abs() * rate;
        let rounded = (scaled + 5_000) / 10_000;
        let signed = if cents < 0 { -rounded } else { rounded };
        Money(signed as i64)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for TaxRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{whole}%")
        } else {
            write!(f, "{whole}.{frac:02}%")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_cents() {
        assert_eq!(Money::new(0).to_string(), "0.00");
        assert_eq!(Money::new(1).to_string(), "0.01");
        assert_eq!(Money::new(10).to_string(), "0.10");
        assert_eq!(Money::new(1050).to_string(), "10.50");
        assert_eq!(Money::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Money>().unwrap().cents(), 1000);
        assert_eq!("10.5".parse::<Money>().unwrap().cents(), 1050);
        assert_eq!("10,50".parse::<Money>().unwrap().cents(), 1050);
        assert_eq!("-0.01".parse::<Money>().unwrap().cents(), -1);
        assert_eq!("+1.00".parse::<Money>().unwrap().cents(), 100);
        assert_eq!("  2.30 ".parse::<Money>().unwrap().cents(), 230);
    }

    #[test]
    fn parse_rejects_more_than_two_decimals() {
        assert!("12.345".parse::<Money>().is_err());
        assert!("0.001".parse::<Money>().is_err());
    }

    #[test]
    fn tax_rounds_half_up() {
        let rate = TaxRate::DEFAULT;
        assert_eq!(rate.apply(Money::ZERO), Money::ZERO);
        // 0.04 * 10% = 0.004 -> rounds down to 0.00
        assert_eq!(rate.apply(Money::new(4)), Money::ZERO);
        // 0.05 * 10% = 0.005 -> rounds up to 0.01
        assert_eq!(rate.apply(Money::new(5)), Money::new(1));
        assert_eq!(rate.apply(Money::new(10_00)), Money::new(1_00));
        assert_eq!(rate.apply(Money::new(19_99)), Money::new(2_00));
    }

    #[test]
    fn tax_rate_bounds() {
        assert!(TaxRate::from_basis_points(0).is_ok());
        assert!(TaxRate::from_basis_points(10_000).is_ok());
        assert!(TaxRate::from_basis_points(10_001).is_err());
        assert_eq!(TaxRate::from_basis_points(825).unwrap().to_string(), "8.25%");
        assert_eq!(TaxRate::DEFAULT.to_string(), "10%");
    }
}
