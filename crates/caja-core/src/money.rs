//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Backend payloads send amounts as 25.5, "25.50" or 2550.0:              │
//! │    25.5 * 3 = 76.49999999999999  ❌ WRONG!                               │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (centavos)                           │
//! │    "25.50" ──parse_decimal──► 2550 ──× 3──► 7650 = 76.50               │
//! │    Parsing never goes through f64                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use caja_core::money::Money;
//!
//! let price = Money::parse_decimal("25.50").unwrap();
//! let line = price * 3_i64;
//! assert_eq!(line.cents(), 7650);
//! assert_eq!(line.to_string(), "76.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::Percentage;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (centavos).
///
/// ## Design Decisions
/// - **i64 (signed)**: closure differences are negative on shortage
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Fixed scale of 2**: every amount in the system shares one scale
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  CartLine.unit_price ──► line total ──► cart total ──► SaleDraft.total │
/// │                                                                         │
/// │  Theoretical net ──┐                                                    │
/// │                    ├──► total difference ──► difference percentage      │
/// │  Σ actual amounts ─┘                                                    │
/// │                                                                         │
/// │  Denomination face value × quantity ──► cash counted total             │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

/// Number of minor units per major unit.
const SCALE: i64 = 100;

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// let price = Money::from_cents(2550); // 25.50
    /// assert_eq!(price.cents(), 2550);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole major units.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(100).cents(), 10000);
    /// ```
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * SCALE)
    }

    /// Parses a plain decimal string into Money without touching floats.
    ///
    /// Accepts an optional sign, digits, and at most two fractional digits
    /// (`"25"`, `"25.5"`, `"-50.00"`, `".75"`). Thousands separators,
    /// currency symbols and exponents are rejected.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("25.5").unwrap().cents(), 2550);
    /// assert_eq!(Money::parse_decimal("-50.00").unwrap().cents(), -5000);
    /// assert!(Money::parse_decimal("1,000.00").is_err());
    /// assert!(Money::parse_decimal("10.999").is_err());
    /// ```
    pub fn parse_decimal(input: &str) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("'{}' {}", input, reason),
        };

        let trimmed = input.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, fraction) = match unsigned.split_once('.') {
            Some((w, f)) => (w, f),
            None => (unsigned, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("is not a number"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("is not a plain decimal number"));
        }
        if fraction.len() > 2 {
            return Err(invalid("has more than two decimal places"));
        }

        let major: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("is out of range"))?
        };
        let minor: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid("is out of range"))? * 10,
            _ => fraction.parse().map_err(|_| invalid("is out of range"))?,
        };

        let cents = major
            .checked_mul(SCALE)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("is out of range"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }

    /// Like [`Money::parse_decimal`], but rounds extra fractional digits half
    /// away from zero instead of rejecting them.
    ///
    /// For JSON numbers and figures the backend derives by division (average
    /// ticket). Operator-entered amounts go through the strict parser.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal_rounded("33.335").unwrap().cents(), 3334);
    /// assert_eq!(Money::parse_decimal_rounded("-0.004").unwrap().cents(), 0);
    /// ```
    pub fn parse_decimal_rounded(input: &str) -> Result<Money, ValidationError> {
        let trimmed = input.trim();
        let Some((whole, fraction)) = trimmed.split_once('.') else {
            return Money::parse_decimal(trimmed);
        };
        if fraction.len() <= 2 {
            return Money::parse_decimal(trimmed);
        }
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: format!("'{}' is not a plain decimal number", input),
            });
        }

        let truncated = Money::parse_decimal(&format!("{}.{}", whole, &fraction[..2]))?;
        let round_up = fraction.as_bytes()[2] >= b'5';
        let negative = whole.trim_start().starts_with('-');

        Ok(match (round_up, negative) {
            (false, _) => truncated,
            (true, false) => truncated + Money::from_cents(1),
            (true, true) => truncated - Money::from_cents(1),
        })
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / SCALE
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % SCALE).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(2550);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 7650);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns `self - other`, floored at zero.
    ///
    /// Used for cash change: `max(0, received − total)`.
    #[inline]
    pub fn saturating_sub_floor_zero(&self, other: Money) -> Money {
        Money((self.0 - other.0).max(0))
    }

    /// Expresses `self` as a signed percentage of `base`.
    ///
    /// Returns zero when `base` is zero instead of dividing by it. The
    /// result is rounded half away from zero to whole basis points.
    ///
    /// ## Example
    /// ```rust
    /// use caja_core::money::Money;
    ///
    /// let diff = Money::from_cents(-5000);   // -50.00
    /// let net = Money::from_cents(100000);   // 1000.00
    /// assert_eq!(diff.percentage_of(net).bps(), -500); // -5.00%
    /// assert_eq!(diff.percentage_of(Money::zero()).bps(), 0);
    /// ```
    pub fn percentage_of(&self, base: Money) -> Percentage {
        if base.is_zero() {
            return Percentage::zero();
        }

        // bps = self / base × 10000, in i128 so large closures cannot overflow
        let numerator = self.0 as i128 * 10_000;
        let denominator = base.0 as i128;
        let quotient = numerator / denominator;
        let remainder = numerator % denominator;

        let rounded = if remainder.abs() * 2 >= denominator.abs() {
            if (numerator < 0) != (denominator < 0) {
                quotient - 1
            } else {
                quotient + 1
            }
        } else {
            quotient
        };

        Percentage::from_bps(rounded as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering ("-50.00").
///
/// ## Note
/// Currency symbols and grouping are a display concern of the frontend.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by a quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
