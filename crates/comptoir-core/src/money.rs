//! # Money Module
//!
//! Integer money and VAT rates for catalog pricing.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Prices are stored as i64 cents, VAT rates as u32 basis points.         │
//! │                                                                         │
//! │    unit_price_cents = 1999        (19.99 €)                             │
//! │    vat_rate_bps     = 2000        (20 %)                                │
//! │                                                                         │
//! │    vat   = (1999 * 2000 + 5000) / 10000 = 400                          │
//! │    gross = 1999 + 400             = 2399   (23.99 €)                    │
//! │                                                                         │
//! │  No floating point anywhere on the pricing path.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Sub};
use ts_rs::TS;

// =============================================================================
// VAT Rate
// =============================================================================

/// VAT rate in basis points (2000 = 20 %).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct VatRate(u32);

impl VatRate {
    /// French standard rate, applied when a product does not specify one.
    pub const STANDARD: VatRate = VatRate(2000);

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        VatRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Percentage for display only.
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Default for VatRate {
    fn default() -> Self {
        VatRate::STANDARD
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// Monetary value in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// VAT owed on this net amount, rounded half up on the cent.
    ///
    /// ## Example
    /// ```rust
    /// use comptoir_core::money::{Money, VatRate};
    ///
    /// let net = Money::from_cents(1999);
    /// assert_eq!(net.vat(VatRate::STANDARD).cents(), 400);
    /// ```
    pub fn vat(&self, rate: VatRate) -> Money {
        // i128 keeps large catalog prices from overflowing the product
        let vat_cents = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_cents(vat_cents as i64)
    }

    /// Net amount plus VAT.
    pub fn with_vat(&self, rate: VatRate) -> Money {
        *self + self.vat(rate)
    }

    /// Gross margin in basis points of the selling price, when defined.
    ///
    /// `None` when the selling price is zero.
    pub fn margin_bps(&self, cost: Money) -> Option<i64> {
        if self.0 == 0 {
            return None;
        }
        Some(((self.0 - cost.0) as i128 * 10000 / self.0 as i128) as i64)
    }
}

/// Renders as `19.99 €`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02} €", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vat_standard_rate() {
        let net = Money::from_cents(1000);
        assert_eq!(net.vat(VatRate::STANDARD).cents(), 200);
        assert_eq!(net.with_vat(VatRate::STANDARD).cents(), 1200);
    }

    #[test]
    fn test_vat_rounds_half_up() {
        // 5.5 % of 0.10 € = 0.0055 € → 1 cent
        let net = Money::from_cents(10);
        assert_eq!(net.vat(VatRate::from_bps(550)).cents(), 1);
        // 5.5 % of 0.09 € = 0.00495 € → 0 cent
        assert_eq!(Money::from_cents(9).vat(VatRate::from_bps(550)).cents(), 0);
    }

    #[test]
    fn test_margin() {
        let price = Money::from_cents(2000);
        assert_eq!(price.margin_bps(Money::from_cents(1500)), Some(2500));
        assert_eq!(Money::zero().margin_bps(Money::from_cents(10)), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1999).to_string(), "19.99 €");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50 €");
        assert_eq!((Money::from_cents(250) * 4).to_string(), "10.00 €");
    }

    #[test]
    fn test_default_vat_is_standard() {
        assert_eq!(VatRate::default().bps(), 2000);
        assert!((VatRate::from_bps(550).percentage() - 5.5).abs() < 0.001);
    }
}
