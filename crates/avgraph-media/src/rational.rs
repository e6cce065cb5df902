//! Exact rational numbers for frame rates, aspect ratios and time bases.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MediaError;

/// A signed numerator over an unsigned denominator.
///
/// A zero denominator is tolerated and means "unknown"; it compares equal
/// only to other unknown values with the same numerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    /// Numerator.
    pub num: i64,
    /// Denominator.
    pub den: u64,
}

impl Rational {
    /// Creates a rational without simplifying it.
    pub const fn new(num: i64, den: u64) -> Self {
        Self { num, den }
    }

    /// Returns `true` when the numerator is zero.
    pub fn is_zero(self) -> bool {
        self.num == 0
    }

    /// Returns the fraction reduced by the gcd of numerator and denominator.
    pub fn simplified(self) -> Self {
        let g = gcd(self.num.unsigned_abs(), self.den);
        if g <= 1 {
            return self;
        }
        Self {
            num: self.num / g as i64,
            den: self.den / g,
        }
    }

    /// Returns `1 / self`, keeping the sign on the numerator.
    ///
    /// Returns `None` for a zero numerator.
    pub fn inverse(self) -> Option<Self> {
        if self.num == 0 {
            return None;
        }
        let num = i64::try_from(self.den).ok()?;
        let num = if self.num < 0 { -num } else { num };
        Some(Self {
            num,
            den: self.num.unsigned_abs(),
        })
    }

    /// Floating-point approximation, `0.0` when the denominator is zero.
    pub fn as_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = MediaError;

    /// Parses `"num/den"` or a bare integer (`"25"` reads as `25/1`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || MediaError::InvalidRational(s.to_string());
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s.trim(), "1"),
        };
        let num = num.parse::<i64>().map_err(|_| bad())?;
        let den = den.parse::<u64>().map_err(|_| bad())?;
        if den == 0 {
            return Err(bad());
        }
        Ok(Self { num, den })
    }
}

/// Greatest common divisor (Euclid).
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplify_reduces_common_factors() {
        assert_eq!(Rational::new(50, 2).simplified(), Rational::new(25, 1));
        assert_eq!(Rational::new(-4, 6).simplified(), Rational::new(-2, 3));
        assert_eq!(Rational::new(0, 0).simplified(), Rational::new(0, 0));
    }

    #[test]
    fn inverse_swaps_and_keeps_sign() {
        assert_eq!(Rational::new(1, 25).inverse(), Some(Rational::new(25, 1)));
        assert_eq!(Rational::new(-3, 2).inverse(), Some(Rational::new(-2, 3)));
        assert_eq!(Rational::new(0, 5).inverse(), None);
    }

    #[test]
    fn parse_fraction_and_integer() {
        assert_eq!("30000/1001".parse::<Rational>().unwrap(), Rational::new(30000, 1001));
        assert_eq!("25".parse::<Rational>().unwrap(), Rational::new(25, 1));
        assert!("1/0".parse::<Rational>().is_err());
        assert!("abc".parse::<Rational>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let r = Rational::new(16, 9);
        assert_eq!(r.to_string().parse::<Rational>().unwrap(), r);
    }
}
