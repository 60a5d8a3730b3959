//! # Exact Rational Numbers
//!
//! Foundation type for all duration and position arithmetic. A [`Rat`] is a
//! reduced fraction with the sign carried on the numerator and a strictly
//! positive denominator. Conversion to `f64` is lossy and happens only at IR
//! emission boundaries.
//!
//! ## Invariants
//! - `d > 0` always
//! - `gcd(|n|, d) == 1` always (lowest terms)
//! - `Rat::new(_, 0)` is rejected
//!
//! Serializes as `{ "n": ..., "d": ... }` per the IR schema.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// An exact rational in lowest terms with a positive denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rat {
    n: i64,
    d: i64,
}

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}

impl Rat {
    pub const ZERO: Rat = Rat { n: 0, d: 1 };
    pub const ONE: Rat = Rat { n: 1, d: 1 };

    /// Construct a rational, normalizing to lowest terms. Returns `None` for
    /// a zero denominator.
    pub fn new(n: i64, d: i64) -> Option<Rat> {
        if d == 0 {
            return None;
        }
        let (mut n, mut d) = if d < 0 { (-n, -d) } else { (n, d) };
        let g = gcd(n, d);
        if g > 1 {
            n /= g;
            d /= g;
        }
        Some(Rat { n, d })
    }

    /// Construct from an integer.
    pub fn int(n: i64) -> Rat {
        Rat { n, d: 1 }
    }

    pub fn numerator(&self) -> i64 {
        self.n
    }

    pub fn denominator(&self) -> i64 {
        self.d
    }

    pub fn is_zero(&self) -> bool {
        self.n == 0
    }

    pub fn is_negative(&self) -> bool {
        self.n < 0
    }

    /// True when the value is a whole integer.
    pub fn is_integer(&self) -> bool {
        self.d == 1
    }

    /// Lossy conversion, used only when emitting IR or mixing with floats.
    pub fn to_f64(&self) -> f64 {
        self.n as f64 / self.d as f64
    }

    /// Exact division. `None` when `other` is zero.
    pub fn checked_div(self, other: Rat) -> Option<Rat> {
        if other.n == 0 {
            return None;
        }
        Rat::new(self.n * other.d, self.d * other.n)
    }

    pub fn abs(self) -> Rat {
        Rat {
            n: self.n.abs(),
            d: self.d,
        }
    }

    /// Round to the nearest multiple of `grid` (ties round up). `grid` must
    /// be positive; returns `self` unchanged otherwise.
    pub fn quantize(self, grid: Rat) -> Rat {
        if grid.n <= 0 {
            return self;
        }
        // self / grid, rounded to nearest integer
        let num = self.n * grid.d;
        let den = self.d * grid.n;
        let steps = (2 * num + den).div_euclid(2 * den);
        grid * Rat::int(steps)
    }
}

impl Add for Rat {
    type Output = Rat;
    fn add(self, rhs: Rat) -> Rat {
        // denominators are nonzero, so the result denominator is too
        Rat::new(self.n * rhs.d + rhs.n * self.d, self.d * rhs.d).unwrap_or(Rat::ZERO)
    }
}

impl Sub for Rat {
    type Output = Rat;
    fn sub(self, rhs: Rat) -> Rat {
        Rat::new(self.n * rhs.d - rhs.n * self.d, self.d * rhs.d).unwrap_or(Rat::ZERO)
    }
}

impl Mul for Rat {
    type Output = Rat;
    fn mul(self, rhs: Rat) -> Rat {
        Rat::new(self.n * rhs.n, self.d * rhs.d).unwrap_or(Rat::ZERO)
    }
}

impl Div for Rat {
    type Output = Rat;
    /// Panics on division by zero; use [`Rat::checked_div`] where the
    /// divisor comes from user input.
    fn div(self, rhs: Rat) -> Rat {
        match self.checked_div(rhs) {
            Some(r) => r,
            None => panic!("rational division by zero"),
        }
    }
}

impl Neg for Rat {
    type Output = Rat;
    fn neg(self) -> Rat {
        Rat {
            n: -self.n,
            d: self.d,
        }
    }
}

impl PartialOrd for Rat {
    fn partial_cmp(&self, other: &Rat) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Rat {
    fn cmp(&self, other: &Rat) -> Ordering {
        // cross-multiply in i128 so large components cannot overflow
        let lhs = self.n as i128 * other.d as i128;
        let rhs = other.n as i128 * self.d as i128;
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Rat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.n, self.d)
    }
}

impl Serialize for Rat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Rat", 2)?;
        s.serialize_field("n", &self.n)?;
        s.serialize_field("d", &self.d)?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduction() {
        let r = Rat::new(6, 8).unwrap();
        assert_eq!(r.numerator(), 3);
        assert_eq!(r.denominator(), 4);
    }

    #[test]
    fn test_sign_normalization() {
        let r = Rat::new(1, -4).unwrap();
        assert_eq!(r.numerator(), -1);
        assert_eq!(r.denominator(), 4);
        let r = Rat::new(-2, -4).unwrap();
        assert_eq!(r.numerator(), 1);
        assert_eq!(r.denominator(), 2);
    }

    #[test]
    fn test_zero_denominator_rejected() {
        assert!(Rat::new(1, 0).is_none());
    }

    #[test]
    fn test_reduction_idempotent() {
        let r = Rat::new(10, 15).unwrap();
        let again = Rat::new(r.numerator(), r.denominator()).unwrap();
        assert_eq!(r, again);
    }

    #[test]
    fn test_exact_sum_thirds() {
        let third = Rat::new(1, 3).unwrap();
        let two_thirds = Rat::new(2, 3).unwrap();
        assert_eq!(third + two_thirds, Rat::ONE);
    }

    #[test]
    fn test_arithmetic() {
        let a = Rat::new(1, 4).unwrap();
        let b = Rat::new(1, 6).unwrap();
        assert_eq!(a + b, Rat::new(5, 12).unwrap());
        assert_eq!(a - b, Rat::new(1, 12).unwrap());
        assert_eq!(a * b, Rat::new(1, 24).unwrap());
        assert_eq!(a.checked_div(b).unwrap(), Rat::new(3, 2).unwrap());
        assert!(a.checked_div(Rat::ZERO).is_none());
    }

    #[test]
    fn test_ordering() {
        let a = Rat::new(1, 3).unwrap();
        let b = Rat::new(1, 4).unwrap();
        assert!(a > b);
        assert!(Rat::int(-1) < Rat::ZERO);
    }

    #[test]
    fn test_quantize() {
        let grid = Rat::new(1, 8).unwrap();
        assert_eq!(Rat::new(3, 16).unwrap().quantize(grid), Rat::new(1, 4).unwrap());
        assert_eq!(Rat::new(5, 32).unwrap().quantize(grid), Rat::new(1, 8).unwrap());
        assert_eq!(Rat::ZERO.quantize(grid), Rat::ZERO);
    }

    #[test]
    fn test_serialize_shape() {
        let r = Rat::new(3, 4).unwrap();
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"n":3,"d":4}"#);
    }
}
