//! # Symbolic Positions
//!
//! A position locates a moment on a timeline. Three variants:
//!
//! - `Rat` - a rational offset in whole notes from the origin
//! - `Ref` - a symbolic `bar:beat` reference, resolvable only with a meter map
//! - `Expr` - a `bar:beat` base plus a rational whole-note delta
//!
//! Arithmetic never discards symbolic bar/beat information; shifting a `Ref`
//! produces an `Expr`, and only the IR normalizer resolves either against the
//! meter map.

use crate::rat::Rat;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// A timeline position, symbolic until normalization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pos {
    /// Rational whole-note offset from the origin.
    Rat(Rat),
    /// Symbolic `bar:beat`; both components are >= 1.
    Ref { bar: u32, beat: u32 },
    /// Symbolic base plus a rational whole-note delta.
    Expr { bar: u32, beat: u32, offset: Rat },
}

impl Pos {
    pub const ORIGIN: Pos = Pos::Rat(Rat::ZERO);

    /// Shift by a rational delta. `Ref` becomes `Expr`; an `Expr` whose
    /// offset cancels back to zero collapses to `Ref`.
    pub fn shift(self, delta: Rat) -> Pos {
        match self {
            Pos::Rat(r) => Pos::Rat(r + delta),
            Pos::Ref { bar, beat } => {
                if delta.is_zero() {
                    self
                } else {
                    Pos::Expr {
                        bar,
                        beat,
                        offset: delta,
                    }
                }
            }
            Pos::Expr { bar, beat, offset } => {
                let offset = offset + delta;
                if offset.is_zero() {
                    Pos::Ref { bar, beat }
                } else {
                    Pos::Expr { bar, beat, offset }
                }
            }
        }
    }

    /// Rational distance `self - other`, when both sides resolve without a
    /// meter map: plain rationals, or symbolic positions sharing the same
    /// `bar:beat` base.
    pub fn minus(self, other: Pos) -> Option<Rat> {
        let (base_a, off_a) = self.split();
        let (base_b, off_b) = other.split();
        if base_a == base_b {
            Some(off_a - off_b)
        } else {
            None
        }
    }

    /// The rational offset when the position carries no symbolic base.
    pub fn as_rat(self) -> Option<Rat> {
        match self {
            Pos::Rat(r) => Some(r),
            _ => None,
        }
    }

    /// Symbolic base (if any) and rational offset component.
    fn split(self) -> (Option<(u32, u32)>, Rat) {
        match self {
            Pos::Rat(r) => (None, r),
            Pos::Ref { bar, beat } => (Some((bar, beat)), Rat::ZERO),
            Pos::Expr { bar, beat, offset } => (Some((bar, beat)), offset),
        }
    }

    /// Deterministic ordering for event sorting. Rational positions compare
    /// numerically and sort before symbolic ones; symbolic positions compare
    /// by `(bar, beat, offset)`.
    pub fn sort_key(&self) -> (u8, i128, i128, Rat) {
        match *self {
            Pos::Rat(r) => (0, r.numerator() as i128, r.denominator() as i128, Rat::ZERO),
            Pos::Ref { bar, beat } => (1, bar as i128, beat as i128, Rat::ZERO),
            Pos::Expr { bar, beat, offset } => (1, bar as i128, beat as i128, offset),
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pos::Rat(r) => write!(f, "{}", r),
            Pos::Ref { bar, beat } => write!(f, "{}:{}", bar, beat),
            Pos::Expr { bar, beat, offset } => write!(f, "{}:{}+{}", bar, beat, offset),
        }
    }
}

impl Serialize for Pos {
    /// IR shape: a plain `{n,d}` for rationals, tagged records for the
    /// symbolic variants.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Pos::Rat(r) => r.serialize(serializer),
            Pos::Ref { bar, beat } => {
                let mut s = serializer.serialize_struct("PosRef", 3)?;
                s.serialize_field("kind", "posref")?;
                s.serialize_field("bar", &bar)?;
                s.serialize_field("beat", &beat)?;
                s.end()
            }
            Pos::Expr { bar, beat, offset } => {
                #[derive(Serialize)]
                struct Base {
                    kind: &'static str,
                    bar: u32,
                    beat: u32,
                }
                let mut s = serializer.serialize_struct("PosExpr", 3)?;
                s.serialize_field("kind", "posexpr")?;
                s.serialize_field(
                    "base",
                    &Base {
                        kind: "posref",
                        bar,
                        beat,
                    },
                )?;
                s.serialize_field("offset", &offset)?;
                s.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64, d: i64) -> Rat {
        Rat::new(n, d).unwrap()
    }

    #[test]
    fn test_shift_rat() {
        let p = Pos::Rat(rat(1, 4)).shift(rat(1, 4));
        assert_eq!(p, Pos::Rat(rat(1, 2)));
    }

    #[test]
    fn test_shift_ref_keeps_base() {
        let p = Pos::Ref { bar: 3, beat: 2 }.shift(rat(1, 8));
        assert_eq!(
            p,
            Pos::Expr {
                bar: 3,
                beat: 2,
                offset: rat(1, 8)
            }
        );
        // shifting back collapses to the bare reference
        assert_eq!(p.shift(rat(-1, 8)), Pos::Ref { bar: 3, beat: 2 });
    }

    #[test]
    fn test_minus_same_base() {
        let a = Pos::Expr {
            bar: 2,
            beat: 1,
            offset: rat(1, 2),
        };
        let b = Pos::Expr {
            bar: 2,
            beat: 1,
            offset: rat(1, 4),
        };
        assert_eq!(a.minus(b), Some(rat(1, 4)));
    }

    #[test]
    fn test_minus_mixed_bases() {
        let a = Pos::Ref { bar: 2, beat: 1 };
        let b = Pos::Rat(rat(1, 1));
        assert_eq!(a.minus(b), None);
        assert_eq!(Pos::Rat(rat(3, 4)).minus(Pos::Rat(rat(1, 4))), Some(rat(1, 2)));
    }

    #[test]
    fn test_serialize_variants() {
        let r = serde_json::to_string(&Pos::Rat(rat(1, 2))).unwrap();
        assert_eq!(r, r#"{"n":1,"d":2}"#);
        let p = serde_json::to_string(&Pos::Ref { bar: 3, beat: 2 }).unwrap();
        assert_eq!(p, r#"{"kind":"posref","bar":3,"beat":2}"#);
        let e = serde_json::to_string(&Pos::Expr {
            bar: 1,
            beat: 1,
            offset: rat(1, 16),
        })
        .unwrap();
        assert_eq!(
            e,
            r#"{"kind":"posexpr","base":{"kind":"posref","bar":1,"beat":1},"offset":{"n":1,"d":16}}"#
        );
    }

    #[test]
    fn test_sort_key_orders_rats_first() {
        let a = Pos::Rat(rat(1, 2));
        let b = Pos::Ref { bar: 1, beat: 1 };
        assert!(a.sort_key() < b.sort_key());
    }
}
