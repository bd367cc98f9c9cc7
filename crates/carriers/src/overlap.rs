//! Weight bounds and the interval overlap predicate.

use serde::{Deserialize, Serialize};

use crate::error::ShippingError;

/// Returns true when weight range `a` overlaps weight range `b`.
///
/// The four legs are deliberately not symmetric in their boundary handling:
///
/// - `a1` in `[b1, b2)`
/// - `a2` in `(b1, b2]`
/// - `b1` in `(a1, a2)`
/// - `b2` in `(a1, a2)`
///
/// Tiers that only touch at a boundary (`[0, 10)` and `[10, 20)`) do not overlap.
/// Evaluated without short-circuiting.
pub fn overlaps(a1: f64, a2: f64, b1: f64, b2: f64) -> bool {
    ((a1 >= b1) & (a1 < b2))
        | ((a2 > b1) & (a2 <= b2))
        | ((b1 > a1) & (b1 < a2))
        | ((b2 > a1) & (b2 < a2))
}

/// Validated `[delimiter1, delimiter2)` weight bounds.
///
/// Invariants: both delimiters are finite, `delimiter1 >= 0`, `delimiter2 > delimiter1`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds", into = "RawBounds")]
pub struct WeightBounds {
    delimiter1: f64,
    delimiter2: f64,
}

#[derive(Serialize, Deserialize)]
struct RawBounds {
    delimiter1: f64,
    delimiter2: f64,
}

impl WeightBounds {
    pub fn new(delimiter1: f64, delimiter2: f64) -> Result<Self, ShippingError> {
        let invalid = |reason| ShippingError::InvalidRange {
            delimiter1,
            delimiter2,
            reason,
        };

        if !delimiter1.is_finite() || !delimiter2.is_finite() {
            return Err(invalid("delimiters must be finite numbers"));
        }
        if delimiter1 < 0.0 {
            return Err(invalid("lower delimiter must not be negative"));
        }
        if delimiter2 <= delimiter1 {
            return Err(invalid("upper delimiter must be greater than lower delimiter"));
        }

        Ok(Self {
            delimiter1,
            delimiter2,
        })
    }

    pub fn delimiter1(&self) -> f64 {
        self.delimiter1
    }

    pub fn delimiter2(&self) -> f64 {
        self.delimiter2
    }

    pub fn overlaps(&self, other: &WeightBounds) -> bool {
        overlaps(self.delimiter1, self.delimiter2, other.delimiter1, other.delimiter2)
    }

    /// Exact same pair of delimiters.
    pub fn same_as(&self, other: &WeightBounds) -> bool {
        self.delimiter1 == other.delimiter1 && self.delimiter2 == other.delimiter2
    }

    /// `delimiter1 <= weight < delimiter2`.
    pub fn contains(&self, weight: f64) -> bool {
        weight >= self.delimiter1 && weight < self.delimiter2
    }
}

impl TryFrom<RawBounds> for WeightBounds {
    type Error = ShippingError;

    fn try_from(raw: RawBounds) -> Result<Self, Self::Error> {
        Self::new(raw.delimiter1, raw.delimiter2)
    }
}

impl From<WeightBounds> for RawBounds {
    fn from(bounds: WeightBounds) -> Self {
        Self {
            delimiter1: bounds.delimiter1,
            delimiter2: bounds.delimiter2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        assert!(!overlaps(0.0, 10.0, 10.0, 20.0));
        assert!(!overlaps(10.0, 20.0, 0.0, 10.0));
    }

    #[test]
    fn partial_overlap_is_detected() {
        assert!(overlaps(0.0, 10.0, 5.0, 15.0));
        assert!(overlaps(5.0, 15.0, 0.0, 10.0));
    }

    #[test]
    fn exact_duplicate_overlaps() {
        assert!(overlaps(0.0, 10.0, 0.0, 10.0));
    }

    #[test]
    fn nested_with_shared_bound_overlaps() {
        // Shared lower bound trips the `[b1, b2)` leg.
        assert!(overlaps(0.0, 5.0, 0.0, 10.0));
        // Shared upper bound trips the `(b1, b2]` leg.
        assert!(overlaps(5.0, 10.0, 0.0, 10.0));
        // Strictly nested, either way round.
        assert!(overlaps(2.0, 3.0, 0.0, 10.0));
        assert!(overlaps(0.0, 10.0, 2.0, 3.0));
    }

    #[test]
    fn disjoint_ranges_do_not_overlap() {
        assert!(!overlaps(0.0, 1.0, 5.0, 6.0));
        assert!(!overlaps(5.0, 6.0, 0.0, 1.0));
    }

    #[test]
    fn bounds_reject_bad_input() {
        assert!(matches!(
            WeightBounds::new(-1.0, 5.0),
            Err(ShippingError::InvalidRange { .. })
        ));
        assert!(WeightBounds::new(5.0, 5.0).is_err());
        assert!(WeightBounds::new(6.0, 5.0).is_err());
        assert!(WeightBounds::new(f64::NAN, 5.0).is_err());
        assert!(WeightBounds::new(0.0, f64::INFINITY).is_err());
        assert!(WeightBounds::new(0.0, 0.5).is_ok());
    }

    #[test]
    fn contains_is_half_open() {
        let b = WeightBounds::new(1.0, 2.0).unwrap();
        assert!(b.contains(1.0));
        assert!(b.contains(1.999));
        assert!(!b.contains(2.0));
        assert!(!b.contains(0.5));
    }

    #[test]
    fn deserialization_validates() {
        let ok: WeightBounds =
            serde_json::from_str(r#"{"delimiter1":0.0,"delimiter2":2.5}"#).unwrap();
        assert_eq!(ok.delimiter2(), 2.5);
        let reversed =
            serde_json::from_str::<WeightBounds>(r#"{"delimiter1":3.0,"delimiter2":2.5}"#);
        assert!(reversed.is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn bounds() -> impl Strategy<Value = (f64, f64)> {
            (0u32..1_000, 1u32..500)
                .prop_map(|(lo, len)| (lo as f64 / 4.0, (lo + len) as f64 / 4.0))
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// For well-formed ranges the predicate matches half-open interval intersection.
            #[test]
            fn matches_half_open_intersection((a1, a2) in bounds(), (b1, b2) in bounds()) {
                prop_assert_eq!(overlaps(a1, a2, b1, b2), a1 < b2 && b1 < a2);
            }

            #[test]
            fn is_symmetric_for_well_formed_ranges((a1, a2) in bounds(), (b1, b2) in bounds()) {
                prop_assert_eq!(overlaps(a1, a2, b1, b2), overlaps(b1, b2, a1, a2));
            }

            #[test]
            fn touching_ranges_never_overlap((a1, a2) in bounds(), len in 1u32..500) {
                let b2 = a2 + len as f64;
                prop_assert!(!overlaps(a1, a2, a2, b2));
                prop_assert!(!overlaps(a2, b2, a1, a2));
            }

            #[test]
            fn range_always_overlaps_itself((a1, a2) in bounds()) {
                prop_assert!(overlaps(a1, a2, a1, a2));
            }
        }
    }
}
