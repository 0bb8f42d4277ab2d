//! Rank Allocation
//!
//! Pure functions computing a rank between two neighbors and forecasting
//! whether the gap left behind still has room for another insert.

use thiserror::Error;

use crate::domain::DomainError;

/// Exclusive upper limit for every rank; the lower limit is 0
pub const UPPER_BOUND: f64 = 100_000_000.0;

/// Rank given to the first item of an empty scope
pub const DEFAULT_RANK: f64 = UPPER_BOUND / 2.0;

/// Smallest neighbor distance still considered safe to split again
pub const MIN_GAP: f64 = 1e-6;

/// Why no rank could be produced
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RankError {
    /// Neighbors misordered, equal, non-finite or outside `(0, UPPER_BOUND)`
    #[error("previous rank {prev:?} must be below next rank {next:?}")]
    InvalidRange { prev: Option<f64>, next: Option<f64> },
    /// No representable value lies strictly between the bounds; the scope
    /// must be normalized before retrying
    #[error("no distinct rank left between {prev:?} and {next:?}")]
    Exhausted { prev: Option<f64>, next: Option<f64> },
}

impl From<RankError> for DomainError {
    fn from(e: RankError) -> Self {
        match e {
            RankError::InvalidRange { prev, next } => DomainError::InvalidRange { prev, next },
            RankError::Exhausted { .. } => DomainError::Internal(e.to_string()),
        }
    }
}

fn in_bounds(rank: f64) -> bool {
    rank.is_finite() && rank > 0.0 && rank < UPPER_BOUND
}

/// Compute the rank for an item placed between `prev` and `next`.
///
/// - both absent: `DEFAULT_RANK`
/// - head (`next` only): `next / 2`
/// - tail (`prev` only): halfway between `prev` and `UPPER_BOUND`
/// - both: the midpoint
///
/// The result always lies strictly between the effective bounds. When
/// floating-point rounding would land on a bound, `Exhausted` is returned
/// instead of a duplicate rank.
pub fn get_insert_rank(prev: Option<f64>, next: Option<f64>) -> Result<f64, RankError> {
    let invalid = RankError::InvalidRange { prev, next };
    if prev.is_some_and(|p| !in_bounds(p)) || next.is_some_and(|n| !in_bounds(n)) {
        return Err(invalid);
    }

    let rank = match (prev, next) {
        (None, None) => return Ok(DEFAULT_RANK),
        (None, Some(next)) => next / 2.0,
        (Some(prev), None) => prev + (UPPER_BOUND - prev) / 2.0,
        (Some(prev), Some(next)) => {
            if prev >= next {
                return Err(invalid);
            }
            (prev + next) / 2.0
        }
    };

    let lower = prev.unwrap_or(0.0);
    let upper = next.unwrap_or(UPPER_BOUND);
    if rank > lower && rank < upper {
        log::debug!("allocated rank {} between {:?} and {:?}", rank, prev, next);
        Ok(rank)
    } else {
        Err(RankError::Exhausted { prev, next })
    }
}

/// Headroom forecast with the default `MIN_GAP`
pub fn gap_acceptable(prev: Option<f64>, next: Option<f64>) -> bool {
    gap_acceptable_with(prev, next, MIN_GAP)
}

/// Whether the distance between the neighbors (absent sides count as 0 and
/// `UPPER_BOUND`) stays above `min_gap`. False means the next insert at the
/// same spot may not find a distinct midpoint and the scope should be
/// normalized.
pub fn gap_acceptable_with(prev: Option<f64>, next: Option<f64>, min_gap: f64) -> bool {
    let lower = prev.unwrap_or(0.0);
    let upper = next.unwrap_or(UPPER_BOUND);
    upper - lower > min_gap
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_scope_gets_midrange() {
        assert_eq!(get_insert_rank(None, None), Ok(50_000_000.0));
    }

    #[test]
    fn test_midpoint_between_neighbors() {
        assert_eq!(get_insert_rank(Some(10.0), Some(20.0)), Ok(15.0));
        assert!(gap_acceptable(Some(10.0), Some(20.0)));
    }

    #[test]
    fn test_head_and_tail() {
        assert_eq!(get_insert_rank(None, Some(40.0)), Ok(20.0));
        assert_eq!(get_insert_rank(Some(60_000_000.0), None), Ok(80_000_000.0));
    }

    #[test]
    fn test_misordered_neighbors() {
        assert_eq!(
            get_insert_rank(Some(20.0), Some(10.0)),
            Err(RankError::InvalidRange { prev: Some(20.0), next: Some(10.0) })
        );
        assert!(matches!(
            get_insert_rank(Some(10.0), Some(10.0)),
            Err(RankError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_out_of_bounds_neighbors() {
        assert!(matches!(get_insert_rank(Some(0.0), None), Err(RankError::InvalidRange { .. })));
        assert!(matches!(get_insert_rank(None, Some(UPPER_BOUND)), Err(RankError::InvalidRange { .. })));
        assert!(matches!(get_insert_rank(Some(f64::NAN), None), Err(RankError::InvalidRange { .. })));
    }

    #[test]
    fn test_adjacent_floats_are_exhausted() {
        let prev = 10.0_f64;
        let next = f64::from_bits(prev.to_bits() + 1);
        assert_eq!(
            get_insert_rank(Some(prev), Some(next)),
            Err(RankError::Exhausted { prev: Some(prev), next: Some(next) })
        );
    }

    #[test]
    fn test_tail_exhausted_near_upper_bound() {
        let prev = f64::from_bits(UPPER_BOUND.to_bits() - 1);
        assert!(matches!(get_insert_rank(Some(prev), None), Err(RankError::Exhausted { .. })));
    }

    #[test]
    fn test_head_near_zero_stays_positive() {
        let rank = get_insert_rank(None, Some(1e-300)).unwrap();
        assert!(rank > 0.0 && rank < 1e-300);
        assert!(matches!(
            get_insert_rank(None, Some(f64::from_bits(1))),
            Err(RankError::Exhausted { .. })
        ));
    }

    #[test]
    fn test_narrow_gap_is_not_acceptable() {
        assert!(!gap_acceptable(Some(10.0), Some(10.0000001)));
        assert!(!gap_acceptable(None, Some(1e-7)));
        assert!(gap_acceptable(None, None));
        assert!(!gap_acceptable_with(Some(10.0), Some(20.0), 10.0));
    }

    #[test]
    fn test_exhausted_maps_to_internal() {
        let err: DomainError = RankError::Exhausted { prev: None, next: None }.into();
        assert!(matches!(err, DomainError::Internal(_)));
    }

    proptest! {
        #[test]
        fn prop_midpoint_strictly_between(a in 1e-3..UPPER_BOUND, b in 1e-3..UPPER_BOUND) {
            prop_assume!((a - b).abs() > MIN_GAP);
            let (prev, next) = if a < b { (a, b) } else { (b, a) };
            let rank = get_insert_rank(Some(prev), Some(next)).unwrap();
            prop_assert!(prev < rank && rank < next);
        }

        #[test]
        fn prop_tail_above_prev(prev in 1e-3..(UPPER_BOUND - 1.0)) {
            let rank = get_insert_rank(Some(prev), None).unwrap();
            prop_assert!(rank > prev && rank < UPPER_BOUND);
        }

        #[test]
        fn prop_head_below_next(next in 1e-3..UPPER_BOUND) {
            let rank = get_insert_rank(None, Some(next)).unwrap();
            prop_assert!(rank > 0.0 && rank < next);
        }

        #[test]
        fn prop_result_never_touches_bounds(a in any::<f64>(), b in any::<f64>()) {
            match get_insert_rank(Some(a), Some(b)) {
                Ok(rank) => prop_assert!(a < rank && rank < b),
                Err(RankError::InvalidRange { .. }) => prop_assert!(!(in_bounds(a) && in_bounds(b) && a < b)),
                Err(RankError::Exhausted { .. }) => prop_assert!(b - a <= MIN_GAP),
            }
        }
    }
}
