//! Budget allocation check
//!
//! Each share lies in [0, 1] and the three must sum to 1 within
//! [`ALLOCATION_TOLERANCE`]. The check runs once per save attempt, before any
//! network call; values being edited are never validated. Only a [`ValidAllocation`] can be sent to the API.

use crate::models::BudgetAllocation;
use thiserror::Error;

/// Absolute tolerance on the sum of shares
pub const ALLOCATION_TOLERANCE: f64 = 0.01;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AllocationError {
    #[error("Budget allocations must sum to 100% (got {total_pct}%)")]
    SumMismatch {
        /// Raw sum of the three fractions
        total: f64,
        /// Sum rounded to whole percent, for display
        total_pct: i64,
    },

    #[error("Budget share '{field}' is not a number")]
    NotFinite { field: &'static str },

    #[error("Budget share '{field}' must be between 0 and 1 (got {value})")]
    OutOfRange { field: &'static str, value: f64 },
}

/// An allocation that passed [`validate_allocation`], persisted as-is
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidAllocation {
    allocation: BudgetAllocation,
    total: f64,
}

impl ValidAllocation {
    pub fn allocation(&self) -> &BudgetAllocation {
        &self.allocation
    }

    /// Sum of the shares (within tolerance of 1)
    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn into_inner(self) -> BudgetAllocation {
        self.allocation
    }
}

/// Validate an allocation before it is saved
///
/// No auto-normalization: a valid allocation keeps its exact shares.
pub fn validate_allocation(
    allocation: &BudgetAllocation,
) -> Result<ValidAllocation, AllocationError> {
    for (field, value) in [
        ("prospecting", allocation.prospecting),
        ("retargeting", allocation.retargeting),
        ("testing", allocation.testing),
    ] {
        if !value.is_finite() {
            return Err(AllocationError::NotFinite { field });
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(AllocationError::OutOfRange { field, value });
        }
    }

    let total = allocation.total();
    if (total - 1.0).abs() <= ALLOCATION_TOLERANCE {
        Ok(ValidAllocation {
            allocation: *allocation,
            total,
        })
    } else {
        Err(AllocationError::SumMismatch {
            total,
            total_pct: (total * 100.0).round() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_sum_is_valid() {
        let valid = validate_allocation(&BudgetAllocation::new(0.5, 0.35, 0.15)).unwrap();
        assert!((valid.total() - 1.0).abs() < 1e-9);
        assert_eq!(*valid.allocation(), BudgetAllocation::new(0.5, 0.35, 0.15));
    }

    #[test]
    fn test_within_tolerance_is_valid_and_not_normalized() {
        let allocation = BudgetAllocation::new(0.5, 0.3, 0.195);
        let valid = validate_allocation(&allocation).unwrap();
        assert_eq!(valid.into_inner(), allocation);

        assert!(validate_allocation(&BudgetAllocation::new(0.5, 0.3, 0.205)).is_ok());
    }

    #[test]
    fn test_accepts_every_triple_within_tolerance() {
        for p in 0..=20 {
            for r in 0..=(20 - p) {
                let prospecting = p as f64 * 0.05;
                let retargeting = r as f64 * 0.05;
                for offset in [-0.009, -0.004, 0.0, 0.004, 0.009] {
                    let testing = 1.0 - prospecting - retargeting + offset;
                    if !(0.0..=1.0).contains(&testing) {
                        continue;
                    }
                    let allocation = BudgetAllocation::new(prospecting, retargeting, testing);
                    if (allocation.total() - 1.0).abs() <= ALLOCATION_TOLERANCE {
                        assert!(
                            validate_allocation(&allocation).is_ok(),
                            "rejected {:?}",
                            allocation
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_sum_94_rejected_with_percent() {
        let err = validate_allocation(&BudgetAllocation::new(0.5, 0.3, 0.14)).unwrap_err();
        match &err {
            AllocationError::SumMismatch { total_pct, .. } => assert_eq!(*total_pct, 94),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.to_string().contains("94%"));
    }

    #[test]
    fn test_sum_107_rejected_with_percent() {
        let err = validate_allocation(&BudgetAllocation::new(0.5, 0.42, 0.15)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Budget allocations must sum to 100% (got 107%)"
        );
    }

    #[test]
    fn test_nan_share_rejected() {
        let err = validate_allocation(&BudgetAllocation::new(f64::NAN, 0.5, 0.5)).unwrap_err();
        assert_eq!(
            err,
            AllocationError::NotFinite {
                field: "prospecting"
            }
        );
    }

    #[test]
    fn test_share_outside_unit_range_rejected() {
        let err = validate_allocation(&BudgetAllocation::new(1.5, -0.5, 0.0)).unwrap_err();
        assert_eq!(
            err,
            AllocationError::OutOfRange {
                field: "prospecting",
                value: 1.5
            }
        );

        let err = validate_allocation(&BudgetAllocation::new(0.6, -0.1, 0.5)).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::OutOfRange {
                field: "retargeting",
                ..
            }
        ));

        assert!(validate_allocation(&BudgetAllocation::new(1.0, 0.0, 0.0)).is_ok());
    }
}
