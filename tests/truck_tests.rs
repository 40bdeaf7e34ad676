//! Truck confirmation protocol tests
//!
//! Covers correlative numbering, folio derivation, and the mixed-week
//! confirmation guard.

use packhouse_core::error::conflict_for_constraint;
use packhouse_core::services::truck::{build_folio, next_correlative, resolve_folio_week};
use uuid::Uuid;

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_first_correlative_is_one() {
        assert_eq!(next_correlative(&[]), 1);
    }

    #[test]
    fn test_correlative_is_max_plus_one() {
        assert_eq!(next_correlative(&[1, 2, 3]), 4);
        // Numbering follows the committed maximum even with gaps.
        assert_eq!(next_correlative(&[1, 7, 3]), 8);
    }

    #[test]
    fn test_folio_format() {
        let warehouse = Uuid::parse_str("a1b2c3d4-0000-0000-0000-000000000000").unwrap();
        let season = Uuid::parse_str("b2c3d4e5-0000-0000-0000-000000000000").unwrap();
        let week = Uuid::parse_str("c3d4e5f6-0000-0000-0000-000000000000").unwrap();

        let folio = build_folio(warehouse, season, Some(week), 7);
        assert_eq!(folio, "Aa1b2c3d4-Tb2c3d4e5-Sc3d4e5f6-0007");
    }

    #[test]
    fn test_folio_number_zero_padded() {
        let folio = build_folio(Uuid::new_v4(), Uuid::new_v4(), None, 12);
        assert!(folio.ends_with("-0012"));

        let folio = build_folio(Uuid::new_v4(), Uuid::new_v4(), None, 1234);
        assert!(folio.ends_with("-1234"));
    }

    /// A truck without loads and without an assigned week stamps the
    /// sentinel week.
    #[test]
    fn test_folio_sentinel_week() {
        let folio = build_folio(Uuid::new_v4(), Uuid::new_v4(), None, 1);
        assert!(folio.contains("-S0-"));
    }

    #[test]
    fn test_folio_week_from_single_load_week() {
        let week = Uuid::new_v4();
        let resolved = resolve_folio_week(&[week], None).unwrap();
        assert_eq!(resolved, Some(week));
    }

    /// Loads take precedence over the truck's own assigned week.
    #[test]
    fn test_load_week_overrides_truck_week() {
        let load_week = Uuid::new_v4();
        let truck_week = Uuid::new_v4();

        let resolved = resolve_folio_week(&[load_week], Some(truck_week)).unwrap();
        assert_eq!(resolved, Some(load_week));
    }

    #[test]
    fn test_no_loads_falls_back_to_truck_week() {
        let truck_week = Uuid::new_v4();
        let resolved = resolve_folio_week(&[], Some(truck_week)).unwrap();
        assert_eq!(resolved, Some(truck_week));
    }

    #[test]
    fn test_mixed_week_truck_rejected() {
        let err = resolve_folio_week(&[Uuid::new_v4(), Uuid::new_v4()], None).unwrap_err();
        assert!(err.is_conflict());
    }

    /// Two confirmations racing for the same number resolve to the same
    /// conflict class as the lock-serialized path, not a raw driver error.
    #[test]
    fn test_duplicate_number_index_maps_to_conflict() {
        let err = conflict_for_constraint("trucks_number_per_season").unwrap();
        assert!(err.is_conflict());
        assert!(conflict_for_constraint("trucks_pkey").is_none());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The next correlative is strictly greater than every committed one.
        #[test]
        fn prop_correlative_strictly_monotonic(
            existing in prop::collection::vec(1i32..=100000, 0..50)
        ) {
            let next = next_correlative(&existing);
            for n in &existing {
                prop_assert!(next > *n);
            }
        }

        /// Assigning the computed number and recomputing advances by one.
        #[test]
        fn prop_correlative_advances_by_one(
            existing in prop::collection::vec(1i32..=100000, 0..50)
        ) {
            let first = next_correlative(&existing);

            let mut with_first = existing.clone();
            with_first.push(first);
            prop_assert_eq!(next_correlative(&with_first), first + 1);
        }

        /// The folio always carries the zero-padded number as its last
        /// segment.
        #[test]
        fn prop_folio_ends_with_number(number in 1i32..=9999) {
            let folio = build_folio(Uuid::new_v4(), Uuid::new_v4(), None, number);
            let suffix = format!("-{:04}", number);
            prop_assert!(folio.ends_with(&suffix));
        }

        /// Folio derivation is stable for fixed inputs (idempotent
        /// confirmation must re-derive the same folio).
        #[test]
        fn prop_folio_stable(number in 1i32..=9999) {
            let warehouse = Uuid::new_v4();
            let season = Uuid::new_v4();
            let week = Uuid::new_v4();

            prop_assert_eq!(
                build_folio(warehouse, season, Some(week), number),
                build_folio(warehouse, season, Some(week), number)
            );
        }
    }
}
