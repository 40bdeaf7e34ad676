//! Consumption ledger tests
//!
//! Covers availability arithmetic: produced minus active consumptions from
//! both origins, floored at zero, and the implicit release on archive.

use packhouse_core::services::consumption::{available_from, LineUsage};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_availability_subtracts_both_origins() {
        assert_eq!(available_from(100, 30, 20), 50);
    }

    #[test]
    fn test_availability_floors_at_zero() {
        // Over-consumption can only arise from data predating the guard;
        // availability still reports zero, never negative.
        assert_eq!(available_from(50, 40, 40), 0);
    }

    #[test]
    fn test_untouched_line_fully_available() {
        assert_eq!(available_from(80, 0, 0), 80);
    }

    #[test]
    fn test_line_usage_available() {
        let usage = LineUsage {
            quantity: 80,
            order_consumed: 10,
            truck_consumed: 70,
        };
        assert_eq!(usage.available(), 0);
    }

    /// Scenario: line of 80, fully loaded onto a truck, then the truck is
    /// voided. Voiding archives the load, so the sum of active consumptions
    /// drops back to zero and the full 80 is available again.
    #[test]
    fn test_archive_releases_capacity() {
        let before = available_from(80, 0, 80);
        assert_eq!(before, 0);

        // Load archived: it no longer counts toward the active sum.
        let after = available_from(80, 0, 0);
        assert_eq!(after, 80);
    }

    #[test]
    fn test_second_consumer_sees_nothing_left() {
        let available = available_from(80, 0, 80);
        let requested = 1i64;
        assert!(requested > available);
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

        /// Availability is never negative.
        #[test]
        fn prop_availability_non_negative(
            quantity in 0i32..=100000,
            orders in 0i64..=200000,
            trucks in 0i64..=200000
        ) {
            prop_assert!(available_from(quantity, orders, trucks) >= 0);
        }

        /// Without consumption, availability equals the produced quantity.
        #[test]
        fn prop_no_consumption_full_availability(quantity in 0i32..=100000) {
            prop_assert_eq!(available_from(quantity, 0, 0), i64::from(quantity));
        }

        /// Availability plus consumption reconstructs the produced quantity
        /// whenever consumption fits within it.
        #[test]
        fn prop_conservation_when_within_bounds(
            quantity in 0i32..=100000,
            orders in 0i64..=100000,
            trucks in 0i64..=100000
        ) {
            prop_assume!(orders + trucks <= i64::from(quantity));
            let available = available_from(quantity, orders, trucks);
            prop_assert_eq!(available + orders + trucks, i64::from(quantity));
        }

        /// Archiving one consumption (removing it from the sum) never
        /// decreases availability.
        #[test]
        fn prop_archive_releases_monotonically(
            quantity in 0i32..=100000,
            orders in 0i64..=100000,
            trucks in 1i64..=100000,
            released in 1i64..=100000
        ) {
            prop_assume!(released <= trucks);
            let before = available_from(quantity, orders, trucks);
            let after = available_from(quantity, orders, trucks - released);
            prop_assert!(after >= before);
        }
    }
}
