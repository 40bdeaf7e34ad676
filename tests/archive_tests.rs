//! Cascade archive/restore tests
//!
//! Covers the restore guard that keeps independently-archived children down
//! when a parent is restored, and the counts accumulator.

use packhouse_core::services::archive::{should_cascade_restore, ArchiveCounts};

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// A direct restore reactivates regardless of how the row was archived.
    #[test]
    fn test_direct_restore_always_allowed() {
        assert!(should_cascade_restore(true, false));
        assert!(should_cascade_restore(false, false));
    }

    /// A cascade restore only reactivates rows the cascade archived.
    #[test]
    fn test_cascade_restore_respects_flag() {
        assert!(should_cascade_restore(true, true));
        assert!(!should_cascade_restore(false, true));
    }

    /// The asymmetry in one place: archive down-propagates unconditionally,
    /// restore up-propagation is gated by the flag.
    #[test]
    fn test_independently_archived_child_stays_down() {
        // Child archived directly (flag false), parent later archived and
        // restored: the cascade restore must skip the child.
        let archived_by_cascade = false;
        assert!(!should_cascade_restore(archived_by_cascade, true));
    }

    #[test]
    fn test_counts_default_empty() {
        let counts = ArchiveCounts::default();
        assert_eq!(counts.total(), 0);
    }

    #[test]
    fn test_counts_total_sums_all_types() {
        let counts = ArchiveCounts {
            warehouses: 1,
            seasons: 2,
            weeks: 4,
            receptions: 10,
            classification_lines: 25,
            orders: 3,
            order_lines: 6,
            order_consumptions: 8,
            trucks: 2,
            manifest_items: 5,
            truck_consumptions: 7,
            purchases: 1,
            consumables: 9,
        };
        assert_eq!(counts.total(), 83);
    }

    #[test]
    fn test_counts_merge_accumulates() {
        let mut a = ArchiveCounts {
            seasons: 1,
            receptions: 2,
            ..Default::default()
        };
        let b = ArchiveCounts {
            seasons: 3,
            classification_lines: 4,
            ..Default::default()
        };

        a.merge(&b);
        assert_eq!(a.seasons, 4);
        assert_eq!(a.receptions, 2);
        assert_eq!(a.classification_lines, 4);
        assert_eq!(a.total(), 10);
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

        /// Direct restores never skip; cascade restores skip exactly the
        /// independently-archived rows.
        #[test]
        fn prop_restore_guard_truth_table(
            by_cascade in any::<bool>(),
            via_cascade in any::<bool>()
        ) {
            let allowed = should_cascade_restore(by_cascade, via_cascade);
            prop_assert_eq!(allowed, !via_cascade || by_cascade);
        }

        /// Merging counts is commutative on totals.
        #[test]
        fn prop_merge_total_commutative(
            a_seasons in 0u64..=1000,
            a_lines in 0u64..=1000,
            b_trucks in 0u64..=1000,
            b_weeks in 0u64..=1000
        ) {
            let a = ArchiveCounts {
                seasons: a_seasons,
                classification_lines: a_lines,
                ..Default::default()
            };
            let b = ArchiveCounts {
                trucks: b_trucks,
                weeks: b_weeks,
                ..Default::default()
            };

            let mut ab = a;
            ab.merge(&b);
            let mut ba = b;
            ba.merge(&a);

            prop_assert_eq!(ab.total(), ba.total());
            prop_assert_eq!(ab, ba);
        }
    }
}
