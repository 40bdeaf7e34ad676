//! Week lifecycle tests
//!
//! Covers the 7-day clamp, interval overlap arithmetic, open-week effective
//! span, and ISO-week labeling.

use chrono::{Duration, NaiveDate};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use packhouse_core::error::conflict_for_constraint;
    use packhouse_core::models::{OperatingWeek, Season};
    use packhouse_core::services::warehouse::season_open_for_writes;
    use packhouse_core::services::week::{clamp_close_date, iso_week_label, spans_overlap};
    use uuid::Uuid;

    fn week(from: NaiveDate, to: Option<NaiveDate>) -> OperatingWeek {
        OperatingWeek {
            id: Uuid::new_v4(),
            warehouse_id: Uuid::new_v4(),
            season_id: Uuid::new_v4(),
            from_date: from,
            to_date: to,
            label: None,
            active: true,
            archived_at: None,
            archived_by_cascade: false,
            created_at: DateTime::<Utc>::default(),
        }
    }

    /// A close 9 days out is clamped to exactly 6 days, not rejected.
    #[test]
    fn test_late_close_is_clamped() {
        let from = date(2026, 3, 2);
        let requested = from + Duration::days(9);

        let persisted = clamp_close_date(from, requested);
        assert_eq!(persisted, from + Duration::days(6));
    }

    #[test]
    fn test_close_within_span_unchanged() {
        let from = date(2026, 3, 2);

        for extra in 0..=6 {
            let requested = from + Duration::days(extra);
            assert_eq!(clamp_close_date(from, requested), requested);
        }
    }

    #[test]
    fn test_same_day_close() {
        let from = date(2026, 3, 2);
        assert_eq!(clamp_close_date(from, from), from);
    }

    /// An open week spans its start plus six days for overlap checks.
    #[test]
    fn test_open_week_effective_end() {
        let w = week(date(2026, 3, 2), None);
        assert_eq!(w.effective_end(), date(2026, 3, 8));
        assert!(w.is_open());
    }

    #[test]
    fn test_closed_week_effective_end() {
        let w = week(date(2026, 3, 2), Some(date(2026, 3, 4)));
        assert_eq!(w.effective_end(), date(2026, 3, 4));
        assert!(!w.is_open());
    }

    #[test]
    fn test_week_contains_boundaries() {
        let w = week(date(2026, 3, 2), Some(date(2026, 3, 6)));
        assert!(w.contains(date(2026, 3, 2)));
        assert!(w.contains(date(2026, 3, 6)));
        assert!(!w.contains(date(2026, 3, 1)));
        assert!(!w.contains(date(2026, 3, 7)));
    }

    #[test]
    fn test_adjacent_spans_do_not_overlap() {
        // Week ends on the 8th, next starts on the 9th.
        assert!(!spans_overlap(
            date(2026, 3, 2),
            date(2026, 3, 8),
            date(2026, 3, 9),
            date(2026, 3, 15),
        ));
    }

    #[test]
    fn test_touching_spans_overlap() {
        // Shared boundary day counts as overlap (inclusive intervals).
        assert!(spans_overlap(
            date(2026, 3, 2),
            date(2026, 3, 8),
            date(2026, 3, 8),
            date(2026, 3, 15),
        ));
    }

    #[test]
    fn test_contained_span_overlaps() {
        assert!(spans_overlap(
            date(2026, 3, 1),
            date(2026, 3, 31),
            date(2026, 3, 10),
            date(2026, 3, 12),
        ));
    }

    #[test]
    fn test_iso_week_label_format() {
        assert_eq!(iso_week_label(date(2024, 12, 23)), "2024-W52");
        // Jan 1st 2027 belongs to ISO week 53 of 2026.
        assert_eq!(iso_week_label(date(2027, 1, 1)), "2026-W53");
        assert_eq!(iso_week_label(date(2026, 1, 5)), "2026-W02");
    }

    fn season(warehouse_id: Uuid) -> Season {
        Season {
            id: Uuid::new_v4(),
            warehouse_id,
            year: 2026,
            start_date: date(2026, 8, 1),
            end_date: None,
            finalized: false,
            active: true,
            archived_at: None,
            archived_by_cascade: false,
            created_at: DateTime::<Utc>::default(),
        }
    }

    /// An open active season under an active warehouse accepts writes.
    #[test]
    fn test_open_season_accepts_writes() {
        let warehouse_id = Uuid::new_v4();
        let season = season(warehouse_id);
        assert!(season_open_for_writes(&season, warehouse_id, true).is_ok());
    }

    /// A season reactivated while its warehouse stays archived must still
    /// reject writes such as starting a week.
    #[test]
    fn test_archived_warehouse_blocks_writes() {
        let warehouse_id = Uuid::new_v4();
        let season = season(warehouse_id);
        let err = season_open_for_writes(&season, warehouse_id, false).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_archived_or_finalized_season_blocks_writes() {
        let warehouse_id = Uuid::new_v4();

        let mut archived = season(warehouse_id);
        archived.active = false;
        assert!(season_open_for_writes(&archived, warehouse_id, true)
            .unwrap_err()
            .is_conflict());

        let mut finalized = season(warehouse_id);
        finalized.finalized = true;
        assert!(season_open_for_writes(&finalized, warehouse_id, true)
            .unwrap_err()
            .is_conflict());
    }

    #[test]
    fn test_foreign_season_rejected() {
        let season = season(Uuid::new_v4());
        let err = season_open_for_writes(&season, Uuid::new_v4(), true).unwrap_err();
        assert!(err.is_validation());
    }

    /// A racing insert that slips to the storage backstop still surfaces as
    /// the same conflict the row-lock path reports.
    #[test]
    fn test_duplicate_open_week_index_maps_to_conflict() {
        let err = conflict_for_constraint("weeks_one_open_per_season").unwrap();
        assert!(err.is_conflict());

        let err = conflict_for_constraint("seasons_one_open_per_year").unwrap();
        assert!(err.is_conflict());

        assert!(conflict_for_constraint("operating_weeks_pkey").is_none());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use packhouse_core::services::week::{clamp_close_date, spans_overlap};
    use proptest::prelude::*;

    fn date_strategy() -> impl Strategy<Value = NaiveDate> {
        (0i64..=20000).prop_map(|offset| {
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap() + Duration::days(offset)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A clamped close always lands within [from, from + 6].
        #[test]
        fn prop_clamped_span_at_most_six_days(
            from in date_strategy(),
            extra in 0i64..=60
        ) {
            let requested = from + Duration::days(extra);
            let persisted = clamp_close_date(from, requested);

            prop_assert!(persisted >= from);
            prop_assert!((persisted - from).num_days() <= 6);
        }

        /// Clamping never produces a later date than requested.
        #[test]
        fn prop_clamp_never_extends(
            from in date_strategy(),
            extra in 0i64..=60
        ) {
            let requested = from + Duration::days(extra);
            prop_assert!(clamp_close_date(from, requested) <= requested);
        }

        /// Overlap is symmetric in its two intervals.
        #[test]
        fn prop_overlap_symmetric(
            a_from in date_strategy(),
            a_len in 0i64..=30,
            b_from in date_strategy(),
            b_len in 0i64..=30
        ) {
            let a_to = a_from + Duration::days(a_len);
            let b_to = b_from + Duration::days(b_len);

            prop_assert_eq!(
                spans_overlap(a_from, a_to, b_from, b_to),
                spans_overlap(b_from, b_to, a_from, a_to)
            );
        }

        /// Every interval overlaps itself.
        #[test]
        fn prop_overlap_reflexive(from in date_strategy(), len in 0i64..=30) {
            let to = from + Duration::days(len);
            prop_assert!(spans_overlap(from, to, from, to));
        }
    }
}
