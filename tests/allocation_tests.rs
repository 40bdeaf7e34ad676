//! Allocation engine tests
//!
//! Covers the greedy FEFO plan: candidates visited in order, exact
//! satisfaction, deterministic output, and rollback-signalling shortfall.

use packhouse_core::services::allocation::{plan_allocation, Candidate, Take};
use uuid::Uuid;

fn candidate(available: i64) -> Candidate {
    Candidate {
        line_id: Uuid::new_v4(),
        available,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_single_line_satisfies_demand() {
        let candidates = [candidate(100)];
        let takes = plan_allocation(&candidates, 60).unwrap();

        assert_eq!(takes.len(), 1);
        assert_eq!(takes[0].line_id, candidates[0].line_id);
        assert_eq!(takes[0].quantity, 60);
    }

    #[test]
    fn test_demand_spans_lines_in_order() {
        let candidates = [candidate(30), candidate(30), candidate(30)];
        let takes = plan_allocation(&candidates, 70).unwrap();

        assert_eq!(takes.len(), 3);
        assert_eq!(takes[0].quantity, 30);
        assert_eq!(takes[1].quantity, 30);
        assert_eq!(takes[2].quantity, 10);
        // Takes follow the candidate visit order.
        for (take, cand) in takes.iter().zip(candidates.iter()) {
            assert_eq!(take.line_id, cand.line_id);
        }
    }

    #[test]
    fn test_exhausted_lines_skipped() {
        let candidates = [candidate(0), candidate(50)];
        let takes = plan_allocation(&candidates, 40).unwrap();

        assert_eq!(takes.len(), 1);
        assert_eq!(takes[0].line_id, candidates[1].line_id);
    }

    #[test]
    fn test_insufficient_stock_reports_shortfall() {
        let candidates = [candidate(30), candidate(20)];
        let shortfall = plan_allocation(&candidates, 70).unwrap_err();

        assert_eq!(shortfall, 20);
    }

    #[test]
    fn test_no_candidates_full_shortfall() {
        let shortfall = plan_allocation(&[], 25).unwrap_err();
        assert_eq!(shortfall, 25);
    }

    #[test]
    fn test_zero_demand_takes_nothing() {
        let candidates = [candidate(100)];
        let takes = plan_allocation(&candidates, 0).unwrap();
        assert!(takes.is_empty());
    }

    /// Two runs over the same initial state produce the same take sequence.
    #[test]
    fn test_plan_is_deterministic() {
        let candidates = [candidate(40), candidate(25), candidate(90)];

        let first: Vec<Take> = plan_allocation(&candidates, 120).unwrap();
        let second: Vec<Take> = plan_allocation(&candidates, 120).unwrap();

        assert_eq!(first, second);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn candidates_strategy() -> impl Strategy<Value = Vec<Candidate>> {
        prop::collection::vec(0i64..=500, 0..20)
            .prop_map(|avails| avails.into_iter().map(candidate).collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A successful plan takes exactly the demanded quantity.
        #[test]
        fn prop_successful_plan_sums_to_demand(
            candidates in candidates_strategy(),
            demand in 1i64..=2000
        ) {
            if let Ok(takes) = plan_allocation(&candidates, demand) {
                let total: i64 = takes.iter().map(|t| t.quantity).sum();
                prop_assert_eq!(total, demand);
            }
        }

        /// No take exceeds its candidate's availability.
        #[test]
        fn prop_takes_within_availability(
            candidates in candidates_strategy(),
            demand in 1i64..=2000
        ) {
            if let Ok(takes) = plan_allocation(&candidates, demand) {
                for take in &takes {
                    let cand = candidates
                        .iter()
                        .find(|c| c.line_id == take.line_id)
                        .unwrap();
                    prop_assert!(take.quantity <= cand.available);
                    prop_assert!(take.quantity > 0);
                }
            }
        }

        /// Success exactly when total availability covers the demand.
        #[test]
        fn prop_success_iff_stock_suffices(
            candidates in candidates_strategy(),
            demand in 1i64..=2000
        ) {
            let stock: i64 = candidates.iter().map(|c| c.available).sum();
            let result = plan_allocation(&candidates, demand);

            if stock >= demand {
                prop_assert!(result.is_ok());
            } else {
                prop_assert_eq!(result.unwrap_err(), demand - stock);
            }
        }

        /// Planning twice over the same candidates is identical.
        #[test]
        fn prop_plan_deterministic(
            candidates in candidates_strategy(),
            demand in 1i64..=2000
        ) {
            prop_assert_eq!(
                plan_allocation(&candidates, demand),
                plan_allocation(&candidates, demand)
            );
        }

        /// Earlier candidates are drained before later ones contribute.
        #[test]
        fn prop_fefo_front_drained_first(
            candidates in candidates_strategy(),
            demand in 1i64..=2000
        ) {
            if let Ok(takes) = plan_allocation(&candidates, demand) {
                // Every take except the last must drain its candidate fully.
                for take in takes.iter().rev().skip(1) {
                    let cand = candidates
                        .iter()
                        .find(|c| c.line_id == take.line_id)
                        .unwrap();
                    prop_assert_eq!(take.quantity, cand.available);
                }
            }
        }
    }
}
