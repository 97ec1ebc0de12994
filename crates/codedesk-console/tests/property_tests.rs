//! Property tests for selection, filter, and eligibility invariants.

use std::collections::{BTreeMap, BTreeSet};

use codedesk_api_models::{FilterToggle, Redemptions, UsagePolicy};
use codedesk_console::{
    CodeId, EligibilityContext, FilterController, Record, RowActions, SelectionTracker, resolve,
    resolve_row,
};
use proptest::prelude::*;

fn filter_strategy() -> impl Strategy<Value = FilterToggle> {
    prop::sample::select(FilterToggle::ALL.to_vec())
}

fn context_strategy() -> impl Strategy<Value = EligibilityContext> {
    (
        filter_strategy(),
        0_u64..500,
        any::<bool>(),
        any::<bool>(),
        0_u64..50,
        any::<bool>(),
    )
        .prop_map(
            |(
                filter,
                selection_count,
                has_table_data,
                resource_available,
                unassigned_count,
                has_public_records_in_selection,
            )| EligibilityContext {
                filter,
                selection_count,
                has_table_data,
                resource_available,
                unassigned_count,
                has_public_records_in_selection,
            },
        )
}

proptest! {
    #[test]
    fn toggled_ids_match_odd_toggle_counts(toggles in prop::collection::vec(0_u8..12, 0..64)) {
        let mut tracker = SelectionTracker::new();
        let mut counts: BTreeMap<u8, usize> = BTreeMap::new();
        for value in &toggles {
            tracker.toggle_record(&CodeId::new(format!("code-{value}")));
            *counts.entry(*value).or_default() += 1;
        }
        let expected: BTreeSet<CodeId> = counts
            .into_iter()
            .filter(|(_, count)| count % 2 == 1)
            .map(|(value, _)| CodeId::new(format!("code-{value}")))
            .collect();
        prop_assert_eq!(&tracker.state().selected_ids, &expected);
        prop_assert!(!tracker.state().all_matching_filter_selected);
    }

    #[test]
    fn filter_change_always_empties_selection(
        start in filter_strategy(),
        next in filter_strategy(),
        ids in prop::collection::vec("[A-Z]{4}", 0..10),
        all_matching in any::<bool>(),
    ) {
        prop_assume!(start != next);
        let mut controller = FilterController::new(start, UsagePolicy::MultiUse);
        let mut tracker = SelectionTracker::new();
        let ids = ids.into_iter().map(CodeId::from);
        if all_matching {
            tracker.select_all_matching_filter(ids);
        } else {
            tracker.select_all_on_page(ids);
        }
        controller.change(next, &mut tracker).unwrap();
        prop_assert!(tracker.state().selected_ids.is_empty());
        prop_assert!(!tracker.state().all_matching_filter_selected);
    }

    #[test]
    fn resolve_is_deterministic(ctx in context_strategy()) {
        let first = resolve(&ctx);
        let second = resolve(&ctx);
        prop_assert_eq!(&first, &second);
        if let Some(enabled) = first.options.iter().find(|option| !option.disabled) {
            prop_assert_eq!(first.default, enabled.kind);
        }
    }

    #[test]
    fn exhausted_records_never_offer_row_actions(
        total in 0_u32..20,
        extra in 0_u32..5,
        assigned in any::<bool>(),
        filter in filter_strategy(),
    ) {
        let record = Record {
            id: CodeId::from("EXHAUSTED"),
            redemptions: Redemptions { used: total + extra, total, num_assignments: 0 },
            assigned_to: assigned.then(|| "learner@example.com".to_string()),
            is_public: false,
            error_reason: None,
            redeemed_by: None,
        };
        prop_assert_eq!(resolve_row(&record, filter, true), RowActions::None);
    }
}
