//! Id-based selection tracking for bulk code actions.
//!
//! # Design
//! - Selection survives page changes because it is keyed by code id.
//! - "All matching filter" is a sentinel; the id list it carries is advisory only.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::models::CodeId;

/// Selection set used for bulk code actions.
pub type SelectionSet = BTreeSet<CodeId>;

/// Current selection as seen by subscribers.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct SelectionState {
    /// Explicitly selected ids (advisory when `all_matching_filter_selected`).
    pub selected_ids: SelectionSet,
    /// Every record matching the active filter is selected.
    pub all_matching_filter_selected: bool,
}

impl SelectionState {
    /// True when nothing is selected and the sentinel is off.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.all_matching_filter_selected && self.selected_ids.is_empty()
    }
}

/// Authoritative description of what a selection targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SelectionScope {
    /// Exactly these ids.
    Ids(Vec<CodeId>),
    /// Whatever the server returns for the active filter.
    AllMatching,
}

/// Owner of the [`SelectionState`]; all mutation goes through its methods.
#[derive(Clone, Debug, Default)]
pub struct SelectionTracker {
    state: SelectionState,
}

impl SelectionTracker {
    /// Start with an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow the current state.
    #[must_use]
    pub const fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Add or remove one id. Leaves "all matching" mode. Returns whether the id is now selected.
    pub fn toggle_record(&mut self, id: &CodeId) -> bool {
        self.state.all_matching_filter_selected = false;
        if self.state.selected_ids.remove(id) {
            false
        } else {
            self.state.selected_ids.insert(id.clone());
            true
        }
    }

    /// Replace the selection with exactly the visible page ids.
    pub fn select_all_on_page<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = CodeId>,
    {
        self.state.selected_ids = ids.into_iter().collect();
        self.state.all_matching_filter_selected = false;
    }

    /// Enter "all matching filter" mode, keeping `advisory_ids` only for display.
    pub fn select_all_matching_filter<I>(&mut self, advisory_ids: I)
    where
        I: IntoIterator<Item = CodeId>,
    {
        self.state.selected_ids = advisory_ids.into_iter().collect();
        self.state.all_matching_filter_selected = true;
    }

    /// Reset to an empty explicit selection.
    pub fn clear(&mut self) {
        self.state.selected_ids.clear();
        self.state.all_matching_filter_selected = false;
    }

    /// Number of selected records given the filter's total.
    #[must_use]
    pub fn count(&self, total_records_for_filter: u64) -> u64 {
        if self.state.all_matching_filter_selected {
            total_records_for_filter
        } else {
            self.state.selected_ids.len() as u64
        }
    }

    /// Whether `id` is part of the explicit (or advisory) selection.
    #[must_use]
    pub fn is_selected(&self, id: &CodeId) -> bool {
        self.state.all_matching_filter_selected || self.state.selected_ids.contains(id)
    }

    /// Snapshot what an action would target right now.
    #[must_use]
    pub fn scope(&self) -> SelectionScope {
        if self.state.all_matching_filter_selected {
            SelectionScope::AllMatching
        } else {
            SelectionScope::Ids(self.state.selected_ids.iter().cloned().collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<CodeId> {
        values.iter().copied().map(CodeId::from).collect()
    }

    #[test]
    fn toggle_adds_then_removes() {
        let mut tracker = SelectionTracker::new();
        let id = CodeId::from("A");
        assert!(tracker.toggle_record(&id));
        assert!(tracker.is_selected(&id));
        assert!(!tracker.toggle_record(&id));
        assert!(tracker.state().is_empty());
    }

    #[test]
    fn toggle_leaves_all_matching_mode() {
        let mut tracker = SelectionTracker::new();
        tracker.select_all_matching_filter(ids(&["A", "B"]));
        tracker.toggle_record(&CodeId::from("B"));
        assert!(!tracker.state().all_matching_filter_selected);
        assert_eq!(tracker.scope(), SelectionScope::Ids(ids(&["A"])));
    }

    #[test]
    fn select_all_on_page_replaces_previous_ids() {
        let mut tracker = SelectionTracker::new();
        tracker.toggle_record(&CodeId::from("Z"));
        tracker.select_all_on_page(ids(&["A", "B", "C"]));
        assert_eq!(tracker.count(100), 3);
        assert!(!tracker.is_selected(&CodeId::from("Z")));
    }

    #[test]
    fn all_matching_counts_filter_total() {
        let mut tracker = SelectionTracker::new();
        tracker.select_all_matching_filter(ids(&["A", "B"]));
        assert_eq!(tracker.count(250), 250);
        assert_eq!(tracker.scope(), SelectionScope::AllMatching);
        assert_eq!(tracker.state().selected_ids.len(), 2);
    }

    #[test]
    fn clear_drops_sentinel() {
        let mut tracker = SelectionTracker::new();
        tracker.select_all_matching_filter(ids(&["A"]));
        tracker.clear();
        assert_eq!(tracker.state(), &SelectionState::default());
        assert_eq!(tracker.count(250), 0);
    }
}
