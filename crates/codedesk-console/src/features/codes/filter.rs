//! Active status filter and the columns each filter exposes.
//!
//! # Design
//! - The controller is the only place the filter changes, and every change clears the selection.
//! - Filter availability depends on the coupon's usage policy.

use codedesk_api_models::{FilterToggle, UsagePolicy};
use serde::Serialize;
use thiserror::Error;

use super::selection::SelectionTracker;

/// Rejected filter transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    /// The filter is not offered for this coupon's usage policy.
    #[error("filter {filter} is not available for this coupon")]
    Unavailable {
        /// Requested filter.
        filter: FilterToggle,
        /// Coupon usage policy.
        policy: UsagePolicy,
    },
}

/// Result of a filter transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterChange {
    /// The requested filter was already active.
    Unchanged,
    /// The filter switched and the selection was cleared.
    Changed {
        /// Filter that was active before.
        previous: FilterToggle,
        /// Filter now active.
        current: FilterToggle,
    },
}

/// Owner of the active [`FilterToggle`].
#[derive(Clone, Debug)]
pub struct FilterController {
    active: FilterToggle,
    usage_policy: UsagePolicy,
}

impl FilterController {
    /// Start on `initial`, falling back to `unassigned` when it is not available.
    #[must_use]
    pub fn new(initial: FilterToggle, usage_policy: UsagePolicy) -> Self {
        let active = if is_available(initial, usage_policy) {
            initial
        } else {
            FilterToggle::Unassigned
        };
        Self {
            active,
            usage_policy,
        }
    }

    /// Filter currently applied.
    #[must_use]
    pub const fn active(&self) -> FilterToggle {
        self.active
    }

    /// Usage policy availability is computed against.
    #[must_use]
    pub const fn usage_policy(&self) -> UsagePolicy {
        self.usage_policy
    }

    /// Filters offered for the current usage policy, in declaration order.
    #[must_use]
    pub fn available_filters(&self) -> Vec<FilterToggle> {
        FilterToggle::ALL
            .into_iter()
            .filter(|filter| is_available(*filter, self.usage_policy))
            .collect()
    }

    /// Switch to `next`, clearing `selection` when the filter actually changes.
    ///
    /// # Errors
    /// Returns [`FilterError::Unavailable`] when `next` is not offered for the usage policy;
    /// the filter and selection are left untouched.
    pub fn change(
        &mut self,
        next: FilterToggle,
        selection: &mut SelectionTracker,
    ) -> Result<FilterChange, FilterError> {
        if !is_available(next, self.usage_policy) {
            return Err(FilterError::Unavailable {
                filter: next,
                policy: self.usage_policy,
            });
        }
        if next == self.active {
            return Ok(FilterChange::Unchanged);
        }
        let previous = self.active;
        self.active = next;
        selection.clear();
        tracing::debug!(%previous, current = %next, "code filter changed");
        Ok(FilterChange::Changed {
            previous,
            current: next,
        })
    }

    /// Apply a (possibly refreshed) usage policy. Falls back to `unassigned` if the
    /// active filter is no longer offered.
    pub fn set_usage_policy(
        &mut self,
        policy: UsagePolicy,
        selection: &mut SelectionTracker,
    ) -> FilterChange {
        self.usage_policy = policy;
        if is_available(self.active, policy) {
            return FilterChange::Unchanged;
        }
        let previous = self.active;
        self.active = FilterToggle::Unassigned;
        selection.clear();
        FilterChange::Changed {
            previous,
            current: self.active,
        }
    }
}

/// Whether `filter` is offered under `policy`.
#[must_use]
pub const fn is_available(filter: FilterToggle, policy: UsagePolicy) -> bool {
    !matches!(
        (filter, policy),
        (
            FilterToggle::PartiallyRedeemed,
            UsagePolicy::SingleUse | UsagePolicy::OncePerCustomer
        )
    )
}

/// Table columns a filter exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    /// Code string.
    Code,
    /// `used / total` redemptions.
    Redemptions,
    /// Assignable capacity left.
    AssignmentsRemaining,
    /// Assignee email.
    AssignedTo,
    /// Learner who redeemed the code.
    RedeemedBy,
    /// Derived status label.
    Status,
    /// Row actions.
    Actions,
}

impl Column {
    /// Header label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Code => "CODE",
            Self::Redemptions => "REDEMPTIONS",
            Self::AssignmentsRemaining => "REMAINING",
            Self::AssignedTo => "ASSIGNED TO",
            Self::RedeemedBy => "REDEEMED BY",
            Self::Status => "STATUS",
            Self::Actions => "ACTIONS",
        }
    }
}

/// Columns shown for `filter`.
#[must_use]
pub const fn columns_for(filter: FilterToggle) -> &'static [Column] {
    match filter {
        FilterToggle::Unassigned => &[
            Column::Code,
            Column::Redemptions,
            Column::AssignmentsRemaining,
            Column::Actions,
        ],
        FilterToggle::Unredeemed => &[Column::Code, Column::AssignedTo, Column::Actions],
        FilterToggle::PartiallyRedeemed => &[
            Column::Code,
            Column::Redemptions,
            Column::AssignedTo,
            Column::Actions,
        ],
        FilterToggle::Redeemed => &[Column::Code, Column::RedeemedBy, Column::Status],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CodeId;

    #[test]
    fn change_clears_selection() {
        let mut controller = FilterController::new(FilterToggle::Unassigned, UsagePolicy::MultiUse);
        let mut selection = SelectionTracker::new();
        selection.select_all_matching_filter([CodeId::from("A")]);

        let change = controller
            .change(FilterToggle::Unredeemed, &mut selection)
            .unwrap();
        assert_eq!(
            change,
            FilterChange::Changed {
                previous: FilterToggle::Unassigned,
                current: FilterToggle::Unredeemed,
            }
        );
        assert!(selection.state().is_empty());
        assert!(!selection.state().all_matching_filter_selected);
    }

    #[test]
    fn same_filter_is_a_no_op() {
        let mut controller = FilterController::new(FilterToggle::Unredeemed, UsagePolicy::MultiUse);
        let mut selection = SelectionTracker::new();
        selection.toggle_record(&CodeId::from("A"));
        let change = controller
            .change(FilterToggle::Unredeemed, &mut selection)
            .unwrap();
        assert_eq!(change, FilterChange::Unchanged);
        assert_eq!(selection.count(0), 1);
    }

    #[test]
    fn single_use_hides_partially_redeemed() {
        let mut controller = FilterController::new(FilterToggle::Unassigned, UsagePolicy::SingleUse);
        assert_eq!(
            controller.available_filters(),
            vec![
                FilterToggle::Unassigned,
                FilterToggle::Unredeemed,
                FilterToggle::Redeemed
            ]
        );
        let mut selection = SelectionTracker::new();
        selection.toggle_record(&CodeId::from("A"));
        let err = controller
            .change(FilterToggle::PartiallyRedeemed, &mut selection)
            .unwrap_err();
        assert!(matches!(err, FilterError::Unavailable { .. }));
        assert_eq!(controller.active(), FilterToggle::Unassigned);
        assert_eq!(selection.count(0), 1);
    }

    #[test]
    fn policy_refresh_falls_back_to_unassigned() {
        let mut controller =
            FilterController::new(FilterToggle::PartiallyRedeemed, UsagePolicy::MultiUse);
        let mut selection = SelectionTracker::new();
        selection.toggle_record(&CodeId::from("A"));
        let change = controller.set_usage_policy(UsagePolicy::OncePerCustomer, &mut selection);
        assert!(matches!(change, FilterChange::Changed { .. }));
        assert_eq!(controller.active(), FilterToggle::Unassigned);
        assert!(selection.state().is_empty());
    }

    #[test]
    fn redeemed_columns_have_no_actions() {
        assert!(!columns_for(FilterToggle::Redeemed).contains(&Column::Actions));
        assert!(columns_for(FilterToggle::Unassigned).contains(&Column::AssignmentsRemaining));
    }
}
