//! Which code actions are legal for the current filter, selection, and row.
//!
//! # Design
//! - Pure functions: identical inputs always yield identical options and default.
//! - Bulk options keep a fixed declaration order so the default is deterministic.

use codedesk_api_models::{ActionKind, FilterToggle};
use serde::Serialize;

use crate::models::Record;

/// Actions offered by the bulk action control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkActionKind {
    /// Assign codes to emails.
    Assign,
    /// Re-send assignment emails.
    Remind,
    /// Withdraw assignments.
    Revoke,
}

impl BulkActionKind {
    /// Declaration order used for the default choice.
    pub const ALL: [Self; 3] = [Self::Assign, Self::Remind, Self::Revoke];

    /// Matching wire action.
    #[must_use]
    pub const fn as_action(self) -> ActionKind {
        match self {
            Self::Assign => ActionKind::Assign,
            Self::Remind => ActionKind::Remind,
            Self::Revoke => ActionKind::Revoke,
        }
    }
}

/// Inputs to [`resolve`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EligibilityContext {
    /// Active filter.
    pub filter: FilterToggle,
    /// Number of selected records.
    pub selection_count: u64,
    /// The table currently shows rows for the filter.
    pub has_table_data: bool,
    /// The parent coupon can be acted upon.
    pub resource_available: bool,
    /// Codes with unassigned capacity in the coupon.
    pub unassigned_count: u64,
    /// At least one selected record is public.
    pub has_public_records_in_selection: bool,
}

/// One entry of the bulk action control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BulkActionOption {
    /// Action offered.
    pub kind: BulkActionKind,
    /// Whether the entry is greyed out.
    pub disabled: bool,
}

/// Resolver output: options in declaration order plus the default choice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedActions {
    /// Options in `[assign, remind, revoke]` order.
    pub options: [BulkActionOption; 3],
    /// First enabled option, or the first declared one when none are enabled.
    pub default: BulkActionKind,
}

impl ResolvedActions {
    /// Whether `kind` is currently enabled.
    #[must_use]
    pub fn is_enabled(&self, kind: BulkActionKind) -> bool {
        self.options
            .iter()
            .any(|option| option.kind == kind && !option.disabled)
    }

    /// Whether the trigger for the default choice should be enabled.
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.options.iter().any(|option| !option.disabled)
    }
}

/// Resolve the bulk action options for `ctx`.
#[must_use]
pub fn resolve(ctx: &EligibilityContext) -> ResolvedActions {
    let shared_blocked = !ctx.has_table_data || !ctx.resource_available;

    let assign_disabled = ctx.has_public_records_in_selection
        || ctx.filter != FilterToggle::Unassigned
        || shared_blocked
        || ctx.unassigned_count == 0;
    let remind_disabled = matches!(ctx.filter, FilterToggle::Unassigned | FilterToggle::Redeemed)
        || shared_blocked;
    let revoke_disabled = remind_disabled || ctx.selection_count == 0;

    let options = [
        BulkActionOption {
            kind: BulkActionKind::Assign,
            disabled: assign_disabled,
        },
        BulkActionOption {
            kind: BulkActionKind::Remind,
            disabled: remind_disabled,
        },
        BulkActionOption {
            kind: BulkActionKind::Revoke,
            disabled: revoke_disabled,
        },
    ];
    let default = options
        .iter()
        .find(|option| !option.disabled)
        .map_or(BulkActionKind::ALL[0], |option| option.kind);

    ResolvedActions { options, default }
}

/// Actions offered on a single row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowActions {
    /// Nothing can be done with this row.
    None,
    /// The code can be assigned.
    Assign {
        /// Assignable capacity left on the code.
        remaining_uses: u32,
    },
    /// The assignment can be reminded or revoked.
    RemindOrRevoke,
    /// The assignment errored; only revoke is offered.
    Revoke,
}

impl RowActions {
    /// Wire actions this row accepts.
    #[must_use]
    pub fn kinds(self) -> Vec<ActionKind> {
        match self {
            Self::None => Vec::new(),
            Self::Assign { .. } => vec![ActionKind::Assign],
            Self::RemindOrRevoke => vec![ActionKind::Remind, ActionKind::Revoke],
            Self::Revoke => vec![ActionKind::Revoke],
        }
    }

    /// Whether `kind` is offered.
    #[must_use]
    pub fn allows(self, kind: ActionKind) -> bool {
        self.kinds().contains(&kind)
    }
}

/// Resolve the per-row actions for `record` under `filter`.
#[must_use]
pub const fn resolve_row(
    record: &Record,
    filter: FilterToggle,
    resource_available: bool,
) -> RowActions {
    if !resource_available || record.is_exhausted() || record.is_public {
        return RowActions::None;
    }
    if record.is_assigned() {
        return if record.error_reason.is_some() {
            RowActions::Revoke
        } else {
            RowActions::RemindOrRevoke
        };
    }
    let mut remaining_uses = record.remaining_uses();
    if matches!(filter, FilterToggle::Unassigned) {
        remaining_uses = remaining_uses.saturating_sub(record.redemptions.num_assignments);
    }
    RowActions::Assign { remaining_uses }
}

/// Visibility toggle offered on a row, if any.
///
/// Assigned or exhausted codes cannot change visibility.
#[must_use]
pub const fn resolve_visibility(record: &Record, resource_available: bool) -> Option<ActionKind> {
    if !resource_available || record.is_assigned() || record.is_exhausted() {
        return None;
    }
    if record.is_public {
        Some(ActionKind::MakePrivate)
    } else {
        Some(ActionKind::MakePublic)
    }
}
