//! Code actions: targets, payload validation, and settled outcomes.

use codedesk_api_models::{
    ActionKind, ActionRequest, ActionResponse, ActionTarget, EmailTemplate, FilterToggle,
    ItemDetail,
};
use serde::Serialize;
use thiserror::Error;

use super::selection::SelectionScope;
use crate::models::{CodeId, Record};

/// User-supplied action input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionPayload {
    /// Learner emails (assign only).
    pub emails: Vec<String>,
    /// Optional email copy.
    pub template: Option<EmailTemplate>,
}

impl ActionPayload {
    /// Payload carrying only emails.
    #[must_use]
    pub fn with_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            emails: emails.into_iter().map(Into::into).collect(),
            template: None,
        }
    }
}

/// Snapshot of what an execution applies to, captured when `execute` is called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionTarget {
    /// One record from a row action.
    Single {
        /// Record as displayed when the action was triggered.
        record: Record,
        /// Action input.
        payload: ActionPayload,
    },
    /// The bulk selection.
    Bulk {
        /// Explicit ids or the "all matching filter" sentinel.
        scope: SelectionScope,
        /// Filter the selection was made under.
        filter: FilterToggle,
        /// Action input.
        payload: ActionPayload,
    },
}

impl ExecutionTarget {
    /// Number of explicitly targeted codes; `None` for filter-scoped targets.
    #[must_use]
    pub fn explicit_len(&self) -> Option<u64> {
        match self {
            Self::Single { .. } => Some(1),
            Self::Bulk {
                scope: SelectionScope::Ids(ids),
                ..
            } => Some(ids.len() as u64),
            Self::Bulk {
                scope: SelectionScope::AllMatching,
                ..
            } => None,
        }
    }

    /// Borrow the payload.
    #[must_use]
    pub const fn payload(&self) -> &ActionPayload {
        match self {
            Self::Single { payload, .. } | Self::Bulk { payload, .. } => payload,
        }
    }

    /// Wire request for `kind`. "All matching" becomes a filter descriptor, never an id list.
    #[must_use]
    pub fn to_request(&self, kind: ActionKind) -> ActionRequest {
        let target = match self {
            Self::Single { record, .. } => ActionTarget::Codes {
                codes: vec![record.id.as_str().to_string()],
            },
            Self::Bulk {
                scope: SelectionScope::Ids(ids),
                ..
            } => ActionTarget::Codes {
                codes: ids.iter().map(|id| id.as_str().to_string()).collect(),
            },
            Self::Bulk {
                scope: SelectionScope::AllMatching,
                filter,
                ..
            } => ActionTarget::Filter { filter: *filter },
        };
        let payload = self.payload();
        ActionRequest {
            action: kind,
            target,
            emails: if kind == ActionKind::Assign {
                payload.emails.clone()
            } else {
                Vec::new()
            },
            template: payload.template.clone(),
        }
    }
}

/// Payload problems caught before any network call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    /// Assign needs at least one email.
    #[error("at least one email is required to assign codes")]
    MissingEmails,
    /// An email is malformed.
    #[error("invalid email address '{email}'")]
    InvalidEmail {
        /// Offending value.
        email: String,
    },
    /// More emails than assignable capacity.
    #[error("{requested} emails exceed the {available} assignable uses")]
    InsufficientCapacity {
        /// Emails supplied.
        requested: u64,
        /// Capacity available.
        available: u64,
    },
}

/// Validate `payload` for `kind`. `capacity` is the assignable capacity when known.
///
/// # Errors
/// Returns a [`PayloadError`] describing the first problem found.
pub fn validate_payload(
    kind: ActionKind,
    payload: &ActionPayload,
    capacity: Option<u64>,
) -> Result<(), PayloadError> {
    if kind != ActionKind::Assign {
        return Ok(());
    }
    if payload.emails.is_empty() {
        return Err(PayloadError::MissingEmails);
    }
    if let Some(email) = payload.emails.iter().find(|email| !looks_like_email(email)) {
        return Err(PayloadError::InvalidEmail {
            email: email.clone(),
        });
    }
    let requested = payload.emails.len() as u64;
    match capacity {
        Some(available) if requested > available => Err(PayloadError::InsufficientCapacity {
            requested,
            available,
        }),
        _ => Ok(()),
    }
}

fn looks_like_email(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'))
}

/// One failed item (or a transport failure) surfaced with an outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    /// Code the failure refers to.
    pub code: Option<CodeId>,
    /// Email the failure refers to.
    pub email: Option<String>,
    /// Reason reported.
    pub message: String,
}

/// Settled result of one execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    /// Action that ran.
    pub kind: ActionKind,
    /// Items that committed.
    pub succeeded_count: u64,
    /// Items that failed.
    pub failed_count: u64,
    /// Failure details.
    pub errors: Vec<ErrorDetail>,
    /// The action had errors (transport or per-item).
    pub failed: bool,
}

impl ActionOutcome {
    /// Account a server response. `expected` is the explicit target size, if any.
    #[must_use]
    pub fn from_response(kind: ActionKind, response: ActionResponse, expected: Option<u64>) -> Self {
        match response {
            ActionResponse::Items(items) => {
                let mut succeeded_count = 0;
                let mut errors = Vec::new();
                for item in items {
                    match item.detail {
                        ItemDetail::Success => succeeded_count += 1,
                        ItemDetail::Failure => errors.push(ErrorDetail {
                            code: item.code.map(CodeId::new),
                            email: item.email,
                            message: item
                                .message
                                .unwrap_or_else(|| "action failed".to_string()),
                        }),
                        ItemDetail::Unknown => {}
                    }
                }
                let failed_count = errors.len() as u64;
                Self {
                    kind,
                    succeeded_count,
                    failed_count,
                    errors,
                    failed: failed_count > 0,
                }
            }
            ActionResponse::Summary(summary) => {
                let flagged = summary.detail == Some(ItemDetail::Failure);
                let failed_count = summary.num_failed.unwrap_or(if flagged {
                    expected.unwrap_or(0)
                } else {
                    0
                });
                let succeeded_count = summary.num_successful.unwrap_or_else(|| {
                    if flagged {
                        0
                    } else {
                        expected.unwrap_or(0).saturating_sub(failed_count)
                    }
                });
                Self {
                    kind,
                    succeeded_count,
                    failed_count,
                    errors: Vec::new(),
                    failed: flagged || failed_count > 0,
                }
            }
        }
    }

    /// Outcome for a call that never produced a response.
    #[must_use]
    pub fn transport_failure(kind: ActionKind, expected: Option<u64>, message: String) -> Self {
        Self {
            kind,
            succeeded_count: 0,
            failed_count: expected.unwrap_or(0),
            errors: vec![ErrorDetail {
                code: None,
                email: None,
                message,
            }],
            failed: true,
        }
    }
}

/// Format a status line for a settled outcome.
#[must_use]
pub fn outcome_message(outcome: &ActionOutcome) -> String {
    let total = outcome.succeeded_count + outcome.failed_count;
    let noun = |count: u64| if count == 1 { "code" } else { "codes" };
    if outcome.failed && outcome.succeeded_count == 0 {
        let reason = outcome
            .errors
            .first()
            .map_or("unknown error", |error| error.message.as_str());
        return format!("Could not {} codes: {reason}", verb(outcome.kind));
    }
    let done = match outcome.kind {
        ActionKind::Assign => "Assigned",
        ActionKind::Remind => "Reminder sent for",
        ActionKind::Revoke => "Revoked",
        ActionKind::MakePublic => "Made public",
        ActionKind::MakePrivate => "Made private",
    };
    if outcome.failed {
        format!(
            "{done} {} of {total} {} ({} failed)",
            outcome.succeeded_count,
            noun(total),
            outcome.failed_count
        )
    } else {
        format!(
            "{done} {} {}",
            outcome.succeeded_count,
            noun(outcome.succeeded_count)
        )
    }
}

const fn verb(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Assign => "assign",
        ActionKind::Remind => "remind",
        ActionKind::Revoke => "revoke",
        ActionKind::MakePublic => "publish",
        ActionKind::MakePrivate => "unpublish",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codedesk_api_models::{ActionSummary, ItemResult};

    fn item(code: &str, detail: ItemDetail) -> ItemResult {
        ItemResult {
            code: Some(code.into()),
            email: None,
            detail,
            message: None,
        }
    }

    #[test]
    fn one_failed_item_marks_outcome_failed() {
        let response = ActionResponse::Items(vec![
            item("A", ItemDetail::Success),
            item("B", ItemDetail::Failure),
            item("C", ItemDetail::Success),
        ]);
        let outcome = ActionOutcome::from_response(ActionKind::Remind, response, Some(3));
        assert_eq!(outcome.succeeded_count, 2);
        assert_eq!(outcome.failed_count, 1);
        assert!(outcome.failed);
        assert_eq!(outcome.errors[0].code, Some(CodeId::from("B")));
        assert_eq!(
            outcome_message(&outcome),
            "Reminder sent for 2 of 3 codes (1 failed)"
        );
    }

    #[test]
    fn summary_without_counts_uses_expected_size() {
        let outcome = ActionOutcome::from_response(
            ActionKind::Revoke,
            ActionResponse::Summary(ActionSummary::default()),
            Some(4),
        );
        assert_eq!(outcome.succeeded_count, 4);
        assert!(!outcome.failed);
        assert_eq!(outcome_message(&outcome), "Revoked 4 codes");

        let flagged = ActionOutcome::from_response(
            ActionKind::Revoke,
            ActionResponse::Summary(ActionSummary {
                detail: Some(ItemDetail::Failure),
                ..ActionSummary::default()
            }),
            Some(1),
        );
        assert!(flagged.failed);
        assert_eq!(flagged.failed_count, 1);
        assert_eq!(flagged.succeeded_count, 0);
    }

    #[test]
    fn transport_failure_message_names_the_action() {
        let outcome =
            ActionOutcome::transport_failure(ActionKind::Assign, None, "connection reset".into());
        assert_eq!(outcome.failed_count, 0);
        assert_eq!(
            outcome_message(&outcome),
            "Could not assign codes: connection reset"
        );
    }

    #[test]
    fn assign_payload_requires_valid_emails_within_capacity() {
        assert_eq!(
            validate_payload(ActionKind::Assign, &ActionPayload::default(), None),
            Err(PayloadError::MissingEmails)
        );
        assert!(matches!(
            validate_payload(
                ActionKind::Assign,
                &ActionPayload::with_emails(["not-an-email"]),
                None
            ),
            Err(PayloadError::InvalidEmail { .. })
        ));
        assert_eq!(
            validate_payload(
                ActionKind::Assign,
                &ActionPayload::with_emails(["a@example.com", "b@example.com"]),
                Some(1)
            ),
            Err(PayloadError::InsufficientCapacity {
                requested: 2,
                available: 1
            })
        );
        assert!(validate_payload(ActionKind::Remind, &ActionPayload::default(), Some(0)).is_ok());
    }

    #[test]
    fn all_matching_target_serialises_filter_not_ids() {
        let target = ExecutionTarget::Bulk {
            scope: SelectionScope::AllMatching,
            filter: FilterToggle::Unredeemed,
            payload: ActionPayload::with_emails(["ignored@example.com"]),
        };
        let request = target.to_request(ActionKind::Remind);
        assert_eq!(
            request.target,
            ActionTarget::Filter {
                filter: FilterToggle::Unredeemed
            }
        );
        assert!(request.emails.is_empty());
        assert_eq!(target.explicit_len(), None);
    }
}
