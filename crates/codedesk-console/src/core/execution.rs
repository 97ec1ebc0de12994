//! Single-flight execution of code actions.
//!
//! # Design
//! - At most one execution per coupon is pending; a second call is rejected, not queued.
//! - The target is captured by value when `execute` is called and never re-read.
//! - Transport failures settle as a failed outcome; they are not returned as errors.
//! - Each settlement yields exactly one [`Invalidation`] for the caller to apply.

use std::sync::Arc;

use codedesk_api_models::ActionKind;
use codedesk_telemetry::{ActionResultLabel, Metrics};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::features::codes::actions::{ActionOutcome, ExecutionTarget, PayloadError};
use crate::models::{CodeId, CouponId};
use crate::services::api::CouponApi;

/// Reasons an execution is refused before any network call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecuteError {
    /// Another action is still pending for this coupon.
    #[error("an action is already pending")]
    Busy {
        /// Action currently in flight.
        pending: ActionKind,
    },
    /// The action is not enabled for the current filter and selection.
    #[error("action {kind} is not eligible for the current selection")]
    Ineligible {
        /// Rejected action.
        kind: ActionKind,
    },
    /// The targeted code is not part of any loaded page.
    #[error("code {id} is not loaded")]
    UnknownRecord {
        /// Requested code.
        id: CodeId,
    },
    /// The payload failed validation.
    #[error("invalid action payload")]
    InvalidPayload {
        /// Validation failure.
        #[from]
        source: PayloadError,
    },
}

/// Coordinator lifecycle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExecutionState {
    /// Nothing running and no outcome on display.
    #[default]
    Idle,
    /// Waiting on the server.
    Pending {
        /// Action in flight.
        kind: ActionKind,
    },
    /// Settled without item failures.
    Succeeded(ActionOutcome),
    /// Settled with a transport failure or item failures.
    Failed(ActionOutcome),
}

impl ExecutionState {
    /// Settled outcome on display, if any.
    #[must_use]
    pub const fn outcome(&self) -> Option<&ActionOutcome> {
        match self {
            Self::Succeeded(outcome) | Self::Failed(outcome) => Some(outcome),
            Self::Idle | Self::Pending { .. } => None,
        }
    }

    /// Whether a call is in flight.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Follow-up work owed after a settlement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Invalidation {
    /// Re-fetch the current page.
    pub refresh_page: bool,
    /// Re-fetch the coupon overview counters.
    pub refresh_overview: bool,
    /// Reset the selection.
    pub clear_selection: bool,
    /// Advance the table refresh token.
    pub bump_refresh_token: bool,
}

impl Invalidation {
    /// Work owed after the server accepted `kind`, with or without item failures.
    #[must_use]
    pub const fn after(kind: ActionKind) -> Self {
        Self {
            refresh_page: true,
            refresh_overview: !matches!(kind, ActionKind::Remind),
            clear_selection: true,
            bump_refresh_token: true,
        }
    }

    /// Whether anything needs doing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !(self.refresh_page
            || self.refresh_overview
            || self.clear_selection
            || self.bump_refresh_token)
    }
}

/// Result of one execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Accounting of what happened.
    pub outcome: ActionOutcome,
    /// Follow-up owed by the caller.
    pub invalidation: Invalidation,
}

/// Runs actions against one coupon, one at a time.
pub struct ActionExecutionCoordinator<A: CouponApi + ?Sized> {
    api: Arc<A>,
    coupon: CouponId,
    state: watch::Sender<ExecutionState>,
    metrics: Option<Metrics>,
}

impl<A: CouponApi + ?Sized> ActionExecutionCoordinator<A> {
    /// Coordinator for `coupon`.
    #[must_use]
    pub fn new(api: Arc<A>, coupon: CouponId) -> Self {
        let (state, _) = watch::channel(ExecutionState::Idle);
        Self {
            api,
            coupon,
            state,
            metrics: None,
        }
    }

    /// Count settled actions in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ExecutionState {
        self.state.borrow().clone()
    }

    /// Subscribe to lifecycle changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
        self.state.subscribe()
    }

    /// Run `kind` against `target`.
    ///
    /// # Errors
    /// Returns [`ExecuteError::Busy`] while another execution is pending. Remote
    /// failures are reported through the returned outcome instead.
    pub async fn execute(
        &self,
        kind: ActionKind,
        target: ExecutionTarget,
    ) -> Result<Settlement, ExecuteError> {
        let mut busy = None;
        self.state.send_if_modified(|state| {
            if let ExecutionState::Pending { kind: pending } = state {
                busy = Some(*pending);
                false
            } else {
                *state = ExecutionState::Pending { kind };
                true
            }
        });
        if let Some(pending) = busy {
            warn!(requested = %kind, %pending, "action rejected while another is pending");
            return Err(ExecuteError::Busy { pending });
        }

        let mut guard = PendingGuard {
            state: &self.state,
            metrics: self.metrics.as_ref(),
            kind,
            armed: true,
        };
        if let Some(metrics) = &self.metrics {
            metrics.action_started();
        }

        let expected = target.explicit_len();
        let request = target.to_request(kind);
        let result = self.api.execute_action(&self.coupon, &request).await;
        guard.armed = false;

        let (outcome, invalidation, label) = match result {
            Ok(response) => {
                let outcome = ActionOutcome::from_response(kind, response, expected);
                let label = if outcome.failed {
                    ActionResultLabel::Partial
                } else {
                    ActionResultLabel::Succeeded
                };
                (outcome, Invalidation::after(kind), label)
            }
            Err(err) => {
                warn!(coupon = %self.coupon, %kind, error = %err, "action call failed");
                let outcome = ActionOutcome::transport_failure(kind, expected, format!("{err:#}"));
                (outcome, Invalidation::default(), ActionResultLabel::Failed)
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.action_settled(kind.as_str(), label);
        }
        info!(
            coupon = %self.coupon,
            %kind,
            succeeded = outcome.succeeded_count,
            failed = outcome.failed_count,
            "action settled"
        );

        let settled = if outcome.failed {
            ExecutionState::Failed(outcome.clone())
        } else {
            ExecutionState::Succeeded(outcome.clone())
        };
        self.state.send_replace(settled);
        Ok(Settlement {
            outcome,
            invalidation,
        })
    }

    /// Return a settled coordinator to idle. Pending executions are unaffected.
    pub fn dismiss(&self) {
        self.state.send_if_modified(|state| {
            if matches!(
                state,
                ExecutionState::Succeeded(_) | ExecutionState::Failed(_)
            ) {
                *state = ExecutionState::Idle;
                true
            } else {
                false
            }
        });
    }
}

/// Resets a pending state if the execute future is dropped mid-call.
struct PendingGuard<'a> {
    state: &'a watch::Sender<ExecutionState>,
    metrics: Option<&'a Metrics>,
    kind: ActionKind,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(metrics) = self.metrics {
            metrics.action_settled(self.kind.as_str(), ActionResultLabel::Failed);
        }
        self.state.send_replace(ExecutionState::Idle);
    }
}
