#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Selection and bulk-action engine for a coupon's paginated codes.
//!
//! Layout: `models.rs` (records and pages), `features/codes/` (selection,
//! filter, eligibility, action payloads and outcomes), `services/` (remote API
//! trait and the debounced data source), `core/` (action coordinator and the
//! [`CodesConsole`] session), `config.rs` (tuning and env overrides).
//!
//! # Design
//! - Selection is keyed by code id; pages are replaced wholesale on refetch.
//! - Page requests carry monotonic tokens and only the latest result is applied.
//! - Actions run one at a time against a target captured at call time.

pub mod config;
pub mod core;
pub mod features;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use crate::config::{ConfigError, ConsoleConfig};
pub use crate::core::execution::{
    ActionExecutionCoordinator, ExecuteError, ExecutionState, Invalidation, Settlement,
};
pub use crate::core::store::{CodesConsole, ConsoleSnapshot};
pub use crate::features::codes::actions::{
    ActionOutcome, ActionPayload, ErrorDetail, ExecutionTarget, PayloadError, outcome_message,
    validate_payload,
};
pub use crate::features::codes::eligibility::{
    BulkActionKind, BulkActionOption, EligibilityContext, ResolvedActions, RowActions, resolve,
    resolve_row, resolve_visibility,
};
pub use crate::features::codes::filter::{
    Column, FilterChange, FilterController, FilterError, columns_for, is_available,
};
pub use crate::features::codes::selection::{
    SelectionScope, SelectionSet, SelectionState, SelectionTracker,
};
pub use crate::models::{CodeId, CouponId, Page, Record, RecordStatus};
pub use crate::services::api::{CouponApi, SharedCouponApi};
pub use crate::services::datasource::{FetchError, FetchOutcome, FetchTicket, PagedDataSource};
