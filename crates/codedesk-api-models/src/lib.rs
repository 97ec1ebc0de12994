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
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
//! Shared HTTP DTOs for the Codedesk coupon API.
//!
//! These types are re-used by the console engine and the CLI for
//! request/response encoding so the contract with the coupon service stays
//! deterministic. The closed enums here (`FilterToggle`, `ActionKind`,
//! `UsagePolicy`) are the single source of truth for the wire spellings.
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// URI reference identifying the problem type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    /// Detailed diagnostic message when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Parameters that failed validation, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON Pointer to the offending field.
    pub pointer: String,
    /// Human-readable description of the validation failure.
    pub message: String,
}

/// Status partition of the codes being viewed. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum FilterToggle {
    /// Codes with remaining capacity that are not individually assigned.
    Unassigned,
    /// Assigned codes that have not been redeemed yet.
    Unredeemed,
    /// Multi-use codes redeemed at least once but not exhausted.
    PartiallyRedeemed,
    /// Codes whose redemptions are exhausted.
    Redeemed,
}

impl FilterToggle {
    /// Every filter in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Unassigned,
        Self::Unredeemed,
        Self::PartiallyRedeemed,
        Self::Redeemed,
    ];

    /// Wire spelling used in query strings.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unassigned => "unassigned",
            Self::Unredeemed => "unredeemed",
            Self::PartiallyRedeemed => "partially-redeemed",
            Self::Redeemed => "redeemed",
        }
    }

    /// Parse the wire spelling back into a filter.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|filter| filter.as_str() == value.trim())
    }
}

impl Display for FilterToggle {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Redemption policy of the parent coupon.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum UsagePolicy {
    /// Each code can be redeemed exactly once.
    SingleUse,
    /// Each customer may redeem a code once.
    OncePerCustomer,
    /// Codes can be redeemed several times up to their total.
    MultiUse,
}

/// Operations the coupon service accepts against codes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Assign codes to learner emails.
    Assign,
    /// Re-send the assignment email.
    Remind,
    /// Withdraw an assignment.
    Revoke,
    /// Expose a code publicly.
    MakePublic,
    /// Withdraw a code from public use.
    MakePrivate,
}

impl ActionKind {
    /// Wire spelling used in request bodies and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Remind => "remind",
            Self::Revoke => "revoke",
            Self::MakePublic => "make-public",
            Self::MakePrivate => "make-private",
        }
    }
}

impl Display for ActionKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Server-side ordering applied to a page request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SortKey {
    /// Column the server sorts on.
    pub field: String,
    /// Sort descending when `true`.
    #[serde(default)]
    pub descending: bool,
}

impl SortKey {
    /// Render the `ordering` query value (`-field` for descending).
    #[must_use]
    pub fn to_query(&self) -> String {
        if self.descending {
            format!("-{}", self.field)
        } else {
            self.field.clone()
        }
    }
}

/// Parameters identifying one page of codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PageQuery {
    /// Active status filter.
    pub filter: FilterToggle,
    /// Zero-based page index.
    pub page_index: u32,
    /// Rows per page.
    pub page_size: u32,
    /// Optional server-side ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortKey>,
}

impl PageQuery {
    /// Query-string pairs understood by the coupon service (pages are 1-based on the wire).
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("code_filter", self.filter.as_str().to_string()),
            ("page", (u64::from(self.page_index) + 1).to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(sort) = &self.sort {
            pairs.push(("ordering", sort.to_query()));
        }
        pairs
    }
}

/// Redemption counters attached to each code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Redemptions {
    /// Redemptions already consumed.
    pub used: u32,
    /// Total redemptions the code allows.
    pub total: u32,
    /// Outstanding individual assignments made against the code.
    #[serde(default)]
    pub num_assignments: u32,
}

/// One code as returned by the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeRecordDto {
    /// Code identifier, unique within the coupon.
    pub code: String,
    /// Redemption counters.
    pub redemptions: Redemptions,
    /// Email the code is individually assigned to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Whether the code is publicly redeemable.
    #[serde(default)]
    pub is_public: bool,
    /// Most recent assignment error reported for this code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Timestamp of the current assignment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_date: Option<DateTime<Utc>>,
    /// Timestamp of the latest redemption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redemption_date: Option<DateTime<Utc>>,
    /// Learner who redeemed the code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_by: Option<String>,
}

/// Paginated list response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PageResponse {
    /// Total codes matching the filter.
    pub count: u64,
    /// Number of pages at the requested page size.
    pub num_pages: u32,
    /// Codes on the requested page.
    pub results: Vec<CodeRecordDto>,
}

/// Aggregate counters for the parent coupon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverviewCounters {
    /// Coupon identifier.
    pub coupon_id: String,
    /// Redemption policy of the coupon.
    pub usage_policy: UsagePolicy,
    /// Whether the coupon can currently be acted upon (active and not expired).
    pub is_available: bool,
    /// Codes with unassigned capacity.
    pub unassigned_codes: u64,
    /// Total codes in the coupon.
    pub total_codes: u64,
    /// Redemptions consumed across all codes.
    #[serde(default)]
    pub redemptions_used: u64,
}

/// Which codes an action applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ActionTarget {
    /// An explicit list of codes.
    Codes {
        /// Code identifiers.
        codes: Vec<String>,
    },
    /// Every code the server returns for the filter.
    Filter {
        /// Filter descriptor resolved server-side.
        filter: FilterToggle,
    },
}

/// Email copy sent with assign/remind actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EmailTemplate {
    /// Subject line.
    pub subject: String,
    /// Opening paragraph.
    pub greeting: String,
    /// Closing paragraph.
    pub closing: String,
}

/// Body of the action endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionRequest {
    /// Operation to perform.
    pub action: ActionKind,
    /// Codes affected.
    pub target: ActionTarget,
    /// Learner emails for assignment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    /// Optional email copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<EmailTemplate>,
}

/// Per-item status flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ItemDetail {
    /// Item committed.
    Success,
    /// Item rejected.
    Failure,
    /// Any other value the server may add later.
    #[serde(other)]
    Unknown,
}

/// Per-item entry in a bulk response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemResult {
    /// Code the entry refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Email the entry refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Status flag.
    pub detail: ItemDetail,
    /// Server-provided reason on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregate body returned by single-item and filter-scoped actions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ActionSummary {
    /// Items that committed, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_successful: Option<u64>,
    /// Items that failed, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_failed: Option<u64>,
    /// Overall status flag, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<ItemDetail>,
}

/// Response of the action endpoint: a per-item list or an aggregate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ActionResponse {
    /// One entry per affected code.
    Items(Vec<ItemResult>),
    /// Aggregate counters.
    Summary(ActionSummary),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_round_trips_wire_spelling() {
        assert_eq!(
            serde_json::to_value(FilterToggle::PartiallyRedeemed).unwrap(),
            json!("partially-redeemed")
        );
        assert_eq!(
            FilterToggle::parse("partially-redeemed"),
            Some(FilterToggle::PartiallyRedeemed)
        );
        assert_eq!(FilterToggle::parse("bogus"), None);
    }

    #[test]
    fn page_query_pairs_are_one_based_with_ordering() {
        let query = PageQuery {
            filter: FilterToggle::Unredeemed,
            page_index: 2,
            page_size: 25,
            sort: Some(SortKey {
                field: "assigned_to".into(),
                descending: true,
            }),
        };
        let pairs = query.query_pairs();
        assert!(pairs.contains(&("code_filter", "unredeemed".to_string())));
        assert!(pairs.contains(&("page", "3".to_string())));
        assert!(pairs.contains(&("ordering", "-assigned_to".to_string())));
    }

    #[test]
    fn action_target_is_tagged_by_scope() {
        let request = ActionRequest {
            action: ActionKind::Remind,
            target: ActionTarget::Filter {
                filter: FilterToggle::Unredeemed,
            },
            emails: Vec::new(),
            template: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["target"]["scope"], "filter");
        assert_eq!(value["target"]["filter"], "unredeemed");
        assert!(value.get("emails").is_none());
    }

    #[test]
    fn action_response_accepts_items_or_summary() {
        let items: ActionResponse = serde_json::from_value(json!([
            {"code": "A", "detail": "success"},
            {"code": "B", "detail": "failure", "message": "bounced"},
            {"code": "C", "detail": "queued"}
        ]))
        .unwrap();
        match items {
            ActionResponse::Items(items) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[1].detail, ItemDetail::Failure);
                assert_eq!(items[2].detail, ItemDetail::Unknown);
            }
            ActionResponse::Summary(_) => panic!("expected item list"),
        }

        let summary: ActionResponse =
            serde_json::from_value(json!({"num_successful": 4, "num_failed": 0})).unwrap();
        assert_eq!(
            summary,
            ActionResponse::Summary(ActionSummary {
                num_successful: Some(4),
                num_failed: Some(0),
                detail: None,
            })
        );
    }

    #[test]
    fn code_record_defaults_optional_fields() {
        let record: CodeRecordDto = serde_json::from_value(json!({
            "code": "ABC",
            "redemptions": {"used": 0, "total": 3}
        }))
        .unwrap();
        assert!(!record.is_public);
        assert_eq!(record.redemptions.num_assignments, 0);
        assert!(record.assigned_to.is_none());
    }
}
