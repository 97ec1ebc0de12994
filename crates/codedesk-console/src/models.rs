//! Domain records and pages built from the coupon API DTOs.
//!
//! # Design
//! - Records and pages are immutable once built; a refetch replaces the page wholesale.
//! - Identity is the code string, never a row position.

use std::fmt::{self, Display, Formatter};

use codedesk_api_models::{CodeRecordDto, FilterToggle, PageQuery, PageResponse, Redemptions};
use serde::Serialize;

/// Identifier of the parent coupon.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CouponId(String);

impl CouponId {
    /// Wrap a coupon identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CouponId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Identifier of one redeemable code, unique within its coupon.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CodeId(String);

impl CodeId {
    /// Wrap a code identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CodeId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for CodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Status derived from a record's redemption counters and assignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Capacity remains and nobody is assigned.
    Unassigned,
    /// Individually assigned, not yet redeemed.
    Assigned,
    /// Redeemed at least once with capacity left.
    PartiallyRedeemed,
    /// No redemptions left.
    Redeemed,
}

/// One redeemable code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Code identifier.
    pub id: CodeId,
    /// Redemption counters.
    pub redemptions: Redemptions,
    /// Email the code is individually assigned to.
    pub assigned_to: Option<String>,
    /// Whether the code is publicly redeemable.
    pub is_public: bool,
    /// Latest assignment error for this code.
    pub error_reason: Option<String>,
    /// Learner who redeemed the code, when reported.
    pub redeemed_by: Option<String>,
}

impl Record {
    /// Derive the display status.
    #[must_use]
    pub const fn status(&self) -> RecordStatus {
        if self.is_exhausted() {
            RecordStatus::Redeemed
        } else if self.redemptions.used > 0 {
            RecordStatus::PartiallyRedeemed
        } else if self.assigned_to.is_some() {
            RecordStatus::Assigned
        } else {
            RecordStatus::Unassigned
        }
    }

    /// True once every allowed redemption is consumed.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.redemptions.used >= self.redemptions.total
    }

    /// True when the code is individually assigned.
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.assigned_to.is_some()
    }

    /// Redemptions left before the code is exhausted.
    #[must_use]
    pub const fn remaining_uses(&self) -> u32 {
        self.redemptions.total.saturating_sub(self.redemptions.used)
    }
}

impl From<CodeRecordDto> for Record {
    fn from(value: CodeRecordDto) -> Self {
        Self {
            id: CodeId::new(value.code),
            redemptions: value.redemptions,
            assigned_to: value.assigned_to.filter(|email| !email.trim().is_empty()),
            is_public: value.is_public,
            error_reason: value.error.filter(|reason| !reason.trim().is_empty()),
            redeemed_by: value.redeemed_by,
        }
    }
}

/// One page of codes as applied by the data source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page {
    /// Records in server order.
    pub records: Vec<Record>,
    /// Total records matching the filter.
    pub total_count: u64,
    /// Number of pages at this page size.
    pub page_count: u32,
    /// Zero-based page index.
    pub page_index: u32,
    /// Rows per page.
    pub page_size: u32,
    /// Filter the page was fetched under.
    pub filter: FilterToggle,
}

impl Page {
    /// Build a page from the query that produced it and the server response.
    #[must_use]
    pub fn from_response(query: &PageQuery, response: PageResponse) -> Self {
        Self {
            records: response.results.into_iter().map(Record::from).collect(),
            total_count: response.count,
            page_count: response.num_pages,
            page_index: query.page_index,
            page_size: query.page_size,
            filter: query.filter,
        }
    }

    /// Identifiers in row order.
    #[must_use]
    pub fn ids(&self) -> Vec<CodeId> {
        self.records.iter().map(|record| record.id.clone()).collect()
    }

    /// Look up a record on this page.
    #[must_use]
    pub fn record(&self, id: &CodeId) -> Option<&Record> {
        self.records.iter().find(|record| &record.id == id)
    }

    /// True when the page has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
