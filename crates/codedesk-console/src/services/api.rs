//! Remote coupon API abstraction consumed by the console engine.

use std::sync::Arc;

use async_trait::async_trait;
use codedesk_api_models::{ActionRequest, ActionResponse, OverviewCounters, PageQuery, PageResponse};

use crate::models::CouponId;

/// Trait defining the coupon backend used by the console.
#[async_trait]
pub trait CouponApi: Send + Sync {
    /// Fetch one page of codes for `query`.
    async fn fetch_page(&self, coupon: &CouponId, query: &PageQuery)
    -> anyhow::Result<PageResponse>;
    /// Run an action against the coupon's codes.
    async fn execute_action(
        &self,
        coupon: &CouponId,
        request: &ActionRequest,
    ) -> anyhow::Result<ActionResponse>;
    /// Fetch the coupon-level counters shown above the table.
    async fn fetch_overview(&self, coupon: &CouponId) -> anyhow::Result<OverviewCounters>;
}

/// Shared reference to the coupon backend.
pub type SharedCouponApi = Arc<dyn CouponApi>;
