//! Scripted in-memory coupon API used by the console tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use anyhow::anyhow;
use async_trait::async_trait;
use codedesk_api_models::{
    ActionRequest, ActionResponse, CodeRecordDto, ItemDetail, ItemResult, OverviewCounters,
    PageQuery, PageResponse, Redemptions, UsagePolicy,
};
use tokio::sync::oneshot;

use crate::models::CouponId;
use crate::services::api::CouponApi;

#[derive(Default)]
struct Script {
    pages: VecDeque<PageResponse>,
    fetch_gates: VecDeque<oneshot::Receiver<()>>,
    fetch_failures: usize,
    fetch_calls: Vec<PageQuery>,
    actions: VecDeque<Result<ActionResponse, String>>,
    action_gates: VecDeque<oneshot::Receiver<()>>,
    action_calls: Vec<ActionRequest>,
    overview: Option<OverviewCounters>,
    overview_calls: usize,
    overview_failures: usize,
}

/// Fake API answering from queued responses. Gated calls block until released.
#[derive(Default)]
pub(crate) struct FakeApi {
    script: Mutex<Script>,
}

impl FakeApi {
    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push_page(&self, page: PageResponse) {
        self.script().pages.push_back(page);
    }

    pub(crate) fn gate_next_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script().fetch_gates.push_back(rx);
        tx
    }

    pub(crate) fn fail_next_fetches(&self, count: usize) {
        self.script().fetch_failures = count;
    }

    pub(crate) fn fetch_calls(&self) -> Vec<PageQuery> {
        self.script().fetch_calls.clone()
    }

    pub(crate) fn push_action(&self, response: Result<ActionResponse, String>) {
        self.script().actions.push_back(response);
    }

    pub(crate) fn gate_next_action(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script().action_gates.push_back(rx);
        tx
    }

    pub(crate) fn action_calls(&self) -> Vec<ActionRequest> {
        self.script().action_calls.clone()
    }

    pub(crate) fn set_overview(&self, overview: OverviewCounters) {
        self.script().overview = Some(overview);
    }

    pub(crate) fn fail_next_overviews(&self, count: usize) {
        self.script().overview_failures = count;
    }

    pub(crate) fn overview_calls(&self) -> usize {
        self.script().overview_calls
    }

    pub(crate) async fn wait_for_fetches(&self, count: usize) {
        while self.script().fetch_calls.len() < count {
            tokio::task::yield_now().await;
        }
    }

    pub(crate) async fn wait_for_actions(&self, count: usize) {
        while self.script().action_calls.len() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl CouponApi for FakeApi {
    async fn fetch_page(
        &self,
        _coupon: &CouponId,
        query: &PageQuery,
    ) -> anyhow::Result<PageResponse> {
        let (gate, response) = {
            let mut script = self.script();
            script.fetch_calls.push(query.clone());
            let gate = script.fetch_gates.pop_front();
            let response = if script.fetch_failures > 0 {
                script.fetch_failures -= 1;
                None
            } else {
                Some(script.pages.pop_front().unwrap_or_default())
            };
            (gate, response)
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        response.ok_or_else(|| anyhow!("connection refused"))
    }

    async fn execute_action(
        &self,
        _coupon: &CouponId,
        request: &ActionRequest,
    ) -> anyhow::Result<ActionResponse> {
        let (gate, response) = {
            let mut script = self.script();
            script.action_calls.push(request.clone());
            (script.action_gates.pop_front(), script.actions.pop_front())
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match response {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("no scripted action response")),
        }
    }

    async fn fetch_overview(&self, coupon: &CouponId) -> anyhow::Result<OverviewCounters> {
        let mut script = self.script();
        script.overview_calls += 1;
        if script.overview_failures > 0 {
            script.overview_failures -= 1;
            return Err(anyhow!("overview service unavailable"));
        }
        Ok(script.overview.clone().unwrap_or_else(|| overview(coupon.as_str(), 10)))
    }
}

pub(crate) fn overview(coupon: &str, unassigned_codes: u64) -> OverviewCounters {
    OverviewCounters {
        coupon_id: coupon.to_string(),
        usage_policy: UsagePolicy::MultiUse,
        is_available: true,
        unassigned_codes,
        total_codes: unassigned_codes,
        redemptions_used: 0,
    }
}

pub(crate) fn code(id: &str) -> CodeRecordDto {
    CodeRecordDto {
        code: id.to_string(),
        redemptions: Redemptions {
            used: 0,
            total: 1,
            num_assignments: 0,
        },
        assigned_to: None,
        is_public: false,
        error: None,
        assigned_date: None,
        redemption_date: None,
        redeemed_by: None,
    }
}

pub(crate) fn assigned(id: &str, email: &str) -> CodeRecordDto {
    CodeRecordDto {
        assigned_to: Some(email.to_string()),
        ..code(id)
    }
}

pub(crate) fn page_of(results: Vec<CodeRecordDto>) -> PageResponse {
    PageResponse {
        count: results.len() as u64,
        num_pages: 1,
        results,
    }
}

pub(crate) fn page_response(ids: &[&str]) -> PageResponse {
    page_of(ids.iter().map(|id| code(id)).collect())
}

pub(crate) fn item_results(items: &[(&str, bool)]) -> ActionResponse {
    ActionResponse::Items(
        items
            .iter()
            .map(|(code, ok)| ItemResult {
                code: Some((*code).to_string()),
                email: None,
                detail: if *ok {
                    ItemDetail::Success
                } else {
                    ItemDetail::Failure
                },
                message: (!ok).then(|| "assignment bounced".to_string()),
            })
            .collect(),
    )
}
