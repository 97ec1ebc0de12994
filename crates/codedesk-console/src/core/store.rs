//! Console session for one coupon's codes.
//!
//! # Design
//! - One mutex guards the view (filter, selection, paging, overview); it is never held across an await.
//! - Filter changes clear the selection and issue the replacement fetch ticket under the same lock.
//! - Row lookups only see applied pages: a refetch replaces its page index wholesale, and filter,
//!   sort, or post-action invalidation drops every cached page.
//! - A settlement's invalidation is applied once, then the page and overview refetches run together.
//! - Every state change publishes a fresh [`ConsoleSnapshot`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use codedesk_api_models::{
    ActionKind, FilterToggle, OverviewCounters, PageQuery, SortKey, UsagePolicy,
};
use codedesk_telemetry::Metrics;
use tokio::sync::watch;
use tracing::{debug, error, warn};

use super::execution::{ActionExecutionCoordinator, ExecuteError, ExecutionState, Settlement};
use crate::config::ConsoleConfig;
use crate::features::codes::actions::{
    ActionOutcome, ActionPayload, ExecutionTarget, validate_payload,
};
use crate::features::codes::eligibility::{
    BulkActionKind, EligibilityContext, ResolvedActions, RowActions, resolve, resolve_row,
    resolve_visibility,
};
use crate::features::codes::filter::{FilterChange, FilterController, FilterError};
use crate::features::codes::selection::{SelectionScope, SelectionState, SelectionTracker};
use crate::models::{CodeId, CouponId, Page, Record};
use crate::services::api::CouponApi;
use crate::services::datasource::{FetchError, FetchOutcome, FetchTicket, PagedDataSource};

/// Everything a front end renders, published after each state change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleSnapshot {
    /// Active filter.
    pub filter: FilterToggle,
    /// Filters offered for the coupon.
    pub available_filters: Vec<FilterToggle>,
    /// Current selection.
    pub selection: SelectionState,
    /// Selection size, resolving "all matching" against the page total.
    pub selection_count: u64,
    /// Bulk options and default.
    pub actions: ResolvedActions,
    /// Requested page index.
    pub page_index: u32,
    /// Requested sort.
    pub sort: Option<SortKey>,
    /// Applied page for the active filter.
    pub page: Option<Arc<Page>>,
    /// Coupon counters.
    pub overview: Option<OverviewCounters>,
    /// Coordinator lifecycle.
    pub execution: ExecutionState,
    /// Outcome on display until dismissed or the selection changes.
    pub outcome: Option<ActionOutcome>,
    /// Advances after each settled action.
    pub refresh_token: u64,
}

struct ViewState {
    filter: FilterController,
    selection: SelectionTracker,
    page_index: u32,
    sort: Option<SortKey>,
    overview: Option<OverviewCounters>,
    loaded: BTreeMap<u32, Arc<Page>>,
    refresh_token: u64,
    outcome: Option<ActionOutcome>,
}

/// Composes the data source, selection, eligibility, and execution for one coupon.
pub struct CodesConsole<A: CouponApi + ?Sized> {
    api: Arc<A>,
    coupon: CouponId,
    config: ConsoleConfig,
    source: PagedDataSource<A>,
    coordinator: ActionExecutionCoordinator<A>,
    view: Mutex<ViewState>,
    snapshot_tx: watch::Sender<ConsoleSnapshot>,
}

impl<A: CouponApi + ?Sized> CodesConsole<A> {
    /// New session starting on the `unassigned` filter.
    #[must_use]
    pub fn new(api: Arc<A>, coupon: CouponId, config: ConsoleConfig) -> Self {
        let source = PagedDataSource::new(Arc::clone(&api), coupon.clone(), config.debounce);
        let coordinator = ActionExecutionCoordinator::new(Arc::clone(&api), coupon.clone());
        let view = ViewState {
            filter: FilterController::new(FilterToggle::Unassigned, UsagePolicy::MultiUse),
            selection: SelectionTracker::new(),
            page_index: 0,
            sort: None,
            overview: None,
            loaded: BTreeMap::new(),
            refresh_token: 0,
            outcome: None,
        };
        let initial = build_snapshot(&view, None, ExecutionState::Idle);
        let (snapshot_tx, _) = watch::channel(initial);
        Self {
            api,
            coupon,
            config,
            source,
            coordinator,
            view: Mutex::new(view),
            snapshot_tx,
        }
    }

    /// Record fetch and action metrics.
    #[must_use]
    pub fn with_metrics(mut self, metrics: &Metrics) -> Self {
        self.source = self.source.with_metrics(metrics.clone());
        self.coordinator = self.coordinator.with_metrics(metrics.clone());
        self
    }

    /// Coupon this session browses.
    #[must_use]
    pub const fn coupon(&self) -> &CouponId {
        &self.coupon
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ConsoleSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConsoleSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Load the overview, then the first page of the active filter.
    ///
    /// The page is loaded even when the overview call fails; every action stays
    /// disabled until an overview arrives.
    ///
    /// # Errors
    /// Returns [`FetchError::Remote`] when the page fails, otherwise
    /// [`FetchError::Overview`] once the page has been applied.
    pub async fn open(&self) -> Result<Option<Arc<Page>>, FetchError> {
        let overview = self.refresh_overview().await;
        let ticket = self.refresh();
        let page = self.load(ticket).await?;
        overview.map(|_| page)
    }

    /// Switch filters. The selection is cleared before this returns.
    ///
    /// # Errors
    /// Returns [`FilterError::Unavailable`] when the filter is not offered.
    pub fn set_filter(&self, next: FilterToggle) -> Result<FetchTicket, FilterError> {
        let mut view = self.lock_view();
        let ViewState {
            filter, selection, ..
        } = &mut *view;
        if let FilterChange::Changed { .. } = filter.change(next, selection)? {
            view.page_index = 0;
            view.loaded.clear();
            self.reset_outcome(&mut view);
        }
        let ticket = self.source.issue(self.query(&view));
        self.publish(&view);
        Ok(ticket)
    }

    /// Move to `page_index`. The selection is kept.
    pub fn set_page(&self, page_index: u32) -> FetchTicket {
        let mut view = self.lock_view();
        view.page_index = page_index;
        let ticket = self.source.issue(self.query(&view));
        self.publish(&view);
        ticket
    }

    /// Change the sort and return to the first page. The selection is kept.
    pub fn set_sort(&self, sort: Option<SortKey>) -> FetchTicket {
        let mut view = self.lock_view();
        view.sort = sort;
        view.page_index = 0;
        view.loaded.clear();
        let ticket = self.source.issue(self.query(&view));
        self.publish(&view);
        ticket
    }

    /// Re-request the current page.
    pub fn refresh(&self) -> FetchTicket {
        let view = self.lock_view();
        self.source.issue(self.query(&view))
    }

    /// Resolve a ticket returned by one of the request methods.
    ///
    /// # Errors
    /// Returns [`FetchError::Remote`] when the latest request fails; the previous
    /// page stays in place.
    pub async fn load(&self, ticket: FetchTicket) -> Result<Option<Arc<Page>>, FetchError> {
        let outcome = self.source.resolve(ticket).await?;
        let FetchOutcome::Applied(page) = outcome else {
            return Ok(None);
        };
        let mut view = self.lock_view();
        if page.filter == view.filter.active() {
            view.loaded.insert(page.page_index, Arc::clone(&page));
        }
        self.publish(&view);
        Ok(Some(page))
    }

    /// Page applied for the active filter.
    #[must_use]
    pub fn page(&self) -> Option<Arc<Page>> {
        let view = self.lock_view();
        self.active_page(&view)
    }

    /// Reload coupon counters and re-check filter availability.
    ///
    /// # Errors
    /// Returns [`FetchError::Overview`] when the call fails.
    pub async fn refresh_overview(&self) -> Result<OverviewCounters, FetchError> {
        let overview = match self.api.fetch_overview(&self.coupon).await {
            Ok(overview) => overview,
            Err(source) => {
                warn!(coupon = %self.coupon, error = %source, "overview fetch failed");
                return Err(FetchError::Overview { source });
            }
        };
        let mut view = self.lock_view();
        let ViewState {
            filter, selection, ..
        } = &mut *view;
        if let FilterChange::Changed { previous, current } =
            filter.set_usage_policy(overview.usage_policy, selection)
        {
            debug!(%previous, %current, "filter no longer offered; falling back");
            view.page_index = 0;
            view.loaded.clear();
        }
        view.overview = Some(overview.clone());
        self.publish(&view);
        Ok(overview)
    }

    /// Toggle one code. Returns whether it is now selected.
    pub fn toggle_record(&self, id: &CodeId) -> bool {
        self.mutate_selection(|selection, _| selection.toggle_record(id))
    }

    /// Select exactly the rows of the applied page.
    pub fn select_all_on_page(&self) {
        self.mutate_selection(|selection, page| {
            selection.select_all_on_page(page.map(|page| page.ids()).unwrap_or_default());
        });
    }

    /// Select every code matching the active filter.
    pub fn select_all_matching_filter(&self) {
        self.mutate_selection(|selection, page| {
            selection.select_all_matching_filter(page.map(|page| page.ids()).unwrap_or_default());
        });
    }

    /// Drop the selection.
    pub fn clear_selection(&self) {
        self.mutate_selection(|selection, _| selection.clear());
    }

    /// Bulk options for the current filter and selection.
    #[must_use]
    pub fn bulk_actions(&self) -> ResolvedActions {
        let view = self.lock_view();
        resolve(&self.eligibility(&view))
    }

    /// Row actions for a loaded code.
    #[must_use]
    pub fn row_actions(&self, id: &CodeId) -> Option<RowActions> {
        let view = self.lock_view();
        let available = resource_available(&view);
        loaded_record(&view, id).map(|record| resolve_row(record, view.filter.active(), available))
    }

    /// Visibility toggle offered for a loaded code.
    #[must_use]
    pub fn visibility_action(&self, id: &CodeId) -> Option<ActionKind> {
        let view = self.lock_view();
        let available = resource_available(&view);
        loaded_record(&view, id).and_then(|record| resolve_visibility(record, available))
    }

    /// Run a bulk action on the current selection. With nothing selected, assign
    /// and remind target every code matching the filter.
    ///
    /// # Errors
    /// Returns [`ExecuteError::Ineligible`] when the option is disabled,
    /// [`ExecuteError::InvalidPayload`] for bad input, and [`ExecuteError::Busy`]
    /// while another action is pending.
    pub async fn execute_bulk(
        &self,
        kind: BulkActionKind,
        payload: ActionPayload,
    ) -> Result<ActionOutcome, ExecuteError> {
        let action = kind.as_action();
        let target = {
            let view = self.lock_view();
            let ctx = self.eligibility(&view);
            if !resolve(&ctx).is_enabled(kind) {
                error!(%action, filter = %ctx.filter, selection = ctx.selection_count, "bulk action is not eligible");
                return Err(ExecuteError::Ineligible { kind: action });
            }
            let scope = if view.selection.state().is_empty() {
                SelectionScope::AllMatching
            } else {
                view.selection.scope()
            };
            let capacity = assign_capacity(&view, &scope);
            validate_payload(action, &payload, capacity)?;
            ExecutionTarget::Bulk {
                scope,
                filter: view.filter.active(),
                payload,
            }
        };
        self.run(action, target).await
    }

    /// Run a row action on one loaded code.
    ///
    /// # Errors
    /// Returns [`ExecuteError::UnknownRecord`] for codes not on a loaded page,
    /// otherwise as [`Self::execute_bulk`].
    pub async fn execute_single(
        &self,
        kind: ActionKind,
        id: &CodeId,
        payload: ActionPayload,
    ) -> Result<ActionOutcome, ExecuteError> {
        let target = {
            let view = self.lock_view();
            let record = loaded_record(&view, id)
                .ok_or_else(|| ExecuteError::UnknownRecord { id: id.clone() })?;
            let available = resource_available(&view);
            let row = resolve_row(record, view.filter.active(), available);
            let allowed = match kind {
                ActionKind::MakePublic | ActionKind::MakePrivate => {
                    resolve_visibility(record, available) == Some(kind)
                }
                _ => row.allows(kind),
            };
            if !allowed {
                error!(%kind, code = %id, "row action is not eligible");
                return Err(ExecuteError::Ineligible { kind });
            }
            let capacity = match row {
                RowActions::Assign { remaining_uses } => Some(u64::from(remaining_uses)),
                _ => None,
            };
            validate_payload(kind, &payload, capacity)?;
            ExecutionTarget::Single {
                record: record.clone(),
                payload,
            }
        };
        self.run(kind, target).await
    }

    /// Hide the settled outcome.
    pub fn dismiss_outcome(&self) {
        let mut view = self.lock_view();
        self.reset_outcome(&mut view);
        self.publish(&view);
    }

    /// Counter advanced after each settled action.
    #[must_use]
    pub fn refresh_token(&self) -> u64 {
        self.lock_view().refresh_token
    }

    /// Coordinator lifecycle.
    #[must_use]
    pub fn execution_state(&self) -> ExecutionState {
        self.coordinator.state()
    }

    async fn run(
        &self,
        kind: ActionKind,
        target: ExecutionTarget,
    ) -> Result<ActionOutcome, ExecuteError> {
        let Settlement {
            outcome,
            invalidation,
        } = self.coordinator.execute(kind, target).await?;

        let ticket = {
            let mut view = self.lock_view();
            view.outcome = Some(outcome.clone());
            if invalidation.clear_selection {
                view.selection.clear();
            }
            if invalidation.bump_refresh_token {
                view.refresh_token += 1;
            }
            if invalidation.refresh_page {
                view.loaded.clear();
            }
            let ticket = invalidation
                .refresh_page
                .then(|| self.source.issue(self.query(&view)));
            self.publish(&view);
            ticket
        };

        let page = async {
            if let Some(ticket) = ticket
                && let Err(err) = self.load(ticket).await
            {
                warn!(error = %err, "page refresh after action failed");
            }
        };
        let overview = async {
            if invalidation.refresh_overview
                && let Err(err) = self.refresh_overview().await
            {
                warn!(error = %err, "overview refresh after action failed");
            }
        };
        tokio::join!(page, overview);
        Ok(outcome)
    }

    fn mutate_selection<T>(
        &self,
        apply: impl FnOnce(&mut SelectionTracker, Option<&Page>) -> T,
    ) -> T {
        let mut view = self.lock_view();
        let page = self.active_page(&view);
        let result = apply(&mut view.selection, page.as_deref());
        self.reset_outcome(&mut view);
        self.publish(&view);
        result
    }

    fn reset_outcome(&self, view: &mut ViewState) {
        view.outcome = None;
        self.coordinator.dismiss();
    }

    fn query(&self, view: &ViewState) -> PageQuery {
        PageQuery {
            filter: view.filter.active(),
            page_index: view.page_index,
            page_size: self.config.page_size,
            sort: view.sort.clone(),
        }
    }

    fn active_page(&self, view: &ViewState) -> Option<Arc<Page>> {
        self.source
            .current()
            .filter(|page| page.filter == view.filter.active())
    }

    fn eligibility(&self, view: &ViewState) -> EligibilityContext {
        let page = self.active_page(view);
        eligibility_context(view, page.as_deref())
    }

    fn publish(&self, view: &ViewState) {
        let snapshot = build_snapshot(
            view,
            self.active_page(view),
            self.coordinator.state(),
        );
        self.snapshot_tx.send_replace(snapshot);
    }

    fn lock_view(&self) -> MutexGuard<'_, ViewState> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn resource_available(view: &ViewState) -> bool {
    view.overview
        .as_ref()
        .is_some_and(|overview| overview.is_available)
}

/// Record `id` as last applied, preferring the requested page index.
fn loaded_record<'a>(view: &'a ViewState, id: &CodeId) -> Option<&'a Record> {
    view.loaded
        .get(&view.page_index)
        .and_then(|page| page.record(id))
        .or_else(|| view.loaded.values().find_map(|page| page.record(id)))
}

fn eligibility_context(view: &ViewState, page: Option<&Page>) -> EligibilityContext {
    let total = page.map_or(0, |page| page.total_count);
    let selected = &view.selection.state().selected_ids;
    EligibilityContext {
        filter: view.filter.active(),
        selection_count: view.selection.count(total),
        has_table_data: page.is_some_and(|page| !page.is_empty()),
        resource_available: resource_available(view),
        unassigned_count: view
            .overview
            .as_ref()
            .map_or(0, |overview| overview.unassigned_codes),
        has_public_records_in_selection: selected
            .iter()
            .filter_map(|id| loaded_record(view, id))
            .any(|record| record.is_public),
    }
}

/// Assignable capacity of `scope`, or `None` when part of it is not loaded.
fn assign_capacity(view: &ViewState, scope: &SelectionScope) -> Option<u64> {
    match scope {
        SelectionScope::AllMatching => view
            .overview
            .as_ref()
            .map(|overview| overview.unassigned_codes),
        SelectionScope::Ids(ids) => ids.iter().try_fold(0_u64, |total, id| {
            let record = loaded_record(view, id)?;
            match resolve_row(record, view.filter.active(), true) {
                RowActions::Assign { remaining_uses } => Some(total + u64::from(remaining_uses)),
                _ => Some(total),
            }
        }),
    }
}

fn build_snapshot(
    view: &ViewState,
    page: Option<Arc<Page>>,
    execution: ExecutionState,
) -> ConsoleSnapshot {
    let ctx = eligibility_context(view, page.as_deref());
    ConsoleSnapshot {
        filter: view.filter.active(),
        available_filters: view.filter.available_filters(),
        selection: view.selection.state().clone(),
        selection_count: ctx.selection_count,
        actions: resolve(&ctx),
        page_index: view.page_index,
        sort: view.sort.clone(),
        page,
        overview: view.overview.clone(),
        execution,
        outcome: view.outcome.clone(),
        refresh_token: view.refresh_token,
    }
}
