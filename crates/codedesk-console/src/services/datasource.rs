//! Debounced page fetching with stale-response discard.
//!
//! # Design
//! - Every request gets a monotonically increasing token when it is issued.
//! - A result is applied only if its token is still the latest when it settles, so
//!   completion order never decides which page wins.
//! - Failures keep the last applied page in place.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use codedesk_api_models::PageQuery;
use codedesk_telemetry::{FetchResultLabel, Metrics};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::api::CouponApi;
use crate::models::{CouponId, Page};

/// Errors surfaced by the data source and overview loads.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The page fetch failed remotely; the previous page is kept.
    #[error("failed to fetch page {page} for filter {filter}", page = .query.page_index, filter = .query.filter)]
    Remote {
        /// Query that failed.
        query: PageQuery,
        /// Underlying transport error.
        #[source]
        source: anyhow::Error,
    },
    /// The overview counters could not be loaded.
    #[error("failed to fetch coupon overview")]
    Overview {
        /// Underlying transport error.
        #[source]
        source: anyhow::Error,
    },
}

/// Identity of one issued request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTicket {
    token: u64,
    query: PageQuery,
}

impl FetchTicket {
    /// Token assigned when the request was issued.
    #[must_use]
    pub const fn token(&self) -> u64 {
        self.token
    }

    /// Query the request carries.
    #[must_use]
    pub const fn query(&self) -> &PageQuery {
        &self.query
    }
}

/// How a resolved request ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page was applied and published.
    Applied(Arc<Page>),
    /// A newer request was issued first; nothing was applied.
    Superseded,
}

impl FetchOutcome {
    /// Applied page, if any.
    #[must_use]
    pub fn page(&self) -> Option<&Arc<Page>> {
        match self {
            Self::Applied(page) => Some(page),
            Self::Superseded => None,
        }
    }
}

/// Paged view over the coupon's codes.
pub struct PagedDataSource<A: CouponApi + ?Sized> {
    api: Arc<A>,
    coupon: CouponId,
    debounce: Duration,
    latest: Mutex<u64>,
    page_tx: watch::Sender<Option<Arc<Page>>>,
    metrics: Option<Metrics>,
}

impl<A: CouponApi + ?Sized> PagedDataSource<A> {
    /// Build a data source for `coupon` with the given quiet period.
    #[must_use]
    pub fn new(api: Arc<A>, coupon: CouponId, debounce: Duration) -> Self {
        let (page_tx, _) = watch::channel(None);
        Self {
            api,
            coupon,
            debounce,
            latest: Mutex::new(0),
            page_tx,
            metrics: None,
        }
    }

    /// Record fetch results in `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register a new request. Any earlier ticket becomes stale immediately.
    pub fn issue(&self, query: PageQuery) -> FetchTicket {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        *latest += 1;
        debug!(token = *latest, filter = %query.filter, page = query.page_index, "page request issued");
        FetchTicket {
            token: *latest,
            query,
        }
    }

    /// Whether `token` is the most recently issued one.
    #[must_use]
    pub fn is_latest(&self, token: u64) -> bool {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) == token
    }

    /// Wait out the quiet period, then fetch and apply `ticket` if it is still latest.
    ///
    /// # Errors
    /// Returns [`FetchError::Remote`] when the latest request fails. Failures of
    /// superseded requests are reported as [`FetchOutcome::Superseded`].
    pub async fn resolve(&self, ticket: FetchTicket) -> Result<FetchOutcome, FetchError> {
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        if !self.is_latest(ticket.token) {
            return Ok(self.superseded(ticket.token));
        }

        let started = Instant::now();
        let result = self.api.fetch_page(&self.coupon, &ticket.query).await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_fetch_latency(started.elapsed());
        }

        let latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        if *latest != ticket.token {
            drop(latest);
            return Ok(self.superseded(ticket.token));
        }
        match result {
            Ok(response) => {
                let page = Arc::new(Page::from_response(&ticket.query, response));
                self.page_tx.send_replace(Some(Arc::clone(&page)));
                drop(latest);
                self.record(FetchResultLabel::Applied);
                debug!(
                    token = ticket.token,
                    rows = page.records.len(),
                    total = page.total_count,
                    "page applied"
                );
                Ok(FetchOutcome::Applied(page))
            }
            Err(source) => {
                drop(latest);
                self.record(FetchResultLabel::Failed);
                warn!(
                    token = ticket.token,
                    filter = %ticket.query.filter,
                    error = %source,
                    "page fetch failed; keeping previous page"
                );
                Err(FetchError::Remote {
                    query: ticket.query,
                    source,
                })
            }
        }
    }

    /// Issue and resolve `query` in one step.
    ///
    /// # Errors
    /// See [`Self::resolve`].
    pub async fn fetch(&self, query: PageQuery) -> Result<FetchOutcome, FetchError> {
        let ticket = self.issue(query);
        self.resolve(ticket).await
    }

    /// Most recently applied page.
    #[must_use]
    pub fn current(&self) -> Option<Arc<Page>> {
        self.page_tx.borrow().clone()
    }

    /// Subscribe to applied pages.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Page>>> {
        self.page_tx.subscribe()
    }

    fn superseded(&self, token: u64) -> FetchOutcome {
        self.record(FetchResultLabel::Superseded);
        debug!(token, "page result superseded; discarding");
        FetchOutcome::Superseded
    }

    fn record(&self, label: FetchResultLabel) {
        if let Some(metrics) = &self.metrics {
            metrics.inc_fetch(label);
        }
    }
}
