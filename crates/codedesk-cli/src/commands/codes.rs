use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use codedesk_api_models::{ActionKind, FilterToggle, SortKey};
use codedesk_console::{
    ActionOutcome, ActionPayload, BulkActionKind, CodeId, CodesConsole, ConfigError,
    ConsoleConfig, CouponId, ExecuteError, FetchError, Page, RowActions,
    outcome_message,
};
use codedesk_telemetry::Metrics;
use tracing::{debug, warn};

use crate::cli::{BulkArgs, CommandOptions, CouponArgs, FilterArg, ListArgs, SingleArgs};
use crate::client::{CliError, CliResult, HttpCouponApi};
use crate::output::{RowView, render_outcome, render_overview, render_page};

type Console = CodesConsole<HttpCouponApi>;

struct Session {
    console: Console,
    metrics: Metrics,
    options: CommandOptions,
}

impl Session {
    fn open(api: HttpCouponApi, coupon: &str, options: CommandOptions) -> CliResult<Self> {
        let config = ConsoleConfig::from_env().map_err(config_failure)?;
        // One-shot commands never race their own requests.
        let config = ConsoleConfig {
            debounce: Duration::ZERO,
            ..config
        };
        let metrics = Metrics::new()
            .map_err(|err| CliError::failure(anyhow!("failed to build metrics: {err}")))?;
        let console = CodesConsole::new(Arc::new(api), CouponId::new(coupon), config)
            .with_metrics(&metrics);
        Ok(Self {
            console,
            metrics,
            options,
        })
    }

    async fn load_page(
        &self,
        filter: FilterToggle,
        page: u32,
        sort: Option<SortKey>,
    ) -> CliResult<Arc<Page>> {
        if page == 0 {
            return Err(CliError::validation("page numbers start at 1"));
        }
        // Browsing works without counters; actions stay disabled until they load.
        if let Err(err) = self.console.refresh_overview().await {
            warn!(
                coupon = %self.console.coupon(),
                error = %err,
                "overview unavailable; actions disabled"
            );
        }
        self.console
            .set_filter(filter)
            .map_err(|err| CliError::validation(err.to_string()))?;
        if sort.is_some() {
            self.console.set_sort(sort);
        }
        let ticket = self.console.set_page(page - 1);
        self.console
            .load(ticket)
            .await
            .map_err(fetch_failure)?
            .ok_or_else(|| CliError::failure(anyhow!("page request was superseded")))
    }

    fn rows(&self, page: &Page) -> Vec<RowView> {
        page.records
            .iter()
            .map(|record| RowView {
                record: record.clone(),
                status: record.status(),
                actions: self.console.row_actions(&record.id).unwrap_or(RowActions::None),
                visibility: self.console.visibility_action(&record.id),
            })
            .collect()
    }

    /// Prometheus text for this session when `--metrics` was passed.
    fn metrics_report(&self) -> CliResult<Option<String>> {
        if !self.options.metrics {
            return Ok(None);
        }
        self.metrics
            .render()
            .map(Some)
            .map_err(|err| CliError::failure(anyhow!("failed to render metrics: {err}")))
    }

    fn report(&self) -> CliResult<()> {
        if let Some(text) = self.metrics_report()? {
            eprint!("{text}");
        }
        Ok(())
    }

    fn finish(&self, outcome: &ActionOutcome) -> CliResult<()> {
        let snapshot = self.metrics.snapshot();
        debug!(
            coupon = %self.console.coupon(),
            fetches_applied = snapshot.fetches_applied,
            fetches_failed = snapshot.fetches_failed,
            "action settled"
        );
        render_outcome(outcome, self.options.output)?;
        self.report()?;
        if outcome.failed {
            return Err(CliError::failure(anyhow!(outcome_message(outcome))));
        }
        Ok(())
    }
}

pub(crate) async fn handle_overview(
    api: HttpCouponApi,
    args: CouponArgs,
    options: CommandOptions,
) -> CliResult<()> {
    let session = Session::open(api, &args.coupon, options)?;
    let overview = session
        .console
        .refresh_overview()
        .await
        .map_err(fetch_failure)?;
    render_overview(&overview, options.output)?;
    session.report()
}

pub(crate) async fn handle_list(
    api: HttpCouponApi,
    args: ListArgs,
    options: CommandOptions,
) -> CliResult<()> {
    let session = Session::open(api, &args.coupon, options)?;
    let page = session
        .load_page(args.filter.into_filter(), args.page, args.sort_key())
        .await?;
    render_page(&page, &session.rows(&page), options.output)?;
    session.report()
}

pub(crate) async fn handle_bulk(
    api: HttpCouponApi,
    kind: BulkActionKind,
    args: BulkArgs,
    options: CommandOptions,
) -> CliResult<()> {
    if args.codes.is_empty() && !args.all {
        return Err(CliError::validation(
            "select codes with --code or pass --all to target the whole filter",
        ));
    }
    if kind != BulkActionKind::Assign && !args.emails.is_empty() {
        return Err(CliError::validation("--email is only accepted by assign"));
    }

    let filter = args
        .filter
        .map_or_else(|| default_filter(kind), FilterArg::into_filter);
    let session = Session::open(api, &args.coupon, options)?;
    session.load_page(filter, 1, None).await?;

    if args.all {
        session.console.select_all_matching_filter();
    } else {
        let codes: BTreeSet<&str> = args.codes.iter().map(String::as_str).collect();
        for code in codes {
            session.console.toggle_record(&CodeId::from(code));
        }
    }

    let payload = ActionPayload {
        emails: args.emails,
        template: args.template.to_template(),
    };
    let outcome = session
        .console
        .execute_bulk(kind, payload)
        .await
        .map_err(execute_failure)?;
    session.finish(&outcome)
}

pub(crate) async fn handle_single(
    api: HttpCouponApi,
    kind: ActionKind,
    args: SingleArgs,
    options: CommandOptions,
) -> CliResult<()> {
    let session = Session::open(api, &args.coupon, options)?;
    session
        .load_page(args.filter.into_filter(), args.page, None)
        .await?;
    let outcome = session
        .console
        .execute_single(kind, &CodeId::new(args.code), ActionPayload::default())
        .await
        .map_err(execute_failure)?;
    session.finish(&outcome)
}

const fn default_filter(kind: BulkActionKind) -> FilterToggle {
    match kind {
        BulkActionKind::Assign => FilterToggle::Unassigned,
        BulkActionKind::Remind | BulkActionKind::Revoke => FilterToggle::Unredeemed,
    }
}

fn config_failure(err: ConfigError) -> CliError {
    let ConfigError::InvalidField {
        field,
        value,
        reason,
    } = err;
    CliError::validation(format!(
        "invalid {field} ({}): {reason}",
        value.as_deref().unwrap_or("unset")
    ))
}

fn fetch_failure(err: FetchError) -> CliError {
    match err {
        FetchError::Remote { source, .. } | FetchError::Overview { source } => {
            CliError::from_remote(source)
        }
    }
}

fn execute_failure(err: ExecuteError) -> CliError {
    match err {
        ExecuteError::Busy { .. } => CliError::failure(err),
        other => CliError::validation(format!("{:#}", anyhow::Error::new(other))),
    }
}
