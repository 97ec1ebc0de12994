//! Argument parsing and command dispatch.

use clap::{Args, Parser, Subcommand, ValueEnum};
use codedesk_api_models::{ActionKind, EmailTemplate, FilterToggle, SortKey};
use codedesk_console::BulkActionKind;
use codedesk_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};
use url::Url;
use uuid::Uuid;

use crate::client::{CliDependencies, CliResult, HttpCouponApi, parse_api_key, parse_url};
use crate::commands::codes::{handle_bulk, handle_list, handle_overview, handle_single};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: cli.log_level.as_str(),
        format: cli.log_format.map_or_else(LogFormat::infer, LogFormatArg::into_format),
        build_sha: option_env!("CODEDESK_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }

    let request_id = Uuid::new_v4().to_string();
    let deps = match CliDependencies::from_cli(&cli, &request_id) {
        Ok(deps) => deps,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    match dispatch(cli, &deps).await {
        Ok(()) => 0,
        Err(err) => {
            tracing::debug!(request_id, error = %err, "command failed");
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, deps: &CliDependencies) -> CliResult<()> {
    let api = HttpCouponApi {
        client: deps.client.clone(),
        base_url: cli.api_url,
        api_key: parse_api_key(cli.api_key)?,
    };

    let options = CommandOptions {
        output: cli.output,
        metrics: cli.metrics,
    };
    match cli.command {
        Command::Overview(args) => handle_overview(api, args, options).await,
        Command::List(args) => handle_list(api, args, options).await,
        Command::Assign(args) => handle_bulk(api, BulkActionKind::Assign, args, options).await,
        Command::Remind(args) => handle_bulk(api, BulkActionKind::Remind, args, options).await,
        Command::Revoke(args) => handle_bulk(api, BulkActionKind::Revoke, args, options).await,
        Command::MakePublic(args) => {
            handle_single(api, ActionKind::MakePublic, args, options).await
        }
        Command::MakePrivate(args) => {
            handle_single(api, ActionKind::MakePrivate, args, options).await
        }
    }
}

#[derive(Parser)]
#[command(name = "codedesk", about = "Browse coupon codes and run code actions")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "CODEDESK_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(long, global = true, env = "CODEDESK_API_KEY")]
    pub(crate) api_key: Option<String>,
    #[arg(
        long,
        global = true,
        env = "CODEDESK_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    /// Print the session's Prometheus metrics to stderr when the command ends.
    #[arg(long, global = true)]
    pub(crate) metrics: bool,
    #[arg(long, global = true, value_enum, env = "CODEDESK_LOG_FORMAT")]
    pub(crate) log_format: Option<LogFormatArg>,
    #[arg(long, global = true, env = "CODEDESK_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show coupon-level counters.
    Overview(CouponArgs),
    /// List one page of codes.
    List(ListArgs),
    /// Assign codes to learner emails.
    Assign(BulkArgs),
    /// Re-send assignment emails.
    Remind(BulkArgs),
    /// Withdraw assignments.
    Revoke(BulkArgs),
    /// Make one code publicly redeemable.
    MakePublic(SingleArgs),
    /// Withdraw one code from public use.
    MakePrivate(SingleArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct CouponArgs {
    /// Coupon identifier.
    pub(crate) coupon: String,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct ListArgs {
    /// Coupon identifier.
    pub(crate) coupon: String,
    #[arg(long, value_enum, default_value_t = FilterArg::Unassigned)]
    pub(crate) filter: FilterArg,
    /// One-based page number.
    #[arg(long, default_value_t = 1)]
    pub(crate) page: u32,
    /// Field to sort by.
    #[arg(long)]
    pub(crate) sort: Option<String>,
    #[arg(long, requires = "sort")]
    pub(crate) descending: bool,
}

impl ListArgs {
    pub(crate) fn sort_key(&self) -> Option<SortKey> {
        self.sort.as_ref().map(|field| SortKey {
            field: field.clone(),
            descending: self.descending,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct BulkArgs {
    /// Coupon identifier.
    pub(crate) coupon: String,
    /// Filter the selection is made under.
    #[arg(long, value_enum)]
    pub(crate) filter: Option<FilterArg>,
    /// Codes to act on; repeat for several.
    #[arg(long = "code", conflicts_with = "all")]
    pub(crate) codes: Vec<String>,
    /// Act on every code matching the filter.
    #[arg(long)]
    pub(crate) all: bool,
    /// Learner email; repeat for several (assign only).
    #[arg(long = "email")]
    pub(crate) emails: Vec<String>,
    #[command(flatten)]
    pub(crate) template: TemplateArgs,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SingleArgs {
    /// Coupon identifier.
    pub(crate) coupon: String,
    /// Code to act on.
    pub(crate) code: String,
    #[arg(long, value_enum, default_value_t = FilterArg::Unassigned)]
    pub(crate) filter: FilterArg,
    /// One-based page the code is listed on.
    #[arg(long, default_value_t = 1)]
    pub(crate) page: u32,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct TemplateArgs {
    #[arg(long)]
    pub(crate) subject: Option<String>,
    #[arg(long)]
    pub(crate) greeting: Option<String>,
    #[arg(long)]
    pub(crate) closing: Option<String>,
}

impl TemplateArgs {
    pub(crate) fn to_template(&self) -> Option<EmailTemplate> {
        if self.subject.is_none() && self.greeting.is_none() && self.closing.is_none() {
            return None;
        }
        Some(EmailTemplate {
            subject: self.subject.clone().unwrap_or_default(),
            greeting: self.greeting.clone().unwrap_or_default(),
            closing: self.closing.clone().unwrap_or_default(),
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum FilterArg {
    Unassigned,
    Unredeemed,
    PartiallyRedeemed,
    Redeemed,
}

impl FilterArg {
    pub(crate) const fn into_filter(self) -> FilterToggle {
        match self {
            Self::Unassigned => FilterToggle::Unassigned,
            Self::Unredeemed => FilterToggle::Unredeemed,
            Self::PartiallyRedeemed => FilterToggle::PartiallyRedeemed,
            Self::Redeemed => FilterToggle::Redeemed,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormatArg {
    Pretty,
    Json,
}

impl LogFormatArg {
    const fn into_format(self) -> LogFormat {
        match self {
            Self::Pretty => LogFormat::Pretty,
            Self::Json => LogFormat::Json,
        }
    }
}

/// Presentation settings shared by every command handler.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct CommandOptions {
    pub(crate) output: OutputFormat,
    pub(crate) metrics: bool,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
