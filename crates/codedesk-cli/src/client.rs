//! HTTP coupon API client and CLI error types.

use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use codedesk_api_models::{
    ActionRequest, ActionResponse, OverviewCounters, PageQuery, PageResponse, ProblemDetails,
};
use codedesk_console::{CouponApi, CouponId};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::cli::Cli;

pub(crate) const HEADER_API_KEY: &str = "x-codedesk-api-key";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    /// Recover a `CliError` that travelled through the console as an `anyhow::Error`.
    pub(crate) fn from_remote(error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(cli) => cli,
            Err(other) => Self::Failure(other),
        }
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.display_message())
    }
}

impl std::error::Error for CliError {}

/// Dependencies constructed from CLI options.
#[derive(Clone)]
pub(crate) struct CliDependencies {
    pub(crate) client: Client,
}

impl CliDependencies {
    /// Construct a configured HTTP client tagged with the invocation's request id.
    pub(crate) fn from_cli(cli: &Cli, request_id: &str) -> CliResult<Self> {
        let mut default_headers = HeaderMap::new();
        let request_id = HeaderValue::from_str(request_id).map_err(|_| {
            CliError::failure(anyhow!("request identifier contains invalid characters"))
        })?;
        default_headers.insert(HEADER_REQUEST_ID, request_id);

        let client = Client::builder()
            .timeout(Duration::from_secs(cli.timeout))
            .default_headers(default_headers)
            .build()
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;

        Ok(Self { client })
    }
}

/// Coupon API reached over HTTP.
#[derive(Clone)]
pub(crate) struct HttpCouponApi {
    pub(crate) client: Client,
    pub(crate) base_url: Url,
    pub(crate) api_key: Option<String>,
}

impl HttpCouponApi {
    fn endpoint(&self, coupon: &CouponId, suffix: &str) -> anyhow::Result<Url> {
        self.base_url
            .join(&format!("/api/v1/coupons/{coupon}/{suffix}"))
            .map_err(|err| anyhow!("invalid base URL: {err}"))
    }

    fn authorise(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(HEADER_API_KEY, key),
            None => request,
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> anyhow::Result<T> {
        if !response.status().is_success() {
            return Err(anyhow::Error::new(classify_problem(response).await));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| anyhow!("failed to parse response: {err}"))
    }
}

#[async_trait]
impl CouponApi for HttpCouponApi {
    async fn fetch_page(
        &self,
        coupon: &CouponId,
        query: &PageQuery,
    ) -> anyhow::Result<PageResponse> {
        let url = self.endpoint(coupon, "codes")?;
        let response = self
            .authorise(self.client.get(url).query(&query.query_pairs()))
            .send()
            .await
            .map_err(|err| anyhow!("request to coupon API failed: {err}"))?;
        Self::decode(response).await
    }

    async fn execute_action(
        &self,
        coupon: &CouponId,
        request: &ActionRequest,
    ) -> anyhow::Result<ActionResponse> {
        let url = self.endpoint(coupon, "codes/actions")?;
        let response = self
            .authorise(self.client.post(url).json(request))
            .send()
            .await
            .map_err(|err| anyhow!("request to coupon API failed: {err}"))?;
        Self::decode(response).await
    }

    async fn fetch_overview(&self, coupon: &CouponId) -> anyhow::Result<OverviewCounters> {
        let url = self.endpoint(coupon, "overview")?;
        let response = self
            .authorise(self.client.get(url))
            .send()
            .await
            .map_err(|err| anyhow!("request to coupon API failed: {err}"))?;
        Self::decode(response).await
    }
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Parse the API key provided to the CLI.
pub(crate) fn parse_api_key(input: Option<String>) -> CliResult<Option<String>> {
    let Some(raw) = input else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CliError::validation("API key cannot be an empty string"));
    }
    Ok(Some(trimmed.to_string()))
}

/// Classify an HTTP response into a CLI error.
pub(crate) async fn classify_problem(response: reqwest::Response) -> CliError {
    let status = response.status();
    let bytes = response.bytes().await.unwrap_or_default();

    let body_text = String::from_utf8_lossy(&bytes).to_string();
    let problem = serde_json::from_slice::<ProblemDetails>(&bytes).ok();

    let message = problem
        .as_ref()
        .and_then(|p| p.detail.clone())
        .unwrap_or_else(|| {
            problem
                .as_ref()
                .map_or_else(|| body_text.trim().to_string(), |p| p.title.clone())
        });

    if matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY
    ) {
        CliError::validation(message)
    } else {
        let detail = if let Some(problem) = problem {
            format!("{} (status {})", message, problem.status)
        } else if !body_text.is_empty() {
            format!("{message} (status {status})")
        } else {
            format!("request failed with status {status}")
        };
        CliError::failure(anyhow!(detail))
    }
}
