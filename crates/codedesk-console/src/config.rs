//! Console tuning knobs and their environment overrides.

use std::time::Duration;

use thiserror::Error;

/// Quiet period applied before a page request hits the API.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
/// Rows requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;
/// Largest page size the coupon API accepts.
pub const MAX_PAGE_SIZE: u32 = 100;
/// Environment variable overriding the debounce period (milliseconds).
pub const DEBOUNCE_ENV: &str = "CODEDESK_DEBOUNCE_MS";
/// Environment variable overriding the page size.
pub const PAGE_SIZE_ENV: &str = "CODEDESK_PAGE_SIZE";

/// Errors raised while loading or validating [`ConsoleConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid console configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

/// Settings for one console session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Quiet period before a page request is sent.
    pub debounce: Duration,
    /// Rows per page.
    pub page_size: u32,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ConsoleConfig {
    /// Defaults overridden by `CODEDESK_DEBOUNCE_MS` and `CODEDESK_PAGE_SIZE`.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidField`] when a variable does not parse or the
    /// result fails [`Self::validate`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    ///
    /// # Errors
    /// See [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(DEBOUNCE_ENV) {
            let millis = parse_number::<u64>(DEBOUNCE_ENV, &raw)?;
            config.debounce = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup(PAGE_SIZE_ENV) {
            config.page_size = parse_number::<u32>(PAGE_SIZE_ENV, &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the coupon API would refuse.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidField`] for a zero or oversized page size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidField {
                field: "page_size",
                value: Some(self.page_size.to_string()),
                reason: "page size must be positive",
            });
        }
        if self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidField {
                field: "page_size",
                value: Some(self.page_size.to_string()),
                reason: "page size exceeds the API maximum",
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidField {
        field,
        value: Some(raw.to_string()),
        reason: "must be a non-negative integer",
    })
}
