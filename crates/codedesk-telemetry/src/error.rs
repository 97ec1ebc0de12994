//! Error types for telemetry operations.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Installing the tracing subscriber failed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// Building a collector failed.
    #[error("failed to build metrics collector '{name}'")]
    MetricsCollector {
        /// Series that failed.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Registering a collector failed.
    #[error("failed to register metrics collector '{name}'")]
    MetricsRegister {
        /// Series that failed.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Text encoding of the registry failed.
    #[error("failed to encode metrics")]
    MetricsEncode {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Encoded output was not UTF-8.
    #[error("metrics output was not valid utf-8")]
    MetricsUtf8 {
        /// Conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn collector_errors_name_the_series() {
        let err = TelemetryError::MetricsRegister {
            name: "codedesk_actions_total",
            source: PrometheusError::AlreadyReg,
        };
        assert_eq!(
            err.to_string(),
            "failed to register metrics collector 'codedesk_actions_total'"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn encoding_errors_keep_their_source() {
        let utf8_error = String::from_utf8(vec![0, 159]).unwrap_err();
        let err = TelemetryError::MetricsUtf8 { source: utf8_error };
        assert_eq!(err.to_string(), "metrics output was not valid utf-8");
        assert!(err.source().is_some());
    }
}
