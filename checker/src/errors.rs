use std::error::Error as StdError;

use thiserror::Error;

use crate::output::{EXIT_FAILURE, EXIT_UNHEALTHY};

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed request {url} status code: {status}")]
    Http { url: String, status: u16 },

    #[error("failed to read response body: {0}")]
    BodyRead(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("timestamp variable did not contain an integer: {0:?}")]
    TimestampParse(String),

    #[error("{0}")]
    Stale(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

impl Error {
    /// Exit status reported to the monitoring system.
    ///
    /// Staleness means the whole data path worked, so it shares the
    /// "reachable but unhealthy" status with a failed ping. Everything else
    /// is an operational failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Stale(_) => EXIT_UNHEALTHY,
            Error::Config(_)
            | Error::Network(_)
            | Error::Http { .. }
            | Error::BodyRead(_)
            | Error::Decode(_)
            | Error::TimestampParse(_)
            | Error::Client(_) => EXIT_FAILURE,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // reqwest puts the URL in its message, and ours carry the access token.
        let err = err.without_url();
        let message = with_causes(&err);
        if err.is_timeout() || err.is_connect() || err.is_request() {
            Error::Network(message)
        } else if err.is_body() || err.is_decode() {
            Error::BodyRead(message)
        } else if err.is_builder() {
            Error::Client(message)
        } else {
            Error::Network(message)
        }
    }
}

/// `outer: cause: root cause`. reqwest's own message is generic, the
/// underlying cause is what tells a refused connection from a timeout.
pub(crate) fn with_causes(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Stale("old".to_string()).exit_code(), 2);
        assert_eq!(Error::Network("refused".to_string()).exit_code(), 1);
        assert_eq!(
            Error::Http {
                url: "u".to_string(),
                status: 404
            }
            .exit_code(),
            1
        );
        assert_eq!(Error::TimestampParse("abc".to_string()).exit_code(), 1);
        assert_eq!(Error::Config("missing".to_string()).exit_code(), 1);
    }

    #[derive(Debug, Error)]
    #[error("error sending request")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_cause_chain_kept() {
        let err = Outer(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert_eq!(with_causes(&err), "error sending request: connection refused");
    }

    #[test]
    fn test_cause_chain_without_source() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "operation timed out");
        assert_eq!(with_causes(&err), "operation timed out");
    }

    #[test]
    fn test_timestamp_parse_message() {
        let err = Error::TimestampParse("soon".to_string());
        assert_eq!(
            err.to_string(),
            "timestamp variable did not contain an integer: \"soon\""
        );
    }
}
