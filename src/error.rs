//! Error taxonomy for the exporter.
//!
//! Auth and fetch failures are recoverable: the poll driver logs them,
//! waits, and starts over from authentication. Config errors only happen
//! at startup and abort the process.

use std::path::PathBuf;
use thiserror::Error;

/// Credential exchange with Keystone failed.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("token response carried no X-Subject-Token header")]
    MissingToken,
}

/// Quota or usage retrieval failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Keep upstream error bodies short enough for a log line.
pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(500).collect()
}

/// Why a single poll cycle did not publish.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("could not get API token: {0}")]
    Auth(#[source] AuthError),

    #[error("could not get quota: {0}")]
    Quota(#[source] FetchError),

    #[error("could not get current usage: {0}")]
    Usage(#[source] FetchError),
}

impl CycleError {
    /// Stage label used in logs and the failure counter.
    pub fn stage(&self) -> &'static str {
        match self {
            CycleError::Auth(_) => "auth",
            CycleError::Quota(_) => "quota",
            CycleError::Usage(_) => "usage",
        }
    }
}

/// Startup configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{0}` (flag, environment variable or config file)")]
    Missing(&'static str),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_stage_labels() {
        assert_eq!(CycleError::Auth(AuthError::MissingToken).stage(), "auth");

        let fetch = || FetchError::Status {
            url: "https://api.example/v1/projects/p/quota".into(),
            status: 503,
            body: "unavailable".into(),
        };
        assert_eq!(CycleError::Quota(fetch()).stage(), "quota");
        assert_eq!(CycleError::Usage(fetch()).stage(), "usage");
    }

    #[test]
    fn test_cycle_error_message_names_the_step() {
        let err = CycleError::Usage(FetchError::Status {
            url: "https://api.example/v3/projects/p/current_usage".into(),
            status: 500,
            body: "boom".into(),
        });
        let msg = err.to_string();
        assert!(msg.starts_with("could not get current usage"));
        assert!(msg.contains("500"));
    }
}
