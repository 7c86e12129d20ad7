//! Runtime configuration — CLI flags, environment and an optional YAML file.
//!
//! Precedence per setting: flag / environment variable, then the YAML
//! file, then the built-in default.

use clap::Parser;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ConfigError;

pub const DEFAULT_AUTH_URL: &str = "https://keystone.cloud.syseleven.net:5000/v3";
pub const DEFAULT_API_URL: &str = "https://api.cloud.syseleven.net:5001";
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_RETRY_WAIT_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// ── Command Line ────────────────────────────────────────────────────

#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Optional YAML config file.
    #[arg(long, env = "SYSELEVEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// OpenStack project to export quota for.
    #[arg(long, env = "OS_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Username, or application credential ID with --use-app-creds.
    #[arg(long, env = "OS_USERNAME")]
    pub username: Option<String>,

    /// Password, or application credential secret with --use-app-creds.
    #[arg(long, env = "OS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Authenticate with an application credential instead of a password.
    #[arg(
        long,
        env = "SYSELEVEN_USE_APP_CREDS",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub use_app_creds: Option<bool>,

    /// Quota API version ("v1" or "v3").
    #[arg(long, env = "SYSELEVEN_API_VERSION")]
    pub api_version: Option<String>,

    /// Seconds between successful polls.
    #[arg(long, env = "SYSELEVEN_INTERVAL")]
    pub interval: Option<u64>,

    /// Seconds to wait after a failed poll before retrying.
    #[arg(long, env = "SYSELEVEN_RETRY_WAIT")]
    pub retry_wait: Option<u64>,

    /// Give up after this many consecutive failed polls (default: never).
    #[arg(long, env = "SYSELEVEN_MAX_FAILURES")]
    pub max_consecutive_failures: Option<u32>,

    /// Address the /metrics endpoint listens on.
    #[arg(long, env = "SYSELEVEN_LISTEN_ADDRESS")]
    pub listen_address: Option<String>,

    /// Keystone v3 endpoint.
    #[arg(long, env = "OS_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Quota API base URL.
    #[arg(long, env = "SYSELEVEN_API_URL")]
    pub api_url: Option<String>,

    /// Timeout for every upstream HTTP request.
    #[arg(long, env = "SYSELEVEN_HTTP_TIMEOUT")]
    pub http_timeout_secs: Option<u64>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "SYSELEVEN_LOG_JSON")]
    pub log_json: bool,
}

// ── Config File ─────────────────────────────────────────────────────

/// Same settings as [`Args`], all optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub project_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_app_creds: Option<bool>,
    pub api_version: Option<String>,
    pub interval: Option<u64>,
    pub retry_wait: Option<u64>,
    pub max_consecutive_failures: Option<u32>,
    pub listen_address: Option<String>,
    pub auth_url: Option<String>,
    pub api_url: Option<String>,
    pub http_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ── Resolved Types ──────────────────────────────────────────────────

/// Which upstream API schema to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V3,
}

impl ApiVersion {
    /// "v3" selects the v3 schema; every other value, including empty or
    /// unrecognized strings, selects v1.
    pub fn from_config(value: &str) -> Self {
        if value == "v3" {
            ApiVersion::V3
        } else {
            ApiVersion::V1
        }
    }

    /// Whether `value` names a version explicitly rather than falling back.
    pub fn is_recognized(value: &str) -> bool {
        matches!(value, "" | "v1" | "v3")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V3 => "v3",
        }
    }
}

/// How the exporter authenticates against Keystone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Password,
    ApplicationCredential,
}

/// Credential material. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_id: String,
    pub credentials: Credentials,
    pub auth_mode: AuthMode,
    pub api_version: ApiVersion,
    pub interval: Duration,
    pub retry_wait: Duration,
    pub max_consecutive_failures: Option<u32>,
    pub listen_address: SocketAddr,
    pub auth_url: String,
    pub api_url: String,
    pub http_timeout: Duration,
}

impl Config {
    /// Resolve CLI arguments against the optional config file.
    pub fn load(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(args, file)
    }

    pub fn resolve(args: Args, file: FileConfig) -> Result<Self, ConfigError> {
        let project_id = non_empty(args.project_id.or(file.project_id), "project_id")?;
        let username = non_empty(args.username.or(file.username), "username")?;
        let password = non_empty(args.password.or(file.password), "password")?;

        let auth_mode = if args.use_app_creds.or(file.use_app_creds).unwrap_or(false) {
            AuthMode::ApplicationCredential
        } else {
            AuthMode::Password
        };

        let raw_version = args.api_version.or(file.api_version).unwrap_or_default();
        if !ApiVersion::is_recognized(&raw_version) {
            warn!(
                api_version = %raw_version,
                "Unrecognized API version — falling back to v1"
            );
        }
        let api_version = ApiVersion::from_config(&raw_version);

        let interval = positive_secs(
            args.interval.or(file.interval).unwrap_or(DEFAULT_INTERVAL_SECS),
            "interval",
        )?;
        let retry_wait = positive_secs(
            args.retry_wait.or(file.retry_wait).unwrap_or(DEFAULT_RETRY_WAIT_SECS),
            "retry_wait",
        )?;
        let http_timeout = positive_secs(
            args.http_timeout_secs
                .or(file.http_timeout_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            "http_timeout_secs",
        )?;

        let max_consecutive_failures = args
            .max_consecutive_failures
            .or(file.max_consecutive_failures);
        if max_consecutive_failures == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_consecutive_failures",
                reason: "must be at least 1 when set".into(),
            });
        }

        let listen_raw = args
            .listen_address
            .or(file.listen_address)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDRESS.to_string());
        let listen_address = listen_raw.parse().map_err(|e| ConfigError::Invalid {
            field: "listen_address",
            reason: format!("{listen_raw:?}: {e}"),
        })?;

        let auth_url = trim_url(args.auth_url.or(file.auth_url), DEFAULT_AUTH_URL);
        let api_url = trim_url(args.api_url.or(file.api_url), DEFAULT_API_URL);

        Ok(Self {
            project_id,
            credentials: Credentials { username, password },
            auth_mode,
            api_version,
            interval,
            retry_wait,
            max_consecutive_failures,
            listen_address,
            auth_url,
            api_url,
            http_timeout,
        })
    }
}

fn non_empty(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(field)),
    }
}

fn positive_secs(secs: u64, field: &'static str) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be a positive number of seconds".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn trim_url(value: Option<String>, default: &str) -> String {
    value
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}
