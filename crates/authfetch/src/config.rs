// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::orders::ResourceKind;
use crate::poller::PollOptions;
use crate::session::DEFAULT_PUBLIC_PATHS;

fn default_public_paths() -> Vec<String> {
    DEFAULT_PUBLIC_PATHS.iter().map(|p| (*p).to_owned()).collect()
}

/// Configuration for the authenticated client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Backend API base URL. Relative request paths resolve under it.
    #[arg(long, default_value = "http://127.0.0.1:8080/api", env = "AUTHFETCH_BASE_URL")]
    pub base_url: String,

    /// Token refresh endpoint, absolute or relative to the base URL.
    #[arg(long, default_value = "auth/refresh", env = "AUTHFETCH_REFRESH_PATH")]
    pub refresh_path: String,

    /// Directory holding persisted credentials. Defaults to the XDG state dir.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 30000, env = "AUTHFETCH_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Status poll interval in milliseconds.
    #[arg(long, default_value_t = 2000, env = "AUTHFETCH_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Give up polling after this many milliseconds.
    #[arg(long, default_value_t = 60000, env = "AUTHFETCH_POLL_TIMEOUT_MS")]
    pub poll_timeout_ms: u64,

    /// Paths never remembered as a post-login redirect (comma-separated).
    #[arg(
        long = "public-path",
        env = "AUTHFETCH_PUBLIC_PATHS",
        value_delimiter = ',',
        default_values_t = default_public_paths()
    )]
    pub public_paths: Vec<String>,

    /// Log format (json or text).
    #[arg(long, env = "AUTHFETCH_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "AUTHFETCH_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ClientConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("invalid --base-url {:?}: {e}", self.base_url))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("--base-url must be http or https, got {}", base.scheme());
        }
        if self.refresh_path.trim().is_empty() {
            anyhow::bail!("--refresh-path must not be empty");
        }
        if self.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be greater than zero");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("--poll-interval-ms must be greater than zero");
        }
        if self.poll_timeout_ms < self.poll_interval_ms {
            anyhow::bail!("--poll-timeout-ms must not be shorter than --poll-interval-ms");
        }
        if let Some(bad) = self.public_paths.iter().find(|p| !p.starts_with('/')) {
            anyhow::bail!("public path {bad:?} must start with '/'");
        }
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("--log-format must be json or text");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Payment terminal sets with the configured timing.
    pub fn poll_options(&self) -> PollOptions {
        PollOptions::payment().with_interval(self.poll_interval()).with_timeout(self.poll_timeout())
    }

    /// Resolved credential directory.
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(crate::credential::state_dir)
    }
}

/// Command-line interface of the `authfetch` binary.
#[derive(Debug, clap::Parser)]
#[command(name = "authfetch", version, about = "Authenticated backend client with token refresh.")]
pub struct Cli {
    #[command(flatten)]
    pub config: ClientConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Store a token pair issued by the login flow.
    Login {
        #[arg(long, env = "AUTHFETCH_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
        #[arg(long, env = "AUTHFETCH_REFRESH_TOKEN", hide_env_values = true)]
        refresh_token: String,
    },
    /// End the session and clear stored credentials.
    Logout,
    /// Show whether credentials are stored.
    Status,
    /// Exchange the refresh token for a new access token.
    Refresh,
    /// Authenticated GET; prints the response body.
    Get { path: String },
    /// Poll an order or booking until it reaches a final status.
    Watch {
        #[arg(value_enum)]
        kind: ResourceKind,
        id: String,
    },
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
