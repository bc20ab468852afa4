// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;

/// Message surfaced to the user when the session cannot be recovered.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Failures surfaced by [`AuthClient`](crate::client::AuthClient).
///
/// Only auth expiry is handled inside the client; every other variant is
/// returned to the caller untouched.
#[derive(Debug)]
pub enum FetchError {
    /// No access token is stored. No request was issued.
    Unauthenticated,
    /// The request never produced a response (DNS, connect, reset, timeout).
    Transport(reqwest::Error),
    /// Refresh failed or the retry was also rejected as expired. Credentials
    /// have been cleared and listeners notified.
    SessionTerminated,
    /// Non-success status returned by a typed helper such as `json()`.
    Status { status: StatusCode, body: String },
    /// Response body could not be decoded.
    Decode(String),
    /// The request URL could not be resolved.
    InvalidUrl(String),
}

impl FetchError {
    /// Machine-readable code for this error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Transport(_) => "TRANSPORT",
            Self::SessionTerminated => "SESSION_TERMINATED",
            Self::Status { .. } => "HTTP_STATUS",
            Self::Decode(_) => "DECODE",
            Self::InvalidUrl(_) => "INVALID_URL",
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Whether the caller has to send the user back to login.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Unauthenticated | Self::SessionTerminated)
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => f.write_str("not authenticated"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::SessionTerminated => f.write_str(SESSION_EXPIRED_MESSAGE),
            Self::Status { status, body } if body.is_empty() => write!(f, "http {status}"),
            Self::Status { status, body } => write!(f, "http {status}: {body}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::InvalidUrl(msg) => write!(f, "invalid url: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e)
        }
    }
}

/// Errors recorded on a poll session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    /// A single fetch failed. Polling continues.
    Fetch(String),
    /// No terminal status was observed within the window.
    Timeout(Duration),
}

impl PollError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(msg) => write!(f, "status fetch failed: {msg}"),
            Self::Timeout(after) => {
                write!(f, "no final status after {}s; confirmation may still arrive", after.as_secs())
            }
        }
    }
}

impl std::error::Error for PollError {}
