// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential storage: access/refresh token pair behind a swappable store.
//!
//! Stores are plain accessors. They never validate or parse tokens and never
//! fail: when the backing storage is unavailable, reads return `None` and
//! writes are logged and dropped.

pub mod persist;

use std::path::PathBuf;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

pub use persist::FileStore;

/// The stored token pair. Either token missing means "not authenticated".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: non_empty(access_token.into()),
            refresh_token: non_empty(refresh_token.into()),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some() && self.refresh_token.is_some()
    }
}

/// Read/write access to the current credential pair.
pub trait CredentialStore: Send + Sync {
    fn access_token(&self) -> Option<String>;
    fn refresh_token(&self) -> Option<String>;
    fn set_access_token(&self, token: String);
    /// Replace the refresh token (rotation on refresh).
    fn set_refresh_token(&self, token: String);
    /// Remove both tokens.
    fn clear(&self);

    /// Store a complete pair, e.g. after login.
    fn set_credential(&self, credential: Credential) {
        self.clear();
        if let Some(token) = credential.access_token {
            self.set_access_token(token);
        }
        if let Some(token) = credential.refresh_token {
            self.set_refresh_token(token);
        }
    }

    /// Snapshot of both tokens.
    fn snapshot(&self) -> Credential {
        Credential { access_token: self.access_token(), refresh_token: self.refresh_token() }
    }
}

/// In-process credential store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Credential>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self { inner: RwLock::new(credential) }
    }
}

impl CredentialStore for MemoryStore {
    fn access_token(&self) -> Option<String> {
        self.inner.read().access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.inner.read().refresh_token.clone()
    }

    fn set_access_token(&self, token: String) {
        self.inner.write().access_token = non_empty(token);
    }

    fn set_refresh_token(&self, token: String) {
        self.inner.write().refresh_token = non_empty(token);
    }

    fn clear(&self) {
        *self.inner.write() = Credential::default();
    }
}

/// Resolve the state directory for persisted credentials.
///
/// Checks `AUTHFETCH_STATE_DIR`, then `$XDG_STATE_HOME/authfetch`,
/// then `$HOME/.local/state/authfetch`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AUTHFETCH_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("authfetch");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/authfetch");
    }
    PathBuf::from(".authfetch")
}

fn non_empty(token: String) -> Option<String> {
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
