// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session teardown and process-wide session notifications.
//!
//! When the client cannot recover an expired session it clears stored
//! credentials, remembers where the user was so the login flow can send them
//! back, and broadcasts [`SessionEvent::Expired`] to every subscriber.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::credential::CredentialStore;

/// Paths that never get recorded as a post-login redirect target.
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &["/login", "/register", "/forgot-password"];

/// Session-level notifications. Both variants carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The current session is no longer valid; the user must log in again.
    Expired,
    /// A fresh access token was stored.
    Refreshed,
}

/// Source of the current navigation path.
pub trait Location: Send + Sync {
    fn pathname(&self) -> Option<String>;
}

/// Location whose path is set by the host application as it navigates.
#[derive(Debug, Default)]
pub struct StaticLocation {
    path: RwLock<Option<String>>,
}

impl StaticLocation {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: RwLock::new(Some(path.into())) }
    }

    pub fn set(&self, path: impl Into<String>) {
        *self.path.write() = Some(path.into());
    }
}

impl Location for StaticLocation {
    fn pathname(&self) -> Option<String> {
        self.path.read().clone()
    }
}

/// Clears credentials and notifies listeners when a session ends.
pub struct SessionTeardown {
    store: Arc<dyn CredentialStore>,
    location: Arc<dyn Location>,
    public_paths: Vec<String>,
    redirect: RwLock<Option<String>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl SessionTeardown {
    pub fn new(store: Arc<dyn CredentialStore>, location: Arc<dyn Location>) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            store,
            location,
            public_paths: DEFAULT_PUBLIC_PATHS.iter().map(|p| (*p).to_owned()).collect(),
            redirect: RwLock::new(None),
            event_tx,
        }
    }

    /// Replace the set of public paths.
    pub fn with_public_paths(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        self.public_paths = paths.into_iter().collect();
        self
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// End the current session.
    ///
    /// Safe to call repeatedly: the store stays empty and the remembered path
    /// is kept unless a newer non-public one is available. Emits
    /// [`SessionEvent::Expired`] once per call.
    pub fn teardown(&self) {
        self.store.clear();

        match self.location.pathname() {
            Some(path) if !self.is_public(&path) => {
                debug!(path = %path, "remembering path for post-login redirect");
                *self.redirect.write() = Some(path);
            }
            _ => {}
        }

        let listeners = self.event_tx.send(SessionEvent::Expired).unwrap_or(0);
        info!(listeners, "session terminated");
    }

    /// Path recorded by the last teardown, if any.
    pub fn redirect_path(&self) -> Option<String> {
        self.redirect.read().clone()
    }

    /// Take the recorded path, clearing it. Called once login succeeds.
    pub fn take_redirect(&self) -> Option<String> {
        self.redirect.write().take()
    }

    /// Sender half of the event channel, for components that publish
    /// alongside teardown (e.g. refresh success).
    pub fn events(&self) -> broadcast::Sender<SessionEvent> {
        self.event_tx.clone()
    }

    fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|public| {
            path == public
                || path
                    .strip_prefix(public.as_str())
                    .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
        })
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
