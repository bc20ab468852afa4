// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access token refresh.
//!
//! At most one refresh request is in flight. Callers arriving while it runs
//! share its result; the slot is cleared as soon as it settles so the next
//! expiry starts a fresh attempt. A result is only stored while the refresh
//! token it was obtained with is still the stored one.

use std::sync::{Arc, Weak};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::credential::CredentialStore;
use crate::session::SessionEvent;

type RefreshFuture = Shared<BoxFuture<'static, Option<String>>>;

/// Body sent to the refresh endpoint.
#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Body returned by the refresh endpoint.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "accessToken", alias = "token")]
    access_token: String,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
}

struct Inner {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<dyn CredentialStore>,
    events: Option<broadcast::Sender<SessionEvent>>,
    in_flight: Mutex<Option<RefreshFuture>>,
}

/// Coordinates token refreshes across concurrent callers.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    /// Create a coordinator. When `events` is set, each successful refresh
    /// publishes [`SessionEvent::Refreshed`] on it.
    pub fn new(
        http: reqwest::Client,
        refresh_url: impl Into<String>,
        store: Arc<dyn CredentialStore>,
        events: Option<broadcast::Sender<SessionEvent>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                refresh_url: refresh_url.into(),
                store,
                events,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Obtain a new access token.
    ///
    /// Returns `None` when there is no refresh token, the refresh failed for
    /// any reason, or the session was torn down while it ran. Never errors.
    pub async fn refresh(&self) -> Option<String> {
        let operation = {
            let mut slot = self.inner.in_flight.lock();
            if let Some(existing) = slot.clone() {
                debug!("joining in-flight token refresh");
                existing
            } else {
                let Some(refresh_token) = self.inner.store.refresh_token() else {
                    debug!("no refresh token stored, skipping refresh");
                    return None;
                };
                let operation = self.start(refresh_token);
                *slot = Some(operation.clone());
                operation
            }
        };
        operation.await
    }

    fn start(&self, refresh_token: String) -> RefreshFuture {
        let http = self.inner.http.clone();
        let url = self.inner.refresh_url.clone();
        let store = Arc::clone(&self.inner.store);
        let events = self.inner.events.clone();
        let owner: Weak<Inner> = Arc::downgrade(&self.inner);

        async move {
            let token = match do_refresh(&http, &url, &refresh_token).await {
                // Teardown or a new login replaced the pair while the request ran.
                Ok(_) if store.refresh_token().as_deref() != Some(refresh_token.as_str()) => {
                    info!("session changed during token refresh, discarding result");
                    None
                }
                Ok(resp) => {
                    store.set_access_token(resp.access_token.clone());
                    if let Some(rotated) = resp.refresh_token {
                        store.set_refresh_token(rotated);
                    }
                    if let Some(ref tx) = events {
                        let _ = tx.send(SessionEvent::Refreshed);
                    }
                    info!("access token refreshed");
                    Some(resp.access_token)
                }
                Err(e) => {
                    warn!(err = %e, "token refresh failed");
                    None
                }
            };
            if let Some(inner) = owner.upgrade() {
                inner.in_flight.lock().take();
            }
            token
        }
        .boxed()
        .shared()
    }
}

/// Perform a single refresh request.
async fn do_refresh(
    client: &reqwest::Client,
    refresh_url: &str,
    refresh_token: &str,
) -> anyhow::Result<RefreshResponse> {
    let resp = client.post(refresh_url).json(&RefreshRequest { refresh_token }).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        anyhow::bail!("refresh failed ({status}): {text}");
    }

    let body: RefreshResponse = resp.json().await?;
    if body.access_token.is_empty() {
        anyhow::bail!("refresh response carried an empty access token");
    }
    Ok(body)
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
