// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated HTTP client.
//!
//! Attaches the stored access token to every request. A 401 whose body reads
//! as an expired session triggers one shared token refresh and exactly one
//! retry; if that cannot recover the session, credentials are torn down and
//! the caller gets [`FetchError::SessionTerminated`]. Every other response is
//! returned untouched.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, ResponseBuilderExt, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::classify::is_session_expired;
use crate::credential::{CredentialStore, MemoryStore};
use crate::error::FetchError;
use crate::refresh::RefreshCoordinator;
use crate::session::{Location, SessionEvent, SessionTeardown, StaticLocation};

/// Retries allowed after an expired-session 401.
pub const MAX_AUTH_RETRIES: u32 = 1;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Method, headers and body of a request. Cheap to reuse across a retry.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self { method, headers: HeaderMap::new(), body: None }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, FetchError> {
        let body = serde_json::to_vec(value).map_err(|e| FetchError::Decode(e.to_string()))?;
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

/// Result of one attempt.
enum Attempt {
    /// Final response for the caller.
    Done(reqwest::Response),
    /// 401 classified as an expired session.
    Expired,
}

/// HTTP client that manages bearer credentials for its caller.
#[derive(Clone)]
pub struct AuthClient {
    base_url: Url,
    http: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    refresher: RefreshCoordinator,
    teardown: Arc<SessionTeardown>,
}

impl AuthClient {
    /// Start building a client. `refresh_url` may be relative to `base_url`.
    pub fn builder(base_url: impl Into<String>, refresh_url: impl Into<String>) -> AuthClientBuilder {
        AuthClientBuilder {
            base_url: base_url.into(),
            refresh_url: refresh_url.into(),
            store: None,
            location: None,
            teardown: None,
            public_paths: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub fn teardown(&self) -> &Arc<SessionTeardown> {
        &self.teardown
    }

    /// Subscribe to session events (expiry, refresh).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.teardown.subscribe()
    }

    /// Issue an authenticated request.
    ///
    /// `url` is absolute or relative to the base URL. Non-401 responses and
    /// 401s that are not session expiry come back as-is; the caller decides
    /// what a 403 or 500 means.
    pub async fn request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<reqwest::Response, FetchError> {
        let url = self.resolve(url)?;
        let Some(mut token) = self.store.access_token() else {
            debug!(%url, "no access token, request not sent");
            return Err(FetchError::Unauthenticated);
        };

        let mut attempt = 0;
        loop {
            match self.attempt(&url, &options, &token, attempt).await? {
                Attempt::Done(resp) => return Ok(resp),
                Attempt::Expired if attempt < MAX_AUTH_RETRIES => {
                    match self.refresher.refresh().await {
                        Some(fresh) => {
                            token = fresh;
                            attempt += 1;
                        }
                        None => return Err(self.terminate(&url, "token refresh failed")),
                    }
                }
                Attempt::Expired => {
                    return Err(self.terminate(&url, "retry with refreshed token expired"))
                }
            }
        }
    }

    /// Issue a request and decode a successful JSON body.
    ///
    /// Non-success statuses become [`FetchError::Status`].
    pub async fn json<T: DeserializeOwned>(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<T, FetchError> {
        let resp = self.request(url, options).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// `GET` and decode JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        self.json(url, RequestOptions::get()).await
    }

    async fn attempt(
        &self,
        url: &Url,
        options: &RequestOptions,
        token: &str,
        attempt: u32,
    ) -> Result<Attempt, FetchError> {
        let mut headers = options.headers.clone();
        headers.insert(AUTHORIZATION, bearer_value(token)?);

        let mut req = self.http.request(options.method.clone(), url.clone()).headers(headers);
        if let Some(ref body) = options.body {
            req = req.body(body.clone());
        }
        let resp = req.send().await.map_err(FetchError::Transport)?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            debug!(%url, attempt, status = resp.status().as_u16(), "request complete");
            return Ok(Attempt::Done(resp));
        }

        let mut head = http::Response::builder().status(resp.status()).version(resp.version());
        if let Some(headers) = head.headers_mut() {
            *headers = resp.headers().clone();
        }
        if let Some(extensions) = head.extensions_mut() {
            *extensions = resp.extensions().clone();
        }
        let head = head.url(resp.url().clone());
        let body = resp.bytes().await.map_err(FetchError::Transport)?;

        if is_session_expired(String::from_utf8_lossy(&body).as_ref()) {
            debug!(%url, attempt, "401 reads as expired session");
            Ok(Attempt::Expired)
        } else {
            debug!(%url, attempt, "401 is not a session expiry, passing through");
            Ok(Attempt::Done(rehydrate(head, body)?))
        }
    }

    fn terminate(&self, url: &Url, reason: &str) -> FetchError {
        warn!(%url, reason, "session could not be recovered");
        self.teardown.teardown();
        FetchError::SessionTerminated
    }

    fn resolve(&self, url: &str) -> Result<Url, FetchError> {
        resolve_url(&self.base_url, url)
    }
}

/// Builder for [`AuthClient`].
pub struct AuthClientBuilder {
    base_url: String,
    refresh_url: String,
    store: Option<Arc<dyn CredentialStore>>,
    location: Option<Arc<dyn Location>>,
    teardown: Option<Arc<SessionTeardown>>,
    public_paths: Option<Vec<String>>,
    timeout: Duration,
}

impl AuthClientBuilder {
    /// Credential store. Defaults to an empty [`MemoryStore`].
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Navigation source used to remember the page on teardown.
    pub fn location(mut self, location: Arc<dyn Location>) -> Self {
        self.location = Some(location);
        self
    }

    /// Use an existing teardown. It must wrap the same store.
    pub fn teardown(mut self, teardown: Arc<SessionTeardown>) -> Self {
        self.teardown = Some(teardown);
        self
    }

    pub fn public_paths(mut self, paths: Vec<String>) -> Self {
        self.public_paths = Some(paths);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<AuthClient, FetchError> {
        let base_url = parse_base_url(&self.base_url)?;
        let refresh_url = resolve_url(&base_url, &self.refresh_url)?;
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn CredentialStore>);
        let teardown = match self.teardown {
            Some(t) => t,
            None => {
                let location = self
                    .location
                    .unwrap_or_else(|| Arc::new(StaticLocation::default()) as Arc<dyn Location>);
                let mut t = SessionTeardown::new(Arc::clone(&store), location);
                if let Some(paths) = self.public_paths {
                    t = t.with_public_paths(paths);
                }
                Arc::new(t)
            }
        };
        let http = http_client(self.timeout)?;
        let refresher = RefreshCoordinator::new(
            http.clone(),
            refresh_url.to_string(),
            Arc::clone(&store),
            Some(teardown.events()),
        );
        Ok(AuthClient { base_url, http, store, refresher, teardown })
    }
}

/// Build the shared reqwest client.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    crate::ensure_crypto();
    reqwest::Client::builder().timeout(timeout).build().map_err(FetchError::Transport)
}

fn bearer_value(token: &str) -> Result<HeaderValue, FetchError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        warn!("stored access token is not a valid header value");
        FetchError::Unauthenticated
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Rebuild a response whose body was already read, so the caller can read it.
/// `head` carries the original status, version, headers, extensions and URL.
fn rehydrate(
    head: http::response::Builder,
    body: Bytes,
) -> Result<reqwest::Response, FetchError> {
    let resp = head
        .body(body)
        .map_err(|e| FetchError::Decode(format!("rebuilding 401 response: {e}")))?;
    Ok(reqwest::Response::from(resp))
}

fn parse_base_url(raw: &str) -> Result<Url, FetchError> {
    let mut raw = raw.to_owned();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))
}

/// Absolute URLs pass through; anything else resolves under `base`, with a
/// leading `/` ignored so paths stay below the base path.
fn resolve_url(base: &Url, url: &str) -> Result<Url, FetchError> {
    if let Ok(absolute) = Url::parse(url) {
        return Ok(absolute);
    }
    base.join(url.trim_start_matches('/'))
        .map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
