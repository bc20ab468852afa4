// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status poller for outcomes decided out of band (payment webhooks).
//!
//! [`observe`] spawns a task that fetches a resource once immediately (even
//! with a zero timeout), then every `interval`, until its status lands in a
//! terminal set, the timeout elapses, or the handle is cancelled. State is
//! published on a [`watch`] channel; after [`PollHandle::cancel`] returns no
//! further state change is ever published.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::PollError;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(60000);

/// A resource that exposes a status string.
pub trait StatusProjection {
    fn status(&self) -> &str;
}

/// Where a poll session ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollOutcome {
    Pending,
    Succeeded,
    Failed,
    TimedOut,
    /// Reported by the handle only; the published state never carries it.
    Cancelled,
}

impl PollOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PollOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a poll session.
#[derive(Debug, Clone)]
pub struct PollState<T> {
    /// Last status observed, kept through a timeout.
    pub status: Option<String>,
    /// Last successfully fetched resource.
    pub result: Option<T>,
    /// Last transient fetch error, or the timeout. Cleared by a good fetch.
    pub error: Option<PollError>,
    pub done: bool,
    pub outcome: PollOutcome,
    /// Fetches that completed (successfully or not).
    pub fetches: u32,
}

impl<T> Default for PollState<T> {
    fn default() -> Self {
        Self {
            status: None,
            result: None,
            error: None,
            done: false,
            outcome: PollOutcome::Pending,
            fetches: 0,
        }
    }
}

impl<T> PollState<T> {
    /// Still waiting on a terminal status.
    pub fn is_loading(&self) -> bool {
        !self.done
    }
}

/// Terminal sets and timing for a poll session.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub terminal_success: Vec<String>,
    pub terminal_failure: Vec<String>,
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollOptions {
    pub fn new<S, F>(success: S, failure: F) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            terminal_success: success.into_iter().map(Into::into).collect(),
            terminal_failure: failure.into_iter().map(Into::into).collect(),
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Payment confirmation statuses.
    pub fn payment() -> Self {
        Self::new(
            ["CONFIRMED", "PAID", "COMPLETED"],
            ["PAYMENT_FAILED", "CANCELLED", "FAILED", "EXPIRED"],
        )
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Map a status to an outcome. Comparison ignores ASCII case.
    pub fn classify(&self, status: &str) -> PollOutcome {
        let status = status.trim();
        if self.terminal_success.iter().any(|s| s.eq_ignore_ascii_case(status)) {
            PollOutcome::Succeeded
        } else if self.terminal_failure.iter().any(|s| s.eq_ignore_ascii_case(status)) {
            PollOutcome::Failed
        } else {
            PollOutcome::Pending
        }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::payment()
    }
}

type Publisher<T> = Arc<Mutex<Option<watch::Sender<PollState<T>>>>>;

/// Publish `state` unless the session was cancelled. Returns `false` once
/// the publisher is detached.
fn publish<T: Clone>(publisher: &Publisher<T>, state: &PollState<T>) -> bool {
    match publisher.lock().as_ref() {
        Some(tx) => {
            tx.send_replace(state.clone());
            true
        }
        None => false,
    }
}

/// Start polling `resource_id` with `fetch`.
///
/// Must be called within a Tokio runtime.
pub fn observe<T, F, Fut, E>(
    resource_id: impl Into<String>,
    fetch: F,
    options: PollOptions,
) -> PollHandle<T>
where
    T: StatusProjection + Clone + Send + Sync + 'static,
    F: FnMut(String) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let resource_id = resource_id.into();
    let (tx, rx) = watch::channel(PollState::default());
    let publisher: Publisher<T> = Arc::new(Mutex::new(Some(tx)));
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run(
        resource_id.clone(),
        fetch,
        options,
        Arc::clone(&publisher),
        cancel.clone(),
    ));

    PollHandle { resource_id, rx, publisher, cancel, task }
}

async fn run<T, F, Fut, E>(
    resource_id: String,
    mut fetch: F,
    options: PollOptions,
    publisher: Publisher<T>,
    cancel: CancellationToken,
) where
    T: StatusProjection + Clone + Send + Sync + 'static,
    F: FnMut(String) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let deadline = tokio::time::sleep_until(Instant::now() + options.timeout);
    tokio::pin!(deadline);
    let mut interval = tokio::time::interval(options.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut state = PollState::<T>::default();
    debug!(resource = %resource_id, "poll started");

    // The first fetch always runs to completion, whatever the timeout.
    let mut first = true;
    loop {
        let timed_out = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = &mut deadline, if !first => true,
            _ = interval.tick() => false,
        };
        let fetched = if timed_out {
            None
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = &mut deadline, if !first => None,
                r = fetch(resource_id.clone()) => Some(r),
            }
        };
        first = false;

        let Some(fetched) = fetched else {
            state.error = Some(PollError::Timeout(options.timeout));
            state.done = true;
            state.outcome = PollOutcome::TimedOut;
            if publish(&publisher, &state) {
                warn!(resource = %resource_id, fetches = state.fetches, "poll timed out");
            }
            break;
        };

        state.fetches += 1;
        match fetched {
            Ok(resource) => {
                let status = resource.status().to_owned();
                let outcome = options.classify(&status);
                debug!(resource = %resource_id, status = %status, "poll fetched");
                state.status = Some(status);
                state.result = Some(resource);
                state.error = None;
                if outcome != PollOutcome::Pending {
                    state.done = true;
                    state.outcome = outcome;
                }
            }
            Err(e) => {
                debug!(resource = %resource_id, err = %e, "poll fetch failed");
                state.error = Some(PollError::Fetch(e.to_string()));
            }
        }

        if !publish(&publisher, &state) {
            break;
        }
        if state.done {
            info!(
                resource = %resource_id,
                outcome = %state.outcome,
                fetches = state.fetches,
                "poll finished"
            );
            break;
        }
    }

    publisher.lock().take();
}

/// Handle to a running poll session. Dropping it cancels the session.
pub struct PollHandle<T> {
    resource_id: String,
    rx: watch::Receiver<PollState<T>>,
    publisher: Publisher<T>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl<T: Clone> PollHandle<T> {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    /// Current state snapshot.
    pub fn state(&self) -> PollState<T> {
        self.rx.borrow().clone()
    }

    /// Outcome as seen by this handle: [`PollOutcome::Cancelled`] when the
    /// session was cancelled before finishing.
    pub fn outcome(&self) -> PollOutcome {
        let state = self.rx.borrow();
        if !state.done && self.cancel.is_cancelled() {
            PollOutcome::Cancelled
        } else {
            state.outcome
        }
    }

    /// Independent receiver of state updates.
    pub fn subscribe(&self) -> watch::Receiver<PollState<T>> {
        self.rx.clone()
    }

    /// Wait for the next published state. Returns `false` once the session
    /// has ended and nothing more will be published.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Wait until the session finishes (terminal status, timeout or cancel)
    /// and return the final state.
    pub async fn wait(&mut self) -> PollState<T> {
        loop {
            if self.rx.borrow_and_update().done {
                break;
            }
            if self.rx.changed().await.is_err() {
                break;
            }
        }
        self.rx.borrow().clone()
    }

    /// Stop polling. No state change is published after this returns.
    pub fn cancel(&self) {
        if self.publisher.lock().take().is_some() {
            debug!(resource = %self.resource_id, "poll cancelled");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<T> Drop for PollHandle<T> {
    fn drop(&mut self) {
        self.publisher.lock().take();
        self.cancel.cancel();
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
