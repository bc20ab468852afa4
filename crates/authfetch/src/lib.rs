// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authfetch: bearer-authenticated backend client with single-flight token
//! refresh, session teardown and status polling.

pub mod classify;
pub mod client;
pub mod config;
pub mod credential;
pub mod error;
pub mod orders;
pub mod poller;
pub mod refresh;
pub mod session;

#[cfg(test)]
pub mod test_support;

use std::sync::{Arc, Once};

use tracing::info;

use crate::client::{AuthClient, RequestOptions};
use crate::config::{Cli, Command};
use crate::credential::{Credential, CredentialStore, FileStore};
use crate::poller::PollOutcome;

pub use crate::classify::is_session_expired;
pub use crate::client::MAX_AUTH_RETRIES;
pub use crate::error::{FetchError, PollError};
pub use crate::poller::observe;
pub use crate::session::SessionEvent;

/// Install the rustls crypto provider. Safe to call more than once.
pub fn ensure_crypto() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Execute one CLI command.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli { config, command } = cli;
    config.validate()?;

    let store = Arc::new(FileStore::in_dir(&config.state_dir()));
    let client = AuthClient::builder(&config.base_url, &config.refresh_path)
        .store(Arc::clone(&store) as Arc<dyn CredentialStore>)
        .public_paths(config.public_paths.clone())
        .timeout(config.request_timeout())
        .build()?;

    match command {
        Command::Login { access_token, refresh_token } => {
            let credential = Credential::new(access_token, refresh_token);
            if !credential.is_authenticated() {
                anyhow::bail!("both an access token and a refresh token are required");
            }
            client.store().set_credential(credential);
            info!(path = %store.path().display(), "credentials stored");
            println!("logged in");
        }
        Command::Logout => {
            client.teardown().teardown();
            println!("logged out");
        }
        Command::Status => {
            let snapshot = client.store().snapshot();
            let report = serde_json::json!({
                "authenticated": snapshot.is_authenticated(),
                "access_token": snapshot.access_token.is_some(),
                "refresh_token": snapshot.refresh_token.is_some(),
                "store": store.path(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Refresh => {
            if client.refresher().refresh().await.is_none() {
                anyhow::bail!("token refresh failed; log in again");
            }
            println!("token refreshed");
        }
        Command::Get { path } => {
            let resp = client.request(&path, RequestOptions::get()).await?;
            let status = resp.status();
            let body = resp.text().await?;
            println!("{body}");
            if !status.is_success() {
                anyhow::bail!("{path} returned {status}");
            }
        }
        Command::Watch { kind, id } => {
            let mut handle = orders::watch(&client, kind, id.clone(), config.poll_options());
            let finished = tokio::select! {
                state = handle.wait() => Some(state),
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(state) = finished else {
                handle.cancel();
                anyhow::bail!("watch of {kind} {id} interrupted");
            };
            let status = state.status.as_deref().unwrap_or("unknown");
            match state.outcome {
                PollOutcome::Succeeded => println!("{kind} {id}: {status}"),
                PollOutcome::Failed => anyhow::bail!("{kind} {id} failed: {status}"),
                PollOutcome::TimedOut => {
                    let reason = state.error.map(|e| e.to_string()).unwrap_or_default();
                    anyhow::bail!("{kind} {id} still {status}: {reason}");
                }
                PollOutcome::Pending | PollOutcome::Cancelled => {
                    anyhow::bail!("{kind} {id} ended without a final status")
                }
            }
        }
    }
    Ok(())
}
