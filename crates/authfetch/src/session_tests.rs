// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use tokio::sync::broadcast::error::TryRecvError;

use super::{SessionEvent, SessionTeardown, StaticLocation};
use crate::credential::{Credential, CredentialStore, MemoryStore};

fn teardown_at(path: &str) -> (SessionTeardown, Arc<MemoryStore>, Arc<StaticLocation>) {
    let store = Arc::new(MemoryStore::with_credential(Credential::new("acc", "ref")));
    let location = Arc::new(StaticLocation::new(path));
    let teardown = SessionTeardown::new(
        Arc::clone(&store) as Arc<dyn CredentialStore>,
        Arc::clone(&location) as Arc<dyn super::Location>,
    );
    (teardown, store, location)
}

#[test]
fn teardown_clears_store_and_records_path() {
    let (teardown, store, _loc) = teardown_at("/bookings/42");
    let mut rx = teardown.subscribe();

    teardown.teardown();

    assert_eq!(store.snapshot(), Credential::default());
    assert_eq!(teardown.redirect_path().as_deref(), Some("/bookings/42"));
    assert_eq!(rx.try_recv(), Ok(SessionEvent::Expired));
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn teardown_twice_is_idempotent() {
    let (teardown, store, _loc) = teardown_at("/checkout");
    let mut rx = teardown.subscribe();

    teardown.teardown();
    teardown.teardown();

    assert_eq!(store.access_token(), None);
    assert_eq!(store.refresh_token(), None);
    assert_eq!(teardown.redirect_path().as_deref(), Some("/checkout"));
    // One signal per call.
    assert_eq!(rx.try_recv(), Ok(SessionEvent::Expired));
    assert_eq!(rx.try_recv(), Ok(SessionEvent::Expired));
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
}

#[yare::parameterized(
    login = { "/login" },
    login_query = { "/login?next=1" },
    register_sub = { "/register/confirm" },
    forgot = { "/forgot-password" },
)]
fn teardown_skips_public_paths(path: &str) {
    let (teardown, _store, _loc) = teardown_at(path);
    teardown.teardown();
    assert_eq!(teardown.redirect_path(), None);
}

#[test]
fn public_prefix_does_not_match_longer_segment() {
    let (teardown, _store, _loc) = teardown_at("/loginhelp");
    teardown.teardown();
    assert_eq!(teardown.redirect_path().as_deref(), Some("/loginhelp"));
}

#[test]
fn second_teardown_on_public_path_keeps_first_redirect() {
    let (teardown, _store, location) = teardown_at("/orders/7");
    teardown.teardown();
    location.set("/login");
    teardown.teardown();
    assert_eq!(teardown.redirect_path().as_deref(), Some("/orders/7"));
}

#[test]
fn take_redirect_consumes_path() {
    let (teardown, _store, _loc) = teardown_at("/orders/7");
    teardown.teardown();
    assert_eq!(teardown.take_redirect().as_deref(), Some("/orders/7"));
    assert_eq!(teardown.take_redirect(), None);
}

#[test]
fn custom_public_paths() {
    let (teardown, _store, _loc) = teardown_at("/shop");
    let teardown = teardown.with_public_paths(vec!["/shop".to_owned()]);
    teardown.teardown();
    assert_eq!(teardown.redirect_path(), None);
}

#[test]
fn teardown_without_listeners_does_not_fail() {
    let (teardown, store, _loc) = teardown_at("/cart");
    teardown.teardown();
    assert_eq!(store.access_token(), None);
}
