// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::{is_session_expired, Payload};

#[yare::parameterized(
    token_expired = { "token expired", true },
    token_expired_title = { "Token Expired", true },
    jwt_upper = { "JWT EXPIRED", true },
    has_expired = { "Your token has expired", true },
    expired_token = { "expired token supplied", true },
    invalid_token = { "Invalid token", true },
    unauthorized = { "unauthorized access", true },
    session = { "Session expired, please sign in", true },
    forbidden = { "insufficient permissions", false },
    not_owner = { "you do not own this booking", false },
    empty = { "", false },
    garbage = { "\u{0}\u{1}xyzzy", false },
)]
fn classify_text(body: &str, expected: bool) {
    assert_eq!(is_session_expired(body), expected);
}

#[test]
fn classify_json_object_message() {
    assert!(is_session_expired(&json!({ "message": "JWT EXPIRED" })));
    assert!(is_session_expired(&json!({ "error": { "detail": "Token Expired" } })));
    assert!(!is_session_expired(&json!({ "message": "insufficient permissions" })));
}

#[test]
fn classify_json_string_uses_content() {
    assert!(is_session_expired(&json!("Unauthorized")));
    assert!(!is_session_expired(&json!("forbidden")));
}

#[test]
fn classify_non_text_json_is_not_expired() {
    assert!(!is_session_expired(&json!(null)));
    assert!(!is_session_expired(&json!(401)));
    assert!(!is_session_expired(&json!([])));
}

#[test]
fn payload_from_owned_string() {
    let body = String::from("Session Expired");
    assert!(is_session_expired(&body));
    assert!(matches!(Payload::from(&body), Payload::Text(_)));
}
