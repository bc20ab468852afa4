// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recognize expired-session error payloads in 401 response bodies.

use serde_json::Value;

/// Lowercase phrases that mark a 401 as an expired or invalid session rather
/// than a permission denial.
pub const EXPIRY_PHRASES: &[&str] = &[
    "token expired",
    "jwt expired",
    "token has expired",
    "expired token",
    "invalid token",
    "unauthorized",
    "session expired",
];

/// Error payload as returned by the backend: raw body text or decoded JSON.
#[derive(Debug, Clone, Copy)]
pub enum Payload<'a> {
    Text(&'a str),
    Json(&'a Value),
}

impl<'a> From<&'a str> for Payload<'a> {
    fn from(text: &'a str) -> Self {
        Self::Text(text)
    }
}

impl<'a> From<&'a String> for Payload<'a> {
    fn from(text: &'a String) -> Self {
        Self::Text(text)
    }
}

impl<'a> From<&'a Value> for Payload<'a> {
    fn from(value: &'a Value) -> Self {
        Self::Json(value)
    }
}

impl Payload<'_> {
    /// Lowercased text form used for matching. Empty when nothing usable.
    fn normalized(&self) -> String {
        match self {
            Self::Text(text) => text.to_lowercase(),
            Self::Json(Value::Null) => String::new(),
            Self::Json(Value::String(s)) => s.to_lowercase(),
            Self::Json(value) => serde_json::to_string(value).unwrap_or_default().to_lowercase(),
        }
    }
}

/// Whether an error payload describes an expired or invalid session.
///
/// Case-insensitive substring match against [`EXPIRY_PHRASES`].
pub fn is_session_expired<'a>(payload: impl Into<Payload<'a>>) -> bool {
    let text = payload.into().normalized();
    if text.is_empty() {
        return false;
    }
    EXPIRY_PHRASES.iter().any(|phrase| text.contains(phrase))
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
