// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Order and booking projections, and helpers that watch them settle.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::client::AuthClient;
use crate::poller::{observe, PollHandle, PollOptions, StatusProjection};

/// Kind of status-bearing resource exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ResourceKind {
    Order,
    Booking,
}

impl ResourceKind {
    /// Path of resource `id`, relative to the API base.
    pub fn path(&self, id: &str) -> String {
        match self {
            Self::Order => format!("orders/{id}"),
            Self::Booking => format!("bookings/{id}"),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Order => f.write_str("order"),
            Self::Booking => f.write_str("booking"),
        }
    }
}

/// Status view of a resource. Fields the poller does not need are kept in
/// `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub status: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub type Order = Resource;
pub type Booking = Resource;

impl StatusProjection for Resource {
    fn status(&self) -> &str {
        &self.status
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(de)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Poll a resource of `kind` through `client` until it settles.
pub fn watch(
    client: &AuthClient,
    kind: ResourceKind,
    id: impl Into<String>,
    options: PollOptions,
) -> PollHandle<Resource> {
    let client = client.clone();
    observe(
        id,
        move |id: String| {
            let client = client.clone();
            async move { client.get_json::<Resource>(&kind.path(&id)).await }
        },
        options,
    )
}

pub fn watch_order(
    client: &AuthClient,
    id: impl Into<String>,
    options: PollOptions,
) -> PollHandle<Order> {
    watch(client, ResourceKind::Order, id, options)
}

pub fn watch_booking(
    client: &AuthClient,
    id: impl Into<String>,
    options: PollOptions,
) -> PollHandle<Booking> {
    watch(client, ResourceKind::Booking, id, options)
}

#[cfg(test)]
#[path = "orders_tests.rs"]
mod tests;
