//! Token gating and one-time download bookkeeping.

use crate::catalog::Catalog;
use std::collections::HashSet;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Gone,
    NotFound,
}

/// Generate a random access token (32 hex characters, 128 bits)
pub fn generate_access_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Compare two secrets without short-circuiting on the first mismatch
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub struct AccessPolicy {
    token: Option<String>,
    one_time: bool,
    /// Items already handed out in one-time mode
    ledger: Mutex<HashSet<String>>,
}

impl AccessPolicy {
    pub fn new(token: Option<String>, one_time: bool) -> Self {
        Self {
            token,
            one_time,
            ledger: Mutex::new(HashSet::new()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn one_time(&self) -> bool {
        self.one_time
    }

    pub fn authorize(&self, presented: Option<&str>) -> Access {
        match (&self.token, presented) {
            (None, _) => Access::Allow,
            (Some(expected), Some(given))
                if constant_time_eq(expected.as_bytes(), given.as_bytes()) =>
            {
                Access::Allow
            }
            _ => Access::Deny,
        }
    }

    /// Whether `name` can be downloaded right now
    pub async fn check_availability(&self, name: &str, catalog: &Catalog) -> Availability {
        if catalog.resolve_route(name).is_none() {
            return Availability::NotFound;
        }
        if self.one_time && self.ledger.lock().await.contains(name) {
            return Availability::Gone;
        }
        Availability::Available
    }

    /// Mark `name` as downloaded, immediately before its body is streamed.
    ///
    /// Always `true` outside one-time mode. In one-time mode this is an
    /// atomic test-and-set: only the first caller for an item gets `true`,
    /// so of two concurrent requests that both passed
    /// [`check_availability`](Self::check_availability) exactly one wins.
    pub async fn record_download(&self, name: &str) -> bool {
        if !self.one_time {
            return true;
        }
        self.ledger.lock().await.insert(name.to_string())
    }

    pub async fn consumed_count(&self) -> usize {
        self.ledger.lock().await.len()
    }
}
