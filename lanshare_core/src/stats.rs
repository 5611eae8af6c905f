//! Usage counters for the running session.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub struct SessionStats {
    started_at: Instant,
    total_requests: AtomicU64,
    total_downloads: AtomicU64,
    clients: RwLock<HashSet<IpAddr>>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            total_downloads: AtomicU64::new(0),
            clients: RwLock::new(HashSet::new()),
        }
    }

    /// Count a request and remember where it came from
    pub async fn record_request(&self, client: Option<IpAddr>) {
        self.total_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(ip) = client {
            // Fast path: most requests come from a client we already know
            if self.clients.read().await.contains(&ip) {
                return;
            }
            self.clients.write().await.insert(ip);
        }
    }

    pub fn record_download(&self) {
        self.total_downloads.fetch_add(1, Ordering::SeqCst);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::SeqCst)
    }

    pub fn total_downloads(&self) -> u64 {
        self.total_downloads.load(Ordering::SeqCst)
    }

    pub async fn unique_clients(&self) -> usize {
        self.clients.read().await.len()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Payload of `GET /api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub port: u16,
    pub files_count: usize,
    pub uptime: String,
    pub total_requests: u64,
    pub total_downloads: u64,
    pub unique_clients: usize,
}

/// Format a duration as `H:MM:SS`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
