//! Talk to a share server running on this machine

use anyhow::{Result, bail};
use lanshare_core::StatusReport;
use std::time::Duration;

/// Timeout for local status / stop requests
const REQUEST_TIMEOUT_SECS: u64 = 2;

fn client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?)
}

/// Fetch `/api/status` from the server on `port`
pub async fn fetch_status(port: u16) -> Result<StatusReport> {
    let response = client()?
        .get(format!("http://127.0.0.1:{}/api/status", port))
        .send()
        .await?;

    if !response.status().is_success() {
        bail!("server answered {}", response.status());
    }
    Ok(response.json().await?)
}

/// Ask the server on `port` to shut down
pub async fn request_shutdown(port: u16) -> Result<()> {
    let response = client()?
        .get(format!("http://127.0.0.1:{}/shutdown", port))
        .send()
        .await?;

    if !response.status().is_success() {
        bail!("server answered {}", response.status());
    }
    Ok(())
}

/// One line per field of a status payload
pub fn format_status(port: u16, status: &StatusReport) -> String {
    [
        format!("LanShare server is running on port {}", port),
        format!("  Files being shared: {}", status.files_count),
        format!("  Uptime:             {}", status.uptime),
        format!("  Total downloads:    {}", status.total_downloads),
        format!("  Total requests:     {}", status.total_requests),
        format!("  Unique clients:     {}", status.unique_clients),
    ]
    .join("\n")
}
