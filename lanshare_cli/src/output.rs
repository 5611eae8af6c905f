//! Terminal output for the `share` command

use lanshare_core::{ItemKind, ShareSession};
use std::time::Duration;

/// Items listed in the banner before the rest is summarized
const MAX_LISTED_ITEMS: usize = 20;

const RULE: &str = "============================================================";

pub fn clear_screen() {
    print!("\x1B[2J\x1B[1;1H");
}

/// Banner shown once the server is up
pub fn print_banner(session: &ShareSession, ip: &str, url: &str) {
    println!();
    println!("{}", RULE);
    println!("LanShare - File Sharing Server Started!");
    println!("{}", RULE);
    println!();
    println!("Server IP:   {}", ip);
    println!("Port:        {}", session.port());
    println!("URL:         {}", url);

    if let Some(token) = session.access_token() {
        println!("Password:    Enabled");
        println!("Token:       {}", token);
    }
    if session.config().one_time {
        println!("One-time:    each item can be downloaded once");
    }

    let items = session.catalog().list_items();
    println!();
    println!("Sharing {} item(s):", items.len());
    for (i, item) in items.iter().take(MAX_LISTED_ITEMS).enumerate() {
        match (item.kind, item.file_count) {
            (ItemKind::ZippedFolder, Some(count)) => {
                println!("  {}. [dir]  {} ({}, {} files)", i + 1, item.name, item.size_human, count)
            }
            _ => println!("  {}. [file] {} ({})", i + 1, item.name, item.size_human),
        }
    }
    if items.len() > MAX_LISTED_ITEMS {
        println!("  ... and {} more", items.len() - MAX_LISTED_ITEMS);
    }
}

pub fn print_qr(qr: &str) {
    println!();
    println!("Scan this QR code with your phone camera:");
    println!("{}", qr);
}

pub fn print_footer(timeout: Option<Duration>) {
    println!();
    println!("Transfer:");
    println!("  - Connect your phone to the same WiFi");
    println!("  - Scan the QR code or visit the URL");
    println!("  - Download files directly to the phone");

    if let Some(timeout) = timeout {
        println!();
        println!("Server will auto-stop in {} seconds", timeout.as_secs());
    }

    println!();
    println!("{}", RULE);
    println!("Press Ctrl+C to stop sharing");
    println!("{}", RULE);
    println!();
}
