use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use lanshare_core::constants::{DEFAULT_PORT, PORT_SCAN_ATTEMPTS};
use lanshare_core::{SessionConfig, ShareSession, resolve_paths};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

mod client;
mod net;
mod output;
mod qr;

/// Seconds between stats lines in verbose mode
const STATS_INTERVAL_SECS: u64 = 10;

#[derive(Parser, Debug)]
#[command(name = "lanshare")]
#[command(version, about = "Share files with devices on the same network")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Share files and folders over HTTP
    Share(ShareArgs),

    /// Show statistics of a running server
    Status {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Stop a running server
    Stop {
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(Args, Debug)]
struct ShareArgs {
    /// Files or folders to share
    #[arg(required = true)]
    paths: Vec<String>,

    /// Port to listen on (0 = first free port from 8000)
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Serve every file of a folder instead of one zip per folder
    #[arg(long)]
    no_zip: bool,

    /// Require an access token, shown in the banner and QR code
    #[arg(long)]
    password: Option<String>,

    /// Stop automatically after this many seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Each item can be downloaded only once
    #[arg(long)]
    one_time: bool,

    /// Do not print the terminal QR code
    #[arg(long)]
    no_qr: bool,

    /// Also write the QR code as a PNG image
    #[arg(long, value_name = "FILE")]
    qr_png: Option<PathBuf>,

    /// Clear the screen before printing the banner
    #[arg(long)]
    clean: bool,
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Share(args) => run_share(args, cli.verbose).await,
        Commands::Status { port } => run_status(port).await,
        Commands::Stop { port } => run_stop(port).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn session_config(args: &ShareArgs, port: u16) -> SessionConfig {
    SessionConfig {
        port,
        zip_folders: !args.no_zip,
        password: args.password.clone(),
        timeout: args.timeout.map(Duration::from_secs),
        one_time: args.one_time,
        ..Default::default()
    }
}

async fn run_share(args: ShareArgs, verbose: bool) -> Result<()> {
    let shared = resolve_paths(args.paths.as_slice())?;

    let port = match args.port {
        0 => net::find_available_port(DEFAULT_PORT, PORT_SCAN_ATTEMPTS)?,
        port => port,
    };

    let session = ShareSession::new(shared, session_config(&args, port))
        .context("Failed to prepare shared items")?;
    session.start().await.context("Failed to start server")?;

    let ip = net::local_lan_ip().to_string();
    let url = session.url_for(&ip);

    if args.clean {
        output::clear_screen();
    }
    output::print_banner(&session, &ip, &url);

    if !args.no_qr {
        match qr::render_terminal(&url) {
            Ok(code) => output::print_qr(&code),
            Err(e) => tracing::warn!("Could not render QR code: {:#}", e),
        }
    }
    if let Some(path) = &args.qr_png {
        qr::save_png(&url, path)?;
        println!("QR code saved to {}", path.display());
    }

    output::print_footer(session.config().timeout);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping server");
        }
        _ = session.wait() => {}
        _ = report_stats(&session), if verbose => {}
    }

    session.stop().await;
    println!("Server stopped");
    Ok(())
}

/// Log statistics periodically until the session stops
async fn report_stats(session: &ShareSession) {
    let mut interval = tokio::time::interval(Duration::from_secs(STATS_INTERVAL_SECS));
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(status) = session.status().await else {
            return;
        };
        tracing::debug!(
            "uptime {} | requests {} | downloads {} | clients {}",
            status.uptime,
            status.total_requests,
            status.total_downloads,
            status.unique_clients
        );
    }
}

async fn run_status(port: u16) -> Result<()> {
    let status = client::fetch_status(port)
        .await
        .with_context(|| format!("No LanShare server found on port {}", port))?;
    println!("{}", client::format_status(port, &status));
    Ok(())
}

async fn run_stop(port: u16) -> Result<()> {
    client::request_shutdown(port)
        .await
        .with_context(|| format!("No LanShare server found on port {}", port))?;
    println!("LanShare server on port {} is shutting down", port);
    Ok(())
}
