//! Session controller: owns the server lifecycle.
//!
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`. A stop can come
//! from [`ShareSession::stop`], a loopback `/shutdown` request or the
//! optional timeout; all of them go through the same cancellation token.

use crate::access::{AccessPolicy, generate_access_token};
use crate::catalog::Catalog;
use crate::config::SessionConfig;
use crate::error::ShareError;
use crate::http_share::{ShareState, create_router, serve};
use crate::paths::SharedPath;
use crate::stats::StatusReport;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// How long aborted connections get to close before the server task is dropped
const ABORT_WAIT: Duration = Duration::from_secs(1);

struct RunningServer {
    addr: SocketAddr,
    state: Arc<ShareState>,
    stop_token: CancellationToken,
}

pub struct ShareSession {
    config: SessionConfig,
    shared: Vec<SharedPath>,
    catalog: Arc<Catalog>,
    access_token: Option<String>,
    state_tx: Arc<watch::Sender<SessionState>>,
    running: Mutex<Option<RunningServer>>,
    bound_port: AtomicU16,
}

impl ShareSession {
    /// Prepare a session; the catalog is built here so route collisions
    /// surface before anything is bound
    pub fn new(shared: Vec<SharedPath>, config: SessionConfig) -> Result<Self, ShareError> {
        if shared.is_empty() {
            return Err(ShareError::NoValidPaths);
        }
        let catalog = Catalog::build(&shared, config.zip_folders)?;
        let access_token = config.password.as_ref().map(|_| generate_access_token());
        let (state_tx, _) = watch::channel(SessionState::Stopped);

        Ok(Self {
            config,
            shared,
            catalog: Arc::new(catalog),
            access_token,
            state_tx: Arc::new(state_tx),
            running: Mutex::new(None),
            bound_port: AtomicU16::new(0),
        })
    }

    /// Bind the listener and start serving in the background.
    ///
    /// Returns the bound address. Calling it on a running session returns
    /// the existing address.
    pub async fn start(&self) -> Result<SocketAddr, ShareError> {
        let mut running = self.running.lock().await;

        match self.state() {
            SessionState::Running => {
                if let Some(server) = running.as_ref() {
                    return Ok(server.addr);
                }
            }
            SessionState::Stopping => self.wait().await,
            _ => {}
        }

        self.state_tx.send_replace(SessionState::Starting);

        let addr = SocketAddr::new(self.config.host, self.config.port);
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state_tx.send_replace(SessionState::Stopped);
                return Err(ShareError::Bind { addr, source });
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(local_addr) => local_addr,
            Err(e) => {
                self.state_tx.send_replace(SessionState::Stopped);
                return Err(e.into());
            }
        };

        let stop_token = CancellationToken::new();
        let policy = AccessPolicy::new(self.access_token.clone(), self.config.one_time);
        let state = Arc::new(ShareState::new(
            self.catalog.clone(),
            policy,
            local_addr.port(),
            stop_token.clone(),
        ));
        let router = create_router(state.clone());
        let server = tokio::spawn(serve(listener, router, stop_token.clone()));

        self.bound_port.store(local_addr.port(), Ordering::SeqCst);
        self.state_tx.send_replace(SessionState::Running);

        if let Some(timeout) = self.config.timeout {
            spawn_timeout(timeout, stop_token.clone());
        }
        tokio::spawn(supervise(
            server,
            stop_token.clone(),
            state.transfer_abort.clone(),
            self.config.shutdown_grace,
            self.state_tx.clone(),
        ));

        tracing::info!(
            "Sharing {} item(s) on http://{}",
            self.catalog.files_count(),
            local_addr
        );

        *running = Some(RunningServer {
            addr: local_addr,
            state,
            stop_token,
        });
        Ok(local_addr)
    }

    /// Ask the session to stop without waiting for it
    pub async fn request_stop(&self) {
        if let Some(server) = self.running.lock().await.as_ref() {
            server.stop_token.cancel();
        }
    }

    /// Stop the server and wait for it to finish. No-op when already stopped.
    pub async fn stop(&self) {
        if self.state() == SessionState::Stopped {
            return;
        }
        self.request_stop().await;
        self.wait().await;
    }

    /// Block until the session reaches `Stopped`
    pub async fn wait(&self) {
        let mut rx = self.state_tx.subscribe();
        let _ = rx.wait_for(|state| *state == SessionState::Stopped).await;
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    /// Subscribe to lifecycle transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Address of the current (or last) listener
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.bound_port.load(Ordering::SeqCst) {
            0 => None,
            port => Some(SocketAddr::new(self.config.host, port)),
        }
    }

    pub fn port(&self) -> u16 {
        match self.bound_port.load(Ordering::SeqCst) {
            0 => self.config.port,
            port => port,
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn shared_paths(&self) -> &[SharedPath] {
        &self.shared
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current statistics, `None` unless running
    pub async fn status(&self) -> Option<StatusReport> {
        let state = self.running.lock().await.as_ref().map(|r| r.state.clone())?;
        if self.state() != SessionState::Running {
            return None;
        }
        Some(state.status().await)
    }

    /// URL a client at `ip` should open
    pub fn url_for(&self, ip: &str) -> String {
        match &self.access_token {
            Some(token) => format!("http://{}:{}/?token={}", ip, self.port(), token),
            None => format!("http://{}:{}/", ip, self.port()),
        }
    }
}

impl Drop for ShareSession {
    fn drop(&mut self) {
        if let Ok(running) = self.running.try_lock() {
            if let Some(server) = running.as_ref() {
                server.stop_token.cancel();
            }
        }
    }
}

/// Cancel `stop_token` after `timeout` unless the session stops first
fn spawn_timeout(timeout: Duration, stop_token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::info!("Timeout of {:?} reached, stopping server", timeout);
                stop_token.cancel();
            }
            _ = stop_token.cancelled() => {}
        }
    });
}

/// Drive the lifecycle state once a stop is requested.
///
/// In-flight responses get `grace` to finish. After that their bodies are
/// failed through `transfer_abort`, so connections close rather than keep
/// streaming after the session reports `Stopped`.
async fn supervise(
    mut server: JoinHandle<std::io::Result<()>>,
    stop_token: CancellationToken,
    transfer_abort: CancellationToken,
    grace: Duration,
    state_tx: Arc<watch::Sender<SessionState>>,
) {
    tokio::select! {
        _ = stop_token.cancelled() => {}
        result = &mut server => {
            // The serving loop ended without being asked to
            match result {
                Ok(Ok(())) => tracing::warn!("HTTP server exited unexpectedly"),
                Ok(Err(e)) => tracing::error!("HTTP server error: {}", e),
                Err(e) => tracing::error!("HTTP server task failed: {}", e),
            }
            stop_token.cancel();
            transfer_abort.cancel();
            state_tx.send_replace(SessionState::Stopped);
            return;
        }
    }

    state_tx.send_replace(SessionState::Stopping);

    match tokio::time::timeout(grace, &mut server).await {
        Ok(Ok(Ok(()))) => tracing::info!("HTTP server stopped"),
        Ok(Ok(Err(e))) => tracing::error!("HTTP server error during shutdown: {}", e),
        Ok(Err(e)) => tracing::error!("HTTP server task failed: {}", e),
        Err(_) => {
            tracing::warn!("In-flight requests still running after {:?}, aborting", grace);
            transfer_abort.cancel();
            if tokio::time::timeout(ABORT_WAIT, &mut server).await.is_err() {
                server.abort();
            }
        }
    }

    state_tx.send_replace(SessionState::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_file(dir: &std::path::Path) -> Vec<SharedPath> {
        let file = dir.join("hello.txt");
        std::fs::write(&file, b"hello").unwrap();
        vec![SharedPath::new(file).unwrap()]
    }

    #[test]
    fn test_new_requires_paths() {
        let result = ShareSession::new(vec![], SessionConfig::default());
        assert!(matches!(result, Err(ShareError::NoValidPaths)));
    }

    #[test]
    fn test_token_only_with_password() {
        let dir = tempfile::tempdir().unwrap();
        let open = ShareSession::new(shared_file(dir.path()), SessionConfig::default()).unwrap();
        assert!(open.access_token().is_none());
        assert_eq!(open.state(), SessionState::Stopped);

        let config = SessionConfig {
            password: Some("pw".to_string()),
            port: 9123,
            ..Default::default()
        };
        let locked = ShareSession::new(shared_file(dir.path()), config).unwrap();
        let token = locked.access_token().unwrap().to_string();
        assert_eq!(token.len(), 32);
        assert_ne!(token, "pw");
        assert_eq!(
            locked.url_for("192.168.1.2"),
            format!("http://192.168.1.2:9123/?token={}", token)
        );
    }

    #[test]
    fn test_url_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            port: 8000,
            ..Default::default()
        };
        let session = ShareSession::new(shared_file(dir.path()), config).unwrap();
        assert_eq!(session.url_for("10.0.0.5"), "http://10.0.0.5:8000/");
    }

    #[tokio::test]
    async fn test_stop_when_never_started_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let session = ShareSession::new(shared_file(dir.path()), SessionConfig::default()).unwrap();
        session.stop().await;
        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.status().await.is_none());
    }
}
