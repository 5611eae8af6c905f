//! HTTP server for file sharing
//!
//! Listing, download, status and shutdown endpoints on top of the catalog
//! and the access policy.

use super::page::{encode_component, render_index};
use crate::access::{Access, AccessPolicy, Availability};
use crate::archive::stream_zip;
use crate::catalog::{Catalog, CatalogItem, RouteTarget};
use crate::error::ShareError;
use crate::stats::{SessionStats, StatusReport, format_uptime};
use axum::{
    Json, Router,
    body::Body,
    extract::{ConnectInfo, Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// Static HTML content for the 404 page
const NOT_FOUND_HTML: &str = include_str!("static/404.html");

/// State shared by every handler of one session
pub struct ShareState {
    pub catalog: Arc<Catalog>,
    pub policy: AccessPolicy,
    pub stats: SessionStats,
    /// Port reported by `/api/status`
    pub port: u16,
    /// Cancelled to ask the session to stop
    pub stop_token: CancellationToken,
    /// Cancelled when the shutdown grace period runs out; ends every
    /// response body still streaming
    pub transfer_abort: CancellationToken,
}

impl ShareState {
    pub fn new(
        catalog: Arc<Catalog>,
        policy: AccessPolicy,
        port: u16,
        stop_token: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            policy,
            stats: SessionStats::new(),
            port,
            stop_token,
            transfer_abort: CancellationToken::new(),
        }
    }

    pub async fn status(&self) -> StatusReport {
        StatusReport {
            status: "running".to_string(),
            port: self.port,
            files_count: self.catalog.files_count(),
            uptime: format_uptime(self.stats.uptime()),
            total_requests: self.stats.total_requests(),
            total_downloads: self.stats.total_downloads(),
            unique_clients: self.stats.unique_clients().await,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

fn client_ip(req: &Request) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_canonical())
}

/// Handler for the listing page
async fn index_handler(State(state): State<Arc<ShareState>>) -> Html<String> {
    Html(render_index(
        state.catalog.list_items(),
        state.policy.token(),
        &format_uptime(state.stats.uptime()),
    ))
}

/// Handler for the JSON item list
async fn items_handler(State(state): State<Arc<ShareState>>) -> Json<Vec<CatalogItem>> {
    Json(state.catalog.list_items().to_vec())
}

async fn status_handler(State(state): State<Arc<ShareState>>) -> Json<StatusReport> {
    Json(state.status().await)
}

/// Handler for `/download/{*name}`
async fn download_handler(
    State(state): State<Arc<ShareState>>,
    Path(name): Path<String>,
) -> Result<Response, ShareError> {
    match state.policy.check_availability(&name, &state.catalog).await {
        Availability::Available => {}
        Availability::NotFound => return Err(ShareError::NotFound),
        Availability::Gone => {
            tracing::info!("Refusing already downloaded item: {}", name);
            return Err(ShareError::Gone);
        }
    }
    let target = state
        .catalog
        .resolve_route(&name)
        .ok_or(ShareError::NotFound)?;

    let response = item_response(target, &state.transfer_abort)
        .await
        .inspect_err(|e| tracing::warn!("Failed to serve {}: {}", name, e))?;

    // A concurrent request may have recorded the item while this body was
    // being prepared
    if !state.policy.record_download(&name).await {
        tracing::info!("Refusing already downloaded item: {}", name);
        return Err(ShareError::Gone);
    }

    state.stats.record_download();
    tracing::info!("Serving download: {}", name);
    Ok(response)
}

/// Chunk size used when streaming a built archive
const ARCHIVE_CHUNK: usize = 64 * 1024;

/// Forward `stream` until `abort` fires, then fail the body so the
/// connection is closed instead of finishing the transfer
fn abortable<S>(
    stream: S,
    abort: CancellationToken,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    futures_util::stream::unfold(
        (Box::pin(stream), abort, false),
        |(mut stream, abort, done)| async move {
            if done {
                return None;
            }
            tokio::select! {
                biased;
                _ = abort.cancelled() => Some((
                    Err(io::Error::new(io::ErrorKind::Interrupted, "session stopped")),
                    (stream, abort, true),
                )),
                item = stream.next() => item.map(|item| (item, (stream, abort, false))),
            }
        },
    )
}

/// Build the response body for a resolved item
async fn item_response(
    target: &RouteTarget,
    abort: &CancellationToken,
) -> Result<Response, ShareError> {
    match target {
        RouteTarget::File(path) => {
            let file = tokio::fs::File::open(path).await?;
            let len = file.metadata().await?.len();
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "download".to_string());
            let mime = mime_guess::from_path(path).first_or_octet_stream();

            let body = abortable(ReaderStream::new(file), abort.clone());
            let mut response = Body::from_stream(body).into_response();
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
            headers.insert(header::CONTENT_DISPOSITION, content_disposition(&file_name));
            Ok(response)
        }
        RouteTarget::Folder(path) => {
            let folder_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "folder".to_string());
            let data = stream_zip(path.clone()).await?;
            let len = data.len();

            let chunks = (0..len)
                .step_by(ARCHIVE_CHUNK)
                .map(move |start| Ok(data.slice(start..(start + ARCHIVE_CHUNK).min(len))));
            let body = abortable(futures_util::stream::iter(chunks), abort.clone());

            let mut response = Body::from_stream(body).into_response();
            let headers = response.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/zip"),
            );
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
            headers.insert(
                header::CONTENT_DISPOSITION,
                content_disposition(&format!("{}.zip", folder_name)),
            );
            Ok(response)
        }
    }
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name
pub fn content_disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        encode_component(file_name)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Handler for `/shutdown`, only honoured from the local machine
async fn shutdown_handler(
    State(state): State<Arc<ShareState>>,
    req: Request,
) -> Result<&'static str, ShareError> {
    match client_ip(&req) {
        Some(ip) if ip.is_loopback() => {
            tracing::info!("Shutdown requested from {}", ip);
            state.stop_token.cancel();
            Ok("Server shutting down...")
        }
        other => {
            tracing::warn!("Rejected shutdown request from {:?}", other);
            Err(ShareError::Forbidden)
        }
    }
}

/// Handler for invalid routes - serves 404 page
async fn not_found_handler() -> (StatusCode, Html<&'static str>) {
    (StatusCode::NOT_FOUND, Html(NOT_FOUND_HTML))
}

/// Middleware counting every request and its client address
async fn track_request(State(state): State<Arc<ShareState>>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req);
    state.stats.record_request(ip).await;
    tracing::debug!("{} {} from {:?}", req.method(), req.uri().path(), ip);
    next.run(req).await
}

/// Middleware rejecting requests without the session token
async fn require_token(
    State(state): State<Arc<ShareState>>,
    req: Request,
    next: Next,
) -> Result<Response, ShareError> {
    let presented = Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.token);

    match state.policy.authorize(presented.as_deref()) {
        Access::Allow => Ok(next.run(req).await),
        Access::Deny => Err(ShareError::Unauthorized),
    }
}

/// Middleware to add security headers
async fn add_security_headers(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; style-src 'unsafe-inline'; img-src 'self' data:;"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );

    response
}

/// Build the axum router for a share session
pub fn create_router(state: Arc<ShareState>) -> Router {
    let gated = Router::new()
        .route("/", get(index_handler))
        .route("/download/{*name}", get(download_handler))
        .route("/api/status", get(status_handler))
        .route("/api/items", get(items_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .merge(gated)
        .route("/shutdown", get(shutdown_handler))
        .fallback(not_found_handler)
        .layer(middleware::from_fn_with_state(state.clone(), track_request))
        .layer(middleware::from_fn(add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `cancel_token` fires
pub async fn serve(
    listener: TcpListener,
    router: Router,
    cancel_token: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        cancel_token.cancelled().await;
        tracing::info!("HTTP server shutting down gracefully");
    })
    .await
}
