use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use super::routes::AppState;
use crate::error::SyncError;
use crate::watcher;

/// Upper bound on a buffered proxy request/response body (torrent uploads
/// through the WebUI stay well under this).
const MAX_PROXY_BODY: usize = 64 * 1024 * 1024;

/// Drop hop-by-hop headers before relaying in either direction. The body is
/// fully buffered on both legs, so framing and connection-management headers
/// no longer apply.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        header::CONNECTION,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
        header::TE,
        header::TRAILER,
    ] {
        headers.remove(&name);
    }
}

/// Liveness probe. Never gated.
pub async fn healthz() -> &'static str {
    "OK"
}

/// Manual re-check of the port file.
///
/// Awaits the synchronization, so the response may lag behind an in-flight
/// retry sequence on another candidate.
pub async fn trigger_sync(State(state): State<AppState>) -> &'static str {
    tracing::info!("manual sync requested");
    if let Some(port) = watcher::check_file_now(&state.port_file) {
        state.sync.on_candidate_port(port).await;
    }
    "Sync triggered"
}

/// Allowlist gate applied to every route except `/healthz`.
pub async fn allowlist_gate(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, SyncError> {
    let remote = addr.to_string();
    if !state.allowlist.is_allowed(&remote) {
        tracing::warn!(
            %remote,
            method = %request.method(),
            path = %request.uri().path(),
            "blocked unauthorized request"
        );
        return Err(SyncError::AccessDenied(remote));
    }
    Ok(next.run(request).await)
}

/// Single-host reverse proxy to the qBittorrent Web API.
pub async fn proxy(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, SyncError> {
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.upstream, path_and_query);

    let method = request.method().clone();
    let mut headers = request.headers().clone();
    // The upstream derives its own Host from the target URL.
    headers.remove(header::HOST);
    strip_hop_by_hop(&mut headers);

    let body = axum::body::to_bytes(request.into_body(), MAX_PROXY_BODY)
        .await
        .map_err(|err| SyncError::Transport(err.to_string()))?;

    let upstream = state
        .http
        .request(method, url)
        .headers(headers)
        .body(body)
        .send()
        .await?;

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();
    strip_hop_by_hop(&mut response_headers);
    let bytes = upstream.bytes().await?;

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;

    Ok(response)
}
