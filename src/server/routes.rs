use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{allowlist_gate, healthz, proxy, trigger_sync};
use crate::allowlist::IpAllowlist;
use crate::error::SyncResult;
use crate::sync::PortSync;

/// Build the client used by the proxy passthrough.
///
/// Redirects are relayed to the caller, never followed: the WebUI depends on
/// seeing Location headers itself.
pub fn proxy_client() -> SyncResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?)
}

/// Shared state for all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<PortSync>,
    pub allowlist: Arc<IpAllowlist>,
    pub port_file: PathBuf,
    /// qBittorrent base URL the fallback proxies to, without trailing slash.
    pub upstream: String,
    /// Client shared by the proxy passthrough.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        sync: Arc<PortSync>,
        allowlist: IpAllowlist,
        port_file: PathBuf,
        upstream: &str,
        http: reqwest::Client,
    ) -> Self {
        Self {
            sync,
            allowlist: Arc::new(allowlist),
            port_file,
            upstream: upstream.trim_end_matches('/').to_string(),
            http,
        }
    }
}

/// Build the HTTP surface.
///
/// `/healthz` stays outside the allowlist gate so infrastructure probes keep
/// working regardless of network policy; `/sync` and the proxy fallback sit
/// behind it.
pub fn create_router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/sync", any(trigger_sync))
        .fallback(proxy)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            allowlist_gate,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(gated)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
