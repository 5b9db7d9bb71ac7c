//! Liveness and build-information endpoints (`/health`, `/healthz`, `/version`)

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::server::{json_response, AppState};

/// Liveness response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Seconds since the server started
    pub uptime: u64,
    pub timestamp: String,
    /// Root of the account API
    pub account_api: String,
    /// Open notification sockets
    pub open_sockets: usize,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        account_api: state.args.account_base_url(),
        open_sockets: state.sockets.socket_count(),
    }
}

/// `GET /health`
pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let body = serde_json::to_value(build_health_response(state))
        .unwrap_or_else(|_| serde_json::json!({ "healthy": true }));
    json_response(StatusCode::OK, &body)
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    /// Short and full git revision, "unknown" outside a checkout
    pub commit: &'static str,
    pub commit_full: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
}

pub fn version_response() -> VersionResponse {
    VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "gatehouse",
    }
}

/// `GET /version`
pub fn version_info() -> Response<Full<Bytes>> {
    let body = serde_json::to_value(version_response())
        .unwrap_or_else(|_| serde_json::json!({ "version": "unknown", "commit": "unknown" }));
    json_response(StatusCode::OK, &body)
}
