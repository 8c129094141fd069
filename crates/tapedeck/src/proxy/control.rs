//! Capture control endpoints served by the proxy itself.
//!
//! Only origin-form requests reach these handlers; an absolute-form proxy
//! request for `http://host/capture/...` is ordinary traffic.

use super::context::ProxyContext;
use super::headers::CorsHeadersExt;
use super::response_ext::{error_response, json_response, text_response};
use crate::metrics::collect_metrics;
use crate::recording::CapturedExchange;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

pub const SAVE_PATH: &str = "/capture/save";
pub const STATUS_PATH: &str = "/capture/status";
pub const LIVE_PATH: &str = "/capture/live";
pub const CLEAR_PATH: &str = "/capture/clear";
pub const METRICS_PATH: &str = "/capture/metrics";

const CONTROL_PATHS: &[&str] = &[SAVE_PATH, STATUS_PATH, LIVE_PATH, CLEAR_PATH, METRICS_PATH];

#[derive(Debug, Serialize)]
struct StatusBody {
    captured_routes: usize,
    output_dir: String,
}

#[derive(Debug, Serialize)]
struct LiveBody {
    routes: Vec<CapturedExchange>,
    count: usize,
}

#[derive(Debug, Serialize)]
struct ClearBody {
    cleared: usize,
}

pub fn is_control_path(path: &str) -> bool {
    CONTROL_PATHS.contains(&path)
}

/// Answer a control request. `path` must be one of the control paths.
pub async fn handle_control(
    ctx: &ProxyContext,
    method: &Method,
    path: &str,
) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET | &Method::POST, SAVE_PATH) => save(ctx).await,
        (&Method::GET, STATUS_PATH) => json_response(
            StatusCode::OK,
            &StatusBody {
                captured_routes: ctx.store.len(),
                output_dir: ctx.output_dir.display().to_string(),
            },
        ),
        (&Method::GET, LIVE_PATH) => {
            let routes = ctx.store.snapshot();
            let count = routes.len();
            let mut response = json_response(StatusCode::OK, &LiveBody { routes, count });
            response.headers_mut().allow_any_origin();
            response
        }
        (&Method::POST | &Method::DELETE, CLEAR_PATH) => {
            let cleared = ctx.store.clear();
            info!("Cleared {} captures", cleared);
            json_response(StatusCode::OK, &ClearBody { cleared })
        }
        (&Method::GET, METRICS_PATH) => {
            let mut response = Response::new(Full::new(Bytes::from(collect_metrics())));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        _ => error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &format!("{method} not allowed on {path}"),
        ),
    }
}

async fn save(ctx: &ProxyContext) -> Response<Full<Bytes>> {
    let store = Arc::clone(&ctx.store);
    let output_dir = ctx.output_dir.clone();
    match tokio::task::spawn_blocking(move || store.flush(&output_dir)).await {
        Ok(Ok(summary)) => {
            info!(
                "Saved {} captures into {} files",
                summary.routes,
                summary.files.len()
            );
            text_response(StatusCode::OK, "Captures saved successfully")
        }
        Ok(Err(e)) => {
            error!("Error saving captures: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
        Err(e) => {
            error!("Save task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "save task failed")
        }
    }
}
