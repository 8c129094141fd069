//! Request dispatch for the capture proxy.
//!
//! Every request takes exactly one of three paths: CONNECT tunneling,
//! a capture control endpoint, or plain forwarding with capture.

use super::context::ProxyContext;
use super::control::{handle_control, is_control_path};
use super::forwarding::forward_and_capture;
use super::response_ext::{error_response, ProxyBody, ResponseExt};
use super::tunnel::open_tunnel;
use crate::error::ProxyError;
use crate::metrics;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use tracing::{debug, warn};

/// Handle one inbound request. Failures become error responses; nothing
/// here terminates the connection task.
pub async fn handle_request(
    ctx: &ProxyContext,
    req: Request<Incoming>,
) -> Result<Response<ProxyBody>, Infallible> {
    debug!("Received request: {} {}", req.method(), req.uri());

    if req.method() == Method::CONNECT {
        return Ok(into_client_response(open_tunnel(ctx, req).await));
    }

    // Absolute-form requests are proxy traffic even when the path matches.
    if req.uri().authority().is_none() && is_control_path(req.uri().path()) {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        return Ok(handle_control(ctx, &method, &path).await.into_boxed());
    }

    Ok(into_client_response(forward_and_capture(ctx, req).await))
}

fn into_client_response(result: Result<Response<Full<Bytes>>, ProxyError>) -> Response<ProxyBody> {
    match result {
        Ok(response) => response.into_boxed(),
        Err(e) => {
            warn!("Error forwarding request: {}", e);
            metrics::record_forward_error(e.kind());
            error_response(e.status(), &e.to_string()).into_boxed()
        }
    }
}
