//! Request/response logging middleware
//!
//! Every request gets a correlation token (base64 of the arrival time in
//! RFC 3339). Entry and exit lines carry the token so they can be paired:
//!
//! ```text
//! (MjAyNi0xMC0xOVQxMDowMDowMFo=) POST /users {"firstName":"Daniel",...}
//! (MjAyNi0xMC0xOVQxMDowMDowMFo=) 201 {"_id":"...",...} 3ms
//! ```
//!
//! Only bodies whose size is known and at most [`MAX_BUFFERED_BODY`] are read
//! into memory for logging. Anything else streams through untouched and is
//! logged as a placeholder.

use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use tracing::{error, info};

use crate::api::types::ApiError;

/// Response header carrying the correlation token
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Largest body the middleware will hold in memory to log it
pub const MAX_BUFFERED_BODY: usize = 64 * 1024;

const MAX_LOGGED_BODY: usize = 2048;
const MULTIPART_PLACEHOLDER: &str = "[multipart body]";
const UNBUFFERED_PLACEHOLDER: &str = "[body not buffered]";

/// Middleware to log HTTP requests and responses with their bodies.
/// Note: This middleware does NOT create its own tracing span since `TraceLayer`
/// from tower-http already handles span creation.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let token = correlation_token();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let (request, request_body) = if is_multipart(request.headers()) {
        (request, MULTIPART_PLACEHOLDER.to_string())
    } else {
        let (parts, body) = request.into_parts();
        let (body, logged) = match capture(body).await {
            Ok(captured) => captured,
            Err(response) => return response,
        };
        (Request::from_parts(parts, body), logged)
    };

    info!("({}) {} {} {}", token, method, path, request_body);

    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let (body, response_body) = match capture(body).await {
        Ok(captured) => captured,
        Err(response) => return response,
    };

    let status = parts.status;
    let elapsed_ms = start.elapsed().as_millis();

    if status.is_client_error() || status.is_server_error() {
        error!("({}) {} {} {}ms", token, status.as_u16(), response_body, elapsed_ms);
    } else {
        info!("({}) {} {} {}ms", token, status.as_u16(), response_body, elapsed_ms);
    }

    if let Ok(value) = HeaderValue::from_str(&token) {
        parts.headers.insert(REQUEST_ID_HEADER, value);
    }

    Response::from_parts(parts, body)
}

/// Base64 of the current time in RFC 3339
pub fn correlation_token() -> String {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    base64::engine::general_purpose::STANDARD.encode(now)
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("multipart/"))
}

fn fits_buffer(body: &Body) -> bool {
    body.size_hint()
        .upper()
        .is_some_and(|len| len <= MAX_BUFFERED_BODY as u64)
}

/// Buffer a small body for logging, or hand a large/unsized one back as-is
async fn capture(body: Body) -> Result<(Body, String), Response> {
    if !fits_buffer(&body) {
        return Ok((body, UNBUFFERED_PLACEHOLDER.to_string()));
    }

    let bytes = axum::body::to_bytes(body, MAX_BUFFERED_BODY)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to buffer body");
            ApiError::bad_request("Failed to read body").into_response()
        })?;
    let logged = body_for_log(&bytes);

    Ok((Body::from(bytes), logged))
}

fn body_for_log(bytes: &Bytes) -> String {
    if bytes.is_empty() {
        return "{}".to_string();
    }

    truncate_for_log(&String::from_utf8_lossy(bytes), MAX_LOGGED_BODY)
}

/// Truncate long strings for logging
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...[truncated {} chars]", &s[..end], s.len() - end)
}
