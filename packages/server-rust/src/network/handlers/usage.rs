//! `GET /` usage hint.

use axum::http::StatusCode;
use axum::response::Response;

use crate::error::text_response;

/// Static text served on the root path.
pub const USAGE: &str = "POST /obfuscate with Lua source (text/plain or JSON {\"code\": \"...\"}). \
Optional profile via JSON field or ?profile= query: Minify (default), Weak, Vmify, Medium, Strong.";

pub async fn usage_handler() -> Response {
    text_response(StatusCode::OK, USAGE)
}
