//! `POST /obfuscate`: the request-to-subprocess pipeline.
//!
//! Received -> Validated -> WorkspaceAcquired -> Invoked -> Responded, with the
//! workspace released between invocation and response on every path.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use luaguard_core::{resolve, RequestBody};
use serde::Deserialize;
use tracing::{info, info_span, Instrument};

use super::AppState;
use crate::error::{map_outcome, text_response, ObfuscateError};

/// Query parameters accepted by `POST /obfuscate`.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ObfuscateQuery {
    pub profile: Option<String>,
    /// The tool's own name for the same switch.
    pub preset: Option<String>,
}

impl ObfuscateQuery {
    /// First non-empty of `profile`, `preset`.
    #[must_use]
    pub fn requested_profile(&self) -> Option<&str> {
        [&self.profile, &self.preset]
            .into_iter()
            .find_map(|p| p.as_deref().filter(|p| !p.is_empty()))
    }
}

pub async fn obfuscate_handler(
    State(state): State<AppState>,
    Query(query): Query<ObfuscateQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());

    let span = info_span!(
        "obfuscate",
        body_bytes = body.len(),
        profile = tracing::field::Empty,
    );

    match run_pipeline(&state, content_type, query.requested_profile(), &body)
        .instrument(span)
        .await
    {
        Ok(output) => text_response(StatusCode::OK, output),
        Err(e) => e.into_response(),
    }
}

/// Runs one request through validation, workspace, and tool invocation.
///
/// Validation completes before any side effect. Once a workspace exists it is
/// released before this function returns, whatever the outcome; if the future
/// is dropped instead, the workspace guard and `kill_on_drop` clean up.
///
/// # Errors
///
/// An [`ObfuscateError`] describing the first stage that failed.
pub async fn run_pipeline(
    state: &AppState,
    content_type: Option<&str>,
    query_profile: Option<&str>,
    body: &[u8],
) -> Result<Vec<u8>, ObfuscateError> {
    let _in_flight = state.shutdown.in_flight_guard();

    let body = RequestBody::decode(content_type, body)?;
    let request = resolve(&body, query_profile, state.config.limits)?;
    tracing::Span::current().record("profile", request.profile().as_str());

    let workspace = state
        .workspaces
        .acquire()
        .await
        .map_err(ObfuscateError::Workspace)?;

    let outcome = state.transformer.transform(&workspace, &request).await;
    workspace.release().await;

    info!(outcome = outcome.kind(), "transformation finished");
    map_outcome(outcome)
}
