//! Maps pipeline failures and outcomes onto HTTP responses.
//!
//! Every response produced here is plain text. Client errors carry the
//! validation message; server errors carry only the captured message string.

use std::io;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use luaguard_core::{InputError, TransformOutcome};

/// Content type for every body the endpoint produces.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

/// Everything that can stop `POST /obfuscate` short of a 200.
#[derive(Debug, thiserror::Error)]
pub enum ObfuscateError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("Failed to create workspace: {0}")]
    Workspace(#[source] io::Error),
    /// Diagnostic text from the tool, passed through unchanged.
    #[error("{0}")]
    ToolFailure(String),
    #[error("Execution timed out after {} ms.", .after.as_millis())]
    Timeout { after: Duration },
    #[error("Failed to start transformer: {0}")]
    Spawn(String),
}

impl ObfuscateError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Input(e) if e.is_too_large() => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::Workspace(_) | Self::ToolFailure(_) | Self::Timeout { .. } | Self::Spawn(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ObfuscateError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "obfuscation failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        text_response(status, self.to_string())
    }
}

/// Splits an invocation outcome into the transformed output or a terminal error.
///
/// # Errors
///
/// Any non-success outcome, converted to the matching [`ObfuscateError`].
pub fn map_outcome(outcome: TransformOutcome) -> Result<Vec<u8>, ObfuscateError> {
    match outcome {
        TransformOutcome::Success(output) => Ok(output),
        TransformOutcome::ToolFailure(message) => Err(ObfuscateError::ToolFailure(message)),
        TransformOutcome::Timeout { after } => Err(ObfuscateError::Timeout { after }),
        TransformOutcome::SpawnError(message) => Err(ObfuscateError::Spawn(message)),
    }
}

/// Plain-text response with an explicit UTF-8 charset. The body is sent as given.
pub fn text_response(status: StatusCode, body: impl Into<Body>) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN_UTF8)], body.into()).into_response()
}
