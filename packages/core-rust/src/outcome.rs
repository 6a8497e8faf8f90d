//! Result of a single transformer invocation.

use std::time::Duration;

/// Discriminated outcome of running the external tool once.
///
/// Every variant other than [`TransformOutcome::Success`] is terminal for the
/// request: there are no retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Tool exited with status zero; carries the output file exactly as written.
    Success(Vec<u8>),
    /// Tool exited non-zero; carries its diagnostic output verbatim.
    ToolFailure(String),
    /// Tool did not finish within the allotted time and was killed.
    Timeout { after: Duration },
    /// The tool could not be started at all.
    SpawnError(String),
}

impl TransformOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::ToolFailure(_) => "tool_failure",
            Self::Timeout { .. } => "timeout",
            Self::SpawnError(_) => "spawn_error",
        }
    }
}
