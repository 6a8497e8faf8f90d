use async_trait::async_trait;
use luaguard_core::{TransformOutcome, TransformRequest};

use crate::workspace::Workspace;

/// Runs one transformation inside a prepared workspace.
/// Implementations: external process (production), in-memory doubles (tests).
///
/// Failures are reported through [`TransformOutcome`] rather than `Err`, so
/// every way a run can end is visible to the caller as a variant.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Transform `request.source()` with `request.profile()`, using
    /// `workspace` for any files the run needs.
    async fn transform(&self, workspace: &Workspace, request: &TransformRequest)
        -> TransformOutcome;
}
