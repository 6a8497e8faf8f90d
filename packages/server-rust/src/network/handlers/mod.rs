//! Route handlers and the state they share.

pub mod health;
pub mod obfuscate;
pub mod usage;

pub use health::{liveness_handler, readiness_handler};
pub use obfuscate::{obfuscate_handler, run_pipeline, ObfuscateQuery};
pub use usage::{usage_handler, USAGE};

use std::sync::Arc;

use crate::config::AppConfig;
use crate::traits::Transformer;
use crate::workspace::WorkspaceManager;

use super::ShutdownController;

/// Handed to every handler through `State`. Cloning copies four `Arc`s.
///
/// Nothing in here is mutated per request, so handlers never contend on it.
#[derive(Clone)]
pub struct AppState {
    /// Limits, tool settings, and workspace location.
    pub config: Arc<AppConfig>,
    /// Creates per-request workspaces.
    pub workspaces: Arc<WorkspaceManager>,
    /// Runs the external tool.
    pub transformer: Arc<dyn Transformer>,
    /// Health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        transformer: Arc<dyn Transformer>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        let workspaces = Arc::new(WorkspaceManager::new(config.workspace.clone()));
        Self {
            config,
            workspaces,
            transformer,
            shutdown,
        }
    }
}
