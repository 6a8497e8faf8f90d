//! Per-request scratch directories.
//!
//! A [`Workspace`] is a uniquely named directory holding one request's input
//! and output files. It is created by [`WorkspaceManager::acquire`] and removed
//! either explicitly by [`Workspace::release`] or, if the owning future is
//! dropped first, by the guard's `Drop`. Either way the directory is removed
//! exactly once.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::config::WorkspaceConfig;

/// File the source is written to before the tool runs.
pub const INPUT_FILE_NAME: &str = "input.lua";

/// File the tool is told to write its result to.
pub const OUTPUT_FILE_NAME: &str = "output.obfuscated.lua";

/// Creates isolated workspaces under a configured root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    config: WorkspaceConfig,
}

impl WorkspaceManager {
    #[must_use]
    pub fn new(config: WorkspaceConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Creates a fresh, uniquely named directory `<root>/<prefix><random>`.
    ///
    /// Directory creation is atomic per name and retried on collision, so
    /// concurrent requests never share a path.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the directory cannot be created
    /// (missing root, permission denied, disk full).
    pub async fn acquire(&self) -> io::Result<Workspace> {
        let root = self.config.root.clone();
        let prefix = self.config.prefix.clone();

        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(&root)
        })
        .await
        .map_err(io::Error::other)??;

        let workspace = Workspace::new(dir);
        debug!(path = %workspace.root().display(), "workspace acquired");
        Ok(workspace)
    }
}

/// Exclusive scratch directory for one request.
///
/// Owning the [`TempDir`] makes this a drop guard: the directory cannot
/// outlive the value, whatever path the request takes out of the handler.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    input_path: PathBuf,
    output_path: PathBuf,
}

impl Workspace {
    fn new(dir: TempDir) -> Self {
        let input_path = dir.path().join(INPUT_FILE_NAME);
        let output_path = dir.path().join(OUTPUT_FILE_NAME);
        Self {
            dir,
            input_path,
            output_path,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Removes the directory and everything in it.
    ///
    /// A directory that is already gone counts as released. Other failures
    /// are logged and swallowed; release never fails the request.
    pub async fn release(self) {
        let path = self.dir.path().to_path_buf();
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => debug!(path = %path.display(), "workspace released"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "workspace already gone");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove workspace"),
        }
        // Dropping `self.dir` here retries removal and ignores a missing path.
    }
}
