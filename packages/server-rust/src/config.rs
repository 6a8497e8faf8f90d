//! Process-wide configuration for the transformation pipeline.
//!
//! Built once at startup (see [`crate::cli`]) and shared read-only with every
//! request. Nothing in the pipeline reads the environment directly.

use std::path::PathBuf;
use std::time::Duration;

use luaguard_core::InputLimits;

use crate::network::NetworkConfig;

/// Default wall-clock limit for one tool run.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Per-stream ceiling on captured tool stdout and stderr.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1 << 20;

/// Script handed to the interpreter as its first argument.
pub const DEFAULT_TOOL_SCRIPT: &str = "./cli.lua";

/// Prefix of every per-request workspace directory.
pub const DEFAULT_WORKSPACE_PREFIX: &str = "luaguard-";

/// Interpreter used when none is configured.
#[must_use]
pub fn default_tool_executable() -> &'static str {
    if cfg!(windows) {
        "lua"
    } else {
        "luajit"
    }
}

/// How to launch the external obfuscator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Directory the tool runs from. Holds `script`; never the per-request workspace.
    pub working_dir: PathBuf,
    /// Executable to spawn, resolved through `PATH` when not absolute.
    pub executable: String,
    /// First argument, relative to `working_dir`.
    pub script: String,
    /// Hard wall-clock limit. The child is killed once it elapses.
    pub timeout: Duration,
    /// Bytes kept from each of stdout and stderr. The rest is read and discarded.
    pub max_output_bytes: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            executable: default_tool_executable().to_string(),
            script: DEFAULT_TOOL_SCRIPT.to_string(),
            timeout: DEFAULT_EXEC_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// Where per-request workspaces are created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub prefix: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir(),
            prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),
        }
    }
}

/// Everything the server needs, assembled once at startup.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub limits: InputLimits,
    pub tool: ToolConfig,
    pub workspace: WorkspaceConfig,
    /// Concurrent `POST /obfuscate` requests allowed before shedding with 503.
    /// `None` leaves admission unbounded.
    pub max_concurrent_jobs: Option<u32>,
}
