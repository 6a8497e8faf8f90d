//! Command-line and environment configuration for the `luaguard` binary.
//!
//! Every setting can come from a flag or an environment variable; the result
//! is turned into an [`AppConfig`] once, before the server starts.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use luaguard_core::{InputLimits, DEFAULT_MAX_SOURCE_BYTES};

use crate::config::{
    default_tool_executable, AppConfig, ToolConfig, WorkspaceConfig, DEFAULT_TOOL_SCRIPT,
    DEFAULT_WORKSPACE_PREFIX,
};
use crate::logging::LogFormat;
use crate::network::NetworkConfig;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "luaguard",
    version,
    about = "HTTP front end for a command-line Lua obfuscator"
)]
pub struct ServerArgs {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Maximum source length in bytes.
    #[arg(long, env = "MAX_SOURCE_SIZE", default_value_t = DEFAULT_MAX_SOURCE_BYTES)]
    pub max_source_size: usize,

    /// Maximum request body size, e.g. `200kb`, `1mb`, or a plain byte count.
    #[arg(long, env = "MAX_SOURCE_LIMIT", default_value = "200kb", value_parser = parse_byte_size)]
    pub max_body_size: usize,

    /// Wall-clock limit for one tool run, in milliseconds.
    #[arg(
        long,
        env = "EXEC_TIMEOUT_MS",
        default_value_t = 10_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub exec_timeout_ms: u64,

    /// Bytes kept from each of the tool's stdout and stderr, e.g. `1mb`.
    #[arg(long, env = "MAX_OUTPUT_SIZE", default_value = "1mb", value_parser = parse_byte_size)]
    pub max_output_size: usize,

    /// Directory the tool runs from [default: current directory].
    #[arg(long, env = "PROMETHEUS_DIR")]
    pub tool_dir: Option<PathBuf>,

    /// Interpreter executable [default: luajit, or lua on Windows].
    #[arg(long, env = "LUA_BIN")]
    pub tool_bin: Option<String>,

    /// Script passed to the interpreter, relative to the tool directory.
    #[arg(long, env = "TOOL_SCRIPT", default_value = DEFAULT_TOOL_SCRIPT)]
    pub tool_script: String,

    /// Overall per-request deadline, in milliseconds.
    #[arg(
        long,
        env = "REQUEST_TIMEOUT_MS",
        default_value_t = 30_000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub request_timeout_ms: u64,

    /// Concurrent transformations allowed before answering 503 [default: unlimited].
    #[arg(
        long,
        env = "MAX_CONCURRENT_JOBS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_concurrent_jobs: Option<u32>,

    /// Parent directory for per-request workspaces [default: system temp dir].
    #[arg(long, env = "WORKSPACE_ROOT")]
    pub workspace_root: Option<PathBuf>,

    /// Allowed CORS origin; repeat or comma-separate for several.
    #[arg(
        long = "cors-origin",
        env = "CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    pub cors_origins: Vec<String>,

    /// Log output format.
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ServerArgs {
    /// Resolves defaults that depend on the process environment.
    ///
    /// # Errors
    ///
    /// Fails if no tool directory was given and the current directory cannot
    /// be determined.
    pub fn into_config(self) -> anyhow::Result<AppConfig> {
        let working_dir = match self.tool_dir {
            Some(dir) => dir,
            None => std::env::current_dir().context("cannot determine current directory")?,
        };

        Ok(AppConfig {
            network: NetworkConfig {
                host: self.host,
                port: self.port,
                cors_origins: self.cors_origins,
                request_timeout: Duration::from_millis(self.request_timeout_ms),
                max_body_bytes: self.max_body_size,
            },
            limits: InputLimits {
                max_source_bytes: self.max_source_size,
            },
            tool: ToolConfig {
                working_dir,
                executable: self
                    .tool_bin
                    .unwrap_or_else(|| default_tool_executable().to_string()),
                script: self.tool_script,
                timeout: Duration::from_millis(self.exec_timeout_ms),
                max_output_bytes: self.max_output_size,
            },
            workspace: WorkspaceConfig {
                root: self.workspace_root.unwrap_or_else(std::env::temp_dir),
                prefix: DEFAULT_WORKSPACE_PREFIX.to_string(),
            },
            max_concurrent_jobs: self.max_concurrent_jobs,
        })
    }
}

/// Parses sizes like `512`, `200kb`, `1 MB`, `2gb` (1024-based, case-insensitive).
///
/// # Errors
///
/// Returns a message suitable for clap when the value is not a size.
pub fn parse_byte_size(value: &str) -> Result<usize, String> {
    let value = value.trim().to_ascii_lowercase();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let amount: usize = digits
        .parse()
        .map_err(|_| format!("invalid size `{value}`: expected a number with optional unit"))?;

    let multiplier: usize = match unit.trim() {
        "" | "b" => 1,
        "kb" => 1 << 10,
        "mb" => 1 << 20,
        "gb" => 1 << 30,
        other => return Err(format!("unknown size unit `{other}` (use b, kb, mb, gb)")),
    };

    amount
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size `{value}` is too large"))
}
