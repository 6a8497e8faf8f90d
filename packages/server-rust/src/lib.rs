//! `luaguard` server: an HTTP endpoint that runs Lua sources through an
//! external obfuscator in disposable, per-request workspaces.

pub mod cli;
pub mod config;
pub mod error;
pub mod invoker;
pub mod logging;
pub mod network;
pub mod traits;
pub mod workspace;

pub use config::{AppConfig, ToolConfig, WorkspaceConfig};
pub use error::ObfuscateError;
pub use invoker::ProcessTransformer;
pub use network::{AppState, NetworkConfig, NetworkModule};
pub use traits::Transformer;
pub use workspace::{Workspace, WorkspaceManager};
