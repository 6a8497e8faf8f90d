//! `luaguard` binary: parses configuration, installs logging, and serves.

use clap::Parser;
use luaguard_server::cli::ServerArgs;
use luaguard_server::logging::init_tracing;
use luaguard_server::NetworkModule;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    init_tracing(args.log_format)?;

    let config = args.into_config()?;
    if config.network.request_timeout <= config.tool.timeout {
        warn!(
            request_timeout_ms = config.network.request_timeout.as_millis(),
            exec_timeout_ms = config.tool.timeout.as_millis(),
            "request timeout does not exceed tool timeout; slow runs will surface as 408"
        );
    }
    info!(
        tool_dir = %config.tool.working_dir.display(),
        executable = %config.tool.executable,
        workspace_root = %config.workspace.root.display(),
        max_source_bytes = config.limits.max_source_bytes,
        "configuration loaded"
    );

    let mut module = NetworkModule::new(config);
    let port = module.start().await?;
    info!("luaguard listening on :{port}");

    module.serve(shutdown_signal()).await
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
