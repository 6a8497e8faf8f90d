//! Listener and HTTP-layer settings.

use std::time::Duration;

/// Matches the `200kb` body ceiling the service has always advertised.
pub const DEFAULT_MAX_BODY_BYTES: usize = 200 * 1024;

/// Outer deadline for a whole request. Kept well above the tool timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub host: String,
    /// 0 lets the OS pick a free port.
    pub port: u16,
    /// `"*"` or an explicit allow-list.
    pub cors_origins: Vec<String>,
    /// Requests still running after this get 408 and their handler is dropped.
    ///
    /// Should exceed the tool timeout, otherwise a slow tool run surfaces as
    /// 408 instead of the pipeline's own timeout message.
    pub request_timeout: Duration,
    /// Raw body ceiling enforced before the handler runs.
    pub max_body_bytes: usize,
}

impl NetworkConfig {
    /// `host:port` in the form `TcpListener::bind` accepts.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}
