use std::time::Duration;

use super::RequestsLoggingLevel;

/// HTTP surface settings, resolved from `AppConfig`.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub requests_logging_level: RequestsLoggingLevel,
    pub port: u16,
    /// Port 0 skips the metrics listener.
    pub metrics_port: u16,
    /// Requests still running after this get a 408.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            requests_logging_level: RequestsLoggingLevel::Path,
            port: 3001,
            metrics_port: 9091,
            request_timeout: Duration::from_secs(crate::config::DEFAULT_REQUEST_TIMEOUT_SEC),
        }
    }
}
