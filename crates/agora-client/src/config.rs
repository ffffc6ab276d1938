//! Client configuration.

use std::time::Duration;

use agora_core::ChannelConfig;

/// Deadline for an HTTP request before it fails as timed out.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for every HTTP request.
    pub request_timeout: Duration,
    /// Persistent channel behavior.
    pub channel: ChannelConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { request_timeout: DEFAULT_REQUEST_TIMEOUT, channel: ChannelConfig::default() }
    }
}
