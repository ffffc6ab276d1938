//! Error types for the channel layer.

use std::time::Duration;

use thiserror::Error;

use crate::channel::ChannelState;

/// Errors raised by the channel state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Operation needs a Connected channel.
    #[error("channel not connected (state: {state:?})")]
    NotConnected {
        /// State at the time of the attempt.
        state: ChannelState,
    },

    /// Transport did not acknowledge the connection in time.
    #[error("channel connect timed out after {elapsed:?}")]
    ConnectTimeout {
        /// How long we waited.
        elapsed: Duration,
    },

    /// Underlying transport failed or closed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if a later reconnect attempt may succeed.
    ///
    /// Timeouts and transport failures are transient. Using a channel that
    /// is not open is a caller error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectTimeout { .. } | Self::Transport(_))
    }
}
