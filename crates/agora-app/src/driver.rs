//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::{future::Future, ops::Sub, time::Duration};

use agora_client::{PersistedSession, RequestId};
use agora_proto::{ApiError, ApiRequest, ApiResponse, UserId};

use crate::{App, Command};

/// Input collected by a driver for the runtime to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverInput {
    /// The user entered a command.
    Command(Command),
    /// An API call finished.
    ApiResponse {
        /// Id given to [`Driver::execute_request`].
        request_id: RequestId,
        /// Decoded response or failure.
        result: Result<ApiResponse, ApiError>,
    },
    /// The channel requested by [`Driver::open_channel`] is open.
    ChannelOpened,
    /// The channel closed or could not be opened.
    ChannelClosed {
        /// Human-readable cause.
        reason: String,
    },
    /// A text frame arrived on the channel.
    Frame(String),
    /// Only the driver's own display state changed, such as the input line.
    Redraw,
}

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in the terminal client and in simulation.
///
/// Requests and channel operations are fire-and-forget: their outcomes come
/// back later through [`Driver::poll_input`], so a slow server never blocks
/// the loop.
///
/// # Implementations
///
/// - **CLI**: reqwest for HTTP, tokio-tungstenite for the channel, stdin lines
///   for commands
/// - **Simulation**: an in-memory server with a virtual clock
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Poll for the next input.
    ///
    /// Returns `None` if nothing arrived before the driver's tick interval.
    fn poll_input(&mut self) -> impl Future<Output = Result<Option<DriverInput>, Self::Error>> + Send;

    /// Start an API call. The result arrives as [`DriverInput::ApiResponse`].
    fn execute_request(
        &mut self,
        request_id: RequestId,
        request: ApiRequest,
        token: Option<String>,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Open the channel for a user, dropping any channel already open.
    ///
    /// Completion is reported as [`DriverInput::ChannelOpened`] or
    /// [`DriverInput::ChannelClosed`].
    fn open_channel(&mut self, user_id: &UserId) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the channel. Inputs from the closed channel are not reported.
    fn close_channel(&mut self) -> impl Future<Output = ()> + Send;

    /// Send a frame on the open channel.
    ///
    /// A frame sent without an open channel is dropped.
    fn send_frame(&mut self, frame: String) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Write the session to storage, or erase it when `None`.
    fn persist_session(&mut self, session: Option<&PersistedSession>) -> Result<(), Self::Error>;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the application state.
    fn render(&mut self, app: &App) -> Result<(), Self::Error>;

    /// Stop all I/O and clean up resources.
    fn stop(&mut self);
}
