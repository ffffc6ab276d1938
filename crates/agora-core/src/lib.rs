//! Core of the Agora real-time layer.
//!
//! Pure state machines for the persistent channel, with no I/O of their own:
//!
//! - [`env::Environment`]: time and randomness, swapped for virtual time in
//!   simulation
//! - [`channel::ChannelHandle`]: Disconnected/Connecting/Connected lifecycle,
//!   idempotent connect, connect timeout and reconnection backoff
//! - [`router::EventRouter`]: one handler per event kind, replace-not-append
//!
//! Methods take the current time as input and return actions for the caller
//! to execute, so the same code runs against a real socket and in tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod channel;
pub mod env;
pub mod error;
pub mod router;

pub use channel::{ChannelAction, ChannelConfig, ChannelHandle, ChannelState, ReconnectPolicy};
pub use env::Environment;
pub use error::ConnectionError;
pub use router::EventRouter;
