//! Application layer for Agora
//!
//! Pure state machines and generic runtime for UI and protocol orchestration,
//! enabling deterministic simulation testing with the same code that runs in
//! production.
//!
//! # Components
//!
//! - [`App`]: view-model state machine (commands, active conversation,
//!   contacts with presence, unread badges)
//! - [`Bridge`]: protocol bridge (translates App actions to Client events and
//!   Client actions to I/O effects and App events)
//! - [`Driver`]: trait for platform-specific I/O abstraction
//! - [`Runtime`]: generic orchestration loop using Driver; the single point
//!   where inputs are applied to state

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod bridge;
mod driver;
mod event;
mod input;
mod runtime;
mod state;

pub use action::AppAction;
pub use app::App;
pub use bridge::{Bridge, Effect};
pub use driver::{Driver, DriverInput};
pub use event::AppEvent;
pub use input::{Command, ParseError};
pub use runtime::Runtime;
pub use state::{ConnectionState, ContactView, ConversationView};
