//! Terminal UI for Agora
//!
//! A thin shell over [`agora_app::Driver`] that provides terminal-specific
//! I/O. All orchestration logic lives in the generic [`agora_app::Runtime`].
//!
//! This crate only handles terminal rendering, key input and the network
//! transports.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod input;
pub mod system_env;
pub mod terminal;
pub mod ui;

pub use agora_app::{App, AppAction, AppEvent, Bridge, Driver, Runtime};
pub use input::{InputOutcome, InputState, KeyInput};
pub use system_env::SystemEnv;
pub use terminal::{Endpoints, TerminalDriver, TerminalError};
