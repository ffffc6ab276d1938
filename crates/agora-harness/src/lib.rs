//! Deterministic simulation harness for Agora client testing.
//!
//! In-memory implementations of the Environment and Driver traits plus a
//! model of the chat service, so the production [`agora_app::Runtime`] can be
//! exercised end to end without sockets, wall-clock time or real randomness.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Use [`InvariantRegistry::standard()`] for the client
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    CacheScopedToActiveConversation, ClientSnapshot, Invariant, InvariantRegistry,
    InvariantResult, LoggedOutIsEmpty, NoDuplicateMessages, SingleChannel, SystemSnapshot,
    Violation,
};
pub use sim_driver::{SimDriver, SimDriverError, SimRuntime, run_until_idle};
pub use sim_env::SimEnv;
pub use sim_server::{SharedSimServer, SimServer, create_shared_server};
