//! Client
//!
//! Action-based client state machine for Agora. Holds the session, the single
//! persistent channel, and the caches fed by it.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and action-based patterns as
//! [`agora_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`])
//! for the caller to execute. HTTP requests and channel I/O are performed by
//! the caller and fed back as events.
//!
//! # Components
//!
//! - [`Client`]: top-level state machine and the only place state is mutated
//! - [`Session`]: current user and access token
//! - [`ConversationCache`]: messages of the active conversation, deduplicated
//!   by id, plus unread counters
//! - [`ContactCache`] and [`PresenceSet`]: contacts and who is online
//! - [`SessionStore`]: persistence of the session across restarts
//!
//! # Transport (optional)
//!
//! With the `transport` feature enabled, this crate also provides:
//! - [`transport::HttpApi`]: executes [`agora_proto::ApiRequest`]s over HTTP
//! - [`transport::connect_channel`]: open the WebSocket channel

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod chat_cache;
mod client;
mod config;
mod error;
mod event;
mod presence;
mod session;
mod storage;

#[cfg(feature = "transport")]
pub mod transport;

pub use agora_core::{ChannelConfig, ChannelState, Environment, ReconnectPolicy};
pub use chat_cache::{AppendOutcome, ConversationCache};
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_REQUEST_TIMEOUT};
pub use error::{ClientError, StoreError};
pub use event::{ClientAction, ClientEvent, Operation, RequestId};
pub use presence::{ContactCache, PresenceSet};
pub use session::{PersistedSession, Session};
pub use storage::{FileSessionStore, MemorySessionStore, SessionStore};
