//! Wire records for the Agora client.
//!
//! Everything the client exchanges with the remote service is defined here:
//! the JSON records returned by the HTTP API ([`UserProfile`], [`Message`]),
//! the request descriptions the client hands to its HTTP driver
//! ([`ApiRequest`]), and the envelopes carried over the persistent channel
//! ([`ChannelEvent`]).
//!
//! The crate owns no I/O. It only knows how records look on the wire.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod api;
pub mod errors;
pub mod event;
pub mod ids;
pub mod records;

pub use api::{ApiError, ApiRequest, ApiResponse, AuthSession, Method};
pub use errors::{ProtocolError, Result};
pub use event::{ChannelEvent, EventKind};
pub use ids::{ConversationId, MessageId, UserId};
pub use records::{Credentials, Message, MessageDraft, ProfileUpdate, Registration, Role, UserProfile};
