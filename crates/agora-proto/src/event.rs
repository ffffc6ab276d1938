//! Events carried over the persistent channel.
//!
//! Each text frame is a JSON envelope `{"event": <kind>, "data": <payload>}`.
//! The client receives `newMessage` and `getOnlineUsers` and sends
//! `sendMessage` so the service can fan a stored message out to the
//! recipient's open channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    ids::UserId,
    records::Message,
};

/// Kind of a channel event. Subscriptions are keyed by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// A message addressed to the local user was stored.
    NewMessage,
    /// Snapshot of the ids of all online users.
    OnlineUsers,
    /// Local user forwards a stored message for real-time delivery.
    SendMessage,
}

impl EventKind {
    /// All kinds, in wire-name order.
    pub const ALL: [Self; 3] = [Self::NewMessage, Self::OnlineUsers, Self::SendMessage];

    /// Event name used in the envelope.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewMessage => "newMessage",
            Self::OnlineUsers => "getOnlineUsers",
            Self::SendMessage => "sendMessage",
        }
    }

    /// Parse an envelope event name. `None` for names this client ignores.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded channel event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Inbound message push.
    NewMessage(Message),
    /// Inbound presence snapshot. Authoritative for the whole online set.
    OnlineUsers(Vec<UserId>),
    /// Outbound forwarding of a message the service already stored.
    SendMessage(Message),
}

#[derive(Serialize)]
struct EnvelopeOut<'a, T> {
    event: &'static str,
    data: &'a T,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ChannelEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::OnlineUsers(_) => EventKind::OnlineUsers,
            Self::SendMessage(_) => EventKind::SendMessage,
        }
    }

    /// Encode as a JSON envelope text frame.
    pub fn encode(&self) -> Result<String> {
        let event = self.kind().as_str();
        let encoded = match self {
            Self::NewMessage(message) | Self::SendMessage(message) => {
                serde_json::to_string(&EnvelopeOut { event, data: message })
            },
            Self::OnlineUsers(users) => serde_json::to_string(&EnvelopeOut { event, data: users }),
        };
        encoded.map_err(|e| ProtocolError::encode(&e))
    }

    /// Decode a JSON envelope text frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Decode` if the frame is not an envelope or the payload
    ///   does not match the event kind
    /// - `ProtocolError::UnknownEvent` if the event name is not recognised
    pub fn decode(text: &str) -> Result<Self> {
        let envelope: EnvelopeIn = serde_json::from_str(text).map_err(|e| ProtocolError::decode(&e))?;
        let kind = EventKind::from_name(&envelope.event)
            .ok_or_else(|| ProtocolError::UnknownEvent(envelope.event.clone()))?;

        let decoded = match kind {
            EventKind::NewMessage => serde_json::from_value(envelope.data).map(Self::NewMessage),
            EventKind::OnlineUsers => serde_json::from_value(envelope.data).map(Self::OnlineUsers),
            EventKind::SendMessage => serde_json::from_value(envelope.data).map(Self::SendMessage),
        };
        decoded.map_err(|e| ProtocolError::decode(&e))
    }
}
