//! Observable application state types.
//!
//! These are the view model: the subset of client state needed to render a
//! frame, without the request bookkeeping behind it.

use agora_core::ChannelState;
use agora_proto::{ConversationId, Message, MessageId, UserId, UserProfile};

/// Channel connection state as shown to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No channel.
    #[default]
    Disconnected,
    /// Channel opening.
    Connecting,
    /// Live updates flowing.
    Connected,
}

impl From<ChannelState> for ConnectionState {
    fn from(state: ChannelState) -> Self {
        match state {
            ChannelState::Disconnected => Self::Disconnected,
            ChannelState::Connecting => Self::Connecting,
            ChannelState::Connected => Self::Connected,
        }
    }
}

/// The conversation on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
    /// Conversation shown.
    pub conversation_id: ConversationId,
    /// Recipient of messages typed here.
    pub peer: UserId,
    /// Messages in display order.
    pub messages: Vec<Message>,
    /// History requested but not yet loaded.
    pub loading: bool,
}

impl ConversationView {
    /// Empty view waiting for its history.
    pub fn new(conversation_id: ConversationId, peer: UserId) -> Self {
        Self { conversation_id, peer, messages: Vec::new(), loading: true }
    }

    /// True if a message with this id is shown.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|m| &m.id == id)
    }
}

/// A contact paired with its presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactView<'a> {
    /// Contact profile.
    pub profile: &'a UserProfile,
    /// Contact is in the latest presence snapshot.
    pub online: bool,
}
