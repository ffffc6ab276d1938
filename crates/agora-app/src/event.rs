//! Application input events.
//!
//! This module defines [`AppEvent`], the set of inputs that drive the
//! [`crate::App`] state machine.
//!
//! Events originate from two distinct sources:
//! - User commands.
//! - Protocol notifications translated from the underlying client.

use agora_client::Operation;
use agora_proto::{ConversationId, Message, UserId, UserProfile};

use crate::{Command, ConnectionState};

/// Events processed by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// User command.
    Command(Command),

    /// A user logged in (or a stored session was restored).
    SessionStarted(UserProfile),

    /// The session ended.
    SessionEnded,

    /// The current user's profile was replaced.
    ProfileUpdated(UserProfile),

    /// Channel state changed.
    ConnectionChanged(ConnectionState),

    /// History of the active conversation arrived.
    ConversationLoaded {
        /// Conversation.
        conversation_id: ConversationId,
        /// Messages in display order.
        messages: Vec<Message>,
    },

    /// A message was added to the active conversation.
    MessageAppended(Message),

    /// A message sent by the current user was accepted.
    MessageSent(Message),

    /// Unread counter changed.
    UnreadChanged {
        /// Conversation.
        conversation_id: ConversationId,
        /// New count.
        count: usize,
    },

    /// Contact list replaced.
    ContactsRefreshed(Vec<UserProfile>),

    /// Online set replaced.
    PresenceChanged(Vec<UserId>),

    /// An asynchronous operation failed or timed out.
    OperationFailed {
        /// What was attempted.
        operation: Operation,
        /// Failure description.
        message: String,
    },

    /// Error occurred.
    Error {
        /// Error description.
        message: String,
    },
}
