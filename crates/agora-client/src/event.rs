//! Client events and actions.

use std::fmt;

use agora_core::ChannelState;
use agora_proto::{
    ApiError, ApiRequest, ApiResponse, ChannelEvent, ConversationId, Credentials, Message,
    MessageDraft, ProfileUpdate, Registration, UserId, UserProfile,
};

use crate::{error::ClientError, session::PersistedSession};

/// Identifies an in-flight HTTP request.
pub type RequestId = u64;

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Forwarding user intents (login, send message, ...)
/// - Completing the HTTP requests the client asked for
/// - Reporting channel open/close and inbound frames
/// - Driving time forward via ticks
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation environments.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Log in with credentials.
    Login(Credentials),

    /// Create an account and log in.
    Register(Registration),

    /// Log out. Local teardown happens immediately; server invalidation is
    /// best effort.
    Logout,

    /// Restore a session persisted by an earlier run.
    Rehydrate(PersistedSession),

    /// Open the persistent channel for the current user.
    ConnectChannel,

    /// Close the persistent channel.
    DisconnectChannel,

    /// Transport acknowledged the channel connection.
    ChannelOpened,

    /// Transport closed or failed without being asked to.
    ChannelClosed {
        /// Reason reported by the transport.
        reason: String,
    },

    /// Text frame received on the channel.
    FrameReceived(String),

    /// Switch to a conversation and fetch its history.
    LoadConversation {
        /// Conversation to load.
        conversation_id: ConversationId,
    },

    /// Send a message.
    SendMessage(MessageDraft),

    /// Fetch the contact list.
    RefreshContacts,

    /// Update the current user's profile.
    UpdateProfile(ProfileUpdate),

    /// An HTTP request completed.
    ApiResponse {
        /// Request this answers.
        request_id: RequestId,
        /// Decoded response or error.
        result: Result<ApiResponse, ApiError>,
    },

    /// Time tick for timeout processing.
    ///
    /// The caller should send ticks periodically so that request deadlines,
    /// the channel connect timeout and scheduled reconnects fire.
    Tick {
        /// Current time from the environment.
        now: I,
    },
}

/// User-facing operations that can fail asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Login.
    Login,
    /// Account registration.
    Register,
    /// Server-side logout.
    Logout,
    /// Profile update.
    UpdateProfile,
    /// Contact list fetch.
    RefreshContacts,
    /// Conversation history fetch.
    LoadConversation,
    /// Message send.
    SendMessage,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::Logout => "logout",
            Self::UpdateProfile => "update profile",
            Self::RefreshContacts => "refresh contacts",
            Self::LoadConversation => "load conversation",
            Self::SendMessage => "send message",
        };
        f.write_str(name)
    }
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Perform an HTTP request and feed the result back as
    /// [`ClientEvent::ApiResponse`].
    Http {
        /// Correlation id for the response.
        request_id: RequestId,
        /// What to send.
        request: ApiRequest,
        /// Bearer token, for requests that need one.
        token: Option<String>,
    },

    /// Open the channel transport for `user_id`.
    OpenChannel {
        /// Identity parameter for the connection.
        user_id: UserId,
    },

    /// Close the channel transport.
    CloseChannel,

    /// Send an event over the open channel.
    Emit(ChannelEvent),

    /// Write the session to persistent storage.
    PersistSession(PersistedSession),

    /// Remove the session from persistent storage.
    ClearSession,

    /// A session started (login, registration or rehydration).
    SessionStarted(UserProfile),

    /// The session ended.
    SessionEnded,

    /// The current user was replaced.
    ProfileUpdated(UserProfile),

    /// The channel moved to a new state.
    ChannelStateChanged(ChannelState),

    /// The active conversation's cache was replaced by a history fetch.
    ConversationLoaded {
        /// Conversation now cached.
        conversation_id: ConversationId,
        /// Cache contents after the load.
        messages: Vec<Message>,
    },

    /// A message was appended to the active conversation's cache.
    MessageAppended(Message),

    /// The service accepted a message sent by the current user.
    MessageSent(Message),

    /// Unread counter of a conversation changed.
    UnreadChanged {
        /// Conversation.
        conversation_id: ConversationId,
        /// New count.
        count: usize,
    },

    /// The contact cache was replaced.
    ContactsRefreshed(Vec<UserProfile>),

    /// The presence set was replaced. Sorted.
    PresenceChanged(Vec<UserId>),

    /// An asynchronous operation failed.
    OperationFailed {
        /// What failed.
        operation: Operation,
        /// Why.
        error: ClientError,
    },
}

impl From<agora_core::ChannelAction> for ClientAction {
    fn from(action: agora_core::ChannelAction) -> Self {
        match action {
            agora_core::ChannelAction::Open { user_id } => Self::OpenChannel { user_id },
            agora_core::ChannelAction::Close => Self::CloseChannel,
            agora_core::ChannelAction::Emit(event) => Self::Emit(event),
        }
    }
}
