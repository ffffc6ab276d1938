//! Application side-effects and intents.
//!
//! This module defines the [`AppAction`] enum, which represents instructions
//! produced by the [`crate::App`] state machine for the runtime to execute.

use agora_proto::{ConversationId, Credentials, MessageDraft, ProfileUpdate, Registration};

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Log in.
    Login(Credentials),

    /// Create an account and log in.
    Register(Registration),

    /// Log out.
    Logout,

    /// Open the persistent channel.
    ConnectChannel,

    /// Close the persistent channel.
    DisconnectChannel,

    /// Switch to a conversation and load its history.
    SelectConversation {
        /// Conversation to show.
        conversation_id: ConversationId,
    },

    /// Send a message.
    SendMessage(MessageDraft),

    /// Fetch contacts.
    RefreshContacts,

    /// Change the current user's profile.
    UpdateProfile(ProfileUpdate),
}
