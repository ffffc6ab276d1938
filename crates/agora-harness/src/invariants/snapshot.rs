//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use agora_core::ChannelState;
use agora_proto::{ConversationId, MessageId, UserId};

use crate::SimRuntime;

/// Snapshot of the entire system state.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }

    /// Add a client snapshot.
    pub fn add_client(&mut self, client: ClientSnapshot) {
        self.clients.push(client);
    }
}

/// Snapshot of a single client's observable state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Label used in violation messages.
    pub label: String,
    /// Session user in the client. `None` when logged out.
    pub user: Option<UserId>,
    /// User shown by the App.
    pub app_user: Option<UserId>,
    /// Client channel state.
    pub channel: ChannelState,
    /// Channels the server holds open for this client.
    pub live_connections: usize,
    /// Conversation the cache is scoped to.
    pub active_conversation: Option<ConversationId>,
    /// Cached messages as (id, conversation) in cache order.
    pub cached_messages: Vec<(MessageId, ConversationId)>,
    /// Conversation on screen and the ids of its messages.
    pub view: Option<(ConversationId, Vec<(MessageId, ConversationId)>)>,
    /// Cached contacts.
    pub contacts: usize,
    /// Users in the presence set.
    pub online: usize,
    /// Sum of unread badges.
    pub unread: usize,
}

impl ClientSnapshot {
    /// Logged-out client with nothing cached.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            user: None,
            app_user: None,
            channel: ChannelState::Disconnected,
            live_connections: 0,
            active_conversation: None,
            cached_messages: Vec::new(),
            view: None,
            contacts: 0,
            online: 0,
            unread: 0,
        }
    }

    /// Capture the state of a simulated runtime.
    pub fn capture(label: impl Into<String>, runtime: &SimRuntime) -> Self {
        let client = runtime.bridge().client();
        let app = runtime.app();
        let cache = client.conversation();

        Self {
            label: label.into(),
            user: client.session().user_id().cloned(),
            app_user: app.user().map(|u| u.id.clone()),
            channel: client.channel_state(),
            live_connections: runtime.driver().live_connections(),
            active_conversation: cache.active().cloned(),
            cached_messages: cache
                .messages()
                .iter()
                .map(|m| (m.id.clone(), m.conversation_id.clone()))
                .collect(),
            view: app.conversation().map(|view| {
                let ids = view.messages.iter().map(|m| (m.id.clone(), m.conversation_id.clone())).collect();
                (view.conversation_id.clone(), ids)
            }),
            contacts: client.contacts().len(),
            online: client.presence().len(),
            unread: app.unread_counts().values().sum(),
        }
    }

    /// Set the session user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<UserId>) -> Self {
        let user = user.into();
        self.app_user = Some(user.clone());
        self.user = Some(user);
        self
    }

    /// Set the channel state.
    #[must_use]
    pub fn with_channel(mut self, channel: ChannelState) -> Self {
        self.channel = channel;
        self
    }

    /// Set the server-side connection count.
    #[must_use]
    pub fn with_live_connections(mut self, count: usize) -> Self {
        self.live_connections = count;
        self
    }

    /// Scope the cache to a conversation.
    #[must_use]
    pub fn with_active_conversation(mut self, conversation_id: impl Into<ConversationId>) -> Self {
        self.active_conversation = Some(conversation_id.into());
        self
    }

    /// Add a cached message.
    #[must_use]
    pub fn with_cached_message(mut self, id: impl Into<MessageId>, conversation: impl Into<ConversationId>) -> Self {
        self.cached_messages.push((id.into(), conversation.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot() {
        let snapshot = SystemSnapshot::empty();
        assert!(snapshot.clients.is_empty());
    }

    #[test]
    fn client_snapshot_builder() {
        let client = ClientSnapshot::new("ada")
            .with_user("u1")
            .with_channel(ChannelState::Connected)
            .with_live_connections(1)
            .with_active_conversation("c1")
            .with_cached_message("m1", "c1");

        assert_eq!(client.user, Some(UserId::from("u1")));
        assert_eq!(client.app_user, client.user);
        assert_eq!(client.cached_messages.len(), 1);
        assert_eq!(client.active_conversation, Some(ConversationId::from("c1")));
    }
}
