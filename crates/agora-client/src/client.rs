//! Client state machine.
//!
//! The `Client` owns the whole client-side state: session, channel, router and
//! caches. It is the single mutation point for all of them; user intents, HTTP
//! completions, channel pushes and ticks are applied one at a time through
//! [`Client::handle`].

use std::collections::BTreeMap;

use agora_core::{ChannelAction, ChannelHandle, ChannelState, ConnectionError, Environment, EventRouter};
use agora_proto::{
    ApiError, ApiRequest, ApiResponse, ChannelEvent, ConversationId, EventKind, Message, MessageDraft,
    ProfileUpdate, ProtocolError, UserId,
};

use crate::{
    chat_cache::{AppendOutcome, ConversationCache},
    config::ClientConfig,
    error::ClientError,
    event::{ClientAction, ClientEvent, Operation, RequestId},
    presence::{ContactCache, PresenceSet},
    session::{PersistedSession, Session},
};

/// Local reaction to a routed push event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushHandler {
    /// Append to the conversation cache.
    AppendMessage,
    /// Replace the presence set.
    ReplacePresence,
}

/// What an in-flight request was for.
#[derive(Debug, Clone)]
enum PendingKind {
    Login,
    Register,
    Logout,
    UpdateProfile,
    RefreshContacts,
    LoadConversation(ConversationId),
    SendMessage,
}

impl PendingKind {
    fn operation(&self) -> Operation {
        match self {
            Self::Login => Operation::Login,
            Self::Register => Operation::Register,
            Self::Logout => Operation::Logout,
            Self::UpdateProfile => Operation::UpdateProfile,
            Self::RefreshContacts => Operation::RefreshContacts,
            Self::LoadConversation(_) => Operation::LoadConversation,
            Self::SendMessage => Operation::SendMessage,
        }
    }
}

#[derive(Debug)]
struct PendingRequest<I> {
    kind: PendingKind,
    sent_at: I,
}

/// Client-side state of one running Agora client.
pub struct Client<E: Environment> {
    /// Environment for time and randomness.
    env: E,

    config: ClientConfig,

    /// Who is logged in.
    session: Session,

    /// The one persistent channel. Owned here and nowhere else.
    channel: ChannelHandle<E::Instant>,

    /// Push event subscriptions, one per event kind.
    router: EventRouter<PushHandler>,

    /// Messages of the active conversation.
    conversation: ConversationCache,

    contacts: ContactCache,

    presence: PresenceSet,

    /// In-flight HTTP requests by id.
    pending: BTreeMap<RequestId, PendingRequest<E::Instant>>,

    /// Latest history fetch. Any earlier one is superseded.
    active_load: Option<RequestId>,

    next_request_id: RequestId,
}

impl<E: Environment> Client<E> {
    /// Create a logged-out client.
    pub fn new(env: E, config: ClientConfig) -> Self {
        let channel = ChannelHandle::new(config.channel.clone());
        Self {
            env,
            config,
            session: Session::new(),
            channel,
            router: EventRouter::new(),
            conversation: ConversationCache::new(),
            contacts: ContactCache::new(),
            presence: PresenceSet::new(),
            pending: BTreeMap::new(),
            active_load: None,
            next_request_id: 1,
        }
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Session store.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The persistent channel.
    pub fn channel(&self) -> &ChannelHandle<E::Instant> {
        &self.channel
    }

    /// Current channel state.
    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    /// Active conversation cache.
    pub fn conversation(&self) -> &ConversationCache {
        &self.conversation
    }

    /// Contact cache.
    pub fn contacts(&self) -> &ContactCache {
        &self.contacts
    }

    /// Presence set.
    pub fn presence(&self) -> &PresenceSet {
        &self.presence
    }

    /// Number of registered push subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.router.len()
    }

    /// Number of HTTP requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Process an event and return resulting actions.
    ///
    /// Errors are returned for intents rejected before anything is sent
    /// (not logged in, channel closed, empty input). Failures of requests
    /// already in flight arrive later as [`ClientAction::OperationFailed`].
    pub fn handle(&mut self, event: ClientEvent<E::Instant>) -> Result<Vec<ClientAction>, ClientError> {
        match event {
            ClientEvent::Login(credentials) => {
                Ok(self.begin(ApiRequest::Login(credentials), PendingKind::Login, None))
            },
            ClientEvent::Register(registration) => {
                Ok(self.begin(ApiRequest::Register(registration), PendingKind::Register, None))
            },
            ClientEvent::Logout => Ok(self.handle_logout()),
            ClientEvent::Rehydrate(persisted) => Ok(self.handle_rehydrate(persisted)),
            ClientEvent::ConnectChannel => Ok(self.connect_channel()),
            ClientEvent::DisconnectChannel => Ok(self.disconnect_channel()),
            ClientEvent::ChannelOpened => Ok(self.handle_channel_opened()),
            ClientEvent::ChannelClosed { reason } => Ok(self.handle_channel_closed(&reason)),
            ClientEvent::FrameReceived(text) => Ok(self.handle_frame(&text)),
            ClientEvent::LoadConversation { conversation_id } => {
                self.handle_load_conversation(conversation_id)
            },
            ClientEvent::SendMessage(draft) => self.handle_send_message(draft),
            ClientEvent::RefreshContacts => self.handle_refresh_contacts(),
            ClientEvent::UpdateProfile(update) => self.handle_update_profile(update),
            ClientEvent::ApiResponse { request_id, result } => {
                Ok(self.handle_api_response(request_id, result))
            },
            ClientEvent::Tick { now } => Ok(self.handle_tick(now)),
        }
    }

    fn handle_logout(&mut self) -> Vec<ClientAction> {
        // A credential exchange still in flight must not start a session later
        self.pending.retain(|_, p| !matches!(p.kind, PendingKind::Login | PendingKind::Register));

        let Some(token) = self.session.token().map(str::to_owned) else {
            tracing::debug!("logout without active session");
            return vec![];
        };

        // Best-effort server invalidation; local teardown does not wait for it
        let mut actions = self.begin(ApiRequest::Logout, PendingKind::Logout, Some(token));
        actions.extend(self.end_session("logout"));
        actions
    }

    fn handle_rehydrate(&mut self, persisted: PersistedSession) -> Vec<ClientAction> {
        if self.session.is_active() {
            tracing::debug!("rehydrate ignored: session already active");
            return vec![];
        }
        self.start_session(persisted, false)
    }

    fn start_session(&mut self, persisted: PersistedSession, persist: bool) -> Vec<ClientAction> {
        let mut actions = Vec::new();
        if self.session.is_active() {
            actions.extend(self.end_session("replaced by new session"));
        }

        let user = persisted.user.clone();
        let persisted = self.session.start(persisted);
        if persist {
            actions.push(ClientAction::PersistSession(persisted));
        }

        self.router.subscribe(EventKind::NewMessage, PushHandler::AppendMessage);
        self.router.subscribe(EventKind::OnlineUsers, PushHandler::ReplacePresence);

        tracing::info!(user_id = %user.id, "session started");
        actions.push(ClientAction::SessionStarted(user));
        actions.extend(self.connect_channel());
        actions
    }

    /// Local teardown shared by logout and rejected sessions.
    fn end_session(&mut self, reason: &str) -> Vec<ClientAction> {
        let mut actions = self.disconnect_channel();

        self.session.clear();
        self.router.clear();
        self.conversation.clear();
        self.contacts.clear();
        self.presence.clear();
        self.active_load = None;
        self.pending.retain(|_, p| matches!(p.kind, PendingKind::Logout));

        tracing::info!(reason, "session ended");
        actions.push(ClientAction::ClearSession);
        actions.push(ClientAction::SessionEnded);
        actions
    }

    fn connect_channel(&mut self) -> Vec<ClientAction> {
        let before = self.channel.state();
        let now = self.env.now();
        let actions = self.channel.connect(self.session.user_id(), now);
        self.channel_actions(before, actions)
    }

    fn disconnect_channel(&mut self) -> Vec<ClientAction> {
        let before = self.channel.state();
        let actions = self.channel.disconnect();
        self.channel_actions(before, actions)
    }

    fn handle_channel_opened(&mut self) -> Vec<ClientAction> {
        let before = self.channel.state();
        let actions = self.channel.on_open();
        self.channel_actions(before, actions)
    }

    fn handle_channel_closed(&mut self, reason: &str) -> Vec<ClientAction> {
        let before = self.channel.state();
        let now = self.env.now();
        let entropy = self.env.random_u64();
        let actions = self.channel.on_closed(reason, now, entropy);
        self.channel_actions(before, actions)
    }

    fn channel_actions(&self, before: ChannelState, actions: Vec<ChannelAction>) -> Vec<ClientAction> {
        let mut out: Vec<ClientAction> = actions.into_iter().map(ClientAction::from).collect();
        let after = self.channel.state();
        if after != before {
            out.push(ClientAction::ChannelStateChanged(after));
        }
        out
    }

    fn handle_frame(&mut self, text: &str) -> Vec<ClientAction> {
        if !self.channel.is_connected() {
            tracing::debug!("frame on closed channel dropped");
            return vec![];
        }

        let event = match ChannelEvent::decode(text) {
            Ok(event) => event,
            Err(ProtocolError::UnknownEvent(name)) => {
                tracing::debug!(%name, "ignoring unknown channel event");
                return vec![];
            },
            Err(err) => {
                tracing::warn!(error = %err, "undecodable channel frame");
                return vec![];
            },
        };

        let Some(handler) = self.router.route(&event).copied() else {
            return vec![];
        };

        match (handler, event) {
            (PushHandler::AppendMessage, ChannelEvent::NewMessage(message)) => {
                self.on_push_message(message)
            },
            (PushHandler::ReplacePresence, ChannelEvent::OnlineUsers(online)) => {
                self.on_presence_snapshot(online)
            },
            (handler, event) => {
                tracing::debug!(?handler, kind = %event.kind(), "handler does not accept event");
                vec![]
            },
        }
    }

    fn on_push_message(&mut self, message: Message) -> Vec<ClientAction> {
        match self.conversation.append(message.clone()) {
            AppendOutcome::Appended => vec![ClientAction::MessageAppended(message)],
            AppendOutcome::Duplicate => {
                tracing::debug!(message_id = %message.id, "duplicate push ignored");
                vec![]
            },
            AppendOutcome::Inactive => {
                if self.session.user_id() == Some(&message.sender_id) {
                    return vec![];
                }
                let count = self.conversation.mark_unread(&message.conversation_id);
                vec![ClientAction::UnreadChanged { conversation_id: message.conversation_id, count }]
            },
        }
    }

    fn on_presence_snapshot(&mut self, online: Vec<UserId>) -> Vec<ClientAction> {
        if self.presence.replace(online) {
            vec![ClientAction::PresenceChanged(self.presence.to_vec())]
        } else {
            vec![]
        }
    }

    fn handle_load_conversation(
        &mut self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ClientAction>, ClientError> {
        let token = self.token()?;

        let mut actions = Vec::new();
        if self.conversation.activate(conversation_id.clone()) > 0 {
            actions.push(ClientAction::UnreadChanged { conversation_id: conversation_id.clone(), count: 0 });
        }

        // Only the latest history fetch may replace the cache
        let superseded = self.active_load.take().and_then(|id| self.pending.remove(&id).map(|_| id));
        if let Some(request_id) = superseded {
            tracing::debug!(request_id, "history fetch superseded");
        }

        let request = ApiRequest::FetchConversation { conversation_id: conversation_id.clone() };
        let request_id = self.next_request_id;
        actions.extend(self.begin(request, PendingKind::LoadConversation(conversation_id), Some(token)));
        self.active_load = Some(request_id);
        Ok(actions)
    }

    fn handle_send_message(&mut self, draft: MessageDraft) -> Result<Vec<ClientAction>, ClientError> {
        let token = self.token()?;

        if !self.channel.is_connected() {
            return Err(ConnectionError::NotConnected { state: self.channel.state() }.into());
        }
        if draft.content.trim().is_empty() {
            return Err(ClientError::InvalidRequest { reason: "message is empty".into() });
        }

        Ok(self.begin(ApiRequest::SendMessage(draft), PendingKind::SendMessage, Some(token)))
    }

    fn handle_refresh_contacts(&mut self) -> Result<Vec<ClientAction>, ClientError> {
        let token = self.token()?;
        Ok(self.begin(ApiRequest::ListContacts, PendingKind::RefreshContacts, Some(token)))
    }

    fn handle_update_profile(&mut self, update: ProfileUpdate) -> Result<Vec<ClientAction>, ClientError> {
        let token = self.token()?;
        if update.is_empty() {
            return Err(ClientError::InvalidRequest { reason: "profile update has no fields".into() });
        }
        Ok(self.begin(ApiRequest::UpdateProfile(update), PendingKind::UpdateProfile, Some(token)))
    }

    fn handle_api_response(
        &mut self,
        request_id: RequestId,
        result: Result<ApiResponse, ApiError>,
    ) -> Vec<ClientAction> {
        let Some(pending) = self.pending.remove(&request_id) else {
            tracing::debug!(request_id, "response for unknown or expired request dropped");
            return vec![];
        };
        if self.active_load == Some(request_id) {
            self.active_load = None;
        }

        match result {
            Ok(response) => self.complete(pending.kind, response),
            Err(err) => self.fail(&pending.kind, err),
        }
    }

    fn complete(&mut self, kind: PendingKind, response: ApiResponse) -> Vec<ClientAction> {
        match (kind, response) {
            (PendingKind::Login | PendingKind::Register, ApiResponse::Session(auth)) => {
                self.start_session(auth.into(), true)
            },
            (PendingKind::Logout, ApiResponse::LoggedOut) => {
                tracing::debug!("server session invalidated");
                vec![]
            },
            (PendingKind::UpdateProfile, ApiResponse::Profile(profile)) => {
                match self.session.replace_user(profile.clone()) {
                    Some(persisted) => {
                        tracing::info!(user_id = %profile.id, "profile updated");
                        vec![ClientAction::PersistSession(persisted), ClientAction::ProfileUpdated(profile)]
                    },
                    None => vec![],
                }
            },
            (PendingKind::RefreshContacts, ApiResponse::Contacts(contacts)) => {
                self.contacts.replace(contacts.clone());
                vec![ClientAction::ContactsRefreshed(contacts)]
            },
            (PendingKind::LoadConversation(conversation_id), ApiResponse::Conversation(messages)) => {
                if !self.conversation.replace(&conversation_id, messages) {
                    tracing::debug!(%conversation_id, "stale history discarded");
                    return vec![];
                }
                let messages = self.conversation.messages().to_vec();
                vec![ClientAction::ConversationLoaded { conversation_id, messages }]
            },
            (PendingKind::SendMessage, ApiResponse::MessageSent(message)) => self.on_message_sent(message),
            (kind, response) => {
                let operation = kind.operation();
                tracing::warn!(%operation, ?response, "response does not match request");
                let error = ClientError::Request(ApiError::network("unexpected response"));
                vec![ClientAction::OperationFailed { operation, error }]
            },
        }
    }

    fn on_message_sent(&mut self, message: Message) -> Vec<ClientAction> {
        let mut actions = Vec::new();
        match self.conversation.append(message.clone()) {
            AppendOutcome::Appended => actions.push(ClientAction::MessageAppended(message.clone())),
            AppendOutcome::Duplicate => {
                tracing::debug!(message_id = %message.id, "sent message already delivered by push");
            },
            AppendOutcome::Inactive => {
                tracing::debug!(conversation_id = %message.conversation_id, "sent to inactive conversation");
            },
        }
        actions.push(ClientAction::MessageSent(message.clone()));

        // The service stored the message; fan-out over the channel is best effort
        if let Some(action) = self.router.emit(&self.channel, ChannelEvent::SendMessage(message)) {
            actions.push(action.into());
        }
        actions
    }

    fn fail(&mut self, kind: &PendingKind, err: ApiError) -> Vec<ClientAction> {
        let operation = kind.operation();
        let error = match kind {
            PendingKind::Login | PendingKind::Register => ClientError::from_credential_exchange(err),
            _ => ClientError::from_authenticated(err),
        };

        if operation == Operation::Logout {
            tracing::warn!(error = %error, "server-side logout failed");
            return vec![];
        }

        let mut actions = Vec::new();
        if matches!(error, ClientError::Authorization { .. }) && self.session.is_active() {
            tracing::warn!(%operation, "session rejected by service, ending it locally");
            actions.extend(self.end_session("authorization failure"));
        }

        tracing::warn!(%operation, error = %error, "operation failed");
        actions.push(ClientAction::OperationFailed { operation, error });
        actions
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<ClientAction> {
        let before = self.channel.state();
        let entropy = self.env.random_u64();
        let channel_actions = self.channel.tick(now, entropy);
        let mut actions = self.channel_actions(before, channel_actions);

        let timeout = self.config.request_timeout;
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| now - p.sent_at >= timeout)
            .map(|(id, _)| *id)
            .collect();

        for request_id in expired {
            let Some(pending) = self.pending.remove(&request_id) else {
                continue;
            };
            if self.active_load == Some(request_id) {
                self.active_load = None;
            }

            let operation = pending.kind.operation();
            let elapsed = now - pending.sent_at;
            if operation == Operation::Logout {
                tracing::debug!(request_id, "server-side logout timed out");
                continue;
            }

            tracing::warn!(request_id, %operation, ?elapsed, "request timed out");
            actions.push(ClientAction::OperationFailed { operation, error: ClientError::Timeout { elapsed } });
        }

        actions
    }

    fn begin(&mut self, request: ApiRequest, kind: PendingKind, token: Option<String>) -> Vec<ClientAction> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        tracing::debug!(request_id, operation = %kind.operation(), path = %request.path(), "request issued");
        self.pending.insert(request_id, PendingRequest { kind, sent_at: self.env.now() });
        vec![ClientAction::Http { request_id, request, token }]
    }

    fn token(&self) -> Result<String, ClientError> {
        self.session.token().map(str::to_owned).ok_or_else(ClientError::not_logged_in)
    }
}
