//! In-memory model of the chat service.
//!
//! `SimServer` answers the same [`ApiRequest`]s the real HTTP API does and
//! keeps one inbox per connected channel. Tests drive it explicitly: there
//! are no background tasks, and every frame sits in an inbox until a driver
//! drains it.
//!
//! Failure injection covers the cases the client must survive: rejected
//! requests, revoked tokens, refused channel connections, and dropped
//! channels.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::{Arc, Mutex, PoisonError},
};

use agora_proto::{
    ApiError, ApiRequest, ApiResponse, AuthSession, ChannelEvent, ConversationId, Credentials,
    Message, MessageDraft, ProfileUpdate, Registration, UserId, UserProfile,
};
use chrono::{DateTime, Utc};

/// A [`SimServer`] shared by several drivers.
pub type SharedSimServer = Arc<Mutex<SimServer>>;

/// Create an empty shared server.
pub fn create_shared_server() -> SharedSimServer {
    Arc::new(Mutex::new(SimServer::new()))
}

/// Lock a shared server. A test that panicked while holding the lock has
/// already failed, so poisoning is ignored.
pub(crate) fn lock(server: &SharedSimServer) -> std::sync::MutexGuard<'_, SimServer> {
    server.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Account {
    password: String,
    profile: UserProfile,
}

#[derive(Default)]
struct Socket {
    connections: usize,
    inbox: VecDeque<String>,
}

/// Simulated chat service.
#[derive(Default)]
pub struct SimServer {
    /// Accounts by email.
    accounts: BTreeMap<String, Account>,
    /// Token to account email.
    tokens: HashMap<String, String>,
    /// Stored messages in send order.
    messages: Vec<Message>,
    /// Live channels by user.
    sockets: BTreeMap<UserId, Socket>,
    /// Errors returned instead of handling the next requests.
    injected_failures: VecDeque<ApiError>,
    /// Channel connections are refused while set.
    refuse_channels: bool,
    next_id: u64,
    requests_handled: usize,
}

impl SimServer {
    /// Server with no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account directly, bypassing the API.
    pub fn add_user(&mut self, email: &str, password: &str, display_name: &str) -> UserProfile {
        let id = UserId::new(format!("user-{}", self.next_seq()));
        let profile = UserProfile::new(id, display_name);
        self.accounts
            .insert(email.to_owned(), Account { password: password.to_owned(), profile: profile.clone() });
        profile
    }

    /// Answer an API request.
    pub fn handle(&mut self, request: &ApiRequest, token: Option<&str>) -> Result<ApiResponse, ApiError> {
        self.requests_handled += 1;
        if let Some(error) = self.injected_failures.pop_front() {
            tracing::debug!(path = %request.path(), %error, "injected failure");
            return Err(error);
        }

        match request {
            ApiRequest::Login(credentials) => self.login(credentials),
            ApiRequest::Register(registration) => self.register(registration),
            ApiRequest::Logout => {
                if let Some(token) = token {
                    self.tokens.remove(token);
                }
                Ok(ApiResponse::LoggedOut)
            },
            ApiRequest::UpdateProfile(update) => {
                let email = self.authenticate(token)?;
                self.update_profile(&email, update)
            },
            ApiRequest::ListContacts => {
                let me = self.user_for(&self.authenticate(token)?)?;
                let contacts = self
                    .accounts
                    .values()
                    .filter(|a| a.profile.id != me.id)
                    .map(|a| a.profile.clone())
                    .collect();
                Ok(ApiResponse::Contacts(contacts))
            },
            ApiRequest::FetchConversation { conversation_id } => {
                let me = self.user_for(&self.authenticate(token)?)?;
                Ok(ApiResponse::Conversation(self.history(conversation_id, &me.id)))
            },
            ApiRequest::SendMessage(draft) => {
                let me = self.user_for(&self.authenticate(token)?)?;
                Ok(ApiResponse::MessageSent(self.store_message(&me.id, draft)))
            },
        }
    }

    fn login(&mut self, credentials: &Credentials) -> Result<ApiResponse, ApiError> {
        let user = match self.accounts.get(&credentials.email) {
            Some(account) if account.password == credentials.password => account.profile.clone(),
            _ => return Err(rejected(400, "Invalid credentials")),
        };
        Ok(ApiResponse::Session(self.issue_token(&credentials.email, user)))
    }

    fn register(&mut self, registration: &Registration) -> Result<ApiResponse, ApiError> {
        if registration.password.len() < 6 {
            return Err(rejected(400, "Password must be at least 6 characters"));
        }
        if self.accounts.contains_key(&registration.email) {
            return Err(rejected(400, "Email already exists"));
        }
        let user = self.add_user(&registration.email, &registration.password, &registration.display_name);
        Ok(ApiResponse::Session(self.issue_token(&registration.email, user)))
    }

    fn update_profile(&mut self, email: &str, update: &ProfileUpdate) -> Result<ApiResponse, ApiError> {
        let account = self.accounts.get_mut(email).ok_or_else(|| rejected(404, "User not found"))?;
        let profile = &mut account.profile;
        if let Some(name) = &update.display_name {
            profile.display_name.clone_from(name);
        }
        if let Some(avatar) = &update.avatar {
            profile.avatar = Some(avatar.clone());
        }
        if let Some(bio) = &update.bio {
            profile.bio = Some(bio.clone());
        }
        Ok(ApiResponse::Profile(profile.clone()))
    }

    fn issue_token(&mut self, email: &str, user: UserProfile) -> AuthSession {
        let token = format!("token-{}", self.next_seq());
        self.tokens.insert(token.clone(), email.to_owned());
        AuthSession { token, user }
    }

    fn authenticate(&self, token: Option<&str>) -> Result<String, ApiError> {
        let token = token.ok_or_else(|| rejected(401, "Unauthorized - No Token Provided"))?;
        self.tokens.get(token).cloned().ok_or_else(|| rejected(401, "Unauthorized - Invalid Token"))
    }

    fn user_for(&self, email: &str) -> Result<UserProfile, ApiError> {
        self.accounts
            .get(email)
            .map(|a| a.profile.clone())
            .ok_or_else(|| rejected(404, "User not found"))
    }

    fn history(&self, conversation_id: &ConversationId, me: &UserId) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|m| &m.conversation_id == conversation_id && (&m.sender_id == me || &m.receiver_id == me))
            .cloned()
            .collect()
    }

    fn store_message(&mut self, sender: &UserId, draft: &MessageDraft) -> Message {
        let seq = self.next_seq();
        let message = Message {
            id: format!("msg-{seq}").into(),
            conversation_id: draft.conversation_id.clone(),
            sender_id: sender.clone(),
            receiver_id: draft.receiver_id.clone(),
            content: draft.content.clone(),
            created_at: DateTime::<Utc>::from_timestamp(i64::try_from(seq).unwrap_or(i64::MAX), 0)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        };
        self.messages.push(message.clone());
        self.push(&message.receiver_id, &ChannelEvent::NewMessage(message.clone()));
        message
    }

    /// Store a message from `sender` as if another client had sent it, and
    /// push it to the receiver's channel.
    pub fn inject_message(&mut self, sender: &UserId, draft: &MessageDraft) -> Message {
        self.store_message(sender, draft)
    }

    /// Register a channel connection for `user_id`.
    ///
    /// Returns `false` when connections are being refused.
    pub fn connect(&mut self, user_id: &UserId) -> bool {
        if self.refuse_channels {
            return false;
        }
        self.sockets.entry(user_id.clone()).or_default().connections += 1;
        self.broadcast_presence();
        true
    }

    /// Drop one channel connection for `user_id`.
    pub fn disconnect(&mut self, user_id: &UserId) {
        let Some(socket) = self.sockets.get_mut(user_id) else {
            return;
        };
        socket.connections = socket.connections.saturating_sub(1);
        if socket.connections == 0 {
            self.sockets.remove(user_id);
            self.broadcast_presence();
        }
    }

    /// Drop every channel of `user_id` from the server side.
    pub fn kick(&mut self, user_id: &UserId) {
        if self.sockets.remove(user_id).is_some() {
            self.broadcast_presence();
        }
    }

    /// Refuse or accept new channel connections.
    pub fn set_refuse_channels(&mut self, refuse: bool) {
        self.refuse_channels = refuse;
    }

    /// True if `user_id` has at least one live channel.
    pub fn is_connected(&self, user_id: &UserId) -> bool {
        self.sockets.contains_key(user_id)
    }

    /// Number of live channels for `user_id`.
    pub fn connections(&self, user_id: &UserId) -> usize {
        self.sockets.get(user_id).map_or(0, |s| s.connections)
    }

    /// Handle a frame sent by `user_id`'s client.
    ///
    /// A forwarded `sendMessage` is relayed to the receiver as `newMessage`,
    /// so the receiver may see the same message twice.
    pub fn receive_frame(&mut self, from: &UserId, text: &str) {
        match ChannelEvent::decode(text) {
            Ok(ChannelEvent::SendMessage(message)) if &message.sender_id == from => {
                self.push(&message.receiver_id.clone(), &ChannelEvent::NewMessage(message));
            },
            Ok(event) => tracing::debug!(kind = %event.kind(), "ignoring client event"),
            Err(error) => tracing::warn!(%error, "undecodable client frame"),
        }
    }

    /// Take the next frame queued for `user_id`.
    pub fn next_frame(&mut self, user_id: &UserId) -> Option<String> {
        self.sockets.get_mut(user_id)?.inbox.pop_front()
    }

    /// True if frames are queued for `user_id`.
    pub fn has_frames(&self, user_id: &UserId) -> bool {
        self.sockets.get(user_id).is_some_and(|s| !s.inbox.is_empty())
    }

    /// Fail the next request with `error` instead of handling it.
    pub fn inject_failure(&mut self, error: ApiError) {
        self.injected_failures.push_back(error);
    }

    /// Invalidate every issued token.
    pub fn revoke_tokens(&mut self) {
        self.tokens.clear();
    }

    /// All stored messages.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of API requests received, including failed ones.
    pub fn requests_handled(&self) -> usize {
        self.requests_handled
    }

    fn push(&mut self, user_id: &UserId, event: &ChannelEvent) {
        let Some(socket) = self.sockets.get_mut(user_id) else {
            return;
        };
        match event.encode() {
            Ok(frame) => socket.inbox.push_back(frame),
            Err(error) => tracing::warn!(%error, "failed to encode push"),
        }
    }

    fn broadcast_presence(&mut self) {
        let online: Vec<UserId> = self.sockets.keys().cloned().collect();
        let event = ChannelEvent::OnlineUsers(online);
        let Ok(frame) = event.encode() else {
            return;
        };
        for socket in self.sockets.values_mut() {
            socket.inbox.push_back(frame.clone());
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn rejected(status: u16, message: &str) -> ApiError {
    ApiError { status: Some(status), message: message.to_owned() }
}
