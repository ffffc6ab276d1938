//! Client-to-Application translation layer.
//!
//! The [`Bridge`] wraps the sans-IO [`agora_client::Client`] and adapts it to
//! the application lifecycle.
//!
//! # Responsibilities
//!
//! - Converts [`crate::AppAction`] intents into client events.
//! - Accumulates [`Effect`]s (HTTP calls, channel control, outgoing frames,
//!   session persistence) for the driver to perform in the next I/O cycle.
//! - Converts client notifications back into [`crate::AppEvent`]s.
//! - Passes time through generically so the same code runs against a real
//!   clock and a simulated one.

use agora_client::{
    Client, ClientAction, ClientConfig, ClientError, ClientEvent, Environment, PersistedSession,
    RequestId,
};
use agora_proto::{ApiError, ApiRequest, ApiResponse, UserId};

use crate::{AppAction, AppEvent};

/// I/O the driver must perform on behalf of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Execute an API call and report the result with the same id.
    Http {
        /// Correlates the response.
        request_id: RequestId,
        /// Call to make.
        request: ApiRequest,
        /// Bearer token.
        token: Option<String>,
    },
    /// Open the channel as this user, replacing any existing one.
    OpenChannel {
        /// Identifies the connection to the service.
        user_id: UserId,
    },
    /// Close the channel.
    CloseChannel,
    /// Send an encoded frame on the channel.
    SendFrame(String),
    /// Write the session to storage, or erase it when `None`.
    Persist(Option<PersistedSession>),
}

/// Bridge between App and Client protocol logic.
///
/// Generic over Environment to support both production and simulation.
pub struct Bridge<E: Environment> {
    client: Client<E>,
    effects: Vec<Effect>,
}

impl<E: Environment> Bridge<E> {
    /// Create a bridge around a fresh client.
    pub fn new(env: E, config: ClientConfig) -> Self {
        Self { client: Client::new(env, config), effects: Vec::new() }
    }

    /// The wrapped client.
    pub fn client(&self) -> &Client<E> {
        &self.client
    }

    /// Resume a stored session.
    pub fn restore(&mut self, persisted: PersistedSession) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::Rehydrate(persisted))
    }

    /// Process an App action and return resulting App events.
    pub fn process_app_action(&mut self, action: AppAction) -> Vec<AppEvent> {
        let event = match action {
            AppAction::Render | AppAction::Quit => return vec![],
            AppAction::Login(credentials) => ClientEvent::Login(credentials),
            AppAction::Register(registration) => ClientEvent::Register(registration),
            AppAction::Logout => ClientEvent::Logout,
            AppAction::ConnectChannel => ClientEvent::ConnectChannel,
            AppAction::DisconnectChannel => ClientEvent::DisconnectChannel,
            AppAction::SelectConversation { conversation_id } => {
                ClientEvent::LoadConversation { conversation_id }
            },
            AppAction::SendMessage(draft) => ClientEvent::SendMessage(draft),
            AppAction::RefreshContacts => ClientEvent::RefreshContacts,
            AppAction::UpdateProfile(update) => ClientEvent::UpdateProfile(update),
        };
        self.dispatch(event)
    }

    /// Deliver the result of an [`Effect::Http`].
    pub fn handle_api_response(
        &mut self,
        request_id: RequestId,
        result: Result<ApiResponse, ApiError>,
    ) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::ApiResponse { request_id, result })
    }

    /// The channel finished opening.
    pub fn handle_channel_opened(&mut self) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::ChannelOpened)
    }

    /// The channel closed or failed to open.
    pub fn handle_channel_closed(&mut self, reason: String) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::ChannelClosed { reason })
    }

    /// Handle a text frame from the channel.
    pub fn handle_frame(&mut self, text: String) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::FrameReceived(text))
    }

    /// Process a time tick.
    pub fn handle_tick(&mut self, now: E::Instant) -> Vec<AppEvent> {
        self.dispatch(ClientEvent::Tick { now })
    }

    /// Take pending effects in the order they were produced.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn dispatch(&mut self, event: ClientEvent<E::Instant>) -> Vec<AppEvent> {
        let result = self.client.handle(event);
        self.handle_client_result(result)
    }

    fn handle_client_result(&mut self, result: Result<Vec<ClientAction>, ClientError>) -> Vec<AppEvent> {
        match result {
            Ok(actions) => self.process_client_actions(actions),
            Err(e) => vec![AppEvent::Error { message: e.to_string() }],
        }
    }

    fn process_client_actions(&mut self, actions: Vec<ClientAction>) -> Vec<AppEvent> {
        let mut events = Vec::new();

        for action in actions {
            match action {
                ClientAction::Http { request_id, request, token } => {
                    self.effects.push(Effect::Http { request_id, request, token });
                },
                ClientAction::OpenChannel { user_id } => {
                    self.effects.push(Effect::OpenChannel { user_id });
                },
                ClientAction::CloseChannel => self.effects.push(Effect::CloseChannel),
                ClientAction::Emit(event) => match event.encode() {
                    Ok(frame) => self.effects.push(Effect::SendFrame(frame)),
                    Err(error) => tracing::warn!(kind = %event.kind(), %error, "dropping unencodable frame"),
                },
                ClientAction::PersistSession(persisted) => {
                    self.effects.push(Effect::Persist(Some(persisted)));
                },
                ClientAction::ClearSession => self.effects.push(Effect::Persist(None)),
                ClientAction::SessionStarted(user) => events.push(AppEvent::SessionStarted(user)),
                ClientAction::SessionEnded => events.push(AppEvent::SessionEnded),
                ClientAction::ProfileUpdated(user) => events.push(AppEvent::ProfileUpdated(user)),
                ClientAction::ChannelStateChanged(state) => {
                    events.push(AppEvent::ConnectionChanged(state.into()));
                },
                ClientAction::ConversationLoaded { conversation_id, messages } => {
                    events.push(AppEvent::ConversationLoaded { conversation_id, messages });
                },
                ClientAction::MessageAppended(message) => events.push(AppEvent::MessageAppended(message)),
                ClientAction::MessageSent(message) => events.push(AppEvent::MessageSent(message)),
                ClientAction::UnreadChanged { conversation_id, count } => {
                    events.push(AppEvent::UnreadChanged { conversation_id, count });
                },
                ClientAction::ContactsRefreshed(contacts) => {
                    events.push(AppEvent::ContactsRefreshed(contacts));
                },
                ClientAction::PresenceChanged(online) => events.push(AppEvent::PresenceChanged(online)),
                ClientAction::OperationFailed { operation, error } => {
                    events.push(AppEvent::OperationFailed { operation, message: error.to_string() });
                },
            }
        }

        events
    }
}
