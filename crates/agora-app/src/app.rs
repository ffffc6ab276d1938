//! Application state machine.
//!
//! [`App`] owns what the user sees: who is logged in, the open conversation,
//! contacts with their presence, unread badges, and a status line. It consumes
//! [`crate::AppEvent`]s and produces [`crate::AppAction`]s; it never performs
//! I/O and never talks to the client directly.
//!
//! Everything it shows arrives from the client through the bridge, so it is a
//! mirror, not a second source of truth.

use std::collections::{BTreeMap, BTreeSet};

use agora_client::Operation;
use agora_proto::{ConversationId, Credentials, MessageDraft, Registration, UserId, UserProfile};

use crate::{
    AppAction, AppEvent, Command, ConnectionState, ContactView, ConversationView, input::HELP,
};

/// Application state machine.
#[derive(Debug, Clone, Default)]
pub struct App {
    /// Logged-in user. `None` when logged out.
    user: Option<UserProfile>,
    /// Channel state.
    connection: ConnectionState,
    /// Conversation on screen.
    conversation: Option<ConversationView>,
    /// Contacts in server order.
    contacts: Vec<UserProfile>,
    /// Users in the latest presence snapshot.
    online: BTreeSet<UserId>,
    /// Unread badges. Conversations with no unread messages are absent.
    unread: BTreeMap<ConversationId, usize>,
    /// Transient status line.
    status_message: Option<String>,
}

impl App {
    /// Logged-out app with nothing on screen.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Command(command) => self.handle_command(command),
            AppEvent::SessionStarted(user) => {
                self.status_message = Some(format!("Logged in as {}", user.display_name));
                self.user = Some(user);
                vec![AppAction::Render]
            },
            AppEvent::SessionEnded => {
                *self = Self { status_message: Some("Logged out".into()), ..Self::default() };
                vec![AppAction::Render]
            },
            AppEvent::ProfileUpdated(user) => {
                self.status_message = Some("Profile updated".into());
                self.user = Some(user);
                vec![AppAction::Render]
            },
            AppEvent::ConnectionChanged(state) => {
                self.connection = state;
                vec![AppAction::Render]
            },
            AppEvent::ConversationLoaded { conversation_id, messages } => {
                match self.conversation.as_mut() {
                    Some(view) if view.conversation_id == conversation_id => {
                        view.messages = messages;
                        view.loading = false;
                    },
                    _ => return vec![],
                }
                vec![AppAction::Render]
            },
            AppEvent::MessageAppended(message) => {
                match self.conversation.as_mut() {
                    Some(view) if view.conversation_id == message.conversation_id => {
                        if !view.contains(&message.id) {
                            view.messages.push(message);
                        }
                    },
                    _ => return vec![],
                }
                vec![AppAction::Render]
            },
            AppEvent::MessageSent(_) => {
                self.status_message = None;
                vec![AppAction::Render]
            },
            AppEvent::UnreadChanged { conversation_id, count } => {
                if count == 0 {
                    self.unread.remove(&conversation_id);
                } else {
                    self.unread.insert(conversation_id, count);
                }
                vec![AppAction::Render]
            },
            AppEvent::ContactsRefreshed(contacts) => {
                self.contacts = contacts;
                vec![AppAction::Render]
            },
            AppEvent::PresenceChanged(online) => {
                self.online = online.into_iter().collect();
                vec![AppAction::Render]
            },
            AppEvent::OperationFailed { operation, message } => {
                if operation == Operation::LoadConversation
                    && let Some(view) = self.conversation.as_mut()
                {
                    view.loading = false;
                }
                self.status_message = Some(format!("Error: {operation} failed: {message}"));
                vec![AppAction::Render]
            },
            AppEvent::Error { message } => {
                self.status_message = Some(format!("Error: {message}"));
                vec![AppAction::Render]
            },
        }
    }

    fn handle_command(&mut self, command: Command) -> Vec<AppAction> {
        match command {
            Command::Login { email, password } => {
                self.status_message = Some("Logging in...".into());
                vec![AppAction::Login(Credentials::new(email, password)), AppAction::Render]
            },
            Command::Register { email, password, display_name } => {
                self.status_message = Some("Creating account...".into());
                let registration = Registration { display_name, email, password };
                vec![AppAction::Register(registration), AppAction::Render]
            },
            Command::Logout => vec![AppAction::Logout, AppAction::Render],
            Command::Connect => vec![AppAction::ConnectChannel, AppAction::Render],
            Command::Disconnect => vec![AppAction::DisconnectChannel, AppAction::Render],
            Command::Contacts => vec![AppAction::RefreshContacts, AppAction::Render],
            Command::Open { conversation_id, peer } => {
                if self.user.is_none() {
                    return self.status("Log in first");
                }
                self.unread.remove(&conversation_id);
                self.conversation = Some(ConversationView::new(conversation_id.clone(), peer));
                vec![AppAction::SelectConversation { conversation_id }, AppAction::Render]
            },
            Command::Send { content } => {
                let Some(view) = self.conversation.as_ref() else {
                    return self.status("Open a conversation first");
                };
                let draft = MessageDraft {
                    conversation_id: view.conversation_id.clone(),
                    receiver_id: view.peer.clone(),
                    content,
                };
                vec![AppAction::SendMessage(draft), AppAction::Render]
            },
            Command::UpdateProfile(update) => vec![AppAction::UpdateProfile(update), AppAction::Render],
            Command::Help => self.status(HELP),
            Command::Quit => vec![AppAction::Quit],
        }
    }

    fn status(&mut self, message: &str) -> Vec<AppAction> {
        self.status_message = Some(message.to_owned());
        vec![AppAction::Render]
    }

    /// Logged-in user. `None` when logged out.
    pub fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    /// Channel state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    /// Conversation on screen. `None` if none was opened.
    pub fn conversation(&self) -> Option<&ConversationView> {
        self.conversation.as_ref()
    }

    /// Contacts with presence, in server order.
    pub fn contacts(&self) -> Vec<ContactView<'_>> {
        self.contacts
            .iter()
            .map(|profile| ContactView { profile, online: self.online.contains(&profile.id) })
            .collect()
    }

    /// Users currently online.
    pub fn online(&self) -> &BTreeSet<UserId> {
        &self.online
    }

    /// Unread count for a conversation.
    pub fn unread(&self, conversation_id: &ConversationId) -> usize {
        self.unread.get(conversation_id).copied().unwrap_or(0)
    }

    /// All non-zero unread badges.
    pub fn unread_counts(&self) -> &BTreeMap<ConversationId, usize> {
        &self.unread
    }

    /// Transient status message. `None` if no message.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use agora_proto::Message;
    use chrono::{DateTime, Utc};

    use super::*;

    fn logged_in_app() -> App {
        let mut app = App::new();
        let _ = app.handle(AppEvent::SessionStarted(UserProfile::new("u1", "Ada")));
        app
    }

    fn message(id: &str, conversation: &str) -> Message {
        Message {
            id: id.into(),
            conversation_id: conversation.into(),
            sender_id: "u2".into(),
            receiver_id: "u1".into(),
            content: format!("body of {id}"),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn login_command_produces_credentials() {
        let mut app = App::new();
        let actions =
            app.handle(AppEvent::Command(Command::Login { email: "a@x".into(), password: "pw".into() }));

        assert_eq!(actions, vec![AppAction::Login(Credentials::new("a@x", "pw")), AppAction::Render]);
        assert_eq!(app.status_message(), Some("Logging in..."));
    }

    #[test]
    fn open_requires_login() {
        let mut app = App::new();
        let actions =
            app.handle(AppEvent::Command(Command::Open { conversation_id: "c1".into(), peer: "u2".into() }));

        assert_eq!(actions, vec![AppAction::Render]);
        assert!(app.conversation().is_none());
    }

    #[test]
    fn open_selects_and_clears_badge() {
        let mut app = logged_in_app();
        let _ = app.handle(AppEvent::UnreadChanged { conversation_id: "c1".into(), count: 3 });
        let actions =
            app.handle(AppEvent::Command(Command::Open { conversation_id: "c1".into(), peer: "u2".into() }));

        assert_eq!(actions, vec![
            AppAction::SelectConversation { conversation_id: "c1".into() },
            AppAction::Render
        ]);
        assert_eq!(app.unread(&"c1".into()), 0);
        assert!(app.conversation().is_some_and(|v| v.loading));
    }

    #[test]
    fn send_without_conversation_is_refused() {
        let mut app = logged_in_app();
        let actions = app.handle(AppEvent::Command(Command::Send { content: "hi".into() }));

        assert_eq!(actions, vec![AppAction::Render]);
        assert_eq!(app.status_message(), Some("Open a conversation first"));
    }

    #[test]
    fn send_addresses_the_peer() {
        let mut app = logged_in_app();
        let _ = app.handle(AppEvent::Command(Command::Open { conversation_id: "c1".into(), peer: "u2".into() }));
        let actions = app.handle(AppEvent::Command(Command::Send { content: "hi".into() }));

        assert_eq!(actions, vec![
            AppAction::SendMessage(MessageDraft {
                conversation_id: "c1".into(),
                receiver_id: "u2".into(),
                content: "hi".into(),
            }),
            AppAction::Render
        ]);
    }

    #[test]
    fn stale_history_is_ignored() {
        let mut app = logged_in_app();
        let _ = app.handle(AppEvent::Command(Command::Open { conversation_id: "c2".into(), peer: "u3".into() }));
        let actions = app.handle(AppEvent::ConversationLoaded {
            conversation_id: "c1".into(),
            messages: vec![message("m1", "c1")],
        });

        assert!(actions.is_empty());
        assert!(app.conversation().is_some_and(|v| v.messages.is_empty() && v.loading));
    }

    #[test]
    fn failed_history_load_stops_loading() {
        let mut app = logged_in_app();
        let _ = app.handle(AppEvent::Command(Command::Open { conversation_id: "c1".into(), peer: "u2".into() }));
        let actions = app.handle(AppEvent::OperationFailed {
            operation: Operation::LoadConversation,
            message: "request timed out after 15s".into(),
        });

        assert_eq!(actions, vec![AppAction::Render]);
        assert!(app.conversation().is_some_and(|v| v.messages.is_empty() && !v.loading));
        assert!(app.status_message().is_some_and(|s| s.starts_with("Error: load conversation failed")));
    }

    #[test]
    fn unrelated_failure_keeps_loading() {
        let mut app = logged_in_app();
        let _ = app.handle(AppEvent::Command(Command::Open { conversation_id: "c1".into(), peer: "u2".into() }));
        let _ = app.handle(AppEvent::OperationFailed {
            operation: Operation::RefreshContacts,
            message: "network error".into(),
        });

        assert!(app.conversation().is_some_and(|v| v.loading));
    }

    #[test]
    fn appended_messages_show_once() {
        let mut app = logged_in_app();
        let _ = app.handle(AppEvent::Command(Command::Open { conversation_id: "c1".into(), peer: "u2".into() }));
        let _ = app.handle(AppEvent::ConversationLoaded { conversation_id: "c1".into(), messages: vec![] });
        let _ = app.handle(AppEvent::MessageAppended(message("m1", "c1")));
        let _ = app.handle(AppEvent::MessageAppended(message("m1", "c1")));
        let _ = app.handle(AppEvent::MessageAppended(message("m2", "c9")));

        let view = app.conversation().map(|v| v.messages.len());
        assert_eq!(view, Some(1));
    }

    #[test]
    fn contacts_carry_presence() {
        let mut app = logged_in_app();
        let _ = app.handle(AppEvent::ContactsRefreshed(vec![
            UserProfile::new("u2", "Grace"),
            UserProfile::new("u3", "Linus"),
        ]));
        let _ = app.handle(AppEvent::PresenceChanged(vec!["u3".into()]));

        let online: Vec<_> = app.contacts().iter().map(|c| (c.profile.display_name.clone(), c.online)).collect();
        assert_eq!(online, vec![("Grace".to_owned(), false), ("Linus".to_owned(), true)]);
    }

    #[test]
    fn session_end_resets_view() {
        let mut app = logged_in_app();
        let _ = app.handle(AppEvent::Command(Command::Open { conversation_id: "c1".into(), peer: "u2".into() }));
        let _ = app.handle(AppEvent::UnreadChanged { conversation_id: "c2".into(), count: 1 });
        let _ = app.handle(AppEvent::ConnectionChanged(ConnectionState::Connected));
        let _ = app.handle(AppEvent::SessionEnded);

        assert!(app.user().is_none());
        assert!(app.conversation().is_none());
        assert!(app.unread_counts().is_empty());
        assert_eq!(app.connection_state(), ConnectionState::Disconnected);
        assert_eq!(app.status_message(), Some("Logged out"));
    }

    #[test]
    fn quit_only_quits() {
        let mut app = App::new();
        assert_eq!(app.handle(AppEvent::Command(Command::Quit)), vec![AppAction::Quit]);
    }
}
