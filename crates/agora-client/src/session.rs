//! Session store.
//!
//! Who is logged in and with which token. The channel lifecycle tied to the
//! session lives in [`crate::Client`]; this type only holds identity.

use std::fmt;

use agora_proto::{AuthSession, UserId, UserProfile};
use serde::{Deserialize, Serialize};

/// Minimal session fields kept across process restarts.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    /// Access token.
    pub token: String,
    /// Current user at the time of persisting.
    pub user: UserProfile,
}

impl fmt::Debug for PersistedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistedSession")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

impl From<AuthSession> for PersistedSession {
    fn from(auth: AuthSession) -> Self {
        Self { token: auth.token, user: auth.user }
    }
}

/// The authenticated user and their access token.
///
/// Token and user are always set and cleared together.
#[derive(Default)]
pub struct Session {
    active: Option<PersistedSession>,
}

impl Session {
    /// Empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a user is logged in.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Access token, if logged in.
    pub fn token(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.token.as_str())
    }

    /// Current user, if logged in.
    pub fn current_user(&self) -> Option<&UserProfile> {
        self.active.as_ref().map(|s| &s.user)
    }

    /// Id of the current user, if logged in.
    pub fn user_id(&self) -> Option<&UserId> {
        self.current_user().map(|user| &user.id)
    }

    /// Start a session, replacing any existing one.
    ///
    /// Returns what should be persisted.
    pub fn start(&mut self, persisted: PersistedSession) -> PersistedSession {
        self.active = Some(persisted.clone());
        persisted
    }

    /// Replace the current user wholesale.
    ///
    /// Returns the session to re-persist, or `None` if nobody is logged in.
    pub fn replace_user(&mut self, user: UserProfile) -> Option<PersistedSession> {
        let active = self.active.as_mut()?;
        active.user = user;
        Some(active.clone())
    }

    /// End the session. Returns the token it held, if any.
    pub fn clear(&mut self) -> Option<String> {
        self.active.take().map(|s| s.token)
    }

    /// Snapshot for persistence.
    pub fn persisted(&self) -> Option<&PersistedSession> {
        self.active.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("active", &self.is_active())
            .field("user", &self.current_user().map(|u| &u.id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(name: &str) -> PersistedSession {
        PersistedSession { token: "tok".into(), user: UserProfile::new("u1", name) }
    }

    #[test]
    fn start_and_clear() {
        let mut session = Session::new();
        assert!(!session.is_active());
        assert_eq!(session.user_id(), None);

        session.start(persisted("Ada"));
        assert!(session.is_active());
        assert_eq!(session.token(), Some("tok"));
        assert_eq!(session.user_id(), Some(&UserId::from("u1")));

        assert_eq!(session.clear(), Some("tok".into()));
        assert!(!session.is_active());
        assert_eq!(session.clear(), None);
    }

    #[test]
    fn replace_user_requires_active_session() {
        let mut session = Session::new();
        assert!(session.replace_user(UserProfile::new("u1", "Ada")).is_none());

        session.start(persisted("Ada"));
        let updated = session.replace_user(UserProfile::new("u1", "Ada L.")).unwrap();
        assert_eq!(updated.user.display_name, "Ada L.");
        assert_eq!(updated.token, "tok");
        assert_eq!(session.current_user().unwrap().display_name, "Ada L.");
    }

    #[test]
    fn debug_output_hides_token() {
        let rendered = format!("{:?}", persisted("Ada"));
        assert!(!rendered.contains("tok\""), "{rendered}");
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn session_debug_reports_activity_without_token() {
        let mut session = Session::new();
        assert!(format!("{session:?}").contains("active: false"));

        session.start(persisted("Ada"));
        let rendered = format!("{session:?}");
        assert!(rendered.contains("active: true"), "{rendered}");
        assert!(!rendered.contains("tok"), "{rendered}");
    }
}
