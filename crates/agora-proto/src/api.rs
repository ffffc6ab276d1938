//! HTTP API request and response descriptions.
//!
//! The client state machine never performs I/O. It describes each request as
//! an [`ApiRequest`]; the driver turns that into an HTTP call (method, path,
//! JSON body, bearer token) and feeds the decoded [`ApiResponse`] or the
//! [`ApiError`] back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    ids::{ConversationId, UserId},
    records::{Credentials, Message, MessageDraft, ProfileUpdate, Registration, UserProfile},
};

/// HTTP method of an API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
}

/// A request against the remote HTTP API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    /// Exchange credentials for a session.
    Login(Credentials),
    /// Create an account and start a session.
    Register(Registration),
    /// Invalidate the current session server-side.
    Logout,
    /// Change profile fields of the current user.
    UpdateProfile(ProfileUpdate),
    /// List the users the current user can message.
    ListContacts,
    /// Fetch the ordered message history of a conversation.
    FetchConversation {
        /// Conversation to fetch.
        conversation_id: ConversationId,
    },
    /// Store a new message.
    SendMessage(MessageDraft),
}

impl ApiRequest {
    /// HTTP method for this request.
    pub fn method(&self) -> Method {
        match self {
            Self::Login(_) | Self::Register(_) | Self::Logout | Self::SendMessage(_) => {
                Method::Post
            },
            Self::UpdateProfile(_) => Method::Put,
            Self::ListContacts | Self::FetchConversation { .. } => Method::Get,
        }
    }

    /// Path relative to the API base URL.
    pub fn path(&self) -> String {
        match self {
            Self::Login(_) => "/auth/login".to_owned(),
            Self::Register(_) => "/auth/register".to_owned(),
            Self::Logout => "/auth/logout".to_owned(),
            Self::UpdateProfile(_) => "/auth/update-profile".to_owned(),
            Self::ListContacts => "/messages/users".to_owned(),
            Self::FetchConversation { conversation_id } => conversation_path(conversation_id),
            Self::SendMessage(draft) => send_path(&draft.receiver_id),
        }
    }

    /// Whether the request must carry the session's bearer token.
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Self::Login(_) | Self::Register(_))
    }

    /// Whether a 400/401 answer means the supplied credentials were rejected
    /// rather than the session being invalid.
    pub fn is_credential_exchange(&self) -> bool {
        matches!(self, Self::Login(_) | Self::Register(_))
    }

    /// JSON body, if the endpoint takes one.
    pub fn body(&self) -> Result<Option<serde_json::Value>> {
        let value = match self {
            Self::Login(credentials) => serde_json::to_value(credentials),
            Self::Register(registration) => serde_json::to_value(registration),
            Self::UpdateProfile(update) => serde_json::to_value(update),
            Self::SendMessage(draft) => serde_json::to_value(draft),
            Self::Logout | Self::ListContacts | Self::FetchConversation { .. } => return Ok(None),
        };
        value.map(Some).map_err(|e| ProtocolError::encode(&e))
    }

    /// Decode a successful (2xx) response body for this request.
    pub fn decode_response(&self, body: &[u8]) -> Result<ApiResponse> {
        let decoded = match self {
            Self::Login(_) | Self::Register(_) => {
                serde_json::from_slice(body).map(ApiResponse::Session)
            },
            Self::Logout => return Ok(ApiResponse::LoggedOut),
            Self::UpdateProfile(_) => serde_json::from_slice(body).map(ApiResponse::Profile),
            Self::ListContacts => serde_json::from_slice(body).map(ApiResponse::Contacts),
            Self::FetchConversation { .. } => {
                serde_json::from_slice(body).map(ApiResponse::Conversation)
            },
            Self::SendMessage(_) => serde_json::from_slice(body).map(ApiResponse::MessageSent),
        };
        decoded.map_err(|e| ProtocolError::decode(&e))
    }
}

/// Token and profile returned by login and register.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// Profile of the authenticated user.
    pub user: UserProfile,
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession").field("token", &"<redacted>").field("user", &self.user).finish()
    }
}

/// Decoded successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse {
    /// Login or register succeeded.
    Session(AuthSession),
    /// Logout acknowledged.
    LoggedOut,
    /// Updated profile of the current user.
    Profile(UserProfile),
    /// Contact list.
    Contacts(Vec<UserProfile>),
    /// Conversation history in server order.
    Conversation(Vec<Message>),
    /// The stored message with its server-assigned id and timestamp.
    MessageSent(Message),
}

/// Failed API call.
///
/// `status` is `None` when no HTTP response was received at all (DNS,
/// refused connection, malformed body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code, if a response was received.
    pub status: Option<u16>,
    /// Error message reported by the service or the HTTP stack.
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(code) => write!(f, "HTTP {code}: {}", self.message),
            None => write!(f, "request failed: {}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

impl ApiError {
    /// Error without an HTTP response.
    pub fn network(message: impl Into<String>) -> Self {
        Self { status: None, message: message.into() }
    }

    /// Error built from a non-2xx response.
    ///
    /// Uses the `message` (or `error`) field of a JSON body when present,
    /// otherwise the raw body text.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let message = match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => parsed.message,
            Err(_) => String::from_utf8_lossy(body).trim().to_owned(),
        };
        Self { status: Some(status), message }
    }

    /// 401 or 403.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status, Some(401 | 403))
    }

    /// 400 or 401, which credential exchanges use for bad credentials.
    pub fn is_rejected_credentials(&self) -> bool {
        matches!(self.status, Some(400 | 401))
    }
}

/// Path of a conversation's message history.
pub fn conversation_path(conversation_id: &ConversationId) -> String {
    format!("/messages/{conversation_id}")
}

/// Path for sending a message to a user.
pub fn send_path(receiver_id: &UserId) -> String {
    format!("/messages/send/{receiver_id}")
}
