//! Client error types.

use std::time::Duration;

use agora_core::ConnectionError;
use agora_proto::ApiError;
use thiserror::Error;

/// Errors surfaced by client operations.
///
/// Every failure is recoverable: the client stays usable and previously
/// cached data remains readable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Credentials were rejected.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Reason reported by the service.
        message: String,
    },

    /// Missing or expired session.
    #[error("not authorized: {message}")]
    Authorization {
        /// Reason reported by the service, or why the client refused.
        message: String,
    },

    /// Channel is not usable.
    #[error(transparent)]
    Transport(#[from] ConnectionError),

    /// Request failed at the HTTP level or was answered with an error.
    #[error(transparent)]
    Request(ApiError),

    /// Request got no answer before its deadline.
    ///
    /// The request-failure case for an unanswered call, as opposed to
    /// [`ClientError::Request`] for an HTTP error.
    #[error("request timed out after {elapsed:?}")]
    Timeout {
        /// How long we waited.
        elapsed: Duration,
    },

    /// Request was rejected locally before being sent.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What was wrong with it.
        reason: String,
    },
}

impl ClientError {
    /// Operation needs a logged-in session.
    pub(crate) fn not_logged_in() -> Self {
        Self::Authorization { message: "not logged in".into() }
    }

    /// Map an error answer for a credential exchange (login, register).
    pub(crate) fn from_credential_exchange(err: ApiError) -> Self {
        if err.is_rejected_credentials() {
            Self::Authentication { message: err.message }
        } else {
            Self::Request(err)
        }
    }

    /// Map an error answer for a request made with the session token.
    pub(crate) fn from_authenticated(err: ApiError) -> Self {
        if err.is_unauthorized() {
            Self::Authorization { message: err.message }
        } else {
            Self::Request(err)
        }
    }

    /// True if repeating the operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_transient(),
            Self::Request(err) => err.status.is_none_or(|status| status >= 500),
            Self::Timeout { .. } => true,
            Self::Authentication { .. } | Self::Authorization { .. } | Self::InvalidRequest { .. } => {
                false
            },
        }
    }
}

/// Errors from session persistence.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be parsed or written as JSON.
    #[error("session store is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_credentials_are_authentication_failures() {
        let err = ClientError::from_credential_exchange(ApiError::from_response(
            400,
            br#"{"message":"Invalid credentials"}"#,
        ));
        assert_eq!(err, ClientError::Authentication { message: "Invalid credentials".into() });
        assert!(!err.is_transient());
    }

    #[test]
    fn expired_token_is_authorization_failure() {
        let err = ClientError::from_authenticated(ApiError::from_response(401, b"expired"));
        assert!(matches!(err, ClientError::Authorization { .. }));
    }

    #[test]
    fn server_errors_are_transient_request_failures() {
        let err = ClientError::from_authenticated(ApiError::from_response(503, b"busy"));
        assert!(matches!(err, ClientError::Request(_)));
        assert!(err.is_transient());

        let err = ClientError::from_authenticated(ApiError::from_response(404, b"gone"));
        assert!(!err.is_transient());

        assert!(ClientError::from_authenticated(ApiError::network("reset")).is_transient());
    }

    #[test]
    fn timeout_reads_as_a_transient_request_failure() {
        let err = ClientError::Timeout { elapsed: Duration::from_secs(15) };
        assert_eq!(err.to_string(), "request timed out after 15s");
        assert!(err.is_transient());
    }
}
