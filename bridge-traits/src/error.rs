use thiserror::Error;

/// Failures reported by a [`RemoteMusicClient`](crate::remote::RemoteMusicClient).
///
/// Clients map their transport errors onto these variants. Only
/// [`RemoteError::SessionExpired`] is eligible for a session renewal retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Remote session expired")]
    SessionExpired,

    #[error("Remote {resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("Remote service unreachable: {0}")]
    Unreachable(String),

    #[error("Malformed remote response: {0}")]
    MalformedResponse(String),

    #[error("Remote service rejected the request: {0}")]
    Rejected(String),

    #[error("Session credentials unavailable: {0}")]
    CredentialsUnavailable(String),
}

impl RemoteError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// True for the narrow session-expiry signature.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
