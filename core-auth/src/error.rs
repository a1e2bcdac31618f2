use bridge_traits::RemoteError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Session renewal failed during {operation}: {source}")]
    SessionRenewalFailed {
        operation: String,
        #[source]
        source: RemoteError,
    },
}

impl AuthError {
    /// The remote error underneath, whichever stage produced it.
    pub fn remote(&self) -> &RemoteError {
        match self {
            AuthError::Remote(err) => err,
            AuthError::SessionRenewalFailed { source, .. } => source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
