use bridge_traits::RemoteError;
use core_auth::AuthError;
use core_library::models::ResourceType;
use core_library::LibraryError;
use core_sync::SyncError;
use thiserror::Error;

/// Error taxonomy reported to callers of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The remote service no longer has the resource; the local copy is gone too
    StaleReference,
    /// The session could not be renewed, or failed again after renewal
    SessionExpired,
    /// The store failed twice with a busy/locked/timeout condition
    TransientStore,
    /// A referenced song was missing and could not be fetched
    DanglingForeignReference,
    MalformedRemoteResponse,
    RemoteUnavailable,
    Store,
    InvalidInput,
    Configuration,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{resource_type} {id} no longer exists remotely")]
    StaleReference { resource_type: ResourceType, id: String },

    #[error("Remote call for {resource_type} {id} failed: {source}")]
    Remote {
        resource_type: ResourceType,
        id: String,
        #[source]
        source: AuthError,
    },

    #[error("Store operation for {resource_type} {id} failed: {source}")]
    Store {
        resource_type: ResourceType,
        id: String,
        #[source]
        source: LibraryError,
    },

    #[error("Sync of {resource_type} {id} failed: {source}")]
    Sync {
        resource_type: ResourceType,
        id: String,
        #[source]
        source: SyncError,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] core_runtime::Error),
}

impl CoreError {
    /// Attach the failing resource to a lower-level error.
    pub fn for_resource(resource_type: ResourceType, id: &str, err: SyncError) -> Self {
        let id = id.to_string();
        match err {
            SyncError::Library(source) => CoreError::Store {
                resource_type,
                id,
                source,
            },
            SyncError::Remote(source) => CoreError::Remote {
                resource_type,
                id,
                source,
            },
            source => CoreError::Sync {
                resource_type,
                id,
                source,
            },
        }
    }

    pub fn store(resource_type: ResourceType, id: &str, source: LibraryError) -> Self {
        CoreError::Store {
            resource_type,
            id: id.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::StaleReference { .. } => ErrorKind::StaleReference,
            CoreError::Remote { source, .. } => auth_kind(source),
            CoreError::Store { source, .. } => library_kind(source),
            CoreError::Sync { source, .. } => match source {
                SyncError::Library(err) => library_kind(err),
                SyncError::Remote(err) => auth_kind(err),
                SyncError::DanglingReference { .. } => ErrorKind::DanglingForeignReference,
                SyncError::MalformedSnapshot { .. } => ErrorKind::MalformedRemoteResponse,
            },
            CoreError::InvalidInput(_) => ErrorKind::InvalidInput,
            CoreError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// The resource the failure is about, when there is one.
    pub fn resource(&self) -> Option<(ResourceType, &str)> {
        match self {
            CoreError::StaleReference { resource_type, id }
            | CoreError::Remote { resource_type, id, .. }
            | CoreError::Store { resource_type, id, .. }
            | CoreError::Sync { resource_type, id, .. } => Some((*resource_type, id.as_str())),
            CoreError::InvalidInput(_) | CoreError::Configuration(_) => None,
        }
    }
}

fn auth_kind(err: &AuthError) -> ErrorKind {
    match err {
        AuthError::SessionRenewalFailed { .. } => ErrorKind::SessionExpired,
        AuthError::Remote(remote) => remote_kind(remote),
    }
}

fn remote_kind(err: &RemoteError) -> ErrorKind {
    match err {
        RemoteError::SessionExpired | RemoteError::CredentialsUnavailable(_) => ErrorKind::SessionExpired,
        RemoteError::NotFound { .. } => ErrorKind::StaleReference,
        RemoteError::MalformedResponse(_) => ErrorKind::MalformedRemoteResponse,
        RemoteError::Unreachable(_) | RemoteError::Rejected(_) => ErrorKind::RemoteUnavailable,
    }
}

fn library_kind(err: &LibraryError) -> ErrorKind {
    if err.is_transient() {
        ErrorKind::TransientStore
    } else {
        ErrorKind::Store
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
