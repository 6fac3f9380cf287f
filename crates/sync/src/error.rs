#![forbid(unsafe_code)]

use tb_storage::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollaboratorErrorKind {
    NotFound,
    RateLimited,
    Unavailable,
    Rejected,
}

/// Failure reported by a local or remote tracker client.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CollaboratorError {
    pub kind: CollaboratorErrorKind,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(kind: CollaboratorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::NotFound, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::RateLimited, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::Unavailable, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::Rejected, message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("remote unavailable: {message}")]
    RemoteUnavailable { rate_limited: bool, message: String },
    #[error("invalid configuration: {0}")]
    Validation(String),
    #[error("no transition from {key} to status {status:?}")]
    Transition { key: String, status: String },
    #[error("store: {0}")]
    Store(StoreError),
    #[error("collaborator rejected request: {0}")]
    Collaborator(String),
}

impl SyncError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable {
                rate_limited: true,
                ..
            }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Stable tag used in reports and the audit log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::RemoteUnavailable {
                rate_limited: true,
                ..
            } => "rate_limited",
            Self::RemoteUnavailable { .. } => "remote_unavailable",
            Self::Validation(_) => "validation",
            Self::Transition { .. } => "transition",
            Self::Store(_) => "store",
            Self::Collaborator(_) => "collaborator",
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownMapping => Self::NotFound("task is not linked".to_string()),
            StoreError::MappingConflict { .. } => Self::Conflict(err.to_string()),
            other => Self::Store(other),
        }
    }
}

impl From<CollaboratorError> for SyncError {
    fn from(err: CollaboratorError) -> Self {
        match err.kind {
            CollaboratorErrorKind::NotFound => Self::NotFound(err.message),
            CollaboratorErrorKind::RateLimited => Self::RemoteUnavailable {
                rate_limited: true,
                message: err.message,
            },
            CollaboratorErrorKind::Unavailable => Self::RemoteUnavailable {
                rate_limited: false,
                message: err.message,
            },
            CollaboratorErrorKind::Rejected => Self::Collaborator(err.message),
        }
    }
}
