//! Error types

use thiserror::Error;

use crate::expertise::AreaId;
use crate::types::{PostId, UserId};

/// Errors raised by store backends
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A concurrent writer got there first; the transaction may be retried
    #[error("conflicting write: {0}")]
    Conflict(String),

    /// A uniqueness or reference constraint rejected the write. Retrying won't help.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// Writes on behalf of a deactivated user are refused
    #[error("user {0} is not active")]
    Inactive(UserId),

    #[error("record not found: {0}")]
    NotFound(String),

    /// Storage backend error (database, filesystem, etc.)
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by [`crate::ReputationService`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FameError {
    #[error("user {0} does not exist")]
    UserNotFound(UserId),

    #[error("user {0} is deactivated")]
    UserInactive(UserId),

    #[error("username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("post {0} does not exist")]
    PostNotFound(PostId),

    #[error("expertise area {0} does not exist")]
    UnknownArea(AreaId),

    #[error("fame level '{0}' is not on the ladder")]
    UnknownLevel(String),

    #[error("user {user} cannot rate their own post {post}")]
    SelfActionNotAllowed { user: UserId, post: PostId },

    /// Store conflicts persisted through every retry
    #[error("transaction for user {user} still conflicting after {attempts} attempts")]
    Transient { user: UserId, attempts: u32 },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for FameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Inactive(user) => FameError::UserInactive(user),
            other => FameError::Store(other),
        }
    }
}

impl FameError {
    pub fn is_permission_error(&self) -> bool {
        matches!(
            self,
            FameError::SelfActionNotAllowed { .. } | FameError::UserInactive(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FameError>;
