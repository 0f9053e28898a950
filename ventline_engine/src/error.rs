use crate::messenger::MessengerError;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure surface of the discussion engine. Validation variants are
/// returned synchronously to the caller and never retried; `Conflict`
/// signals a constraint violation that survived the transparent retry;
/// `Repository` collapses storage faults into a generic failure.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("post not found: {0}")]
    PostNotFound(String),
    #[error("comment not found: {0}")]
    CommentNotFound(String),
    #[error("comment {parent_comment_id} is not a valid parent in post {post_id}")]
    InvalidParent {
        post_id: String,
        parent_comment_id: String,
    },
    #[error("content may not be empty")]
    EmptyContent,
    #[error("input too long: {length} characters (limit {limit})")]
    OversizedInput { length: usize, limit: usize },
    #[error("no post draft to act on")]
    DraftMissing,
    #[error("post draft has expired")]
    DraftExpired,
    #[error("recipient does not accept messages from this sender")]
    Blocked,
    #[error("operation requires an admin user")]
    NotAuthorized,
    #[error("post is already published")]
    AlreadyPublished,
    #[error("concurrent update conflict")]
    Conflict,
    #[error("message delivery failed")]
    Messenger(#[from] MessengerError),
    #[error("storage failure")]
    Repository(#[from] anyhow::Error),
}

impl EngineError {
    /// True for errors the presentation layer should render with a specific
    /// message, as opposed to system faults that collapse to a generic
    /// "try again". A conflict that survived its retry renders specifically
    /// too.
    pub fn is_validation(&self) -> bool {
        !matches!(self, EngineError::Messenger(_) | EngineError::Repository(_))
    }
}

/// Detects a unique/primary-key violation buried in a repository error, so
/// callers can rely on constraint-violation-as-signal instead of
/// check-then-act alone.
pub(crate) fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<rusqlite::Error>()
        .map_or(false, |err| match err {
            rusqlite::Error::SqliteFailure(failure, _) => {
                failure.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        })
}
