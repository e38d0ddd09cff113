use revstore_core::object::{DecodeError, Id};
use revstore_core::path::PathError;
use thiserror::Error;

/// Describes the potential error conditions that might arise from
/// `Storage` operations.
///
/// Absent objects and revisions are not errors: lookups return `Ok(None)`
/// or an empty list instead.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("remote rejected credentials: {0}")]
    Authentication(String),

    #[error("conflicting update: {0}")]
    Conflict(String),

    #[error("tag `{name}` already points at {existing}, refusing to move it to {requested}")]
    TagCollision {
        name: String,
        existing: Id,
        requested: Id,
    },

    #[error("remote history has diverged: {0}")]
    NonFastForward(String),

    #[error("remote unavailable after {attempts} attempt(s): {message}")]
    TransientRemote { attempts: u32, message: String },

    #[error("storage is read-only")]
    ReadOnly,

    #[error("storage has been closed")]
    Closed,

    #[error("repository was modified outside this storage: {0}")]
    DirtyRepository(String),

    #[error(transparent)]
    InvalidPath(#[from] PathError),

    #[error("path `{0}` is not handled by this storage")]
    OutOfScope(String),

    #[error("path `{0}` conflicts with an existing file or directory")]
    PathConflict(String),

    #[error("revision `{0}` can not be resolved")]
    UnresolvableRevision(String),

    #[error("invalid name `{0}`")]
    InvalidName(String),

    #[error("object {id} is malformed: {source}")]
    Corrupt { id: Id, source: DecodeError },

    #[error("object {0} is missing from the repository")]
    MissingObject(Id),

    #[error(transparent)]
    Repo(#[from] revstore_on_disk::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    /// True for failures caused by a competing update: an unexpected ref
    /// move, or a tag name already used for another commit.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::Conflict(_) | StorageError::TagCollision { .. }
        )
    }
}
