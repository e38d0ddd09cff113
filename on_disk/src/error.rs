use std::path::PathBuf;

use revstore_core::object::{Id, Kind};
use thiserror::Error;

/// Describes the potential error conditions that might arise from `OnDiskRepo` operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("work dir doesn't exist: {0}")]
    WorkDirDoesntExist(PathBuf),

    #[error("git dir doesn't exist: {0}")]
    GitDirDoesntExist(PathBuf),

    #[error("git dir shouldn't exist: {0}")]
    GitDirShouldntExist(PathBuf),

    #[error("object {0} is corrupt")]
    CorruptObject(Id),

    #[error("object {id} is a {actual}, expected a {expected}")]
    ObjectKindMismatch { id: Id, expected: Kind, actual: Kind },

    #[error("invalid ref name `{0}`")]
    InvalidRefName(String),

    #[error("HEAD does not point to a branch")]
    DetachedHead,

    #[error("ref `{0}` is locked by another writer")]
    RefLocked(String),

    #[error("ref `{name}` moved: expected {expected:?}, found {actual:?}")]
    RefMismatch {
        name: String,
        expected: Option<Id>,
        actual: Option<Id>,
    },
}

/// A specialized `Result` type for `OnDiskRepo` operations.
pub type Result<T> = std::result::Result<T, Error>;
