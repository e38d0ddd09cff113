//! Represents the git concept of an "object" which is a tuple of
//! object type and binary data identified by the hash of the binary data.

use thiserror::Error;

mod attribution;
pub use attribution::Attribution;

mod commit;
pub use commit::Commit;

mod file_mode;
pub use file_mode::FileMode;

mod id;
pub use id::{Id, ParseIdError};

mod kind;
pub use kind::Kind;

pub(crate) mod parse_utils;

mod tag;
pub use tag::Tag;

mod tree;
pub use tree::{Tree, TreeEntry};

/// Describes why a tree, commit, or tag payload could not be decoded.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DecodeError {
    #[error("missing `{0}` header")]
    MissingHeader(&'static str),

    #[error(transparent)]
    InvalidId(#[from] ParseIdError),

    #[error("malformed attribution line")]
    InvalidAttribution,

    #[error("invalid file mode in tree entry")]
    InvalidMode,

    #[error("invalid tree entry name `{0}`")]
    InvalidEntryName(String),

    #[error("tree entries out of order at `{0}`")]
    Unsorted(String),

    #[error("payload ends unexpectedly")]
    Truncated,

    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown object type `{0}`")]
    UnknownKind(String),
}

/// Describes a single object stored (or about to be stored) in a repository.
///
/// The ID is computed when the object is constructed, so an `Object` always
/// carries the name it will be stored under.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Object {
    id: Id,
    kind: Kind,
    content: Vec<u8>,
}

impl Object {
    /// Create a new Object.
    pub fn new(kind: Kind, content: Vec<u8>) -> Object {
        Object {
            id: Id::for_content(kind, &content),
            kind,
            content,
        }
    }

    /// Return the ID of the object.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Return the kind of the object.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Return the raw content of the object (without the git header).
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    /// Return the size (in bytes) of the object.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Returns true if the object is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the `<kind> <len>\0` header that precedes the content on disk.
    pub fn header(&self) -> Vec<u8> {
        format!("{} {}\0", self.kind, self.len()).into_bytes()
    }
}
