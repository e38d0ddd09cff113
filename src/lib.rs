//! A versioned object store built on git.
//!
//! Every object is a blob addressed by a slash-separated path. Each write
//! becomes a commit on a single branch of a local repository, so the full
//! history of every path is kept and any past revision can be read back.
//! When a remote is configured, the branch is mirrored to it in the
//! background; a slow or unreachable remote never blocks a write.
//!
//! ```no_run
//! use revstore::{Attribution, ObjectMetadata, Storage, StorageConfig};
//!
//! # fn main() -> revstore::Result<()> {
//! let storage = Storage::open(StorageConfig::builder("/srv/objects").build()?)?;
//!
//! let who = Attribution::now("Ada", "ada@example.com");
//! let meta = ObjectMetadata::new(who).with_title("first draft");
//! let record = storage.append_object("notes/today", &meta, &mut &b"hello"[..], 5)?;
//!
//! storage.tag(&record.revision().to_string(), "draft-1", &meta)?;
//! storage.close();
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod graph;
pub mod mapper;
pub mod remote;

mod error;
pub use error::{Result, StorageError};

mod metadata;
pub use metadata::{ObjectMetadata, ObjectRecord, TagRef};

mod storage;
pub use storage::{Storage, StorageParts};

mod sync;
pub use sync::{push_with_retry, PushOutcome, SyncPolicy, SyncStatus};

pub use revstore_core::object::{Attribution, Id};

pub use auth::{AuthProvider, ConfigAuthProvider, Credentials, KeySource};
pub use config::{PlainSecrets, SecretResolver, StorageConfig, StorageConfigBuilder};
pub use graph::CommitGraph;
pub use mapper::{ExtensionMapper, IdentityMapper, LegacyPrefixMapper, PathMapper, PrefixMapper};
pub use remote::{GitCliTransport, LocalTransport, PushError, PushStatus, Transport};
