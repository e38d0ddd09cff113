//! This crate implements the core data model for a versioned object store:
//! git-format objects (blobs, trees, commits, tags), their IDs, and the
//! rules for paths that may be stored in a tree.

pub mod object;
pub mod path;
