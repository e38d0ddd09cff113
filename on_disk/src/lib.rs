//! This crate provides a git repository that stores content on the local file system.
//!
//! It intentionally uses the same `.git` folder format as command-line git,
//! so repositories written here can be inspected, cloned, and pushed with
//! ordinary git tooling.

mod error;
pub use error::{Error, Result};

mod on_disk_repo;
pub use on_disk_repo::{check_ref_name, OnDiskRepo};

mod temp_git_repo;
pub use temp_git_repo::TempGitRepo;
