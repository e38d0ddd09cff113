//! Validated hierarchical paths inside a repository tree.

use std::fmt;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Reasons why a given string can not be accepted as a repository path.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum PathError {
    #[error("path is empty")]
    EmptyPath,

    #[error("path `{0}` must be relative")]
    AbsolutePath(String),

    #[error("path `{0}` ends with `/`")]
    TrailingSlash(String),

    #[error("path `{0}` contains an empty segment")]
    DuplicateSlash(String),

    #[error("path contains a NUL character")]
    ContainsNull,

    #[error("path `{0}` contains a reserved segment")]
    ReservedSegment(String),
}

/// A `/`-separated path that is acceptable as a location in a git tree.
///
/// Paths are normalized to Unicode NFC on construction so that canonically
/// equivalent spellings of a name address the same entry.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RepoPath {
    path: String,
}

impl RepoPath {
    /// Validate and normalize `path`.
    pub fn new(path: &str) -> Result<RepoPath, PathError> {
        let path: String = path.nfc().collect();
        check_path(&path)?;
        Ok(RepoPath { path })
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// Iterate over the `/`-separated segments of the path.
    pub fn segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.path.split('/')
    }

    /// Returns the final segment of the path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Returns a new path with `child` appended as further segments.
    pub fn join(&self, child: &str) -> Result<RepoPath, PathError> {
        RepoPath::new(&format!("{}/{}", self.path, child))
    }

    /// Returns true if `self` equals `prefix` or lies beneath it.
    ///
    /// Matching is by whole segments: `a/b` is within `a`, but `ab/c` is not.
    /// The prefix is normalized the same way paths are.
    pub fn is_within(&self, prefix: &str) -> bool {
        let prefix: String = prefix.trim_end_matches('/').nfc().collect();
        let prefix = prefix.as_str();
        prefix.is_empty()
            || self.path == prefix
            || (self.path.starts_with(prefix) && self.path[prefix.len()..].starts_with('/'))
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        &self.path
    }
}

fn check_path(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        Err(PathError::EmptyPath)
    } else if path.starts_with('/') {
        Err(PathError::AbsolutePath(path.to_string()))
    } else if path.ends_with('/') {
        Err(PathError::TrailingSlash(path.to_string()))
    } else {
        for segment in path.split('/') {
            match check_segment(segment) {
                Err(PathError::EmptyPath) => Err(PathError::DuplicateSlash(path.to_string())),
                Err(PathError::ReservedSegment(_)) => {
                    Err(PathError::ReservedSegment(path.to_string()))
                }
                x => x,
            }?;
        }
        Ok(())
    }
}

fn check_segment(segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        Err(PathError::EmptyPath)
    } else if segment.contains('\0') {
        Err(PathError::ContainsNull)
    } else if segment == "." || segment == ".." || is_dot_git(segment) {
        Err(PathError::ReservedSegment(segment.to_string()))
    } else {
        Ok(())
    }
}

fn is_dot_git(segment: &str) -> bool {
    // `git~1` is the Windows short name for `.git`.
    segment.eq_ignore_ascii_case(".git") || segment.eq_ignore_ascii_case("git~1")
}
