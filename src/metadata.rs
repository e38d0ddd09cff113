//! Caller-facing records: object metadata, object records and tags.

use std::fmt;
use std::sync::Arc;

use revstore_core::object::{Attribution, Commit, Id};

use crate::graph::CommitGraph;
use crate::Result;

/// Who wrote a revision and why.
///
/// Stored as the commit's author and message: the title is the message's
/// first paragraph, the comment everything after the first blank line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectMetadata {
    author: Attribution,
    title: Option<String>,
    comment: Option<String>,
}

impl ObjectMetadata {
    pub fn new(author: Attribution) -> ObjectMetadata {
        ObjectMetadata {
            author,
            title: None,
            comment: None,
        }
    }

    /// Set the title. The title is always one paragraph: blank lines inside it
    /// are dropped, as is surrounding whitespace, so it reads back unchanged.
    pub fn with_title(mut self, title: &str) -> ObjectMetadata {
        let paragraph: Vec<&str> = title.lines().filter(|line| !line.trim().is_empty()).collect();
        self.title = non_blank(&paragraph.join("\n"));
        self
    }

    /// Set the comment. Surrounding whitespace is dropped.
    pub fn with_comment(mut self, comment: &str) -> ObjectMetadata {
        self.comment = non_blank(comment);
        self
    }

    pub fn author(&self) -> &Attribution {
        &self.author
    }

    /// Creation time, in seconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.author.timestamp()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Render as a commit (or tag) message.
    pub fn to_message(&self) -> String {
        match (&self.title, &self.comment) {
            (Some(title), Some(comment)) => format!("{}\n\n{}\n", title, comment),
            (Some(title), None) => format!("{}\n", title),
            (None, Some(comment)) => format!("\n\n{}\n", comment),
            (None, None) => String::new(),
        }
    }

    /// Recover metadata from a commit's author and message.
    pub fn from_commit(commit: &Commit) -> ObjectMetadata {
        ObjectMetadata::from_message(commit.author().clone(), commit.message())
    }

    pub(crate) fn from_message(author: Attribution, message: &str) -> ObjectMetadata {
        let (title, comment) = match message.find("\n\n") {
            Some(n) => (&message[..n], &message[n + 2..]),
            None => (message, ""),
        };

        ObjectMetadata::new(author)
            .with_title(title)
            .with_comment(comment)
    }
}

fn non_blank(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// One revision of one object, as returned by `Storage` reads.
///
/// The content is not loaded until [`ObjectRecord::content`] is called.
#[derive(Clone)]
pub struct ObjectRecord {
    path: String,
    revision: Id,
    metadata: ObjectMetadata,
    blob: Id,
    graph: Arc<dyn CommitGraph>,
}

impl ObjectRecord {
    pub(crate) fn new(
        path: String,
        revision: Id,
        metadata: ObjectMetadata,
        blob: Id,
        graph: Arc<dyn CommitGraph>,
    ) -> ObjectRecord {
        ObjectRecord {
            path,
            revision,
            metadata,
            blob,
            graph,
        }
    }

    /// The logical path of the object.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The commit this record was resolved at.
    pub fn revision(&self) -> &Id {
        &self.revision
    }

    pub fn metadata(&self) -> &ObjectMetadata {
        &self.metadata
    }

    /// The content-addressed ID of the object's bytes.
    pub fn blob_id(&self) -> &Id {
        &self.blob
    }

    /// Read the object's content.
    pub fn content(&self) -> Result<Vec<u8>> {
        self.graph.read_blob(&self.blob)
    }
}

impl fmt::Debug for ObjectRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRecord")
            .field("path", &self.path)
            .field("revision", &self.revision)
            .field("metadata", &self.metadata)
            .field("blob", &self.blob)
            .finish()
    }
}

/// A named, immutable pointer to a commit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TagRef {
    name: String,
    commit: Id,
}

impl TagRef {
    pub(crate) fn new(name: &str, commit: Id) -> TagRef {
        TagRef {
            name: name.to_string(),
            commit,
        }
    }

    /// The tag's short name (without `refs/tags/`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commit(&self) -> &Id {
        &self.commit
    }
}
