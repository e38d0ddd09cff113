use super::parse_utils::{header, split_headers, utf8};
use super::{Attribution, DecodeError, Id, Kind, Object};

/// A node in the history graph: one tree, its parents, and who made it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Commit {
    tree: Id,
    parents: Vec<Id>,
    author: Attribution,
    committer: Attribution,
    message: String,
}

impl Commit {
    pub fn new(
        tree: Id,
        parents: Vec<Id>,
        author: Attribution,
        committer: Attribution,
        message: &str,
    ) -> Commit {
        Commit {
            tree,
            parents,
            author,
            committer,
            message: message.to_string(),
        }
    }

    pub fn tree(&self) -> &Id {
        &self.tree
    }

    pub fn parents(&self) -> &[Id] {
        &self.parents
    }

    /// Returns the first parent, which is the only one a linear history has.
    pub fn parent(&self) -> Option<&Id> {
        self.parents.first()
    }

    pub fn author(&self) -> &Attribution {
        &self.author
    }

    pub fn committer(&self) -> &Attribution {
        &self.committer
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("tree {}\n", self.tree);
        for parent in &self.parents {
            out.push_str(&format!("parent {}\n", parent));
        }
        out.push_str(&format!("author {}\n", self.author));
        out.push_str(&format!("committer {}\n", self.committer));
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    pub fn to_object(&self) -> Object {
        Object::new(Kind::Commit, self.to_bytes())
    }

    /// Parse git's commit format. Unknown headers (e.g. `gpgsig`, `encoding`)
    /// are skipped.
    pub fn parse(content: &[u8]) -> Result<Commit, DecodeError> {
        let (headers, message) = split_headers(content);
        let mut headers = headers.into_iter();

        let tree = headers
            .next()
            .and_then(|line| header(line, b"tree"))
            .ok_or(DecodeError::MissingHeader("tree"))?;
        let tree = Id::from_hex(tree)?;

        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in headers {
            if let Some(parent) = header(line, b"parent") {
                parents.push(Id::from_hex(parent)?);
            } else if let Some(value) = header(line, b"author") {
                author = Some(Attribution::parse(value).ok_or(DecodeError::InvalidAttribution)?);
            } else if let Some(value) = header(line, b"committer") {
                committer =
                    Some(Attribution::parse(value).ok_or(DecodeError::InvalidAttribution)?);
            }
        }

        Ok(Commit {
            tree,
            parents,
            author: author.ok_or(DecodeError::MissingHeader("author"))?,
            committer: committer.ok_or(DecodeError::MissingHeader("committer"))?,
            message: utf8(message)?.to_string(),
        })
    }
}
