use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use revstore_core::object::{Commit, FileMode, Id, Kind, Tag, Tree};
use revstore_on_disk::{Error as RepoError, OnDiskRepo};
use tracing::debug;

use super::{PushError, PushStatus, Transport};
use crate::graph;

/// Pushes into another repository on the local file system.
///
/// Objects are copied loose, then the remote ref is moved with the same
/// compare-and-swap used for local commits. Only fast-forwards are accepted.
#[derive(Debug)]
pub struct LocalTransport {
    local: Arc<OnDiskRepo>,
    remote_path: PathBuf,
}

impl LocalTransport {
    pub fn new(local: Arc<OnDiskRepo>, remote_path: PathBuf) -> LocalTransport {
        LocalTransport { local, remote_path }
    }

    fn copy_missing(&self, remote: &OnDiskRepo, tip: &Id) -> Result<usize, PushError> {
        let mut copied = 0;
        let mut seen = HashSet::new();
        let mut queue = vec![*tip];

        while let Some(id) = queue.pop() {
            if !seen.insert(id) || remote.has_object(&id) {
                continue;
            }

            let object = self
                .local
                .get_object(&id)
                .map_err(transient)?
                .ok_or_else(|| PushError::Transient(format!("object {} is missing locally", id)))?;

            match object.kind() {
                Kind::Commit => {
                    let commit = Commit::parse(object.content()).map_err(transient)?;
                    queue.push(*commit.tree());
                    queue.extend(commit.parents().iter().copied());
                }
                Kind::Tree => {
                    let tree = Tree::parse(object.content()).map_err(transient)?;
                    queue.extend(
                        tree.entries()
                            .iter()
                            .filter(|e| e.mode() != FileMode::Submodule)
                            .map(|e| *e.id()),
                    );
                }
                Kind::Tag => {
                    let tag = Tag::parse(object.content()).map_err(transient)?;
                    queue.push(*tag.object());
                }
                Kind::Blob => {}
            }

            remote.put_loose_object(&object).map_err(transient)?;
            copied += 1;
        }

        Ok(copied)
    }
}

impl Transport for LocalTransport {
    fn push(&self, refname: &str) -> Result<PushStatus, PushError> {
        let remote = OnDiskRepo::new(&self.remote_path).map_err(transient)?;

        let tip = self
            .local
            .read_ref(refname)
            .map_err(transient)?
            .ok_or_else(|| PushError::Transient(format!("local ref `{}` does not exist", refname)))?;

        let remote_tip = remote.read_ref(refname).map_err(transient)?;
        if remote_tip == Some(tip) {
            return Ok(PushStatus::UpToDate);
        }

        if let Some(remote_tip) = &remote_tip {
            let fast_forward =
                graph::is_ancestor(self.local.as_ref(), remote_tip, &tip).map_err(transient)?;
            if !fast_forward {
                return Err(PushError::Rejected(format!(
                    "`{}` is at {} on the remote, which is not an ancestor of {}",
                    refname, remote_tip, tip
                )));
            }
        }

        let copied = self.copy_missing(&remote, &tip)?;

        match remote.update_ref(refname, remote_tip.as_ref(), &tip) {
            Ok(()) => {}
            Err(err @ RepoError::RefMismatch { .. }) | Err(err @ RepoError::RefLocked(_)) => {
                return Err(PushError::Transient(err.to_string()));
            }
            Err(err) => return Err(transient(err)),
        }

        debug!(
            target: "revstore::remote",
            remote = %self.remote_path.display(),
            %refname,
            %tip,
            copied,
            "pushed"
        );
        Ok(PushStatus::Pushed)
    }
}

fn transient<E: std::fmt::Display>(err: E) -> PushError {
    PushError::Transient(err.to_string())
}
