use revstore_core::object::{Kind, Tag};
use tracing::{debug, info};

use super::Storage;
use crate::graph::CommitGraph;
use crate::sync::PushOutcome;
use crate::{ObjectMetadata, Result, StorageError, TagRef};

const TAG_PREFIX: &str = "refs/tags/";

impl Storage {
    /// Create an annotated tag `name` at `revision` and push it.
    ///
    /// Tagging the commit a tag already points at again is a no-op (the push
    /// still happens, in case an earlier one failed). Unlike commits, the push
    /// is synchronous and its failure is returned to the caller.
    pub fn tag(&self, revision: &str, name: &str, metadata: &ObjectMetadata) -> Result<()> {
        self.check_writable()?;

        let refname = format!("{}{}", TAG_PREFIX, name);
        if name.is_empty() || revstore_on_disk::check_ref_name(&refname).is_err() {
            return Err(StorageError::InvalidName(name.to_string()));
        }

        {
            let state = self.state.write();
            if state.closed {
                return Err(StorageError::Closed);
            }

            let commit = self
                .resolve_revision(&state.head, revision)?
                .ok_or_else(|| StorageError::UnresolvableRevision(revision.to_string()))?;

            match self.graph.read_ref(&refname)? {
                Some(existing) => {
                    let existing = self.peel_to_commit(&existing)?.unwrap_or(existing);
                    if existing != commit {
                        return Err(StorageError::TagCollision {
                            name: name.to_string(),
                            existing,
                            requested: commit,
                        });
                    }
                    debug!(target: "revstore::commit", tag = %name, %commit, "tag already in place");
                }
                None => {
                    let tag = Tag::new(
                        commit,
                        Kind::Commit,
                        name,
                        Some(metadata.author().clone()),
                        &metadata.to_message(),
                    );
                    let id = self.graph.write_tag(&tag)?;
                    self.graph.compare_and_swap_ref(&refname, None, &id)?;
                    info!(target: "revstore::commit", tag = %name, %commit, object = %id, "created tag");
                }
            }
        }

        let sync = match &self.sync {
            Some(sync) => sync,
            None => return Ok(()),
        };

        match sync.push_now(&refname) {
            PushOutcome::Succeeded | PushOutcome::UpToDate => Ok(()),
            PushOutcome::Rejected(msg) => Err(StorageError::NonFastForward(msg)),
            PushOutcome::AuthenticationFailed(msg) => Err(StorageError::Authentication(msg)),
            PushOutcome::Abandoned {
                attempts,
                last_error,
            } => Err(StorageError::TransientRemote {
                attempts,
                message: last_error,
            }),
        }
    }

    /// Every tag that points (directly or through annotated tags) at a
    /// commit, ordered by name.
    pub fn get_tags(&self) -> Result<Vec<TagRef>> {
        let mut tags = Vec::new();
        for (refname, id) in self.graph.list_refs(TAG_PREFIX)? {
            let name = refname.trim_start_matches(TAG_PREFIX);
            if let Some(commit) = self.peel_to_commit(&id)? {
                tags.push(TagRef::new(name, commit));
            }
        }
        Ok(tags)
    }
}
