use std::collections::BTreeMap;

use revstore_core::object::{Id, Kind};
use revstore_core::path::RepoPath;

use super::Storage;
use crate::graph::{self, CommitGraph};
use crate::{ObjectMetadata, ObjectRecord, Result};

impl Storage {
    /// Look up `path`, either at the tip of the branch or at `revision`.
    ///
    /// Without a revision, only paths present at the tip are found. The
    /// returned record carries the revision and metadata of the newest commit
    /// (at or before the requested one) that changed the path.
    ///
    /// A revision is a full commit ID, a tag name, or `HEAD`. Unknown
    /// revisions and absent paths yield `Ok(None)`.
    pub fn get_object(&self, path: &str, revision: Option<&str>) -> Result<Option<ObjectRecord>> {
        let logical = RepoPath::new(path)?;
        let physicals = self.physical_paths(&logical)?;
        if physicals.is_empty() {
            return Ok(None);
        }

        let state = self.state.read();
        let commit = match revision {
            None => state.head,
            Some(revision) => match self.resolve_revision(&state.head, revision)? {
                Some(commit) => commit,
                None => return Ok(None),
            },
        };

        self.record_at(&commit, &logical, &physicals)
    }

    /// Every revision of `path`, newest first.
    ///
    /// A revision is listed when the commit gave the path content different
    /// from its parent. Commits that removed the path are not listed.
    pub fn get_revisions(&self, path: &str) -> Result<Vec<ObjectRecord>> {
        let logical = RepoPath::new(path)?;
        let physicals = self.physical_paths(&logical)?;
        if physicals.is_empty() {
            return Ok(vec![]);
        }

        let state = self.state.read();
        graph::revisions(self.graph.as_ref(), &state.head, &physicals)?
            .into_iter()
            .map(|(commit, blob)| self.record(&logical, commit, blob))
            .collect()
    }

    /// Every object at the tip of the branch whose logical path lies within
    /// `prefix` (matched by whole segments; `""` matches everything).
    ///
    /// The order of the result is unspecified.
    pub fn get_all_objects(&self, prefix: &str) -> Result<Vec<ObjectRecord>> {
        let state = self.state.read();
        let head = state.head;
        let tree = *self.graph.read_commit(&head)?.tree();

        // logical path -> (physical path, blob)
        let mut found: BTreeMap<RepoPath, (RepoPath, Id)> = BTreeMap::new();
        for (physical, blob) in graph::walk_blobs(self.graph.as_ref(), &tree)? {
            let logical = match self.mapper.backward_map(&physical) {
                Some(logical) => logical,
                None => continue,
            };
            let (logical, physical) = match (RepoPath::new(&logical), RepoPath::new(&physical)) {
                (Ok(logical), Ok(physical)) => (logical, physical),
                _ => continue,
            };
            if !logical.is_within(prefix) {
                continue;
            }

            // Two physical paths may map back to one logical path (e.g. a
            // legacy location); the one `forward_map` produces wins. Blobs
            // that `get_object` could not reach by this logical path are
            // left out.
            let canonical =
                self.mapper.forward_map(logical.as_str()).as_deref() == Some(physical.as_str());
            let legacy =
                self.mapper.legacy_map(logical.as_str()).as_deref() == Some(physical.as_str());
            if canonical || (legacy && !found.contains_key(&logical)) {
                found.insert(logical, (physical, blob));
            }
        }

        let physicals: Vec<RepoPath> = found.values().map(|(p, _)| p.clone()).collect();
        let changes = graph::last_changes(self.graph.as_ref(), &head, &physicals)?;

        found
            .iter()
            .map(|(logical, (physical, blob))| {
                let commit = changes.get(physical).copied().unwrap_or(head);
                self.record(logical, commit, *blob)
            })
            .collect()
    }

    // Resolve `logical` as of `commit`: the blob in that commit's tree, with
    // the metadata of the newest commit at or before it that changed the path.
    pub(super) fn record_at(
        &self,
        commit: &Id,
        logical: &RepoPath,
        physicals: &[RepoPath],
    ) -> Result<Option<ObjectRecord>> {
        let tree = *self.graph.read_commit(commit)?.tree();
        if graph::lookup_first_blob(self.graph.as_ref(), &tree, physicals)?.is_none() {
            return Ok(None);
        }

        match graph::latest_revision(self.graph.as_ref(), commit, physicals)? {
            Some((changed_at, blob)) => self.record(logical, changed_at, blob).map(Some),
            None => Ok(None),
        }
    }

    fn record(&self, logical: &RepoPath, commit: Id, blob: Id) -> Result<ObjectRecord> {
        let metadata = ObjectMetadata::from_commit(&self.graph.read_commit(&commit)?);
        Ok(ObjectRecord::new(
            logical.to_string(),
            commit,
            metadata,
            blob,
            self.graph.clone(),
        ))
    }

    /// Resolve a revision string to a commit ID.
    ///
    /// Accepts `HEAD`, a full 40-digit commit ID, or the name of a tag that
    /// (possibly through annotated tags) points at a commit.
    pub fn resolve(&self, revision: &str) -> Result<Option<Id>> {
        let state = self.state.read();
        self.resolve_revision(&state.head, revision)
    }

    pub(super) fn resolve_revision(&self, head: &Id, revision: &str) -> Result<Option<Id>> {
        if revision == "HEAD" {
            return Ok(Some(*head));
        }

        if revision.len() == 40 {
            if let Ok(id) = Id::from_hex(revision) {
                return self.peel_to_commit(&id);
            }
        }

        let refname = format!("refs/tags/{}", revision);
        if revstore_on_disk::check_ref_name(&refname).is_err() {
            return Ok(None);
        }

        match self.graph.read_ref(&refname)? {
            Some(id) => self.peel_to_commit(&id),
            None => Ok(None),
        }
    }

    pub(super) fn peel_to_commit(&self, id: &Id) -> Result<Option<Id>> {
        match graph::peel(self.graph.as_ref(), id)? {
            Some((id, Kind::Commit)) => Ok(Some(id)),
            _ => Ok(None),
        }
    }
}
