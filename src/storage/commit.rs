use std::io::{self, Read};

use revstore_core::object::{Commit, Id};
use revstore_core::path::RepoPath;
use tracing::{debug, error};

use super::{State, Storage};
use crate::graph::{self, CommitGraph};
use crate::{ObjectMetadata, ObjectRecord, Result, StorageError};

// Largest up-front allocation made on behalf of a caller-supplied length.
const MAX_PREALLOCATION: u64 = 1 << 20;

/// What a single-path commit did to the branch.
enum Change {
    Committed(Id),
    Unchanged(Id),
}

impl Storage {
    /// Store `length` bytes read from `content` as the new revision of `path`.
    ///
    /// The commit is local and synchronous; when a remote is configured a push
    /// is queued afterwards. Writing the same bytes that `path` already holds
    /// creates no commit and returns the existing revision.
    pub fn append_object(
        &self,
        path: &str,
        metadata: &ObjectMetadata,
        content: &mut dyn Read,
        length: u64,
    ) -> Result<ObjectRecord> {
        self.check_writable()?;

        let logical = RepoPath::new(path)?;
        let physical = self
            .physical_path(&logical)?
            .ok_or_else(|| StorageError::OutOfScope(logical.to_string()))?;

        let mut bytes = Vec::with_capacity(length.min(MAX_PREALLOCATION) as usize);
        content.take(length).read_to_end(&mut bytes)?;
        if bytes.len() as u64 != length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "expected {} bytes of content for `{}`, got {}",
                    length,
                    logical,
                    bytes.len()
                ),
            )
            .into());
        }

        // Blobs are content-addressed, so writing one ahead of the lock is safe
        // even if the commit never happens.
        let blob = self.graph.write_blob(bytes)?;

        let head = match self.commit_change(&logical, &[(&physical, Some(&blob))], metadata)? {
            Change::Committed(commit) => {
                self.after_commit(commit);
                return Ok(ObjectRecord::new(
                    logical.to_string(),
                    commit,
                    metadata.clone(),
                    blob,
                    self.graph.clone(),
                ));
            }
            Change::Unchanged(head) => head,
        };

        self.record_at(&head, &logical, std::slice::from_ref(&physical))?
            .ok_or(StorageError::MissingObject(blob))
    }

    /// Remove `path` from the branch. Removing an absent path does nothing.
    ///
    /// A copy left at a legacy location of the path is removed in the same
    /// commit.
    pub fn delete_object(&self, path: &str, metadata: &ObjectMetadata) -> Result<()> {
        self.check_writable()?;

        let logical = RepoPath::new(path)?;
        let physicals = self.physical_paths(&logical)?;
        if physicals.is_empty() {
            return Ok(());
        }

        let removals: Vec<(&RepoPath, Option<&Id>)> =
            physicals.iter().map(|physical| (physical, None)).collect();
        if let Change::Committed(commit) = self.commit_change(&logical, &removals, metadata)? {
            self.after_commit(commit);
        }
        Ok(())
    }

    // Runs the locked part of the pipeline: check the repository is in the
    // state we left it, derive the new tree, commit, and advance the branch.
    fn commit_change(
        &self,
        logical: &RepoPath,
        changes: &[(&RepoPath, Option<&Id>)],
        metadata: &ObjectMetadata,
    ) -> Result<Change> {
        let mut state = self.state.write();
        if state.closed {
            return Err(StorageError::Closed);
        }
        self.ensure_clean(&state)?;

        let parent = state.head;
        let parent_commit = self.graph.read_commit(&parent)?;

        let mut tree = *parent_commit.tree();
        for (physical, blob) in changes {
            tree = graph::tree_with_change(self.graph.as_ref(), &tree, physical, *blob)?;
        }

        if &tree == parent_commit.tree() {
            debug!(target: "revstore::commit", path = %logical, head = %parent, "no change; nothing to commit");
            return Ok(Change::Unchanged(parent));
        }

        let author = metadata.author().clone();
        let commit = Commit::new(
            tree,
            vec![parent],
            author.clone(),
            author,
            &metadata.to_message(),
        );
        let id = self.graph.write_commit(&commit)?;

        if let Err(err) = self
            .graph
            .compare_and_swap_ref(&self.branch_ref, Some(&parent), &id)
        {
            self.roll_back(&parent, &id);
            return Err(err);
        }

        match self.graph.read_ref(&self.branch_ref) {
            Ok(Some(actual)) if actual == id => {}
            Ok(actual) => {
                self.roll_back(&parent, &id);
                return Err(StorageError::Conflict(format!(
                    "`{}` is at {:?} right after committing {}",
                    self.branch_ref, actual, id
                )));
            }
            Err(err) => {
                self.roll_back(&parent, &id);
                return Err(err);
            }
        }

        state.head = id;
        debug!(target: "revstore::commit", path = %logical, %parent, commit = %id, "committed");
        Ok(Change::Committed(id))
    }

    // The branch must still be where we last put it, and no other writer may
    // be in the middle of moving it.
    fn ensure_clean(&self, state: &State) -> Result<()> {
        if self.graph.is_ref_locked(&self.branch_ref) {
            return Err(StorageError::DirtyRepository(format!(
                "`{}` is locked by another writer",
                self.branch_ref
            )));
        }

        let on_disk = self.graph.read_ref(&self.branch_ref)?;
        if on_disk != Some(state.head) {
            return Err(StorageError::DirtyRepository(format!(
                "`{}` moved from {} to {:?}",
                self.branch_ref, state.head, on_disk
            )));
        }

        Ok(())
    }

    fn roll_back(&self, parent: &Id, attempted: &Id) {
        error!(
            target: "revstore::commit",
            branch = %self.branch_ref,
            %parent,
            %attempted,
            "branch update failed; rolling back"
        );

        if let Err(err) = self.graph.force_ref(&self.branch_ref, parent) {
            error!(target: "revstore::commit", branch = %self.branch_ref, %err, "rollback failed");
        }
    }

    fn after_commit(&self, commit: Id) {
        if let Some(sync) = &self.sync {
            sync.enqueue(commit);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use revstore_core::object::{Attribution, Id, Object};
    use revstore_on_disk::OnDiskRepo;

    use crate::graph::CommitGraph;
    use crate::{ObjectMetadata, Result, Storage, StorageConfig, StorageError, StorageParts};

    fn meta(title: &str) -> ObjectMetadata {
        ObjectMetadata::new(Attribution::new("Test", "test@example.com", 1_600_000_000, 0))
            .with_title(title)
    }

    fn storage(dir: &tempfile::TempDir) -> Storage {
        Storage::open(StorageConfig::builder(dir.path().join("repo")).build().unwrap()).unwrap()
    }

    #[test]
    fn short_content_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let s = storage(&dir);
        let head = s.head();

        let err = s
            .append_object("a", &meta("short"), &mut &b"abc"[..], 10)
            .unwrap_err();
        match err {
            StorageError::Io(err) => assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof),
            err => panic!("wrong error: {:?}", err),
        }
        assert_eq!(s.head(), head);
    }

    #[test]
    fn extra_content_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let s = storage(&dir);

        let r = s
            .append_object("a", &meta("extra"), &mut &b"abcdef"[..], 3)
            .unwrap();
        assert_eq!(r.content().unwrap(), b"abc".to_vec());
    }

    #[test]
    fn moved_branch_is_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let s = storage(&dir);
        s.append_object("a", &meta("one"), &mut &b"1"[..], 1).unwrap();
        let head = s.head();

        // Someone else rewinds the branch behind our back.
        let parent = {
            let repo = revstore_on_disk::OnDiskRepo::new(s.path()).unwrap();
            let commit = crate::graph::CommitGraph::read_commit(&repo, &head).unwrap();
            let parent = *commit.parent().unwrap();
            repo.force_ref(s.branch_ref(), &parent).unwrap();
            parent
        };

        match s.append_object("b", &meta("two"), &mut &b"2"[..], 1).unwrap_err() {
            StorageError::DirtyRepository(_) => (),
            err => panic!("wrong error: {:?}", err),
        }

        // Nothing was committed and the foreign ref value was left alone.
        let repo = revstore_on_disk::OnDiskRepo::new(s.path()).unwrap();
        assert_eq!(repo.read_ref(s.branch_ref()).unwrap(), Some(parent));
        assert_eq!(s.head(), head);
    }

    #[test]
    fn locked_branch_is_dirty() {
        let dir = tempfile::tempdir().unwrap();
        let s = storage(&dir);

        let lock = s.path().join(".git").join(format!("{}.lock", s.branch_ref()));
        fs::write(&lock, "").unwrap();

        match s.delete_object("a", &meta("rm")).unwrap_err() {
            StorageError::DirtyRepository(_) => (),
            err => panic!("wrong error: {:?}", err),
        }

        fs::remove_file(&lock).unwrap();
        s.delete_object("a", &meta("rm")).unwrap();
    }

    #[test]
    fn writes_after_close_fail() {
        let dir = tempfile::tempdir().unwrap();
        let s = storage(&dir);
        s.append_object("a", &meta("one"), &mut &b"1"[..], 1).unwrap();
        s.close();

        match s.append_object("b", &meta("two"), &mut &b"2"[..], 1).unwrap_err() {
            StorageError::Closed => (),
            err => panic!("wrong error: {:?}", err),
        }
        assert!(s.get_object("a", None).unwrap().is_some());
    }

    // A repository whose next branch update can be made to misbehave after
    // the ref has already moved.
    struct Faulty {
        repo: OnDiskRepo,
        fail_after_move: AtomicBool,
        hide_after_move: AtomicBool,
        hide_next_read: AtomicBool,
    }

    impl Faulty {
        fn new(repo: OnDiskRepo) -> Faulty {
            Faulty {
                repo,
                fail_after_move: AtomicBool::new(false),
                hide_after_move: AtomicBool::new(false),
                hide_next_read: AtomicBool::new(false),
            }
        }

        fn repo(&self) -> &OnDiskRepo {
            &self.repo
        }
    }

    impl CommitGraph for Faulty {
        fn write_object(&self, object: &Object) -> Result<()> {
            CommitGraph::write_object(self.repo(), object)
        }

        fn read_object(&self, id: &Id) -> Result<Option<Object>> {
            CommitGraph::read_object(self.repo(), id)
        }

        fn read_ref(&self, name: &str) -> Result<Option<Id>> {
            if self.hide_next_read.swap(false, Ordering::SeqCst) {
                return Ok(None);
            }
            CommitGraph::read_ref(self.repo(), name)
        }

        fn compare_and_swap_ref(&self, name: &str, expected: Option<&Id>, new: &Id) -> Result<()> {
            CommitGraph::compare_and_swap_ref(self.repo(), name, expected, new)?;
            if self.fail_after_move.swap(false, Ordering::SeqCst) {
                return Err(StorageError::Conflict(format!("`{}` moved concurrently", name)));
            }
            if self.hide_after_move.swap(false, Ordering::SeqCst) {
                self.hide_next_read.store(true, Ordering::SeqCst);
            }
            Ok(())
        }

        fn force_ref(&self, name: &str, new: &Id) -> Result<()> {
            CommitGraph::force_ref(self.repo(), name, new)
        }

        fn list_refs(&self, prefix: &str) -> Result<Vec<(String, Id)>> {
            CommitGraph::list_refs(self.repo(), prefix)
        }

        fn is_ref_locked(&self, name: &str) -> bool {
            CommitGraph::is_ref_locked(self.repo(), name)
        }
    }

    fn faulty_storage(dir: &tempfile::TempDir) -> (Storage, Arc<Faulty>) {
        let path = dir.path().join("repo");
        drop(storage(dir));

        let graph = Arc::new(Faulty::new(OnDiskRepo::new(&path).unwrap()));
        let s = Storage::with_parts(
            StorageConfig::builder(&path).build().unwrap(),
            StorageParts::new().graph(graph.clone()),
        )
        .unwrap();
        (s, graph)
    }

    fn assert_rolled_back(s: &Storage, err: StorageError, head: Id) {
        assert!(err.is_conflict(), "{:?}", err);
        assert_eq!(s.head(), head);

        let repo = OnDiskRepo::new(s.path()).unwrap();
        assert_eq!(repo.read_ref(s.branch_ref()).unwrap(), Some(head));
        assert!(s.get_object("b", None).unwrap().is_none());

        // The storage is still clean and accepts the next write.
        let record = s.append_object("b", &meta("retry"), &mut &b"2"[..], 1).unwrap();
        let commit = CommitGraph::read_commit(&repo, record.revision()).unwrap();
        assert_eq!(commit.parent(), Some(&head));
    }

    #[test]
    fn failed_branch_update_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let (s, graph) = faulty_storage(&dir);
        s.append_object("a", &meta("one"), &mut &b"1"[..], 1).unwrap();
        let head = s.head();

        graph.fail_after_move.store(true, Ordering::SeqCst);
        let err = s
            .append_object("b", &meta("two"), &mut &b"2"[..], 1)
            .unwrap_err();
        assert_rolled_back(&s, err, head);
    }

    #[test]
    fn unverified_branch_update_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let (s, graph) = faulty_storage(&dir);
        s.append_object("a", &meta("one"), &mut &b"1"[..], 1).unwrap();
        let head = s.head();

        graph.hide_after_move.store(true, Ordering::SeqCst);
        let err = s
            .append_object("b", &meta("two"), &mut &b"2"[..], 1)
            .unwrap_err();
        assert_rolled_back(&s, err, head);
    }
}
