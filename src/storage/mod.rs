//! The storage facade: one repository, one tracked branch, one push worker.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use revstore_core::object::{Attribution, Commit, Id, Tree};
use revstore_core::path::RepoPath;
use revstore_on_disk::{Error as RepoError, OnDiskRepo};
use tracing::info;

use crate::auth::{AuthProvider, ConfigAuthProvider};
use crate::graph::CommitGraph;
use crate::mapper::{IdentityMapper, PathMapper};
use crate::remote::{self, Transport};
use crate::sync::{SyncPolicy, SyncStatus, Synchronizer};
use crate::{Result, StorageConfig, StorageError};

mod commit;
mod history;
mod tags;

const INITIAL_COMMIT_MESSAGE: &str = "Initialize storage\n";

/// Optional collaborators for [`Storage::with_parts`].
///
/// Anything left unset falls back to the default: [`IdentityMapper`],
/// [`ConfigAuthProvider`], and a transport chosen from `remoteUrl`.
pub struct StorageParts {
    mapper: Arc<dyn PathMapper>,
    auth: Box<dyn AuthProvider>,
    transport: Option<Arc<dyn Transport>>,
    graph: Option<Arc<dyn CommitGraph>>,
}

impl StorageParts {
    pub fn new() -> StorageParts {
        StorageParts::default()
    }

    pub fn mapper<M: PathMapper + 'static>(mut self, mapper: M) -> Self {
        self.mapper = Arc::new(mapper);
        self
    }

    pub fn auth<A: AuthProvider + 'static>(mut self, auth: A) -> Self {
        self.auth = Box::new(auth);
        self
    }

    /// Use this transport instead of the one `remoteUrl` would select.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Read and write objects and refs through `graph` instead of the
    /// repository at `localPath`, which must already exist.
    #[cfg(test)]
    pub(crate) fn graph(mut self, graph: Arc<dyn CommitGraph>) -> Self {
        self.graph = Some(graph);
        self
    }
}

impl Default for StorageParts {
    fn default() -> Self {
        StorageParts {
            mapper: Arc::new(IdentityMapper),
            auth: Box::new(ConfigAuthProvider),
            transport: None,
            graph: None,
        }
    }
}

struct State {
    head: Id,
    closed: bool,
}

/// A versioned object store backed by a git repository.
///
/// Reads take a shared lock on the storage state; appends, deletes and tags
/// take it exclusively for the local part of their work. Pushing to the
/// remote never happens under the lock.
pub struct Storage {
    config: StorageConfig,
    repo: Arc<OnDiskRepo>,
    graph: Arc<dyn CommitGraph>,
    mapper: Arc<dyn PathMapper>,
    branch_ref: String,
    state: RwLock<State>,
    sync: Option<Synchronizer>,
}

impl Storage {
    /// Open the storage described by `config`, creating the repository
    /// (with an empty initial commit) if necessary.
    pub fn open(config: StorageConfig) -> Result<Storage> {
        Storage::with_parts(config, StorageParts::default())
    }

    pub fn with_parts(config: StorageConfig, parts: StorageParts) -> Result<Storage> {
        let repo = Arc::new(open_or_init(&config)?);
        let graph: Arc<dyn CommitGraph> = match parts.graph {
            Some(graph) => graph,
            None => repo.clone(),
        };

        let branch_ref = match config.branch() {
            Some(branch) => format!("refs/heads/{}", branch),
            None => repo.head_ref()?,
        };

        let head = match graph.read_ref(&branch_ref)? {
            Some(head) => {
                graph.read_commit(&head)?;
                head
            }
            None if config.read_only() => {
                return Err(StorageError::Configuration(format!(
                    "branch `{}` has no commits and the storage is read-only",
                    branch_ref
                )));
            }
            None => initial_commit(graph.as_ref(), &config, &branch_ref)?,
        };

        let sync = if config.read_only() {
            None
        } else {
            let transport = match parts.transport {
                Some(transport) => Some(transport),
                None => {
                    let credentials = parts.auth.credentials(&config)?;
                    remote::transport_for(&config, credentials, repo.clone())?
                }
            };

            match transport {
                Some(transport) => Some(Synchronizer::start(
                    transport,
                    branch_ref.clone(),
                    SyncPolicy {
                        max_attempts: config.max_push_attempts(),
                        backoff: config.retry_backoff(),
                    },
                )?),
                None => None,
            }
        };

        info!(
            target: "revstore::storage",
            path = %config.local_path().display(),
            branch = %branch_ref,
            %head,
            remote = sync.is_some(),
            read_only = config.read_only(),
            "storage opened"
        );

        Ok(Storage {
            config,
            repo,
            graph,
            mapper: parts.mapper,
            branch_ref,
            state: RwLock::new(State {
                head,
                closed: false,
            }),
            sync,
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The directory holding the repository.
    pub fn path(&self) -> &Path {
        self.repo.work_dir()
    }

    /// Full name of the tracked branch (e.g. `refs/heads/master`).
    pub fn branch_ref(&self) -> &str {
        &self.branch_ref
    }

    pub fn is_mutable(&self) -> bool {
        !self.config.read_only()
    }

    /// The commit the tracked branch currently points at.
    pub fn head(&self) -> Id {
        self.state.read().head
    }

    /// Counters from the push worker. All zero when no remote is configured.
    pub fn sync_status(&self) -> SyncStatus {
        self.sync
            .as_ref()
            .map(Synchronizer::status)
            .unwrap_or_default()
    }

    /// Stop accepting writes, let queued pushes finish, and stop the push
    /// worker. Waits at most `shutdownTimeoutMillis` for the worker.
    ///
    /// Calling `close` more than once is harmless. Reads keep working.
    pub fn close(&self) {
        {
            let mut state = self.state.write();
            if state.closed {
                return;
            }
            state.closed = true;
        }

        if let Some(sync) = &self.sync {
            sync.shutdown(self.config.shutdown_timeout());
        }

        info!(target: "revstore::storage", path = %self.config.local_path().display(), "storage closed");
    }

    fn check_writable(&self) -> Result<()> {
        if self.config.read_only() {
            Err(StorageError::ReadOnly)
        } else {
            Ok(())
        }
    }

    // Validate a logical path and find where it lives in the tree.
    // `None` means the mapper does not handle it.
    fn physical_path(&self, logical: &RepoPath) -> Result<Option<RepoPath>> {
        match self.mapper.forward_map(logical.as_str()) {
            Some(physical) => Ok(Some(RepoPath::new(&physical)?)),
            None => Ok(None),
        }
    }

    // Every location that may hold `logical`, preferred first: where it is
    // written today, then a legacy location the mapper still reads.
    fn physical_paths(&self, logical: &RepoPath) -> Result<Vec<RepoPath>> {
        let mut paths = Vec::new();
        if let Some(physical) = self.physical_path(logical)? {
            paths.push(physical);
            if let Some(legacy) = self.mapper.legacy_map(logical.as_str()) {
                paths.push(RepoPath::new(&legacy)?);
            }
        }
        Ok(paths)
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("config", &self.config)
            .field("branch_ref", &self.branch_ref)
            .field("mapper", &self.mapper)
            .finish()
    }
}

fn open_or_init(config: &StorageConfig) -> Result<OnDiskRepo> {
    let path = config.local_path();

    match OnDiskRepo::new(path) {
        Ok(repo) => return Ok(repo),
        Err(RepoError::WorkDirDoesntExist(_)) | Err(RepoError::GitDirDoesntExist(_)) => {}
        Err(err) => return Err(err.into()),
    }

    if config.read_only() {
        return Err(StorageError::Configuration(format!(
            "no repository at `{}` and the storage is read-only",
            path.display()
        )));
    }

    std::fs::create_dir_all(path)?;
    let repo = OnDiskRepo::init(path)?;
    if let Some(branch) = config.branch() {
        repo.set_head_ref(&format!("refs/heads/{}", branch))?;
    }

    info!(target: "revstore::storage", path = %path.display(), "initialized repository");
    Ok(repo)
}

fn initial_commit(graph: &dyn CommitGraph, config: &StorageConfig, branch_ref: &str) -> Result<Id> {
    let tree = graph.write_tree(&Tree::new())?;
    let who = Attribution::now(config.committer_name(), config.committer_email());
    let commit = Commit::new(tree, vec![], who.clone(), who, INITIAL_COMMIT_MESSAGE);
    let id = graph.write_commit(&commit)?;

    graph.compare_and_swap_ref(branch_ref, None, &id)?;
    info!(target: "revstore::storage", branch = %branch_ref, commit = %id, "created initial commit");
    Ok(id)
}
