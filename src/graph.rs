//! The commit graph backend and the tree/history algorithms built on it.
//!
//! Everything the storage knows about git goes through [`CommitGraph`]: a
//! handful of object and ref primitives. The typed helpers and the free
//! functions in this module (tree rebuilding, lookups, history walks) are
//! written once against the trait, so the backend can be swapped without
//! touching the pipeline.

use std::collections::{BTreeMap, HashSet};

use revstore_core::object::{Commit, FileMode, Id, Kind, Object, Tag, Tree, TreeEntry};
use revstore_core::path::RepoPath;
use revstore_on_disk::{Error as RepoError, OnDiskRepo};

use crate::{Result, StorageError};

/// Object and ref primitives of a git-like repository.
pub trait CommitGraph: Send + Sync {
    /// Store an object. Storing an object that already exists is a no-op.
    fn write_object(&self, object: &Object) -> Result<()>;

    fn read_object(&self, id: &Id) -> Result<Option<Object>>;

    fn read_ref(&self, name: &str) -> Result<Option<Id>>;

    /// Move `name` from `expected` to `new`; `expected == None` requires the
    /// ref to be absent. Fails with `Conflict` if the ref holds any other
    /// value or is locked.
    fn compare_and_swap_ref(&self, name: &str, expected: Option<&Id>, new: &Id) -> Result<()>;

    /// Overwrite `name` unconditionally. Only used for rollback.
    fn force_ref(&self, name: &str, new: &Id) -> Result<()>;

    /// All refs under `prefix`, sorted by name.
    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, Id)>>;

    /// Returns true if another writer holds the ref's lock.
    fn is_ref_locked(&self, name: &str) -> bool;

    fn write_blob(&self, content: Vec<u8>) -> Result<Id> {
        let object = Object::new(Kind::Blob, content);
        self.write_object(&object)?;
        Ok(*object.id())
    }

    fn write_tree(&self, tree: &Tree) -> Result<Id> {
        let object = tree.to_object();
        self.write_object(&object)?;
        Ok(*object.id())
    }

    fn write_commit(&self, commit: &Commit) -> Result<Id> {
        let object = commit.to_object();
        self.write_object(&object)?;
        Ok(*object.id())
    }

    fn write_tag(&self, tag: &Tag) -> Result<Id> {
        let object = tag.to_object();
        self.write_object(&object)?;
        Ok(*object.id())
    }

    /// Read an object that must exist and be of the given kind.
    fn read_kind(&self, id: &Id, kind: Kind) -> Result<Object> {
        match self.read_object(id)? {
            Some(object) if object.kind() == kind => Ok(object),
            Some(object) => Err(StorageError::Conflict(format!(
                "object {} is a {}, expected a {}",
                id,
                object.kind(),
                kind
            ))),
            None => Err(StorageError::MissingObject(*id)),
        }
    }

    fn read_blob(&self, id: &Id) -> Result<Vec<u8>> {
        Ok(self.read_kind(id, Kind::Blob)?.into_content())
    }

    fn read_tree(&self, id: &Id) -> Result<Tree> {
        let object = self.read_kind(id, Kind::Tree)?;
        Tree::parse(object.content()).map_err(|source| StorageError::Corrupt { id: *id, source })
    }

    fn read_commit(&self, id: &Id) -> Result<Commit> {
        let object = self.read_kind(id, Kind::Commit)?;
        Commit::parse(object.content()).map_err(|source| StorageError::Corrupt { id: *id, source })
    }

    fn read_tag(&self, id: &Id) -> Result<Tag> {
        let object = self.read_kind(id, Kind::Tag)?;
        Tag::parse(object.content()).map_err(|source| StorageError::Corrupt { id: *id, source })
    }
}

impl CommitGraph for OnDiskRepo {
    fn write_object(&self, object: &Object) -> Result<()> {
        self.put_loose_object(object)?;
        Ok(())
    }

    fn read_object(&self, id: &Id) -> Result<Option<Object>> {
        Ok(self.get_object(id)?)
    }

    fn read_ref(&self, name: &str) -> Result<Option<Id>> {
        Ok(OnDiskRepo::read_ref(self, name)?)
    }

    fn compare_and_swap_ref(&self, name: &str, expected: Option<&Id>, new: &Id) -> Result<()> {
        match self.update_ref(name, expected, new) {
            Ok(()) => Ok(()),
            Err(err @ RepoError::RefMismatch { .. }) | Err(err @ RepoError::RefLocked(_)) => {
                Err(StorageError::Conflict(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn force_ref(&self, name: &str, new: &Id) -> Result<()> {
        Ok(OnDiskRepo::force_ref(self, name, new)?)
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, Id)>> {
        Ok(OnDiskRepo::list_refs(self, prefix)?)
    }

    fn is_ref_locked(&self, name: &str) -> bool {
        OnDiskRepo::is_ref_locked(self, name)
    }
}

/// Returns the ID of `tree` with the blob at `path` replaced by `blob`, or
/// removed when `blob` is `None`.
///
/// Only the trees along `path` are rewritten; every other subtree is shared
/// with the original. Directories left empty by a removal disappear. The
/// result equals the original ID when nothing changed.
pub fn tree_with_change<G: CommitGraph + ?Sized>(
    graph: &G,
    tree: &Id,
    path: &RepoPath,
    blob: Option<&Id>,
) -> Result<Id> {
    let segments: Vec<&str> = path.segments().collect();
    let root = graph.read_tree(tree)?;

    match rebuild(graph, root, &segments, blob, path)? {
        Some(new_tree) => graph.write_tree(&new_tree),
        None => graph.write_tree(&Tree::new()),
    }
}

// Returns `None` when the rebuilt tree is empty.
fn rebuild<G: CommitGraph + ?Sized>(
    graph: &G,
    mut tree: Tree,
    segments: &[&str],
    blob: Option<&Id>,
    path: &RepoPath,
) -> Result<Option<Tree>> {
    let (name, rest) = match segments.split_first() {
        Some(x) => x,
        None => return Ok(Some(tree)),
    };

    let existing = tree.get(name).cloned();

    if rest.is_empty() {
        match (blob, existing) {
            (Some(_), Some(entry)) if entry.is_tree() => {
                return Err(StorageError::PathConflict(path.to_string()));
            }
            (Some(blob), Some(entry)) if entry.id() == blob => {}
            (Some(blob), existing) => {
                let mode = existing
                    .map(|e| e.mode())
                    .filter(|m| m.is_blob())
                    .unwrap_or(FileMode::Normal);
                tree.insert(TreeEntry::new(mode, name, *blob));
            }
            (None, Some(entry)) if !entry.is_tree() => {
                tree.remove(name);
            }
            (None, _) => {}
        }
    } else {
        let subtree = match &existing {
            Some(entry) if entry.is_tree() => Some(graph.read_tree(entry.id())?),
            Some(_) if blob.is_some() => {
                return Err(StorageError::PathConflict(path.to_string()));
            }
            Some(_) => None,
            None => Some(Tree::new()),
        };

        // Removing beneath a file, or beneath a directory that isn't there,
        // changes nothing.
        let subtree = match subtree {
            Some(subtree) if !(blob.is_none() && subtree.is_empty()) => subtree,
            _ => return Ok(non_empty(tree)),
        };

        match rebuild(graph, subtree, rest, blob, path)? {
            Some(new_subtree) => {
                let id = graph.write_tree(&new_subtree)?;
                tree.insert(TreeEntry::new(FileMode::Tree, name, id));
            }
            None => {
                tree.remove(name);
            }
        }
    }

    Ok(non_empty(tree))
}

fn non_empty(tree: Tree) -> Option<Tree> {
    if tree.is_empty() {
        None
    } else {
        Some(tree)
    }
}

/// Find the entry at `path` within `tree`.
pub fn lookup<G: CommitGraph + ?Sized>(
    graph: &G,
    tree: &Id,
    path: &RepoPath,
) -> Result<Option<TreeEntry>> {
    let mut tree = graph.read_tree(tree)?;
    let mut segments = path.segments().peekable();

    while let Some(name) = segments.next() {
        let entry = match tree.get(name) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };

        if segments.peek().is_none() {
            return Ok(Some(entry));
        }
        if !entry.is_tree() {
            return Ok(None);
        }
        tree = graph.read_tree(entry.id())?;
    }

    Ok(None)
}

/// Returns the blob ID at `path` in `tree`, ignoring directories.
pub fn lookup_blob<G: CommitGraph + ?Sized>(
    graph: &G,
    tree: &Id,
    path: &RepoPath,
) -> Result<Option<Id>> {
    Ok(lookup(graph, tree, path)?
        .filter(|entry| !entry.is_tree())
        .map(|entry| *entry.id()))
}

/// List every blob reachable from `tree` as `(path, blob id)`, in tree order.
pub fn walk_blobs<G: CommitGraph + ?Sized>(graph: &G, tree: &Id) -> Result<Vec<(String, Id)>> {
    let mut out = Vec::new();
    walk_into(graph, tree, "", &mut out)?;
    Ok(out)
}

fn walk_into<G: CommitGraph + ?Sized>(
    graph: &G,
    tree: &Id,
    prefix: &str,
    out: &mut Vec<(String, Id)>,
) -> Result<()> {
    for entry in graph.read_tree(tree)?.entries() {
        let path = format!("{}{}", prefix, entry.name());
        match entry.mode() {
            FileMode::Tree => walk_into(graph, entry.id(), &format!("{}/", path), out)?,
            mode if mode.is_blob() => out.push((path, *entry.id())),
            _ => {}
        }
    }
    Ok(())
}

/// For each path, find the newest commit (walking first parents from `head`)
/// in which that path's blob differs from the commit's parent.
///
/// The walk stops early once every path has been resolved. Paths that never
/// changed along the chain are absent from the result.
pub fn last_changes<G: CommitGraph + ?Sized>(
    graph: &G,
    head: &Id,
    paths: &[RepoPath],
) -> Result<BTreeMap<RepoPath, Id>> {
    let mut found = BTreeMap::new();
    let mut pending: Vec<&RepoPath> = paths.iter().collect();

    let mut commit_id = *head;
    let mut commit = graph.read_commit(head)?;
    while !pending.is_empty() {
        let parent = match commit.parent() {
            Some(id) => Some((*id, graph.read_commit(id)?)),
            None => None,
        };
        let parent_tree = parent.as_ref().map(|(_, parent)| *parent.tree());

        let mut changed = Vec::new();
        changed_paths(
            graph,
            Some(commit.tree()),
            parent_tree.as_ref(),
            0,
            &pending,
            &mut changed,
        )?;
        if !changed.is_empty() {
            pending.retain(|path| !changed.contains(path));
            for path in changed {
                found.insert(path.clone(), commit_id);
            }
        }

        match parent {
            Some((id, parent)) => {
                commit_id = id;
                commit = parent;
            }
            None => break,
        }
    }

    Ok(found)
}

// Collect the `paths` whose blob differs between two trees. Subtrees with
// equal IDs are not descended into. `depth` is the number of leading
// segments already matched.
fn changed_paths<'p, G: CommitGraph + ?Sized>(
    graph: &G,
    here: Option<&Id>,
    before: Option<&Id>,
    depth: usize,
    paths: &[&'p RepoPath],
    changed: &mut Vec<&'p RepoPath>,
) -> Result<()> {
    if here == before || paths.is_empty() {
        return Ok(());
    }

    let here = here.map(|id| graph.read_tree(id)).transpose()?;
    let before = before.map(|id| graph.read_tree(id)).transpose()?;
    let entry = |tree: &Option<Tree>, name: &str, want_tree: bool| -> Option<Id> {
        tree.as_ref()
            .and_then(|tree| tree.get(name))
            .filter(|entry| entry.is_tree() == want_tree)
            .map(|entry| *entry.id())
    };

    let mut children: BTreeMap<&'p str, Vec<&'p RepoPath>> = BTreeMap::new();
    for &path in paths {
        let mut segments = path.segments().skip(depth);
        let name = match segments.next() {
            Some(name) => name,
            None => continue,
        };

        if segments.next().is_none() {
            if entry(&here, name, false) != entry(&before, name, false) {
                changed.push(path);
            }
        } else {
            children.entry(name).or_default().push(path);
        }
    }

    for (name, group) in children {
        changed_paths(
            graph,
            entry(&here, name, true).as_ref(),
            entry(&before, name, true).as_ref(),
            depth + 1,
            &group,
            changed,
        )?;
    }
    Ok(())
}

/// List the commits, newest first, in which the object stored at `paths`
/// holds a blob different from the one in the commit's parent.
///
/// `paths` are alternative locations of one object in order of preference:
/// the object's blob in a tree is the one at the first location present.
/// Commits that remove the object are skipped: there is no content to
/// resolve at those revisions.
pub fn revisions<G: CommitGraph + ?Sized>(
    graph: &G,
    head: &Id,
    paths: &[RepoPath],
) -> Result<Vec<(Id, Id)>> {
    walk_revisions(graph, head, paths, usize::MAX)
}

/// The newest entry [`revisions`] would return, found without walking the
/// rest of the history.
pub fn latest_revision<G: CommitGraph + ?Sized>(
    graph: &G,
    head: &Id,
    paths: &[RepoPath],
) -> Result<Option<(Id, Id)>> {
    Ok(walk_revisions(graph, head, paths, 1)?.into_iter().next())
}

/// Returns the blob at the first of `paths` present in `tree`.
pub fn lookup_first_blob<G: CommitGraph + ?Sized>(
    graph: &G,
    tree: &Id,
    paths: &[RepoPath],
) -> Result<Option<Id>> {
    for path in paths {
        if let Some(blob) = lookup_blob(graph, tree, path)? {
            return Ok(Some(blob));
        }
    }
    Ok(None)
}

fn walk_revisions<G: CommitGraph + ?Sized>(
    graph: &G,
    head: &Id,
    paths: &[RepoPath],
    limit: usize,
) -> Result<Vec<(Id, Id)>> {
    let mut out = Vec::new();

    let mut commit_id = *head;
    let mut commit = graph.read_commit(head)?;
    let mut here = lookup_first_blob(graph, commit.tree(), paths)?;

    while out.len() < limit {
        let parent = match commit.parent() {
            Some(id) => Some((*id, graph.read_commit(id)?)),
            None => None,
        };
        let before = match &parent {
            Some((_, parent)) if parent.tree() == commit.tree() => here,
            Some((_, parent)) => lookup_first_blob(graph, parent.tree(), paths)?,
            None => None,
        };

        if let Some(blob) = here {
            if before != Some(blob) {
                out.push((commit_id, blob));
            }
        }

        here = before;
        match parent {
            Some((id, parent)) => {
                commit_id = id;
                commit = parent;
            }
            None => break,
        }
    }

    Ok(out)
}

/// Returns true if `ancestor` is reachable from `descendant` (or equal to it).
pub fn is_ancestor<G: CommitGraph + ?Sized>(
    graph: &G,
    ancestor: &Id,
    descendant: &Id,
) -> Result<bool> {
    let mut seen = HashSet::new();
    let mut queue = vec![*descendant];

    while let Some(id) = queue.pop() {
        if &id == ancestor {
            return Ok(true);
        }
        if !seen.insert(id) {
            continue;
        }
        match graph.read_object(&id)? {
            Some(object) if object.kind() == Kind::Commit => {
                let commit = Commit::parse(object.content())
                    .map_err(|source| StorageError::Corrupt { id, source })?;
                queue.extend(commit.parents().iter().copied());
            }
            _ => {}
        }
    }

    Ok(false)
}

/// Follow annotated tags until a non-tag object is reached.
pub fn peel<G: CommitGraph + ?Sized>(graph: &G, id: &Id) -> Result<Option<(Id, Kind)>> {
    let mut id = *id;
    for _ in 0..16 {
        let object = match graph.read_object(&id)? {
            Some(object) => object,
            None => return Ok(None),
        };
        if object.kind() != Kind::Tag {
            return Ok(Some((id, object.kind())));
        }
        let tag =
            Tag::parse(object.content()).map_err(|source| StorageError::Corrupt { id, source })?;
        id = *tag.object();
    }
    Ok(None)
}
