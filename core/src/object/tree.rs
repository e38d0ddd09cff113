use std::cmp::Ordering;

use super::{parse_utils, DecodeError, FileMode, Id, Kind, Object};

/// A single named entry in a tree: a blob (file) or a nested tree (directory).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreeEntry {
    mode: FileMode,
    name: String,
    id: Id,
}

impl TreeEntry {
    /// Create a new tree entry.
    pub fn new(mode: FileMode, name: &str, id: Id) -> TreeEntry {
        TreeEntry {
            mode,
            name: name.to_string(),
            id,
        }
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn is_tree(&self) -> bool {
        self.mode == FileMode::Tree
    }
}

/// An immutable directory snapshot, kept in git's canonical entry order.
///
/// Git sorts entries by name, comparing trees as though their names ended
/// with `/`. Two entries may not share a name, regardless of mode.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Tree {
        Tree::default()
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Find the entry with the given name, if any.
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Insert an entry, replacing any existing entry of the same name.
    pub fn insert(&mut self, entry: TreeEntry) {
        self.remove(&entry.name);

        let pos = self
            .entries
            .iter()
            .position(|e| entry_order(e, &entry) == Ordering::Greater)
            .unwrap_or_else(|| self.entries.len());

        self.entries.insert(pos, entry);
    }

    /// Remove the entry with the given name, returning it if it existed.
    pub fn remove(&mut self, name: &str) -> Option<TreeEntry> {
        let pos = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(pos))
    }

    /// Serialize to git's tree format: `<octal mode> <name>\0<20-byte id>` per entry.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.to_octal_string().as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.id.as_bytes());
        }
        out
    }

    pub fn to_object(&self) -> Object {
        Object::new(Kind::Tree, self.to_bytes())
    }

    /// Parse git's tree format.
    ///
    /// Entries must be well-formed and appear in canonical order without
    /// duplicate names.
    pub fn parse(content: &[u8]) -> Result<Tree, DecodeError> {
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut rest = content;

        while !rest.is_empty() {
            let nul = rest
                .iter()
                .position(|b| *b == 0)
                .ok_or(DecodeError::Truncated)?;

            let (mode, name) = parse_utils::split_once(&rest[..nul], &b' ');
            let mode = FileMode::from_octal_slice(mode).ok_or(DecodeError::InvalidMode)?;
            let name = parse_utils::utf8(name)?;
            if name.is_empty() || name.contains('/') {
                return Err(DecodeError::InvalidEntryName(name.to_string()));
            }

            let id_start = nul + 1;
            if rest.len() < id_start + 20 {
                return Err(DecodeError::Truncated);
            }
            let id = Id::new(&rest[id_start..id_start + 20])?;

            let entry = TreeEntry::new(mode, name, id);
            if let Some(previous) = entries.last() {
                if previous.name == entry.name
                    || entry_order(previous, &entry) != Ordering::Less
                {
                    return Err(DecodeError::Unsorted(entry.name));
                }
            }

            entries.push(entry);
            rest = &rest[id_start + 20..];
        }

        Ok(Tree { entries })
    }
}

fn entry_order(left: &TreeEntry, right: &TreeEntry) -> Ordering {
    sort_key(left).cmp(sort_key(right))
}

fn sort_key(entry: &TreeEntry) -> impl Iterator<Item = u8> + '_ {
    let suffix: &[u8] = if entry.is_tree() { b"/" } else { b"" };
    entry.name.bytes().chain(suffix.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> Id {
        Id::new(&[n; 20]).unwrap()
    }

    #[test]
    fn insert_keeps_git_order() {
        let mut tree = Tree::new();
        tree.insert(TreeEntry::new(FileMode::Normal, "foo.c", id(1)));
        tree.insert(TreeEntry::new(FileMode::Tree, "foo", id(2)));
        tree.insert(TreeEntry::new(FileMode::Normal, "foo-bar", id(3)));
        tree.insert(TreeEntry::new(FileMode::Normal, "a", id(4)));

        let names: Vec<&str> = tree.entries().iter().map(|e| e.name()).collect();
        // "foo" sorts as "foo/", which comes after "foo-bar" and "foo.c".
        assert_eq!(names, vec!["a", "foo-bar", "foo.c", "foo"]);
    }

    #[test]
    fn insert_replaces_same_name() {
        let mut tree = Tree::new();
        tree.insert(TreeEntry::new(FileMode::Normal, "x", id(1)));
        tree.insert(TreeEntry::new(FileMode::Normal, "x", id(2)));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get("x").unwrap().id(), &id(2));
    }

    #[test]
    fn remove() {
        let mut tree = Tree::new();
        tree.insert(TreeEntry::new(FileMode::Normal, "x", id(1)));

        assert!(tree.remove("y").is_none());
        assert_eq!(tree.remove("x").unwrap().id(), &id(1));
        assert!(tree.is_empty());
    }

    #[test]
    fn empty_tree_id_matches_git() {
        assert_eq!(
            Tree::new().to_object().id().to_string(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }

    #[test]
    fn parse_what_we_write() {
        let mut tree = Tree::new();
        tree.insert(TreeEntry::new(FileMode::Normal, "readme", id(1)));
        tree.insert(TreeEntry::new(FileMode::Tree, "src", id(2)));

        assert_eq!(Tree::parse(&tree.to_bytes()).unwrap(), tree);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(
            Tree::parse(b"100644 name").unwrap_err(),
            DecodeError::Truncated
        );

        let mut short_id = b"100644 name\0".to_vec();
        short_id.extend_from_slice(&[1; 10]);
        assert_eq!(Tree::parse(&short_id).unwrap_err(), DecodeError::Truncated);

        let mut bad_mode = b"100645 name\0".to_vec();
        bad_mode.extend_from_slice(&[1; 20]);
        assert_eq!(Tree::parse(&bad_mode).unwrap_err(), DecodeError::InvalidMode);

        let mut unsorted = Vec::new();
        for name in &["b", "a"] {
            unsorted.extend_from_slice(b"100644 ");
            unsorted.extend_from_slice(name.as_bytes());
            unsorted.push(0);
            unsorted.extend_from_slice(&[1; 20]);
        }
        assert_eq!(
            Tree::parse(&unsorted).unwrap_err(),
            DecodeError::Unsorted("a".to_string())
        );
    }
}
