use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use revstore_core::object::Id;
use tempfile::NamedTempFile;
use tracing::debug;

use super::OnDiskRepo;
use crate::{Error, Result};

const MAX_SYMREF_DEPTH: usize = 5;

impl OnDiskRepo {
    /// Returns the full name of the branch HEAD points to (e.g. `refs/heads/master`).
    pub fn head_ref(&self) -> Result<String> {
        let head = fs::read_to_string(self.git_dir.join("HEAD"))?;
        match head.trim_end().strip_prefix("ref: ") {
            Some(name) => Ok(name.to_string()),
            None => Err(Error::DetachedHead),
        }
    }

    /// Point HEAD at the named branch, which need not exist yet.
    pub fn set_head_ref(&self, name: &str) -> Result<()> {
        check_ref_name(name)?;
        fs::write(self.git_dir.join("HEAD"), format!("ref: {}\n", name))?;
        Ok(())
    }

    /// Resolve a ref to the object ID it points at.
    ///
    /// Loose refs take precedence over `packed-refs`. Symbolic refs are
    /// followed. Returns `Ok(None)` if the ref does not exist.
    pub fn read_ref(&self, name: &str) -> Result<Option<Id>> {
        let mut name = name.to_string();

        for _ in 0..MAX_SYMREF_DEPTH {
            let contents = match fs::read_to_string(self.git_dir.join(&name)) {
                Ok(contents) => contents,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    return Ok(self.packed_refs()?.remove(&name));
                }
                Err(err) => return Err(err.into()),
            };

            let contents = contents.trim_end();
            match contents.strip_prefix("ref: ") {
                Some(target) => name = target.to_string(),
                None => return parse_ref_contents(&name, contents).map(Some),
            }
        }

        Err(Error::InvalidRefName(name))
    }

    /// Atomically move `name` from `expected` to `new`.
    ///
    /// `expected == None` means the ref must not exist yet. Fails with
    /// `RefMismatch` if the ref holds some other value and with `RefLocked`
    /// if another writer holds the ref's lock file.
    pub fn update_ref(&self, name: &str, expected: Option<&Id>, new: &Id) -> Result<()> {
        check_ref_name(name)?;

        let ref_path = self.git_dir.join(name);
        if let Some(parent) = ref_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let (lock, mut file) = RefLock::acquire(&ref_path, name)?;

        let actual = self.read_ref(name)?;
        if actual.as_ref() != expected {
            return Err(Error::RefMismatch {
                name: name.to_string(),
                expected: expected.copied(),
                actual,
            });
        }

        writeln!(file, "{}", new)?;
        file.sync_all()?;
        drop(file);

        lock.commit(&ref_path)?;
        debug!(target: "revstore::refs", %name, %new, "ref updated");
        Ok(())
    }

    /// Overwrite `name` with `new` regardless of its current value or lock state.
    pub fn force_ref(&self, name: &str, new: &Id) -> Result<()> {
        check_ref_name(name)?;

        let ref_path = self.git_dir.join(name);
        let dir = ref_path
            .parent()
            .ok_or_else(|| Error::InvalidRefName(name.to_string()))?;
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        writeln!(temp, "{}", new)?;
        temp.as_file().sync_all()?;
        temp.persist(&ref_path).map_err(|err| err.error)?;

        debug!(target: "revstore::refs", %name, %new, "ref forced");
        Ok(())
    }

    /// Returns true if a `<name>.lock` file is present for this ref.
    pub fn is_ref_locked(&self, name: &str) -> bool {
        lock_path(&self.git_dir.join(name)).exists()
    }

    /// List all refs whose names start with `prefix` (e.g. `refs/tags/`),
    /// sorted by name.
    pub fn list_refs(&self, prefix: &str) -> Result<Vec<(String, Id)>> {
        let mut refs: BTreeMap<String, Id> = self
            .packed_refs()?
            .into_iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .collect();

        let dir = self.git_dir.join(prefix);
        if dir.is_dir() {
            let mut loose = Vec::new();
            collect_loose_refs(&dir, prefix.trim_end_matches('/'), &mut loose)?;
            for name in loose {
                if let Some(id) = self.read_ref(&name)? {
                    refs.insert(name, id);
                }
            }
        }

        Ok(refs.into_iter().collect())
    }

    fn packed_refs(&self) -> Result<BTreeMap<String, Id>> {
        let contents = match fs::read_to_string(self.git_dir.join("packed-refs")) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(err.into()),
        };

        let mut refs = BTreeMap::new();
        for line in contents.lines() {
            if line.starts_with('#') || line.starts_with('^') || line.is_empty() {
                continue;
            }

            let mut parts = line.splitn(2, ' ');
            if let (Some(hex), Some(name)) = (parts.next(), parts.next()) {
                refs.insert(name.to_string(), parse_ref_contents(name, hex)?);
            }
        }

        Ok(refs)
    }
}

/// Check a ref name against the rules of `git check-ref-format`.
pub fn check_ref_name(name: &str) -> Result<()> {
    let invalid = || Err(Error::InvalidRefName(name.to_string()));

    if name.is_empty()
        || name == "@"
        || name.ends_with('/')
        || name.ends_with('.')
        || name.contains("..")
        || name.contains("@{")
    {
        return invalid();
    }

    if name
        .chars()
        .any(|c| c.is_control() || " ~^:?*[\\".contains(c))
    {
        return invalid();
    }

    for component in name.split('/') {
        if component.is_empty() || component.starts_with('.') || component.ends_with(".lock") {
            return invalid();
        }
    }

    Ok(())
}

fn parse_ref_contents(name: &str, contents: &str) -> Result<Id> {
    Id::from_hex(contents.trim()).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("ref `{}` is unreadable: {}", name, err),
        )
        .into()
    })
}

fn collect_loose_refs(dir: &Path, name_prefix: &str, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = match entry.file_name().into_string() {
            Ok(file_name) => file_name,
            Err(_) => continue,
        };

        let name = format!("{}/{}", name_prefix, file_name);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_loose_refs(&entry.path(), &name, out)?;
        } else if file_type.is_file() && !file_name.ends_with(".lock") {
            out.push(name);
        }
    }

    Ok(())
}

fn lock_path(ref_path: &Path) -> PathBuf {
    let mut path: OsString = ref_path.as_os_str().to_owned();
    path.push(".lock");
    PathBuf::from(path)
}

// Holds `<ref>.lock` for the duration of an update. The lock file is removed
// on drop unless it was renamed over the ref by `commit`.
struct RefLock {
    path: PathBuf,
    committed: bool,
}

impl RefLock {
    fn acquire(ref_path: &Path, name: &str) -> Result<(RefLock, File)> {
        let path = lock_path(ref_path);
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::RefLocked(name.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        Ok((
            RefLock {
                path,
                committed: false,
            },
            file,
        ))
    }

    fn commit(mut self, ref_path: &Path) -> Result<()> {
        fs::rename(&self.path, ref_path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for RefLock {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}
