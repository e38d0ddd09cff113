use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::str;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use revstore_core::object::{Id, Kind, Object};
use tempfile::NamedTempFile;

use crate::{Error, Result};

mod refs;
pub use refs::check_ref_name;

/// A git repository stored on the local file system.
///
/// Both the conventional layout (a work directory containing `.git`) and
/// bare repositories (the git directory itself) are supported. Only loose
/// objects are written; refs are plain files updated through `<ref>.lock`
/// files, exactly as command-line git does.
///
/// All methods take `&self`. Callers that need to serialize ref updates
/// across threads must do so themselves; the lock files only protect against
/// other processes.
#[derive(Debug)]
pub struct OnDiskRepo {
    work_dir: PathBuf,
    git_dir: PathBuf,
}

impl OnDiskRepo {
    /// Open an existing on-disk git repository.
    ///
    /// `work_dir` should either contain a `.git` directory or be a bare
    /// repository. Use `init` to create an empty repository if necessary.
    pub fn new(work_dir: &Path) -> Result<Self> {
        let work_dir = work_dir.to_path_buf();
        if !work_dir.exists() {
            return Err(Error::WorkDirDoesntExist(work_dir));
        }

        let git_dir = work_dir.join(".git");
        if git_dir.is_dir() {
            return Ok(OnDiskRepo { work_dir, git_dir });
        }

        if work_dir.join("HEAD").is_file() && work_dir.join("objects").is_dir() {
            return Ok(OnDiskRepo {
                git_dir: work_dir.clone(),
                work_dir,
            });
        }

        Err(Error::GitDirDoesntExist(git_dir))
    }

    /// Creates a new, empty git repository on the local file system.
    ///
    /// Analogous to [`git init`](https://git-scm.com/docs/git-init).
    pub fn init(work_dir: &Path) -> Result<Self> {
        let git_dir = work_dir.join(".git");
        if git_dir.exists() {
            return Err(Error::GitDirShouldntExist(git_dir));
        }

        create_layout(&git_dir, false)?;

        Ok(OnDiskRepo {
            work_dir: work_dir.to_path_buf(),
            git_dir,
        })
    }

    /// Creates a new, empty bare repository in `dir`.
    ///
    /// Analogous to `git init --bare`.
    pub fn init_bare(dir: &Path) -> Result<Self> {
        if dir.join("HEAD").exists() {
            return Err(Error::GitDirShouldntExist(dir.to_path_buf()));
        }

        create_layout(dir, true)?;

        Ok(OnDiskRepo {
            work_dir: dir.to_path_buf(),
            git_dir: dir.to_path_buf(),
        })
    }

    /// Return the working directory for this repo.
    ///
    /// For a bare repository this is the same as `git_dir`.
    pub fn work_dir(&self) -> &Path {
        self.work_dir.as_path()
    }

    /// Return the path to the git directory.
    pub fn git_dir(&self) -> &Path {
        self.git_dir.as_path()
    }

    /// Returns true if an object with this ID is present.
    pub fn has_object(&self, id: &Id) -> bool {
        self.object_path(id).is_file()
    }

    /// Write an object to the repository's loose object store.
    ///
    /// The object is compressed into a temporary file and then moved into
    /// place, so readers never observe a partially written object. Returns
    /// `false` if the object was already present.
    pub fn put_loose_object(&self, object: &Object) -> Result<bool> {
        let object_path = self.object_path(object.id());
        if object_path.exists() {
            return Ok(false);
        }

        let object_dir = object_path
            .parent()
            .ok_or_else(|| Error::CorruptObject(*object.id()))?;
        fs::create_dir_all(object_dir)?;

        let mut temp = NamedTempFile::new_in(object_dir)?;
        {
            let mut encoder = ZlibEncoder::new(temp.as_file_mut(), Compression::default());
            encoder.write_all(&object.header())?;
            encoder.write_all(object.content())?;
            encoder.finish()?;
        }
        temp.as_file().sync_all()?;

        match temp.persist_noclobber(&object_path) {
            Ok(_) => Ok(true),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err.error.into()),
        }
    }

    /// Read an object from the loose object store.
    ///
    /// Returns `Ok(None)` if no such object exists. The content is re-hashed
    /// on read; a mismatch is reported as `CorruptObject`.
    pub fn get_object(&self, id: &Id) -> Result<Option<Object>> {
        let file = match File::open(self.object_path(id)) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let mut raw = Vec::new();
        ZlibDecoder::new(file)
            .read_to_end(&mut raw)
            .map_err(|_| Error::CorruptObject(*id))?;

        let nul = raw
            .iter()
            .position(|b| *b == 0)
            .ok_or(Error::CorruptObject(*id))?;

        let (kind, len) = parse_header(&raw[..nul]).ok_or(Error::CorruptObject(*id))?;
        let content = raw.split_off(nul + 1);
        if content.len() != len {
            return Err(Error::CorruptObject(*id));
        }

        let object = Object::new(kind, content);
        if object.id() != id {
            return Err(Error::CorruptObject(*id));
        }

        Ok(Some(object))
    }

    /// Read an object and require it to be of the given kind.
    pub fn get_object_of_kind(&self, id: &Id, expected: Kind) -> Result<Option<Object>> {
        match self.get_object(id)? {
            Some(object) if object.kind() != expected => Err(Error::ObjectKindMismatch {
                id: *id,
                expected,
                actual: object.kind(),
            }),
            x => Ok(x),
        }
    }

    fn object_path(&self, id: &Id) -> PathBuf {
        let hex = id.to_string();
        self.git_dir.join("objects").join(&hex[..2]).join(&hex[2..])
    }
}

fn parse_header(header: &[u8]) -> Option<(Kind, usize)> {
    let header = str::from_utf8(header).ok()?;
    let mut parts = header.splitn(2, ' ');
    let kind = parts.next()?.parse::<Kind>().ok()?;
    let len = parts.next()?.parse::<usize>().ok()?;
    Some((kind, len))
}

fn create_layout(git_dir: &Path, bare: bool) -> Result<()> {
    fs::create_dir_all(git_dir)?;

    create_config(git_dir, bare)?;
    create_description(git_dir)?;
    create_head(git_dir)?;
    create_hooks_dir(git_dir)?;
    create_info_dir(git_dir)?;
    create_objects_dir(git_dir)?;
    create_refs_dir(git_dir)?;

    Ok(())
}

fn create_config(git_dir: &Path, bare: bool) -> Result<()> {
    let config_path = git_dir.join("config");
    let config_txt = format!(
        "[core]\n\trepositoryformatversion = 0\n\tfilemode = true\n\tbare = {}\n\tlogallrefupdates = true\n",
        bare
    );

    fs::write(config_path, config_txt).map_err(|e| e.into())
}

fn create_description(git_dir: &Path) -> Result<()> {
    let desc_path = git_dir.join("description");
    let desc_txt = "Unnamed repository; edit this file 'description' to name the repository.\n";

    fs::write(desc_path, desc_txt).map_err(|e| e.into())
}

fn create_head(git_dir: &Path) -> Result<()> {
    let head_path = git_dir.join("HEAD");
    let head_txt = "ref: refs/heads/master\n";

    fs::write(head_path, head_txt).map_err(|e| e.into())
}

fn create_hooks_dir(git_dir: &Path) -> Result<()> {
    let hooks_dir = git_dir.join("hooks");
    fs::create_dir_all(&hooks_dir).map_err(|e| e.into())

    // NOTE: Intentionally not including the sample files.
}

fn create_info_dir(git_dir: &Path) -> Result<()> {
    let info_dir = git_dir.join("info");
    fs::create_dir_all(&info_dir)?;

    let exclude_path = info_dir.join("exclude");
    let exclude_txt = "# git ls-files --others --exclude-from=.git/info/exclude\n# Lines that start with '#' are comments.\n";

    fs::write(exclude_path, exclude_txt).map_err(|e| e.into())
}

fn create_objects_dir(git_dir: &Path) -> Result<()> {
    let info_dir = git_dir.join("objects/info");
    fs::create_dir_all(&info_dir)?;

    let pack_dir = git_dir.join("objects/pack");
    fs::create_dir_all(&pack_dir).map_err(|e| e.into())
}

fn create_refs_dir(git_dir: &Path) -> Result<()> {
    let heads_dir = git_dir.join("refs/heads");
    fs::create_dir_all(&heads_dir)?;

    let tags_dir = git_dir.join("refs/tags");
    fs::create_dir_all(&tags_dir).map_err(|e| e.into())
}

#[cfg(test)]
mod tests;
