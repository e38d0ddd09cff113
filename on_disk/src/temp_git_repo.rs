use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};

/// A `TempGitRepo` creates a temporary, empty repo using
/// the command-line git from the host system. This is
/// used in tests to check that repositories written by
/// revstore are readable by git and vice versa.
///
/// Because this struct is intended for testing, its functions
/// panic instead of returning Result structs.
pub struct TempGitRepo {
    #[allow(dead_code)] // tempdir is only used for RAII
    tempdir: tempfile::TempDir,
    path: PathBuf,
}

impl TempGitRepo {
    /// Create a new repo with a work directory in a temporary directory.
    /// This directory will be deleted when the struct is dropped.
    pub fn new() -> TempGitRepo {
        TempGitRepo::with_init_args(&["init", "--quiet"])
    }

    /// Create a new bare repo in a temporary directory.
    pub fn new_bare() -> TempGitRepo {
        TempGitRepo::with_init_args(&["init", "--quiet", "--bare"])
    }

    fn with_init_args(args: &[&str]) -> TempGitRepo {
        let tempdir = tempfile::tempdir().unwrap();
        let path: PathBuf = tempdir.path().to_path_buf();

        let mut r = TempGitRepo { tempdir, path };
        r.git_command(args);
        r
    }

    /// Return the path for this repo's root (working directory, or
    /// the git directory itself for a bare repo).
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Create a command struct pointing to the root of the repo.
    pub fn command<S: AsRef<OsStr>>(&mut self, program: S) -> Command {
        let mut c = Command::new(program);
        c.current_dir(&self.path);
        c
    }

    /// Run a git command and return the git repo struct for method chaining.
    /// Since this is used primarily for testing purposes, panics if command fails.
    pub fn git_command<I, S>(&mut self, args: I) -> &mut TempGitRepo
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.git_stdout(args);
        self
    }

    /// Run a git command and return its standard output.
    /// Panics if the command fails.
    pub fn git_stdout<I, S>(&mut self, args: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.command("git").args(args).output().unwrap();

        if !output.status.success() {
            panic!(
                "git command failed with status {:?}\n\nstdout:\n\n{}\n\nstderr:\n\n{}\n\n",
                output.status.code(),
                std::str::from_utf8(&output.stdout).unwrap(),
                std::str::from_utf8(&output.stderr).unwrap()
            );
        }

        String::from_utf8(output.stdout).unwrap()
    }
}
