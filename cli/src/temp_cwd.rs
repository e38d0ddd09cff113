use std::{
    env,
    path::{Path, PathBuf},
};

// Changes the working directory of the whole test process until dropped,
// which lets the CLI tests exercise the "no -C given" path.
//
// Panics instead of returning errors. Any test that uses this must be
// marked #[serial].
pub(crate) struct TempCwd {
    old_path: PathBuf,
}

impl TempCwd {
    pub fn new<P: AsRef<Path>>(path: P) -> TempCwd {
        let old_path = env::current_dir().unwrap();
        env::set_current_dir(path).unwrap();

        TempCwd { old_path }
    }
}

impl Drop for TempCwd {
    fn drop(&mut self) {
        env::set_current_dir(&self.old_path).unwrap();
    }
}
