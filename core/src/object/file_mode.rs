/// Describes the type of a tree entry.
///
/// Git uses a variation on the Unix file permissions flags to denote an entry's
/// intended type on disk. The following values are recognized:
///
/// * `0o100644` - normal file
/// * `0o100755` - executable file
/// * `0o120000` - symbolic link
/// * `0o040000` - tree (subdirectory)
/// * `0o160000` - submodule (aka gitlink)
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum FileMode {
    Normal,
    Executable,
    SymbolicLink,
    Tree,
    Submodule,
}

impl FileMode {
    /// Convert from git file-mode integer to `FileMode` enum.
    ///
    /// Returns `None` if the value is not one of the recognized constants.
    pub fn from_value(value: u32) -> Option<FileMode> {
        match value {
            0o100644 => Some(FileMode::Normal),
            0o100755 => Some(FileMode::Executable),
            0o120000 => Some(FileMode::SymbolicLink),
            0o040000 => Some(FileMode::Tree),
            0o160000 => Some(FileMode::Submodule),
            _ => None,
        }
    }

    /// Parse the octal representation used inside tree objects.
    ///
    /// Git writes trees without a leading zero (`40000`), which is the
    /// only form accepted here.
    pub fn from_octal_slice(slice: &[u8]) -> Option<FileMode> {
        if slice.is_empty() || slice.starts_with(b"0") {
            return None;
        }

        let mut value: u32 = 0;
        for c in slice {
            match c {
                b'0'..=b'7' => value = value.checked_mul(8)?.checked_add((c - b'0') as u32)?,
                _ => return None,
            }
        }

        FileMode::from_value(value)
    }

    /// Convert from `FileMode` enum to git file-mode integer.
    pub fn to_value(self) -> u32 {
        match self {
            FileMode::Normal => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::SymbolicLink => 0o120000,
            FileMode::Tree => 0o040000,
            FileMode::Submodule => 0o160000,
        }
    }

    /// Returns the octal text written into tree objects.
    pub fn to_octal_string(self) -> String {
        format!("{:o}", self.to_value())
    }

    /// Returns true if entries with this mode reference a blob.
    pub fn is_blob(self) -> bool {
        matches!(
            self,
            FileMode::Normal | FileMode::Executable | FileMode::SymbolicLink
        )
    }
}
