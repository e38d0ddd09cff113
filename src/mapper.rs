//! Translation between logical object paths and their location in the tree.
//!
//! A logical path is what callers pass to `Storage`; a physical path is
//! where the blob lives in the repository. The first segment of a logical
//! path is its *kind*. Mappers are partial: a `None` result means the path
//! is outside this storage's jurisdiction.

use std::collections::BTreeMap;
use std::fmt::Debug;

/// Maps logical paths to physical paths and back.
///
/// Implementations must round-trip: for every `p` where
/// `forward_map(p) == Some(q)`, `backward_map(q) == Some(p)`.
pub trait PathMapper: Debug + Send + Sync {
    /// The physical directory prefix used for objects of `kind`, including a
    /// trailing `/` when non-empty.
    fn path_prefix(&self, kind: &str) -> String;

    /// The suffix (typically a file extension) appended to objects of `kind`.
    fn path_suffix(&self, kind: &str) -> String;

    fn forward_map(&self, logical: &str) -> Option<String>;

    fn backward_map(&self, physical: &str) -> Option<String>;

    /// An older physical location that may still hold `logical`. Reads fall
    /// back to it when `forward_map`'s location is empty, and deletes clear
    /// it as well. New content is never written there.
    fn legacy_map(&self, _logical: &str) -> Option<String> {
        None
    }
}

/// Logical and physical paths are the same.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityMapper;

impl PathMapper for IdentityMapper {
    fn path_prefix(&self, _kind: &str) -> String {
        String::new()
    }

    fn path_suffix(&self, _kind: &str) -> String {
        String::new()
    }

    fn forward_map(&self, logical: &str) -> Option<String> {
        Some(logical.to_string())
    }

    fn backward_map(&self, physical: &str) -> Option<String> {
        Some(physical.to_string())
    }
}

/// Stores everything beneath a fixed directory: `prefix/<logical>`.
#[derive(Clone, Debug)]
pub struct PrefixMapper {
    prefix: String,
}

impl PrefixMapper {
    pub fn new(prefix: &str) -> PrefixMapper {
        PrefixMapper {
            prefix: normalize_prefix(prefix),
        }
    }
}

impl PathMapper for PrefixMapper {
    fn path_prefix(&self, _kind: &str) -> String {
        self.prefix.clone()
    }

    fn path_suffix(&self, _kind: &str) -> String {
        String::new()
    }

    fn forward_map(&self, logical: &str) -> Option<String> {
        Some(format!("{}{}", self.prefix, logical))
    }

    fn backward_map(&self, physical: &str) -> Option<String> {
        strip_non_empty(physical, &self.prefix).map(str::to_string)
    }
}

/// Stores registered kinds as `prefix/<kind>/<name>.<ext>`.
///
/// Logical paths whose kind has no registered extension are not handled.
#[derive(Clone, Debug)]
pub struct ExtensionMapper {
    prefix: String,
    extensions: BTreeMap<String, String>,
}

impl ExtensionMapper {
    pub fn new(prefix: &str) -> ExtensionMapper {
        ExtensionMapper {
            prefix: normalize_prefix(prefix),
            extensions: BTreeMap::new(),
        }
    }

    /// Register `extension` (without the leading dot) for `kind`.
    pub fn with_kind(mut self, kind: &str, extension: &str) -> ExtensionMapper {
        self.extensions.insert(
            kind.to_string(),
            format!(".{}", extension.trim_start_matches('.')),
        );
        self
    }
}

impl PathMapper for ExtensionMapper {
    fn path_prefix(&self, kind: &str) -> String {
        format!("{}{}/", self.prefix, kind)
    }

    fn path_suffix(&self, kind: &str) -> String {
        self.extensions.get(kind).cloned().unwrap_or_default()
    }

    fn forward_map(&self, logical: &str) -> Option<String> {
        let (kind, name) = split_kind(logical)?;
        let suffix = self.extensions.get(kind)?;
        Some(format!("{}{}", self.path_prefix(kind), name) + suffix)
    }

    fn backward_map(&self, physical: &str) -> Option<String> {
        let rest = strip_non_empty(physical, &self.prefix)?;
        let (kind, name) = split_kind(rest)?;
        let suffix = self.extensions.get(kind)?;
        let name = name.strip_suffix(suffix.as_str())?;
        if name.is_empty() || name.ends_with('/') {
            return None;
        }
        Some(format!("{}/{}", kind, name))
    }
}

/// Wraps another mapper and also accepts physical paths written under an
/// older layout that had an extra leading directory.
///
/// New objects are always written through the inner mapper.
#[derive(Debug)]
pub struct LegacyPrefixMapper<M> {
    legacy_prefix: String,
    inner: M,
}

impl<M: PathMapper> LegacyPrefixMapper<M> {
    pub fn new(legacy_prefix: &str, inner: M) -> LegacyPrefixMapper<M> {
        LegacyPrefixMapper {
            legacy_prefix: normalize_prefix(legacy_prefix),
            inner,
        }
    }
}

impl<M: PathMapper> PathMapper for LegacyPrefixMapper<M> {
    fn path_prefix(&self, kind: &str) -> String {
        self.inner.path_prefix(kind)
    }

    fn path_suffix(&self, kind: &str) -> String {
        self.inner.path_suffix(kind)
    }

    fn forward_map(&self, logical: &str) -> Option<String> {
        self.inner.forward_map(logical)
    }

    // Only offered when it reads back as `logical`, so a fallback never
    // surfaces another object's content.
    fn legacy_map(&self, logical: &str) -> Option<String> {
        let physical = format!("{}{}", self.legacy_prefix, self.inner.forward_map(logical)?);
        if self.backward_map(&physical).as_deref() == Some(logical) {
            Some(physical)
        } else {
            None
        }
    }

    fn backward_map(&self, physical: &str) -> Option<String> {
        self.inner.backward_map(physical).or_else(|| {
            strip_non_empty(physical, &self.legacy_prefix)
                .and_then(|rest| self.inner.backward_map(rest))
        })
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{}/", prefix)
    }
}

fn strip_non_empty<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    path.strip_prefix(prefix).filter(|rest| !rest.is_empty())
}

fn split_kind(path: &str) -> Option<(&str, &str)> {
    let slash = path.find('/')?;
    let (kind, name) = (&path[..slash], &path[slash + 1..]);
    if kind.is_empty() || name.is_empty() {
        None
    } else {
        Some((kind, name))
    }
}
