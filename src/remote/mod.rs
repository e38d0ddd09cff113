//! Transports that mirror local refs to the configured remote.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

use revstore_on_disk::OnDiskRepo;
use thiserror::Error;
use url::Url;

use crate::auth::Credentials;
use crate::{Result, StorageError, StorageConfig};

mod git_cli;
pub use git_cli::GitCliTransport;

mod local;
pub use local::LocalTransport;

/// Outcome of a push that the remote accepted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PushStatus {
    Pushed,
    UpToDate,
}

/// Why a push did not succeed.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum PushError {
    /// The remote has history the local ref does not contain.
    #[error("rejected by remote: {0}")]
    Rejected(String),

    /// Worth retrying: the remote was unreachable, busy or misbehaving.
    #[error("transient failure: {0}")]
    Transient(String),

    #[error("authentication failed: {0}")]
    Authentication(String),
}

/// Pushes one ref of the local repository to a remote.
///
/// A push always sends the ref's value at the time of the push, together
/// with every object the remote needs to fast-forward to it.
pub trait Transport: Debug + Send + Sync {
    fn push(&self, refname: &str) -> std::result::Result<PushStatus, PushError>;
}

/// Pick a transport for the configured remote URL.
///
/// Absolute paths and `file://` URLs are served by [`LocalTransport`];
/// everything else goes through the host `git` binary.
pub fn transport_for(
    config: &StorageConfig,
    credentials: Credentials,
    repo: Arc<OnDiskRepo>,
) -> Result<Option<Arc<dyn Transport>>> {
    let url = match config.remote_url() {
        Some(url) => url,
        None => return Ok(None),
    };

    if let Some(path) = local_path(url)? {
        return Ok(Some(Arc::new(LocalTransport::new(repo, path))));
    }

    Ok(Some(Arc::new(GitCliTransport::new(repo, url, credentials)?)))
}

fn local_path(url: &str) -> Result<Option<PathBuf>> {
    if url.starts_with("file:") {
        let parsed = Url::parse(url)
            .map_err(|err| StorageError::Configuration(format!("bad `remoteUrl`: {}", err)))?;
        let path = parsed.to_file_path().map_err(|_| {
            StorageError::Configuration(format!("`remoteUrl` is not a local path: {}", url))
        })?;
        return Ok(Some(path));
    }

    let path = PathBuf::from(url);
    if path.is_absolute() {
        Ok(Some(path))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_paths() {
        assert_eq!(
            local_path("/srv/mirror").unwrap(),
            Some(PathBuf::from("/srv/mirror"))
        );
        assert_eq!(
            local_path("file:///srv/mirror").unwrap(),
            Some(PathBuf::from("/srv/mirror"))
        );
        assert_eq!(local_path("ssh://git@example.com/repo.git").unwrap(), None);
        assert_eq!(local_path("git@example.com:repo.git").unwrap(), None);
        assert!(local_path("file://remote-host/srv/mirror").is_err());
    }
}
