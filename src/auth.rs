//! Credentials for talking to the remote.

use std::path::PathBuf;

use crate::{Result, StorageConfig};

/// Where an SSH private key comes from.
#[derive(Clone, Eq, PartialEq)]
pub enum KeySource {
    /// The key material itself, as found in the `key` setting.
    Literal(String),

    /// A file containing the key.
    File(PathBuf),
}

/// The credentials a transport should present to the remote.
#[derive(Clone, Eq, PartialEq)]
pub enum Credentials {
    None,
    SshKey {
        key: KeySource,
        verify_known_hosts: bool,
    },
    UserPassword {
        username: String,
        password: String,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::None => f.write_str("None"),
            Credentials::SshKey {
                key,
                verify_known_hosts,
            } => f
                .debug_struct("SshKey")
                .field(
                    "key",
                    &match key {
                        KeySource::Literal(_) => "<literal>".to_string(),
                        KeySource::File(path) => path.display().to_string(),
                    },
                )
                .field("verify_known_hosts", verify_known_hosts)
                .finish(),
            Credentials::UserPassword { username, .. } => f
                .debug_struct("UserPassword")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Supplies credentials for a storage's remote.
///
/// A storage asks its provider once, when opening. Replace the default
/// [`ConfigAuthProvider`] to source credentials from elsewhere.
pub trait AuthProvider: Send + Sync {
    fn credentials(&self, config: &StorageConfig) -> Result<Credentials>;
}

/// Derives credentials from the storage configuration.
///
/// A non-blank literal `key` wins over `keyPath`, and any SSH key wins over
/// `username`/`password`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfigAuthProvider;

impl AuthProvider for ConfigAuthProvider {
    fn credentials(&self, config: &StorageConfig) -> Result<Credentials> {
        let literal = config
            .key()
            .filter(|key| !key.trim().is_empty())
            .map(|key| KeySource::Literal(key.to_string()));

        let key = literal.or_else(|| config.key_path().map(|p| KeySource::File(p.to_path_buf())));

        if let Some(key) = key {
            return Ok(Credentials::SshKey {
                key,
                verify_known_hosts: config.verify_known_hosts(),
            });
        }

        match (config.username(), config.password()) {
            (Some(username), Some(password)) => Ok(Credentials::UserPassword {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Ok(Credentials::None),
        }
    }
}
