//! Validated, immutable storage configuration.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::value::{Error as ValueError, MapDeserializer};
use serde::Deserialize;

use crate::{Result, StorageError};

pub const DEFAULT_MAX_PUSH_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_COMMITTER_NAME: &str = "revstore";
pub const DEFAULT_COMMITTER_EMAIL: &str = "revstore@localhost";

/// Resolves secret references (e.g. `${vault:...}`) into their values.
///
/// The storage never interprets secret syntax itself; every secret-bearing
/// setting passes through this trait exactly once, at construction.
pub trait SecretResolver {
    fn resolve(&self, key: &str, value: &str) -> Result<String>;
}

/// A `SecretResolver` that returns every value verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainSecrets;

impl SecretResolver for PlainSecrets {
    fn resolve(&self, _key: &str, value: &str) -> Result<String> {
        Ok(value.to_string())
    }
}

// Settings exactly as found in the key/value source. Blank means unset.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawSettings {
    local_path: String,
    remote_url: String,
    branch: String,
    key_path: String,
    key: String,
    username: String,
    password: String,
    verify_known_hosts: String,
    max_push_attempts: String,
    read_only: String,
    retry_backoff_millis: String,
    shutdown_timeout_millis: String,
    committer_name: String,
    committer_email: String,
}

/// Describes where a storage keeps its repository and how it talks to the
/// remote. Construct with [`StorageConfig::from_settings`] or
/// [`StorageConfig::builder`]; both validate eagerly.
#[derive(Clone)]
pub struct StorageConfig {
    local_path: PathBuf,
    remote_url: Option<String>,
    branch: Option<String>,
    key: Option<String>,
    key_path: Option<PathBuf>,
    username: Option<String>,
    password: Option<String>,
    verify_known_hosts: bool,
    max_push_attempts: u32,
    read_only: bool,
    retry_backoff: Duration,
    shutdown_timeout: Duration,
    committer_name: String,
    committer_email: String,
}

impl StorageConfig {
    /// Start building a configuration for the repository at `local_path`.
    pub fn builder<P: AsRef<Path>>(local_path: P) -> StorageConfigBuilder {
        StorageConfigBuilder::new(local_path.as_ref())
    }

    /// Read a configuration from a flat key/value source.
    ///
    /// Recognized keys are `localPath`, `remoteUrl`, `branch`, `keyPath`,
    /// `key`, `username`, `password`, `verifyKnownHosts`, `maxPushAttempts`,
    /// `readOnly`, `retryBackoffMillis`, `shutdownTimeoutMillis`,
    /// `committerName` and `committerEmail`. Unknown keys are ignored.
    pub fn from_settings(
        settings: &HashMap<String, String>,
        secrets: &dyn SecretResolver,
    ) -> Result<StorageConfig> {
        let deserializer: MapDeserializer<_, ValueError> =
            MapDeserializer::new(settings.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let raw = RawSettings::deserialize(deserializer)
            .map_err(|err| StorageError::Configuration(err.to_string()))?;

        StorageConfig::from_raw(raw, secrets)
    }

    fn from_raw(raw: RawSettings, secrets: &dyn SecretResolver) -> Result<StorageConfig> {
        let local_path = non_blank(&raw.local_path)
            .ok_or_else(|| StorageError::Configuration("`localPath` is required".to_string()))?;

        let mut builder = StorageConfig::builder(local_path);
        builder.remote_url = resolve_location(secrets, "remoteUrl", &raw.remote_url)?;
        builder.branch = non_blank(&raw.branch);
        builder.key = resolve_secret(secrets, "key", &raw.key)?;
        builder.key_path = resolve_location(secrets, "keyPath", &raw.key_path)?.map(PathBuf::from);
        builder.username = resolve_secret(secrets, "username", &raw.username)?;
        builder.password = resolve_secret(secrets, "password", &raw.password)?;

        if let Some(verify) = parse_setting("verifyKnownHosts", &raw.verify_known_hosts)? {
            builder.verify_known_hosts = verify;
        }
        if let Some(attempts) = parse_setting::<i64>("maxPushAttempts", &raw.max_push_attempts)? {
            if attempts <= 0 || attempts > u32::MAX as i64 {
                return Err(StorageError::Configuration(format!(
                    "`maxPushAttempts` must be a positive integer, got {}",
                    attempts
                )));
            }
            builder.max_push_attempts = attempts as u32;
        }
        if let Some(read_only) = parse_setting("readOnly", &raw.read_only)? {
            builder.read_only = read_only;
        }
        if let Some(millis) = parse_setting("retryBackoffMillis", &raw.retry_backoff_millis)? {
            builder.retry_backoff = Duration::from_millis(millis);
        }
        if let Some(millis) = parse_setting("shutdownTimeoutMillis", &raw.shutdown_timeout_millis)?
        {
            builder.shutdown_timeout = Duration::from_millis(millis);
        }
        if let Some(name) = non_blank(&raw.committer_name) {
            builder.committer_name = name;
        }
        if let Some(email) = non_blank(&raw.committer_email) {
            builder.committer_email = email;
        }

        builder.build()
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref()
    }

    /// The branch to track, or `None` to use whatever HEAD points to.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn key_path(&self) -> Option<&Path> {
        self.key_path.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn verify_known_hosts(&self) -> bool {
        self.verify_known_hosts
    }

    pub fn max_push_attempts(&self) -> u32 {
        self.max_push_attempts
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }

    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    pub fn committer_name(&self) -> &str {
        &self.committer_name
    }

    pub fn committer_email(&self) -> &str {
        &self.committer_email
    }
}

// Secrets never reach logs through `{:?}`.
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |present: bool| if present { Some("<redacted>") } else { None };

        f.debug_struct("StorageConfig")
            .field("local_path", &self.local_path)
            .field("remote_url", &redacted(self.remote_url.is_some()))
            .field("branch", &self.branch)
            .field("key", &redacted(self.key.is_some()))
            .field("key_path", &redacted(self.key_path.is_some()))
            .field("username", &self.username)
            .field("password", &redacted(self.password.is_some()))
            .field("verify_known_hosts", &self.verify_known_hosts)
            .field("max_push_attempts", &self.max_push_attempts)
            .field("read_only", &self.read_only)
            .field("retry_backoff", &self.retry_backoff)
            .field("shutdown_timeout", &self.shutdown_timeout)
            .finish()
    }
}

/// Builds a [`StorageConfig`] programmatically.
#[derive(Clone, Debug)]
pub struct StorageConfigBuilder {
    local_path: PathBuf,
    remote_url: Option<String>,
    branch: Option<String>,
    key: Option<String>,
    key_path: Option<PathBuf>,
    username: Option<String>,
    password: Option<String>,
    verify_known_hosts: bool,
    max_push_attempts: u32,
    read_only: bool,
    retry_backoff: Duration,
    shutdown_timeout: Duration,
    committer_name: String,
    committer_email: String,
}

impl StorageConfigBuilder {
    fn new(local_path: &Path) -> StorageConfigBuilder {
        StorageConfigBuilder {
            local_path: local_path.to_path_buf(),
            remote_url: None,
            branch: None,
            key: None,
            key_path: None,
            username: None,
            password: None,
            verify_known_hosts: true,
            max_push_attempts: DEFAULT_MAX_PUSH_ATTEMPTS,
            read_only: false,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            committer_name: DEFAULT_COMMITTER_NAME.to_string(),
            committer_email: DEFAULT_COMMITTER_EMAIL.to_string(),
        }
    }

    pub fn remote_url(mut self, url: &str) -> Self {
        self.remote_url = Some(url.to_string());
        self
    }

    pub fn branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn key_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.key_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn verify_known_hosts(mut self, verify: bool) -> Self {
        self.verify_known_hosts = verify;
        self
    }

    pub fn max_push_attempts(mut self, attempts: u32) -> Self {
        self.max_push_attempts = attempts;
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn committer(mut self, name: &str, email: &str) -> Self {
        self.committer_name = name.to_string();
        self.committer_email = email.to_string();
        self
    }

    /// Validate the settings and produce an immutable configuration.
    pub fn build(self) -> Result<StorageConfig> {
        let invalid = |msg: String| Err(StorageError::Configuration(msg));

        if self.local_path.as_os_str().is_empty() {
            return invalid("`localPath` is required".to_string());
        }
        if !self.local_path.is_absolute() {
            return invalid(format!(
                "`localPath` must be absolute, got `{}`",
                self.local_path.display()
            ));
        }
        if self.max_push_attempts == 0 {
            return invalid("`maxPushAttempts` must be a positive integer, got 0".to_string());
        }
        if self.username.is_some() && self.password.is_none() {
            return invalid("`password` is required when `username` is set".to_string());
        }
        if let Some(branch) = &self.branch {
            let full = format!("refs/heads/{}", branch);
            if branch.starts_with("refs/") || revstore_on_disk::check_ref_name(&full).is_err() {
                return invalid(format!("`branch` is not a valid branch name: `{}`", branch));
            }
        }

        Ok(StorageConfig {
            local_path: self.local_path,
            remote_url: self.remote_url,
            branch: self.branch,
            key: self.key,
            key_path: self.key_path,
            username: self.username,
            password: self.password,
            verify_known_hosts: self.verify_known_hosts,
            max_push_attempts: self.max_push_attempts,
            read_only: self.read_only,
            retry_backoff: self.retry_backoff,
            shutdown_timeout: self.shutdown_timeout,
            committer_name: self.committer_name,
            committer_email: self.committer_email,
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

// Whitespace only decides whether a secret is set; the value itself is kept
// byte for byte.
fn resolve_secret(secrets: &dyn SecretResolver, key: &str, value: &str) -> Result<Option<String>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    let resolved = secrets.resolve(key, value)?;
    if resolved.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(resolved))
    }
}

// Locations (URLs, file paths) are trimmed after resolution.
fn resolve_location(
    secrets: &dyn SecretResolver,
    key: &str,
    value: &str,
) -> Result<Option<String>> {
    Ok(resolve_secret(secrets, key, value)?.map(|value| value.trim().to_string()))
}

fn parse_setting<T: std::str::FromStr>(key: &str, value: &str) -> Result<Option<T>> {
    match non_blank(value) {
        Some(value) => value.parse().map(Some).map_err(|_| {
            StorageError::Configuration(format!("`{}` has an unparsable value `{}`", key, value))
        }),
        None => Ok(None),
    }
}
