use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

use revstore_on_disk::OnDiskRepo;
use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;

use super::{PushError, PushStatus, Transport};
use crate::auth::{Credentials, KeySource};
use crate::{Result, StorageError};

/// Pushes by running the host `git` binary.
///
/// Used for every remote that is not a local path: SSH, HTTPS and anything
/// else git itself understands. Git never prompts; credentials come only
/// from [`Credentials`].
#[derive(Debug)]
pub struct GitCliTransport {
    repo: Arc<OnDiskRepo>,
    url: String,
    credentials: Credentials,
}

impl GitCliTransport {
    pub fn new(repo: Arc<OnDiskRepo>, url: &str, credentials: Credentials) -> Result<Self> {
        if let Credentials::UserPassword { .. } = &credentials {
            if Url::parse(url).is_err() {
                return Err(StorageError::Configuration(format!(
                    "username/password authentication needs a URL remote, got `{}`",
                    url
                )));
            }
        }

        Ok(GitCliTransport {
            repo,
            url: url.to_string(),
            credentials,
        })
    }

    fn push_url(&self) -> std::result::Result<String, PushError> {
        match &self.credentials {
            Credentials::UserPassword { username, password } => {
                with_userinfo(&self.url, username, password).map_err(PushError::Transient)
            }
            _ => Ok(self.url.clone()),
        }
    }

    fn run(&self, refname: &str) -> std::result::Result<Output, PushError> {
        let mut command = Command::new("git");
        command
            .arg("--git-dir")
            .arg(self.repo.git_dir())
            .args(&["push", "--porcelain"])
            .arg(self.push_url()?)
            .arg(format!("{}:{}", refname, refname))
            .env("GIT_TERMINAL_PROMPT", "0");

        // Keeps a literal key on disk until git has exited.
        let mut _key_file: Option<NamedTempFile> = None;

        if let Credentials::SshKey {
            key,
            verify_known_hosts,
        } = &self.credentials
        {
            let key_path = match key {
                KeySource::File(path) => path.clone(),
                KeySource::Literal(key) => {
                    let file = write_key(key).map_err(|err| {
                        PushError::Transient(format!("can't stage SSH key: {}", err))
                    })?;
                    let path = file.path().to_path_buf();
                    _key_file = Some(file);
                    path
                }
            };

            command.env("GIT_SSH_COMMAND", ssh_command(&key_path, *verify_known_hosts));
        }

        command
            .output()
            .map_err(|err| PushError::Transient(format!("can't run git: {}", err)))
    }

    fn redact(&self, text: &str) -> String {
        match &self.credentials {
            Credentials::UserPassword { password, .. } if !password.is_empty() => {
                text.replace(password.as_str(), "***")
            }
            _ => text.to_string(),
        }
    }
}

impl Transport for GitCliTransport {
    fn push(&self, refname: &str) -> std::result::Result<PushStatus, PushError> {
        let output = self.run(refname)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let report = self.redact(&format!("{}\n{}", stdout.trim(), stderr.trim()));

        debug!(target: "revstore::remote", %refname, status = ?output.status.code(), "git push finished");

        classify(output.status.success(), &report)
    }
}

fn classify(success: bool, report: &str) -> std::result::Result<PushStatus, PushError> {
    let lower = report.to_lowercase();

    if success {
        return if lower.contains("[up to date]") {
            Ok(PushStatus::UpToDate)
        } else {
            Ok(PushStatus::Pushed)
        };
    }

    let message = report.trim().to_string();
    if lower.contains("[rejected]")
        || lower.contains("non-fast-forward")
        || lower.contains("fetch first")
    {
        Err(PushError::Rejected(message))
    } else if lower.contains("authentication failed")
        || lower.contains("permission denied")
        || lower.contains("could not read username")
        || lower.contains("invalid username or password")
        || lower.contains("host key verification failed")
    {
        Err(PushError::Authentication(message))
    } else {
        Err(PushError::Transient(message))
    }
}

fn with_userinfo(url: &str, username: &str, password: &str) -> std::result::Result<String, String> {
    let mut url = Url::parse(url).map_err(|err| err.to_string())?;
    url.set_username(username)
        .map_err(|_| format!("can't set a username on `{}`", url))?;
    url.set_password(Some(password))
        .map_err(|_| "can't set a password on this URL".to_string())?;
    Ok(url.into())
}

fn write_key(key: &str) -> std::io::Result<NamedTempFile> {
    // tempfile creates the file readable by the owner only, as ssh requires.
    let mut file = NamedTempFile::new()?;
    file.write_all(key.as_bytes())?;
    if !key.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.as_file().sync_all()?;
    Ok(file)
}

fn ssh_command(key_path: &Path, verify_known_hosts: bool) -> String {
    let mut command = format!(
        "ssh -i '{}' -o IdentitiesOnly=yes -o BatchMode=yes",
        key_path.display().to_string().replace('\'', "'\\''")
    );
    if verify_known_hosts {
        command.push_str(" -o StrictHostKeyChecking=yes");
    } else {
        command.push_str(" -o StrictHostKeyChecking=no -o UserKnownHostsFile=/dev/null");
    }
    command
}
