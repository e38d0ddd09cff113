use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use revstore::{
    Attribution, ObjectMetadata, ObjectRecord, PushError, PushStatus, Storage, StorageConfig,
    StorageConfigBuilder, StorageParts, Transport,
};

// Each test binary compiles this module separately and uses only part of it.

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn meta(title: &str) -> ObjectMetadata {
    ObjectMetadata::new(Attribution::new(
        "A. U. Thor",
        "author@example.com",
        1_600_000_000,
        0,
    ))
    .with_title(title)
}

#[allow(dead_code)]
pub fn config(dir: &Path) -> StorageConfigBuilder {
    StorageConfig::builder(dir)
        .committer("Test Committer", "committer@example.com")
        .retry_backoff(Duration::from_millis(0))
}

#[allow(dead_code)]
pub fn open(dir: &Path) -> Storage {
    init_tracing();
    Storage::open(config(dir).build().unwrap()).unwrap()
}

#[allow(dead_code)]
pub fn open_with_transport(dir: &Path, transport: Arc<dyn Transport>, attempts: u32) -> Storage {
    init_tracing();
    Storage::with_parts(
        config(dir)
            .remote_url("https://example.com/unused.git")
            .max_push_attempts(attempts)
            .build()
            .unwrap(),
        StorageParts::new().transport(transport),
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn put(storage: &Storage, path: &str, content: &[u8]) -> ObjectRecord {
    storage
        .append_object(path, &meta(path), &mut &content[..], content.len() as u64)
        .unwrap()
}

#[allow(dead_code)]
pub fn history_len(storage: &Storage) -> usize {
    let out = std::process::Command::new("git")
        .current_dir(storage.path())
        .args(&["rev-list", "--count", storage.branch_ref()])
        .output()
        .unwrap();
    assert!(out.status.success());
    String::from_utf8(out.stdout).unwrap().trim().parse().unwrap()
}

/// A transport that replays canned replies, then reports `UpToDate`.
#[derive(Debug, Default)]
pub struct Scripted {
    replies: Mutex<VecDeque<Result<PushStatus, PushError>>>,
    calls: AtomicU64,
    refs: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl Scripted {
    pub fn new(replies: Vec<Result<PushStatus, PushError>>) -> Arc<Scripted> {
        Arc::new(Scripted {
            replies: Mutex::new(replies.into_iter().collect()),
            ..Scripted::default()
        })
    }

    pub fn failing(times: usize) -> Arc<Scripted> {
        Scripted::new(vec![
            Err(PushError::Transient("connection refused".to_string()));
            times
        ])
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn pushed_refs(&self) -> Vec<String> {
        self.refs.lock().unwrap().clone()
    }
}

impl Transport for Scripted {
    fn push(&self, refname: &str) -> Result<PushStatus, PushError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.refs.lock().unwrap().push(refname.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PushStatus::UpToDate))
    }
}
