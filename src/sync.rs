//! Background mirroring of the tracked branch to the remote.
//!
//! One worker thread per storage receives push jobs over a bounded channel.
//! Jobs only carry the commit that triggered them; each push sends the
//! branch's value at push time, so any jobs queued behind the one being
//! handled are folded into it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use revstore_core::object::Id;
use tracing::{debug, error, info, warn};

use crate::remote::{PushError, PushStatus, Transport};
use crate::Result;

const QUEUE_CAPACITY: usize = 64;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How hard to try before giving up on a push.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyncPolicy {
    pub max_attempts: u32,

    /// Delay before the second attempt; doubled after every further failure.
    pub backoff: Duration,
}

/// Final result of [`push_with_retry`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PushOutcome {
    Succeeded,
    UpToDate,
    Rejected(String),
    AuthenticationFailed(String),
    Abandoned { attempts: u32, last_error: String },
}

/// Counters describing the synchronizer's work so far.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SyncStatus {
    /// Push jobs accepted onto the queue.
    pub queued: u64,

    /// Queued jobs folded into a later push.
    pub coalesced: u64,

    /// Individual transport calls, including retries.
    pub attempts: u64,

    pub succeeded: u64,
    pub up_to_date: u64,
    pub rejected: u64,
    pub auth_failures: u64,

    /// Pushes given up after exhausting every attempt.
    pub abandoned: u64,
}

#[derive(Debug, Default)]
pub(crate) struct SyncStats {
    queued: AtomicU64,
    coalesced: AtomicU64,
    attempts: AtomicU64,
    succeeded: AtomicU64,
    up_to_date: AtomicU64,
    rejected: AtomicU64,
    auth_failures: AtomicU64,
    abandoned: AtomicU64,
}

impl SyncStats {
    pub(crate) fn snapshot(&self) -> SyncStatus {
        SyncStatus {
            queued: self.queued.load(Ordering::SeqCst),
            coalesced: self.coalesced.load(Ordering::SeqCst),
            attempts: self.attempts.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            up_to_date: self.up_to_date.load(Ordering::SeqCst),
            rejected: self.rejected.load(Ordering::SeqCst),
            auth_failures: self.auth_failures.load(Ordering::SeqCst),
            abandoned: self.abandoned.load(Ordering::SeqCst),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::SeqCst);
}

/// Push `refname`, retrying transient failures with exponential backoff.
///
/// Rejections and authentication failures end the attempt immediately.
pub fn push_with_retry(
    transport: &dyn Transport,
    refname: &str,
    policy: &SyncPolicy,
) -> PushOutcome {
    push_counted(transport, refname, policy, &SyncStats::default())
}

pub(crate) fn push_counted(
    transport: &dyn Transport,
    refname: &str,
    policy: &SyncPolicy,
    stats: &SyncStats,
) -> PushOutcome {
    let mut delay = policy.backoff;
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        bump(&stats.attempts);

        match transport.push(refname) {
            Ok(PushStatus::Pushed) => {
                bump(&stats.succeeded);
                info!(target: "revstore::sync", %refname, attempt, "pushed to remote");
                return PushOutcome::Succeeded;
            }
            Ok(PushStatus::UpToDate) => {
                bump(&stats.up_to_date);
                debug!(target: "revstore::sync", %refname, "remote already up to date");
                return PushOutcome::UpToDate;
            }
            Err(PushError::Rejected(msg)) => {
                bump(&stats.rejected);
                warn!(
                    target: "revstore::sync",
                    %refname,
                    reason = %msg,
                    "remote history has diverged; keeping local commit and abandoning push"
                );
                return PushOutcome::Rejected(msg);
            }
            Err(PushError::Authentication(msg)) => {
                bump(&stats.auth_failures);
                error!(target: "revstore::sync", %refname, reason = %msg, "remote rejected credentials");
                return PushOutcome::AuthenticationFailed(msg);
            }
            Err(PushError::Transient(msg)) => {
                warn!(
                    target: "revstore::sync",
                    %refname,
                    attempt,
                    max_attempts = policy.max_attempts,
                    reason = %msg,
                    "push failed"
                );
                last_error = msg;

                if attempt < policy.max_attempts && !delay.is_zero() {
                    thread::sleep(delay);
                    delay = delay.checked_mul(2).unwrap_or(MAX_BACKOFF).min(MAX_BACKOFF);
                }
            }
        }
    }

    bump(&stats.abandoned);
    error!(
        target: "revstore::sync",
        %refname,
        attempts = policy.max_attempts,
        reason = %last_error,
        "giving up on push; local commit is intact"
    );
    PushOutcome::Abandoned {
        attempts: policy.max_attempts,
        last_error,
    }
}

/// Owns the push worker for one storage.
pub(crate) struct Synchronizer {
    transport: Arc<dyn Transport>,
    policy: SyncPolicy,
    sender: Mutex<Option<Sender<Id>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    finished: Receiver<()>,
    stats: Arc<SyncStats>,
}

impl Synchronizer {
    pub(crate) fn start(
        transport: Arc<dyn Transport>,
        refname: String,
        policy: SyncPolicy,
    ) -> Result<Synchronizer> {
        let (sender, jobs) = bounded::<Id>(QUEUE_CAPACITY);
        let (done, finished) = bounded::<()>(1);
        let stats = Arc::new(SyncStats::default());

        let worker_stats = stats.clone();
        let worker_transport = transport.clone();
        let worker = thread::Builder::new()
            .name("revstore-sync".into())
            .spawn(move || {
                run_worker(worker_transport.as_ref(), &refname, &policy, &jobs, &worker_stats);
                let _ = done.send(());
            })?;

        Ok(Synchronizer {
            transport,
            policy,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            finished,
            stats,
        })
    }

    /// Queue a push for `commit`. Never blocks.
    pub(crate) fn enqueue(&self, commit: Id) {
        let sender = self.sender.lock();
        let sender = match sender.as_ref() {
            Some(sender) => sender,
            None => {
                debug!(target: "revstore::sync", %commit, "synchronizer closed; push not queued");
                return;
            }
        };

        match sender.try_send(commit) {
            Ok(()) => bump(&self.stats.queued),
            Err(TrySendError::Full(_)) => {
                // The jobs already queued will carry this commit.
                bump(&self.stats.coalesced);
                debug!(target: "revstore::sync", %commit, "push queue full; folding into queued push");
            }
            Err(TrySendError::Disconnected(_)) => {
                error!(target: "revstore::sync", %commit, "push worker has stopped");
            }
        }
    }

    /// Push `refname` on the calling thread, with the same retry policy and
    /// counters as the worker.
    pub(crate) fn push_now(&self, refname: &str) -> PushOutcome {
        push_counted(self.transport.as_ref(), refname, &self.policy, &self.stats)
    }

    pub(crate) fn status(&self) -> SyncStatus {
        self.stats.snapshot()
    }

    /// Stop accepting jobs, let the worker finish what is queued, and wait
    /// up to `timeout` for it. Returns false if the worker had to be
    /// detached.
    pub(crate) fn shutdown(&self, timeout: Duration) -> bool {
        // Dropping the sender lets the worker drain the queue and exit.
        drop(self.sender.lock().take());

        let worker = match self.worker.lock().take() {
            Some(worker) => worker,
            None => return true,
        };

        match self.finished.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.join().is_err() {
                    error!(target: "revstore::sync", "push worker panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                error!(
                    target: "revstore::sync",
                    timeout_ms = timeout.as_millis() as u64,
                    "push worker still busy at shutdown; detaching it"
                );
                false
            }
        }
    }
}

fn run_worker(
    transport: &dyn Transport,
    refname: &str,
    policy: &SyncPolicy,
    jobs: &Receiver<Id>,
    stats: &SyncStats,
) {
    while let Ok(mut commit) = jobs.recv() {
        while let Ok(newer) = jobs.try_recv() {
            bump(&stats.coalesced);
            commit = newer;
        }

        debug!(target: "revstore::sync", %refname, %commit, "pushing");
        push_counted(transport, refname, policy, stats);
    }

    debug!(target: "revstore::sync", %refname, "push worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    #[derive(Debug)]
    struct Scripted {
        replies: Mutex<VecDeque<std::result::Result<PushStatus, PushError>>>,
        calls: AtomicU64,
    }

    impl Scripted {
        fn new(replies: Vec<std::result::Result<PushStatus, PushError>>) -> Scripted {
            Scripted {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: AtomicU64::new(0),
            }
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for Scripted {
        fn push(&self, _refname: &str) -> std::result::Result<PushStatus, PushError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .pop_front()
                .unwrap_or(Ok(PushStatus::UpToDate))
        }
    }

    fn policy(max_attempts: u32) -> SyncPolicy {
        SyncPolicy {
            max_attempts,
            backoff: Duration::from_millis(0),
        }
    }

    fn transient() -> std::result::Result<PushStatus, PushError> {
        Err(PushError::Transient("connection reset".to_string()))
    }

    #[test]
    fn retries_then_succeeds() {
        let t = Scripted::new(vec![transient(), transient(), Ok(PushStatus::Pushed)]);
        assert_eq!(
            push_with_retry(&t, "refs/heads/master", &policy(3)),
            PushOutcome::Succeeded
        );
        assert_eq!(t.calls(), 3);
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let t = Scripted::new(vec![transient(); 5]);
        let stats = SyncStats::default();

        match push_counted(&t, "refs/heads/master", &policy(3), &stats) {
            PushOutcome::Abandoned {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "connection reset");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(t.calls(), 3);
        assert_eq!(stats.snapshot().attempts, 3);
        assert_eq!(stats.snapshot().abandoned, 1);
    }

    #[test]
    fn rejection_is_not_retried() {
        let t = Scripted::new(vec![Err(PushError::Rejected("fetch first".to_string()))]);
        assert_eq!(
            push_with_retry(&t, "refs/heads/master", &policy(3)),
            PushOutcome::Rejected("fetch first".to_string())
        );
        assert_eq!(t.calls(), 1);
    }

    #[test]
    fn authentication_is_not_retried() {
        let t = Scripted::new(vec![Err(PushError::Authentication("denied".to_string()))]);
        assert_eq!(
            push_with_retry(&t, "refs/heads/master", &policy(3)),
            PushOutcome::AuthenticationFailed("denied".to_string())
        );
        assert_eq!(t.calls(), 1);
    }

    #[test]
    fn worker_drains_queue_on_shutdown() {
        let t = Arc::new(Scripted::new(vec![]));
        let sync =
            Synchronizer::start(t.clone(), "refs/heads/master".to_string(), policy(1)).unwrap();

        let id = Id::from_hex("0123456789012345678901234567890123456789").unwrap();
        sync.enqueue(id);
        sync.enqueue(id);
        sync.enqueue(id);

        assert!(sync.shutdown(Duration::from_secs(10)));

        let status = sync.status();
        assert_eq!(status.queued, 3);
        assert!(t.calls() >= 1 && t.calls() <= 3);
        assert_eq!(status.attempts, t.calls());
        assert_eq!(status.coalesced + t.calls(), 3);

        // Nothing is accepted after shutdown.
        sync.enqueue(id);
        assert_eq!(sync.status().queued, 3);
        assert!(sync.shutdown(Duration::from_secs(1)));
    }
}
