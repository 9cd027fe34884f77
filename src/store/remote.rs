use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::PersistError;

/// Object storage as seen by the core: opaque JSON blobs under string paths.
pub trait RemoteStore: Send + Sync {
    fn put(&self, path: &str, body: &[u8]) -> Result<(), PersistError>;
    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, PersistError>;
    /// Paths under `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, PersistError>;
}

/// `users/{uid}/{namespace}/{rest}`.
pub fn user_path(uid: &str, namespace: &str, rest: &str) -> String {
    format!("users/{uid}/{namespace}/{rest}")
}

/// In-memory remote; can be told to fail its next `n` writes.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failures_left: Mutex<usize>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(n: usize) -> Self {
        Self { objects: Mutex::default(), failures_left: Mutex::new(n) }
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }
}

impl RemoteStore for MemoryRemote {
    fn put(&self, path: &str, body: &[u8]) -> Result<(), PersistError> {
        {
            let mut left = self.failures_left.lock();
            if *left > 0 {
                *left -= 1;
                return Err(PersistError::Remote(format!("injected failure for {path}")));
            }
        }
        self.objects.lock().insert(path.to_owned(), body.to_vec());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, PersistError> {
        Ok(self.objects.lock().get(path).cloned())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, PersistError> {
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// How many times the worker tries one job, and how long it waits between.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    /// Single attempt; the next natural write supersedes a failed one.
    fn default() -> Self {
        Self { max_attempts: 1, backoff: Duration::ZERO }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self::default()
    }

    pub fn attempts(max_attempts: u32, backoff: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), backoff }
    }
}

#[derive(Clone, Debug)]
pub struct UploadJob {
    pub path: String,
    pub body: Vec<u8>,
}

/// Counters kept by the worker and the enqueue side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub uploaded: u64,
    pub failed: u64,
    pub retried: u64,
    pub dropped: u64,
}

/// Bounded fire-and-forget upload queue with a single worker thread.
///
/// `enqueue` never blocks the caller: a full queue drops the job with a
/// warning. Dropping the queue (or calling [`UploadQueue::shutdown`]) closes
/// the channel and joins the worker after it drains what was accepted.
pub struct UploadQueue {
    tx: Option<SyncSender<UploadJob>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<Mutex<UploadStats>>,
    remote: Arc<dyn RemoteStore>,
}

impl UploadQueue {
    pub fn spawn(
        remote: Arc<dyn RemoteStore>,
        capacity: usize,
        policy: RetryPolicy,
    ) -> Result<Self, PersistError> {
        let (tx, rx) = mpsc::sync_channel::<UploadJob>(capacity.max(1));
        let stats = Arc::new(Mutex::new(UploadStats::default()));
        let worker_stats = Arc::clone(&stats);
        let worker_remote = Arc::clone(&remote);

        let worker = std::thread::Builder::new()
            .name("pendulum-upload".into())
            .spawn(move || {
                while let Ok(job) = rx.recv() {
                    run_job(worker_remote.as_ref(), &job, policy, &worker_stats);
                }
                debug!("upload worker exiting");
            })?;

        Ok(Self { tx: Some(tx), worker: Some(worker), stats, remote })
    }

    /// Queue one upload without blocking.
    pub fn enqueue(&self, path: impl Into<String>, body: Vec<u8>) -> Result<(), PersistError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(PersistError::QueueClosed);
        };
        let job = UploadJob { path: path.into(), body };
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                self.stats.lock().dropped += 1;
                warn!(path = %job.path, "upload queue full, dropping job");
                Err(PersistError::QueueFull)
            }
            Err(TrySendError::Disconnected(job)) => {
                self.stats.lock().dropped += 1;
                warn!(path = %job.path, "upload worker gone, dropping job");
                Err(PersistError::QueueClosed)
            }
        }
    }

    /// Serialize `value` and queue it.
    pub fn enqueue_json<T: serde::Serialize + ?Sized>(
        &self,
        path: impl Into<String>,
        value: &T,
    ) -> Result<(), PersistError> {
        let body = serde_json::to_vec_pretty(value)?;
        self.enqueue(path, body)
    }

    pub fn stats(&self) -> UploadStats {
        *self.stats.lock()
    }

    /// Direct read access for best-effort syncs; writes go through the queue.
    pub fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    /// Close the queue, wait for accepted jobs, return the final counters.
    pub fn shutdown(mut self) -> UploadStats {
        self.close();
        self.stats()
    }

    fn close(&mut self) {
        self.tx.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("upload worker panicked");
            }
        }
    }
}

impl Drop for UploadQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_job(remote: &dyn RemoteStore, job: &UploadJob, policy: RetryPolicy, stats: &Mutex<UploadStats>) {
    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match remote.put(&job.path, &job.body) {
            Ok(()) => {
                debug!(path = %job.path, bytes = job.body.len(), attempt, "uploaded");
                stats.lock().uploaded += 1;
                return;
            }
            Err(e) if attempt < attempts => {
                debug!(path = %job.path, error = %e, attempt, "upload failed, retrying");
                stats.lock().retried += 1;
                if !policy.backoff.is_zero() {
                    std::thread::sleep(policy.backoff);
                }
            }
            Err(e) => {
                warn!(path = %job.path, error = %e, attempt, "upload failed");
                stats.lock().failed += 1;
            }
        }
    }
}

/// Queue handle bound to the signed-in user. Cheap to clone.
#[derive(Clone)]
pub struct Uploader {
    queue: Rc<UploadQueue>,
    uid: Option<String>,
}

impl Uploader {
    pub fn new(queue: Rc<UploadQueue>, uid: Option<String>) -> Self {
        Self { queue, uid }
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn set_uid(&mut self, uid: Option<String>) {
        self.uid = uid;
    }

    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    /// Queue `value` at `users/{uid}/{namespace}/{rest}`; returns the path.
    pub fn upload_json<T: serde::Serialize + ?Sized>(
        &self,
        namespace: &str,
        rest: &str,
        value: &T,
    ) -> Result<String, PersistError> {
        let uid = self.uid.as_deref().ok_or(PersistError::NotSignedIn)?;
        let path = user_path(uid, namespace, rest);
        self.queue.enqueue_json(path.clone(), value)?;
        Ok(path)
    }
}
