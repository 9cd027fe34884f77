// tests/store.rs
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use pendulum_core::PersistError;
use pendulum_core::store::{
    FileStore, KeyValueStore, MemoryRemote, MemoryStore, RemoteStore, RetryPolicy, UploadQueue, UploadStats,
    Uploader, get_json, set_json, user_path,
};

/* ──────────────────────────────────────────────────────────────────────────
1) Local key-value stores
────────────────────────────────────────────────────────────────────────── */

fn exercise(store: &dyn KeyValueStore) {
    assert_eq!(store.get("levels.max_reached").unwrap(), None);

    set_json(store, "levels.max_reached", &7u32).unwrap();
    assert_eq!(get_json::<u32>(store, "levels.max_reached").unwrap(), Some(7));

    set_json(store, "levels.max_reached", &9u32).unwrap();
    assert_eq!(get_json::<u32>(store, "levels.max_reached").unwrap(), Some(9));

    store.remove("levels.max_reached").unwrap();
    store.remove("levels.max_reached").unwrap();
    assert_eq!(store.get("levels.max_reached").unwrap(), None);

    store.set("garbage", b"{not json").unwrap();
    assert!(matches!(get_json::<u32>(store, "garbage"), Err(PersistError::Encode(_))));
}

#[test]
fn memory_store_round_trips_values() {
    let store = MemoryStore::new();
    exercise(&store);
    assert_eq!(store.len(), 1);
}

#[test]
fn file_store_round_trips_values() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::open(dir.path().join("kv")).unwrap();
    exercise(&store);
}

#[test]
fn file_store_survives_reopen_and_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FileStore::open(dir.path()).unwrap();
        set_json(&store, "golden_mode.outcomes", &vec![1, 2, 3]).unwrap();
        // path separators never escape the root
        store.set("../users/u1", b"x").unwrap();
    }

    let store = FileStore::open(dir.path()).unwrap();
    assert_eq!(get_json::<Vec<i32>>(&store, "golden_mode.outcomes").unwrap(), Some(vec![1, 2, 3]));
    assert_eq!(store.get("../users/u1").unwrap(), Some(b"x".to_vec()));

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2, "{names:?}");
    assert!(names.iter().all(|n| !n.ends_with(".tmp") && !n.contains('/')));
}

/* ──────────────────────────────────────────────────────────────────────────
2) Upload queue
────────────────────────────────────────────────────────────────────────── */

#[test]
fn queue_uploads_in_order_and_reports_stats() {
    let remote = Arc::new(MemoryRemote::new());
    let queue = UploadQueue::spawn(remote.clone(), 8, RetryPolicy::default()).unwrap();
    queue.enqueue("a/1.json", b"1".to_vec()).unwrap();
    queue.enqueue_json("a/2.json", &serde_json::json!({ "n": 2 })).unwrap();

    let stats = queue.shutdown();
    assert_eq!(stats, UploadStats { uploaded: 2, ..Default::default() });
    assert_eq!(remote.get("a/1.json").unwrap(), Some(b"1".to_vec()));
    assert_eq!(remote.list("a/").unwrap(), vec!["a/1.json", "a/2.json"]);
    assert!(remote.list("b/").unwrap().is_empty());
}

#[test]
fn failed_writes_are_retried_up_to_the_limit() {
    let remote = Arc::new(MemoryRemote::failing(2));
    let queue = UploadQueue::spawn(remote.clone(), 8, RetryPolicy::attempts(3, Duration::ZERO)).unwrap();
    queue.enqueue("x.json", b"{}".to_vec()).unwrap();
    let stats = queue.shutdown();
    assert_eq!(stats, UploadStats { uploaded: 1, retried: 2, ..Default::default() });
    assert_eq!(remote.len(), 1);
}

#[test]
fn exhausted_retries_count_as_failures() {
    let remote = Arc::new(MemoryRemote::failing(3));
    let queue = UploadQueue::spawn(remote.clone(), 8, RetryPolicy::attempts(2, Duration::ZERO)).unwrap();
    queue.enqueue("first.json", b"{}".to_vec()).unwrap();
    queue.enqueue("second.json", b"{}".to_vec()).unwrap();
    let stats = queue.shutdown();
    assert_eq!(stats, UploadStats { uploaded: 1, failed: 1, retried: 2, dropped: 0 });
    assert_eq!(remote.paths(), vec!["second.json".to_string()]);
}

/// Blocks every write until the test releases the gate.
struct Gated {
    gate: Mutex<()>,
    entered: AtomicBool,
    inner: MemoryRemote,
}

impl RemoteStore for Gated {
    fn put(&self, path: &str, body: &[u8]) -> Result<(), PersistError> {
        self.entered.store(true, Ordering::SeqCst);
        let _open = self.gate.lock();
        self.inner.put(path, body)
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, PersistError> {
        self.inner.get(path)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, PersistError> {
        self.inner.list(prefix)
    }
}

#[test]
fn a_full_queue_drops_instead_of_blocking() {
    let remote = Arc::new(Gated { gate: Mutex::new(()), entered: AtomicBool::new(false), inner: MemoryRemote::new() });
    let closed = remote.gate.lock();
    let queue = UploadQueue::spawn(remote.clone(), 1, RetryPolicy::default()).unwrap();

    queue.enqueue("1.json", Vec::new()).unwrap();
    while !remote.entered.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }
    // worker is parked inside the first write; one slot left
    queue.enqueue("2.json", Vec::new()).unwrap();
    assert!(matches!(queue.enqueue("3.json", Vec::new()), Err(PersistError::QueueFull)));

    drop(closed);
    let stats = queue.shutdown();
    assert_eq!(stats, UploadStats { uploaded: 2, dropped: 1, ..Default::default() });
    assert_eq!(remote.inner.paths(), vec!["1.json".to_string(), "2.json".to_string()]);
}

/* ──────────────────────────────────────────────────────────────────────────
3) Uploader
────────────────────────────────────────────────────────────────────────── */

#[test]
fn uploader_scopes_paths_to_the_user() {
    assert_eq!(user_path("u9", "golden_mode", "outcomes/a.json"), "users/u9/golden_mode/outcomes/a.json");

    let remote = Arc::new(MemoryRemote::new());
    let queue = std::rc::Rc::new(UploadQueue::spawn(remote.clone(), 4, RetryPolicy::default()).unwrap());
    let mut up = Uploader::new(queue, None);

    assert!(matches!(up.upload_json("ai_models", "t.json", &1), Err(PersistError::NotSignedIn)));

    up.set_uid(Some("u9".into()));
    assert_eq!(up.uid(), Some("u9"));
    let path = up.upload_json("ai_models", "t.json", &1).unwrap();
    assert_eq!(path, "users/u9/ai_models/t.json");

    drop(up);
    assert_eq!(remote.paths(), vec![path]);
}
