//! Autosave scheduling tests
//!
//! These run on Tokio's paused clock: sleeping advances virtual time
//! instantly once every task is idle, so the 2s/10s windows cost nothing.

use memostore::{ErrorSink, List, Map, Store, StoreConfig, StoreError};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn location(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_str().unwrap().to_string()
}

fn on_disk(path: &str) -> Option<Vec<u32>> {
    if !Path::new(path).exists() {
        return None;
    }
    let raw = std::fs::read_to_string(path).unwrap();
    Some(serde_json::from_str(&raw).unwrap())
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_single_mutation_saves_after_debounce() {
    let temp_dir = TempDir::new().unwrap();
    let path = location(&temp_dir, "debounce.json");
    let list = List::<u32>::load(&path).await.unwrap();

    {
        let mut guard = list.lock().await;
        guard.append(1);
        guard.append(2);
    }
    assert!(list.stats().pending);

    advance(1_900).await;
    assert_eq!(on_disk(&path), None);

    advance(600).await;
    assert_eq!(on_disk(&path), Some(vec![1, 2]));

    // Nothing else happens without further mutation.
    advance(30_000).await;
    let stats = list.stats();
    assert_eq!(stats.autosaves, 1);
    assert_eq!(stats.bursts, 1);
    assert!(!stats.pending);
}

#[tokio::test(start_paused = true)]
async fn test_burst_coalesces_into_one_save() {
    let temp_dir = TempDir::new().unwrap();
    let path = location(&temp_dir, "burst.json");
    let list = List::<u32>::load(&path).await.unwrap();

    for i in 0..5 {
        list.lock().await.append(i);
        advance(500).await;
    }
    // Last unlock at t=2.0s, debounce due at t=4.0s.
    advance(1_000).await;
    assert_eq!(on_disk(&path), None);

    advance(1_500).await;
    assert_eq!(on_disk(&path), Some(vec![0, 1, 2, 3, 4]));
    assert_eq!(list.stats().autosaves, 1);
}

#[tokio::test(start_paused = true)]
async fn test_sustained_churn_saves_every_max_delay() {
    let temp_dir = TempDir::new().unwrap();
    let path = location(&temp_dir, "churn.json");
    let list = List::<u32>::load(&path).await.unwrap();

    let mut saved_by_t9 = None;
    let mut saved_by_t11 = None;

    // One mutation per second for 15 seconds.
    for i in 0..15 {
        list.lock().await.append(i);
        advance(1_000).await;

        match i {
            8 => saved_by_t9 = Some(list.stats().autosaves),
            10 => saved_by_t11 = Some(list.stats().autosaves),
            _ => {}
        }
    }

    assert_eq!(saved_by_t9, Some(0));
    assert_eq!(saved_by_t11, Some(1));
    // The first snapshot holds the first ten or eleven mutations.
    let first = on_disk(&path).unwrap();
    assert!(first.len() >= 10 && first.len() <= 12, "got {:?}", first);

    // t=15s: the second burst is still open.
    assert_eq!(list.stats().autosaves, 1);
    assert!(list.stats().pending);

    // Last mutation at t=14s, debounce due at t=16s.
    advance(1_500).await;
    assert_eq!(list.stats().autosaves, 2);
    assert_eq!(on_disk(&path), Some((0..15).collect()));
}

#[tokio::test(start_paused = true)]
async fn test_shared_unlock_does_not_schedule() {
    let temp_dir = TempDir::new().unwrap();
    let path = location(&temp_dir, "read.json");
    let list = List::<u32>::load(&path).await.unwrap();

    let guard = list.lock_shared().await;
    assert!(guard.is_empty());
    guard.unlock_shared();

    advance(15_000).await;
    assert_eq!(list.stats().bursts, 0);
    assert_eq!(on_disk(&path), None);
}

#[tokio::test(start_paused = true)]
async fn test_custom_timings() {
    let temp_dir = TempDir::new().unwrap();
    let path = location(&temp_dir, "fast.json");
    let config = StoreConfig::new()
        .debounce(Duration::from_millis(100))
        .max_delay(Duration::from_millis(300));
    let list = List::<u32>::load_with_config(&path, config).await.unwrap();

    list.lock().await.append(7);
    advance(150).await;
    assert_eq!(on_disk(&path), Some(vec![7]));
}

#[tokio::test(start_paused = true)]
async fn test_failed_autosave_reaches_sink() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("sub");
    let path = dir.join("items.json");
    let path = path.to_str().unwrap().to_string();

    let (sink, mut errors) = ErrorSink::channel(8);
    let map = Map::<u32>::load_with_config(&path, StoreConfig::new().error_sink(sink))
        .await
        .unwrap();
    assert!(dir.is_dir());

    // Turn the parent directory into a regular file so every write fails.
    std::fs::remove_dir(&dir).unwrap();
    std::fs::write(&dir, b"not a directory").unwrap();

    map.lock().await.set("a", 1);

    let err = errors.recv().await.unwrap();
    assert!(matches!(err, StoreError::Io { .. }));
    assert_eq!(err.location(), Some(path.as_str()));

    let stats = map.stats();
    assert_eq!(stats.failed_autosaves, 1);
    assert_eq!(stats.autosaves, 0);

    // Explicit saves report the same failure directly.
    assert!(matches!(map.save().await, Err(StoreError::Io { .. })));

    // In-memory state is untouched.
    assert_eq!(map.lock_shared().await.get("a"), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn test_flush_saves_immediately_and_cancels_burst() {
    let temp_dir = TempDir::new().unwrap();
    let path = location(&temp_dir, "flush.json");
    let list = List::<u32>::load(&path).await.unwrap();

    list.lock().await.append(5);
    assert!(list.stats().pending);

    list.flush().await.unwrap();
    assert_eq!(on_disk(&path), Some(vec![5]));
    assert!(!list.stats().pending);

    advance(15_000).await;
    assert_eq!(list.stats().autosaves, 0);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_save_bypasses_scheduler() {
    let temp_dir = TempDir::new().unwrap();
    let path = location(&temp_dir, "explicit.json");
    let list = List::<u32>::load_with_config(&path, StoreConfig::new().autosave(false))
        .await
        .unwrap();

    list.lock().await.append(3);
    advance(15_000).await;
    assert_eq!(on_disk(&path), None);

    list.save().await.unwrap();
    assert_eq!(on_disk(&path), Some(vec![3]));
    assert_eq!(list.stats().bursts, 0);
}
