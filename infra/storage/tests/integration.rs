use std::collections::BTreeSet;
use std::fs;
use tempfile::TempDir;
use vexil_domain::FlagAccess;
use vexil_domain::config::StorageSettings;
use vexil_storage::*;

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

fn settings(temp: &TempDir, background_writes: bool) -> StorageSettings {
    StorageSettings {
        session_path: temp.path().join("session/flags.json"),
        owner_path: temp.path().join("owner/flags.json"),
        background_writes,
    }
}

#[test]
fn test_commit_then_reopen_roundtrip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("flags.json");

    let mut storage = FileFlagsStorage::open(&path);
    storage.set_flags(names(&["x", "y@2"]));
    storage.set_string_flag("s", "hello");
    storage.set_origin_list_flag("o", "https://a.test");
    assert!(storage.is_dirty());
    storage.commit_pending_writes();
    assert!(!storage.is_dirty());

    let reopened = FileFlagsStorage::open(&path);
    assert_eq!(reopened.flags(), names(&["x", "y@2"]));
    assert_eq!(reopened.string_flag("s"), "hello");
    assert_eq!(reopened.origin_list_flag("o"), "https://a.test");
    assert_eq!(reopened.string_flag("missing"), "");
}

#[test]
fn test_corrupt_file_reads_as_empty() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("flags.json");
    fs::write(&path, b"{ not json").unwrap();

    let storage = FileFlagsStorage::open(&path);
    assert!(storage.flags().is_empty());
    assert!(storage.selection().is_empty());
    assert!(load_selection(&path).is_err());
}

#[test]
fn test_missing_file_reads_as_empty() {
    let temp = TempDir::new().unwrap();
    let storage = FileFlagsStorage::open(temp.path().join("absent.json"));
    assert!(storage.flags().is_empty());
    assert!(!storage.is_dirty());
}

#[test]
fn test_unwritable_target_drops_write_without_panicking() {
    let temp = TempDir::new().unwrap();
    // A directory where the file should be makes the rename fail.
    let path = temp.path().join("flags.json");
    fs::create_dir_all(path.join("occupied")).unwrap();

    let mut storage = FileFlagsStorage::open(&path);
    storage.set_flags(names(&["x"]));
    storage.commit_pending_writes();

    assert!(!storage.is_dirty());
    assert!(storage.flags().contains("x"));
}

#[test]
fn test_drop_commits_pending_changes() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("flags.json");
    {
        let mut storage = FileFlagsStorage::open(&path);
        storage.set_flags(names(&["late"]));
    }
    assert!(FileFlagsStorage::open(&path).flags().contains("late"));
}

#[test]
fn test_queued_commits_land_after_flush() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("flags.json");
    let queue = WriteQueue::spawn().unwrap();

    let mut storage = FileFlagsStorage::open(&path).with_queue(queue.clone());
    storage.set_flags(names(&["a"]));
    storage.commit_pending_writes();
    storage.set_flags(names(&["a", "b"]));
    storage.commit_pending_writes();
    queue.flush();

    assert_eq!(load_selection(&path).unwrap().flags, names(&["a", "b"]));
}

#[test]
fn test_dropping_queued_storage_waits_for_the_write() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested/flags.json");
    {
        let mut storage = FileFlagsStorage::open(&path).with_queue(WriteQueue::spawn().unwrap());
        assert!(storage.queue().is_some());
        storage.set_flags(names(&["queued"]));
    }
    assert_eq!(load_selection(&path).unwrap().flags, names(&["queued"]));
}

#[tokio::test]
async fn test_owner_resolves_to_owner_store() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp, false);

    let mut resolved = resolve_backend(&StaticProbe(true), &settings).await;
    assert_eq!(resolved.access, FlagAccess::Owner);

    resolved.storage.set_flags(names(&["owner-flag"]));
    resolved.storage.commit_pending_writes();
    assert!(settings.owner_path.exists());
    assert!(!settings.session_path.exists());
}

#[tokio::test]
async fn test_non_owner_resolves_to_session_store() {
    let temp = TempDir::new().unwrap();
    let settings = settings(&temp, true);

    let mut resolved = resolve_backend(&StaticProbe(false), &settings).await;
    assert_eq!(resolved.access, FlagAccess::NonOwner);
    assert!(resolved.queue.is_some());

    resolved.storage.set_flags(names(&["session-flag"]));
    drop(resolved);

    assert_eq!(load_selection(&settings.session_path).unwrap().flags, names(&["session-flag"]));
}

#[tokio::test]
async fn test_inline_backend_has_no_queue() {
    let temp = TempDir::new().unwrap();
    let resolved = resolve_backend(&StaticProbe(false), &settings(&temp, false)).await;
    assert!(resolved.queue.is_none());
}

struct SlowProbe;

impl OwnershipProbe for SlowProbe {
    async fn is_owner(&self) -> bool {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        true
    }
}

#[tokio::test]
async fn test_async_probe_is_awaited_before_open() {
    let temp = TempDir::new().unwrap();
    let resolved = resolve_backend(&SlowProbe, &settings(&temp, false)).await;
    assert_eq!(resolved.access, FlagAccess::Owner);
}
