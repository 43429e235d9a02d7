//! FileTokenStore integration tests: persistence, key independence, corruption

use tempfile::TempDir;

use helpalign_core::auth::{FileTokenStore, StoreError, TokenStore};

#[test]
fn test_missing_file_reads_as_empty() {
    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path());

    assert!(!store.path().exists());
    assert_eq!(store.get("HA-patienttoken").unwrap(), None);
    assert_eq!(store.stored_at("HA-patienttoken").unwrap(), None);
    // Removing from an empty store does not create the file
    store.remove("HA-patienttoken").unwrap();
    assert!(!store.path().exists());
}

#[test]
fn test_tokens_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("helpalign");

    let store = FileTokenStore::new(&nested);
    store.set("HA-patienttoken", "abc").unwrap();
    store.set("HA-providertoken", "def").unwrap();
    assert!(store.stored_at("HA-patienttoken").unwrap().is_some());

    let reopened = FileTokenStore::new(&nested);
    assert_eq!(reopened.get("HA-patienttoken").unwrap().as_deref(), Some("abc"));
    assert_eq!(reopened.get("HA-providertoken").unwrap().as_deref(), Some("def"));
}

#[test]
fn test_overwrite_and_remove_single_key() {
    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path());

    store.set("HA-patienttoken", "old").unwrap();
    store.set("HA-patienttoken", "new").unwrap();
    store.set("HA-providertoken", "other").unwrap();
    assert_eq!(store.get("HA-patienttoken").unwrap().as_deref(), Some("new"));

    store.remove("HA-patienttoken").unwrap();
    assert_eq!(store.get("HA-patienttoken").unwrap(), None);
    assert_eq!(store.get("HA-providertoken").unwrap().as_deref(), Some("other"));
}

#[test]
fn test_empty_file_reads_as_empty() {
    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path());
    std::fs::write(store.path(), "").unwrap();

    assert_eq!(store.get("HA-providertoken").unwrap(), None);
}

#[test]
fn test_corrupt_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path());
    std::fs::write(store.path(), "{\"HA-patienttoken\": 42").unwrap();

    assert!(matches!(store.get("HA-patienttoken"), Err(StoreError::Parse(_))));
}

#[cfg(unix)]
#[test]
fn test_token_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let store = FileTokenStore::new(dir.path());
    store.set("HA-patienttoken", "abc").unwrap();

    let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
