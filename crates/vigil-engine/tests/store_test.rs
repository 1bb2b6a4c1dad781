use vigil_engine::session::{MonitorMode, MonitorSession, SessionKey, SessionPatch};
use vigil_engine::store::{FileStore, MemoryStore, SessionStore, StoreError};

fn session() -> MonitorSession {
    MonitorSession::new(
        "#price",
        MonitorMode::Contains,
        "sold out",
        5,
        "In Stock",
        "https://shop.example.com/item/42",
    )
}

#[tokio::test]
async fn test_memory_store_clones_share_record() {
    let store = MemoryStore::new();
    let other = store.clone();

    store.set(session().to_patch()).await.unwrap();
    other.set(SessionPatch::condition_met()).await.unwrap();

    let record = store
        .get(&[SessionKey::IsActive, SessionKey::ConditionMet])
        .await
        .unwrap();
    assert_eq!(record.is_active, Some(false));
    assert_eq!(record.condition_met, Some(true));
    assert!(record.selector.is_none());
}

#[tokio::test]
async fn test_file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    FileStore::new(&path).set(session().to_patch()).await.unwrap();
    FileStore::new(&path)
        .set(SessionPatch::selector("#stock"))
        .await
        .unwrap();

    let record = FileStore::new(&path).get_all().await.unwrap();
    assert_eq!(record.selector.as_deref(), Some("#stock"));
    assert_eq!(record.search_text.as_deref(), Some("sold out"));
    assert_eq!(record.interval, Some(5));

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"monitoringUrl\""));
    assert!(raw.contains("\"initialContent\""));
}

#[tokio::test]
async fn test_file_store_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("absent.json"));

    let record = store.get_all().await.unwrap();
    assert!(record.is_empty());
    assert!(!record.is_active());
}

#[tokio::test]
async fn test_file_store_rejects_corrupt_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{not json").unwrap();

    let err = FileStore::new(&path).get_all().await.unwrap_err();
    assert!(matches!(err, StoreError::Serialization(_)));
}
