mod common;

use async_trait::async_trait;
use common::{ITEM_URL, MockPage};
use vigil_engine::control::{
    SessionStatus, StartError, StartForm, acquire_selector, start_session, stop_session,
};
use vigil_engine::host::{HostError, SelectorAcquisition};
use vigil_engine::session::{MonitorMode, SessionPatch};
use vigil_engine::store::{MemoryStore, SessionStore};

struct FixedPicker(Option<&'static str>);

#[async_trait]
impl SelectorAcquisition for FixedPicker {
    async fn pick_element(&self) -> Result<Option<String>, HostError> {
        Ok(self.0.map(String::from))
    }
}

fn form(selector: &str, mode: MonitorMode, text: &str) -> StartForm {
    StartForm {
        selector: selector.into(),
        mode,
        search_text: text.into(),
        interval: None,
    }
}

#[tokio::test]
async fn test_start_persists_snapshot_and_url() {
    let store = MemoryStore::new();
    let page = MockPage::new(ITEM_URL, Some("In Stock"));

    let session = start_session(
        form("  #price ", MonitorMode::Change, ""),
        page.as_ref(),
        &store,
        10,
    )
    .await
    .unwrap();

    assert_eq!(session.selector, "#price");
    assert_eq!(session.interval_secs, 10);
    let record = store.get_all().await.unwrap();
    assert_eq!(record.initial_content.as_deref(), Some("In Stock"));
    assert_eq!(record.monitoring_url.as_deref(), Some(ITEM_URL));
    assert_eq!(record.is_active, Some(true));
    assert_eq!(record.condition_met, Some(false));
    assert_eq!(SessionStatus::from_record(&record), SessionStatus::Active);
}

#[tokio::test]
async fn test_start_rejects_bad_input_without_writing() {
    let store = MemoryStore::new();
    let page = MockPage::new(ITEM_URL, Some("In Stock"));

    let err = start_session(form("   ", MonitorMode::Change, ""), page.as_ref(), &store, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::EmptySelector));

    let err = start_session(form("#price", MonitorMode::Contains, " "), page.as_ref(), &store, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::MissingSearchText));

    let missing = MockPage::new(ITEM_URL, None);
    let err = start_session(form("#gone", MonitorMode::Change, ""), missing.as_ref(), &store, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, StartError::ElementNotFound(ref s) if s == "#gone"));

    assert!(store.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stop_and_status_labels() {
    let store = MemoryStore::with_record(SessionPatch::condition_met());
    assert_eq!(
        SessionStatus::from_record(&store.get_all().await.unwrap()).label(),
        "Condition met! Monitoring stopped."
    );

    stop_session(&store).await.unwrap();
    let record = store.get_all().await.unwrap();
    assert_eq!(SessionStatus::from_record(&record), SessionStatus::Inactive);
    assert_eq!(SessionStatus::Inactive.label(), "Not monitoring");
}

#[tokio::test]
async fn test_picked_selector_is_stored() {
    let store = MemoryStore::new();

    let picked = acquire_selector(&FixedPicker(Some("#price > span")), &store)
        .await
        .unwrap();
    assert_eq!(picked.as_deref(), Some("#price > span"));
    assert_eq!(
        store.get_all().await.unwrap().selector.as_deref(),
        Some("#price > span")
    );

    let cancelled = acquire_selector(&FixedPicker(None), &store).await.unwrap();
    assert!(cancelled.is_none());
    assert_eq!(
        store.get_all().await.unwrap().selector.as_deref(),
        Some("#price > span")
    );
}
