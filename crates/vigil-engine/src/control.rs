//! Control-surface operations: validating and persisting a new session,
//! stopping, status display, and storing a picked selector.

use crate::host::{HostError, PageContext, SelectorAcquisition};
use crate::store::{SessionStore, StoreError};
use thiserror::Error;
use tracing::info;
use vigil_common::session::{MonitorMode, MonitorSession, SessionPatch};

#[derive(Debug, Error)]
pub enum StartError {
    #[error("Please enter a CSS selector")]
    EmptySelector,
    #[error("Please enter text to search for")]
    MissingSearchText,
    #[error("Element not found with selector: {0}")]
    ElementNotFound(String),
    #[error("Host error: {0}")]
    Host(#[from] HostError),
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

/// Raw user input for a new session.
#[derive(Debug, Clone, Default)]
pub struct StartForm {
    pub selector: String,
    pub mode: MonitorMode,
    pub search_text: String,
    /// Seconds between reloads; `None` or zero uses the configured default.
    pub interval: Option<u64>,
}

/// Validate the form, snapshot the element's current text and persist an
/// active session for the page's URL. Nothing is written when any check fails.
pub async fn start_session(
    form: StartForm,
    page: &dyn PageContext,
    store: &dyn SessionStore,
    default_interval_secs: u64,
) -> Result<MonitorSession, StartError> {
    let selector = form.selector.trim().to_string();
    let search_text = form.search_text.trim().to_string();
    let interval = form
        .interval
        .filter(|i| *i > 0)
        .unwrap_or(default_interval_secs);

    if selector.is_empty() {
        return Err(StartError::EmptySelector);
    }
    if form.mode.requires_search_text() && search_text.is_empty() {
        return Err(StartError::MissingSearchText);
    }

    let Some(initial_content) = page.element_text(&selector).await? else {
        return Err(StartError::ElementNotFound(selector));
    };
    let url = page.url().await?;

    let session = MonitorSession::new(
        selector,
        form.mode,
        search_text,
        interval,
        initial_content,
        url,
    );
    store.set(session.to_patch()).await?;
    info!(
        "Session started on {} for \"{}\"",
        session.monitoring_url, session.selector
    );
    Ok(session)
}

pub async fn stop_session(store: &dyn SessionStore) -> Result<(), StoreError> {
    store.set(SessionPatch::stopped()).await
}

/// Run the element picker and store its selector. Cancelling writes nothing.
pub async fn acquire_selector(
    picker: &dyn SelectorAcquisition,
    store: &dyn SessionStore,
) -> Result<Option<String>, StartError> {
    let Some(selector) = picker.pick_element().await? else {
        return Ok(None);
    };
    record_selection(store, &selector).await?;
    Ok(Some(selector))
}

pub async fn record_selection(store: &dyn SessionStore, selector: &str) -> Result<(), StoreError> {
    store.set(SessionPatch::selector(selector)).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    ConditionMet,
    Active,
    Inactive,
}

impl SessionStatus {
    pub fn from_record(record: &SessionPatch) -> Self {
        if record.is_condition_met() {
            SessionStatus::ConditionMet
        } else if record.is_active() {
            SessionStatus::Active
        } else {
            SessionStatus::Inactive
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::ConditionMet => "Condition met! Monitoring stopped.",
            SessionStatus::Active => "Monitoring active...",
            SessionStatus::Inactive => "Not monitoring",
        }
    }
}
