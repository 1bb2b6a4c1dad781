//! Capabilities the monitoring core consumes from its host.
//!
//! A browser host implements these over its own APIs; tests implement them
//! with recording mocks.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
pub use vigil_common::protocol::TabId;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Host not ready")]
    NotReady,
    #[error("Not supported: {0}")]
    NotSupported(String),
    #[error("Navigation failed: {0}")]
    Navigation(String),
    #[error("Script failed: {0}")]
    Script(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Host error: {0}")]
    Other(String),
}

/// The page currently loaded in the monitored browsing context.
#[async_trait]
pub trait PageContext: Send + Sync {
    async fn url(&self) -> Result<String, HostError>;

    async fn title(&self) -> Result<String, HostError>;

    async fn body_text(&self) -> Result<String, HostError>;

    /// Rendered text of the first element matching `selector`, `None` when
    /// nothing matches.
    async fn element_text(&self, selector: &str) -> Result<Option<String>, HostError>;

    /// Hard navigation to the current URL.
    async fn reload(&self) -> Result<(), HostError>;

    async fn tab_id(&self) -> Option<TabId>;
}

/// Sound and on-page confirmation.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn play_alert(&self) -> Result<(), HostError>;

    async fn show_banner(&self, message: &str, duration: Duration) -> Result<(), HostError>;
}

/// Where a browsing-data clear applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataScope {
    Origin(String),
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataCategory {
    Cache,
    CacheStorage,
    Cookies,
    IndexedDb,
    LocalStorage,
    ServiceWorkers,
    WebSql,
}

/// Everything stored for the blocked origin.
pub const ORIGIN_CATEGORIES: &[DataCategory] = &[
    DataCategory::Cache,
    DataCategory::CacheStorage,
    DataCategory::Cookies,
    DataCategory::IndexedDb,
    DataCategory::LocalStorage,
    DataCategory::ServiceWorkers,
    DataCategory::WebSql,
];

/// Site data that can fingerprint across origins. Cookies are handled
/// separately by [`DataClearer::clear_cookies_all`].
pub const GLOBAL_CATEGORIES: &[DataCategory] = &[
    DataCategory::Cache,
    DataCategory::CacheStorage,
    DataCategory::IndexedDb,
    DataCategory::LocalStorage,
    DataCategory::ServiceWorkers,
];

/// A stored cookie as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
}

impl Cookie {
    /// URL the cookie must be removed through: scheme from `secure`, domain
    /// without its leading dot, then the cookie path.
    pub fn removal_url(&self) -> String {
        format!(
            "http{}://{}{}",
            if self.secure { "s" } else { "" },
            self.domain.trim_start_matches('.'),
            self.path
        )
    }
}

/// Privileged operations only the background context may perform.
#[async_trait]
pub trait DataClearer: Send + Sync {
    /// Delete every cookie of every domain, returning how many were removed.
    async fn clear_cookies_all(&self) -> Result<usize, HostError>;

    async fn clear_browsing_data(
        &self,
        scope: DataScope,
        categories: &[DataCategory],
    ) -> Result<(), HostError>;

    /// Run `script` inside the page of `tab`.
    async fn inject_script(&self, tab: &TabId, script: &str)
    -> Result<serde_json::Value, HostError>;

    /// Open `url` in a browsing context sharing no cookies or storage with
    /// the normal session.
    async fn open_isolated_context(&self, url: &str) -> Result<TabId, HostError>;

    async fn close_context(&self, tab: &TabId) -> Result<(), HostError>;

    async fn reload(&self, tab: &TabId, bypass_cache: bool) -> Result<(), HostError>;
}

/// Interactive element picking. `None` means the user cancelled.
#[async_trait]
pub trait SelectorAcquisition: Send + Sync {
    async fn pick_element(&self) -> Result<Option<String>, HostError>;
}
