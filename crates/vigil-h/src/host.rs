use crate::cdp::CdpClient;
use crate::inject::{
    BODY_TEXT_SCRIPT, banner_script, element_text_script, evaluate, parse_element_text,
};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::network::{
    ClearBrowserCacheParams, DeleteCookiesParams, GetAllCookiesParams,
};
use chromiumoxide::cdp::browser_protocol::page::ReloadParams;
use chromiumoxide::cdp::browser_protocol::storage::ClearDataForOriginParams;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use vigil_engine::host::{
    Cookie, DataCategory, DataClearer, DataScope, HostError, Notifier, PageContext, TabId,
};
use vigil_engine::session::origin_of;

struct Tabs {
    active: Option<TabId>,
    pages: HashMap<TabId, Page>,
}

/// Chromium driven over CDP, acting as page, notifier and privileged
/// background context at once.
///
/// The monitored page is the *active* tab. Opening an isolated context makes
/// the new tab active, so a controller bound to this host follows recovery
/// into the fresh context.
pub struct ChromiumHost {
    client: Option<CdpClient>,
    tabs: RwLock<Tabs>,
    next_tab: AtomicU64,
    visible: bool,
}

impl ChromiumHost {
    pub fn new(visible: bool) -> Self {
        Self {
            client: None,
            tabs: RwLock::new(Tabs {
                active: None,
                pages: HashMap::new(),
            }),
            next_tab: AtomicU64::new(1),
            visible,
        }
    }

    pub async fn launch(&mut self) -> Result<(), HostError> {
        info!("Launching Chromium host...");
        let (client, page) = CdpClient::launch(self.visible).await?;
        self.client = Some(client);
        self.register(page, true).await;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), HostError> {
        self.tabs.write().await.pages.clear();
        if let Some(client) = self.client.take() {
            client.close().await?;
        }
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    /// Navigate the active tab to `url`.
    pub async fn navigate(&self, url: &str) -> Result<String, HostError> {
        let page = self.active_page().await?;
        info!("Navigating to: {}", url);
        page.goto(url)
            .await
            .map_err(|e| HostError::Navigation(e.to_string()))?;
        self.url().await
    }

    fn client(&self) -> Result<&CdpClient, HostError> {
        self.client.as_ref().ok_or(HostError::NotReady)
    }

    async fn register(&self, page: Page, activate: bool) -> TabId {
        let id = TabId::new(format!(
            "tab-{}",
            self.next_tab.fetch_add(1, Ordering::SeqCst)
        ));
        let mut tabs = self.tabs.write().await;
        tabs.pages.insert(id.clone(), page);
        if activate {
            tabs.active = Some(id.clone());
        }
        id
    }

    async fn active_page(&self) -> Result<Page, HostError> {
        let tabs = self.tabs.read().await;
        tabs.active
            .as_ref()
            .and_then(|id| tabs.pages.get(id))
            .cloned()
            .ok_or(HostError::NotReady)
    }

    async fn page(&self, tab: &TabId) -> Result<Page, HostError> {
        self.tabs
            .read()
            .await
            .pages
            .get(tab)
            .cloned()
            .ok_or_else(|| HostError::Other(format!("Unknown tab: {}", tab)))
    }

    /// Origins of every tab this host has open. CDP has no storage clear
    /// across all origins, so this is the reach of a global clear.
    async fn open_origins(&self) -> Vec<String> {
        let pages: Vec<Page> = self.tabs.read().await.pages.values().cloned().collect();
        let mut origins = Vec::new();
        for page in pages {
            if let Ok(Some(url)) = page.url().await {
                if let Some(origin) = origin_of(&url) {
                    if !origins.contains(&origin) {
                        origins.push(origin);
                    }
                }
            }
        }
        origins
    }

    async fn clear_origin(
        &self,
        page: &Page,
        origin: &str,
        categories: &[DataCategory],
    ) -> Result<(), HostError> {
        let Some(types) = storage_types(categories) else {
            return Ok(());
        };
        debug!("Clearing {} for {}", types, origin);
        page.execute(ClearDataForOriginParams::new(origin, types))
            .await
            .map_err(cdp_error)?;
        Ok(())
    }
}

fn cdp_error(e: chromiumoxide::error::CdpError) -> HostError {
    HostError::Other(e.to_string())
}

/// CDP `Storage.clearDataForOrigin` type list for `categories`. The HTTP
/// cache has no per-origin form and is cleared separately.
fn storage_types(categories: &[DataCategory]) -> Option<String> {
    let types: Vec<&str> = categories
        .iter()
        .filter_map(|c| match c {
            DataCategory::Cache => None,
            DataCategory::CacheStorage => Some("cache_storage"),
            DataCategory::Cookies => Some("cookies"),
            DataCategory::IndexedDb => Some("indexeddb"),
            DataCategory::LocalStorage => Some("local_storage"),
            DataCategory::ServiceWorkers => Some("service_workers"),
            DataCategory::WebSql => Some("websql"),
        })
        .collect();
    if types.is_empty() {
        None
    } else {
        Some(types.join(","))
    }
}

#[async_trait]
impl PageContext for ChromiumHost {
    async fn url(&self) -> Result<String, HostError> {
        let page = self.active_page().await?;
        Ok(page
            .url()
            .await
            .map_err(|e| HostError::Navigation(e.to_string()))?
            .unwrap_or_default())
    }

    async fn title(&self) -> Result<String, HostError> {
        let page = self.active_page().await?;
        Ok(page.get_title().await.map_err(cdp_error)?.unwrap_or_default())
    }

    async fn body_text(&self) -> Result<String, HostError> {
        let page = self.active_page().await?;
        let value = evaluate(&page, BODY_TEXT_SCRIPT).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn element_text(&self, selector: &str) -> Result<Option<String>, HostError> {
        let page = self.active_page().await?;
        let value = evaluate(&page, &element_text_script(selector)?).await?;
        Ok(parse_element_text(&value))
    }

    async fn reload(&self) -> Result<(), HostError> {
        let page = self.active_page().await?;
        page.reload()
            .await
            .map_err(|e| HostError::Navigation(format!("reload failed: {}", e)))?;
        Ok(())
    }

    async fn tab_id(&self) -> Option<TabId> {
        self.tabs.read().await.active.clone()
    }
}

#[async_trait]
impl Notifier for ChromiumHost {
    async fn play_alert(&self) -> Result<(), HostError> {
        info!("Playing alert");
        let mut stderr = std::io::stderr();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(|e| HostError::Other(e.to_string()))
    }

    async fn show_banner(&self, message: &str, duration: Duration) -> Result<(), HostError> {
        let page = self.active_page().await?;
        evaluate(&page, &banner_script(message, duration)?).await?;
        Ok(())
    }
}

#[async_trait]
impl DataClearer for ChromiumHost {
    async fn clear_cookies_all(&self) -> Result<usize, HostError> {
        let page = self.active_page().await?;
        let cookies = page
            .execute(GetAllCookiesParams::default())
            .await
            .map_err(cdp_error)?
            .result
            .cookies;

        let count = cookies.len();
        for c in cookies {
            let cookie = Cookie {
                name: c.name,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
            };
            let mut params = DeleteCookiesParams::new(cookie.name.clone());
            params.url = Some(cookie.removal_url());
            page.execute(params).await.map_err(cdp_error)?;
        }
        Ok(count)
    }

    async fn clear_browsing_data(
        &self,
        scope: DataScope,
        categories: &[DataCategory],
    ) -> Result<(), HostError> {
        let page = self.active_page().await?;
        if categories.contains(&DataCategory::Cache) {
            page.execute(ClearBrowserCacheParams::default())
                .await
                .map_err(cdp_error)?;
        }

        match scope {
            DataScope::Origin(origin) => self.clear_origin(&page, &origin, categories).await,
            DataScope::Global => {
                let origins = self.open_origins().await;
                debug!(
                    "Global clear limited to {} open origin(s): {:?}",
                    origins.len(),
                    origins
                );
                for origin in origins {
                    self.clear_origin(&page, &origin, categories).await?;
                }
                Ok(())
            }
        }
    }

    async fn inject_script(
        &self,
        tab: &TabId,
        script: &str,
    ) -> Result<serde_json::Value, HostError> {
        let page = self.page(tab).await?;
        evaluate(&page, script).await
    }

    async fn open_isolated_context(&self, url: &str) -> Result<TabId, HostError> {
        let page = self.client()?.open_isolated(url).await?;
        Ok(self.register(page, true).await)
    }

    async fn close_context(&self, tab: &TabId) -> Result<(), HostError> {
        let page = {
            let mut tabs = self.tabs.write().await;
            if tabs.active.as_ref() == Some(tab) {
                tabs.active = None;
            }
            tabs.pages.remove(tab)
        };
        match page {
            Some(page) => page.close().await.map_err(cdp_error),
            None => {
                warn!("Tab {} already closed", tab);
                Ok(())
            }
        }
    }

    async fn reload(&self, tab: &TabId, bypass_cache: bool) -> Result<(), HostError> {
        let page = self.page(tab).await?;
        page.execute(ReloadParams {
            ignore_cache: Some(bypass_cache),
            ..Default::default()
        })
        .await
        .map_err(cdp_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_types_skip_http_cache() {
        assert_eq!(storage_types(&[DataCategory::Cache]), None);
        assert_eq!(
            storage_types(&[
                DataCategory::Cache,
                DataCategory::Cookies,
                DataCategory::LocalStorage
            ])
            .as_deref(),
            Some("cookies,local_storage")
        );
    }
}
