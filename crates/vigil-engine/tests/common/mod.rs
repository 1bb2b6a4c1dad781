#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use vigil_engine::host::{
    DataCategory, DataClearer, DataScope, HostError, Notifier, PageContext, TabId,
};

pub const ITEM_URL: &str = "https://shop.example.com/item/42?ref=mail";

pub struct PageState {
    pub url: String,
    pub title: String,
    pub body: String,
    pub element: Option<String>,
    pub after_reload: VecDeque<Option<String>>,
    pub reloads: usize,
    pub tab: Option<TabId>,
}

/// Page whose element text can change on each reload.
pub struct MockPage {
    pub state: Mutex<PageState>,
}

impl MockPage {
    pub fn new(url: &str, element: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PageState {
                url: url.to_string(),
                title: "Item 42".to_string(),
                body: "Item 42 details".to_string(),
                element: element.map(String::from),
                after_reload: VecDeque::new(),
                reloads: 0,
                tab: Some(TabId::new("tab-1")),
            }),
        })
    }

    pub fn blocked(url: &str) -> Arc<Self> {
        let page = Self::new(url, Some("In Stock"));
        page.state.lock().unwrap().title = "403 Forbidden".to_string();
        page
    }

    pub fn on_reload(&self, element: Option<&str>) {
        self.state
            .lock()
            .unwrap()
            .after_reload
            .push_back(element.map(String::from));
    }

    pub fn set_url(&self, url: &str) {
        self.state.lock().unwrap().url = url.to_string();
    }

    pub fn set_title(&self, title: &str) {
        self.state.lock().unwrap().title = title.to_string();
    }

    pub fn reloads(&self) -> usize {
        self.state.lock().unwrap().reloads
    }
}

#[async_trait]
impl PageContext for MockPage {
    async fn url(&self) -> Result<String, HostError> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn title(&self) -> Result<String, HostError> {
        Ok(self.state.lock().unwrap().title.clone())
    }

    async fn body_text(&self) -> Result<String, HostError> {
        Ok(self.state.lock().unwrap().body.clone())
    }

    async fn element_text(&self, _selector: &str) -> Result<Option<String>, HostError> {
        Ok(self.state.lock().unwrap().element.clone())
    }

    async fn reload(&self) -> Result<(), HostError> {
        let mut state = self.state.lock().unwrap();
        state.reloads += 1;
        if let Some(next) = state.after_reload.pop_front() {
            state.element = next;
        }
        Ok(())
    }

    async fn tab_id(&self) -> Option<TabId> {
        self.state.lock().unwrap().tab.clone()
    }
}

#[derive(Default)]
pub struct MockNotifier {
    pub events: Mutex<Vec<String>>,
}

impl MockNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn play_alert(&self) -> Result<(), HostError> {
        self.events.lock().unwrap().push("alert".to_string());
        Ok(())
    }

    async fn show_banner(&self, message: &str, _duration: Duration) -> Result<(), HostError> {
        self.events
            .lock()
            .unwrap()
            .push(format!("banner: {}", message));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearerCall {
    ClearCookies,
    ClearBrowsingData(DataScope, Vec<DataCategory>),
    InjectScript(TabId),
    OpenIsolated(String),
    CloseContext(TabId),
    Reload(TabId, bool),
}

/// Records every privileged call with the (paused) time it happened at.
pub struct MockClearer {
    pub calls: Mutex<Vec<(Instant, ClearerCall)>>,
    pub cookie_count: usize,
    pub fail_cookies: bool,
    pub fail_inject: bool,
    pub fail_open: bool,
}

impl Default for MockClearer {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            cookie_count: 12,
            fail_cookies: false,
            fail_inject: false,
            fail_open: false,
        }
    }
}

impl MockClearer {
    pub fn calls(&self) -> Vec<ClearerCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    pub fn time_of(&self, pred: impl Fn(&ClearerCall) -> bool) -> Option<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(_, call)| pred(call))
            .map(|(at, _)| *at)
    }

    fn record(&self, call: ClearerCall) {
        self.calls.lock().unwrap().push((Instant::now(), call));
    }
}

#[async_trait]
impl DataClearer for MockClearer {
    async fn clear_cookies_all(&self) -> Result<usize, HostError> {
        self.record(ClearerCall::ClearCookies);
        if self.fail_cookies {
            return Err(HostError::Other("cookie store unavailable".into()));
        }
        Ok(self.cookie_count)
    }

    async fn clear_browsing_data(
        &self,
        scope: DataScope,
        categories: &[DataCategory],
    ) -> Result<(), HostError> {
        self.record(ClearerCall::ClearBrowsingData(scope, categories.to_vec()));
        Ok(())
    }

    async fn inject_script(
        &self,
        tab: &TabId,
        _script: &str,
    ) -> Result<serde_json::Value, HostError> {
        self.record(ClearerCall::InjectScript(tab.clone()));
        if self.fail_inject {
            return Err(HostError::Script("cannot access page".into()));
        }
        Ok(serde_json::Value::Bool(true))
    }

    async fn open_isolated_context(&self, url: &str) -> Result<TabId, HostError> {
        self.record(ClearerCall::OpenIsolated(url.to_string()));
        if self.fail_open {
            return Err(HostError::NotSupported("incognito".into()));
        }
        Ok(TabId::new("incognito-1"))
    }

    async fn close_context(&self, tab: &TabId) -> Result<(), HostError> {
        self.record(ClearerCall::CloseContext(tab.clone()));
        Ok(())
    }

    async fn reload(&self, tab: &TabId, bypass_cache: bool) -> Result<(), HostError> {
        self.record(ClearerCall::Reload(tab.clone(), bypass_cache));
        Ok(())
    }
}
