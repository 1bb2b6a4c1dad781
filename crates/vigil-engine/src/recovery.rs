//! Blocked-page detection and the clear-and-reopen recovery sequence.
//!
//! Detection runs once per page load on the monitored page, before the
//! reload loop. The sequence itself runs detached from the controller: once
//! started it finishes, or falls back to a cache-bypassing reload.

use crate::config::schema::RecoveryConfig;
use crate::host::{
    DataClearer, DataScope, GLOBAL_CATEGORIES, HostError, Notifier, ORIGIN_CATEGORIES,
    PageContext, TabId,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tracing::{error, info, warn};
use vigil_common::session::origin_of;

/// Page text that marks a blocked response.
pub const DEFAULT_SIGNALS: &[&str] = &["403", "forbidden", "403 forbidden", "access denied"];

pub const BLOCKED_BANNER: &str = "403 Forbidden Detected. Opening in incognito window in 10s...";

/// Clears localStorage, sessionStorage, IndexedDB databases and service
/// worker registrations from inside the page.
pub const CLEAR_CLIENT_STORAGE_JS: &str = r#"(() => {
  try {
    localStorage.clear();
    sessionStorage.clear();
    if (indexedDB && indexedDB.databases) {
      indexedDB.databases().then(dbs => dbs.forEach(db => indexedDB.deleteDatabase(db.name)));
    }
    if (navigator.serviceWorker) {
      navigator.serviceWorker.getRegistrations().then(regs => regs.forEach(r => r.unregister()));
    }
    return true;
  } catch (e) {
    return false;
  }
})()"#;

/// True when the title or body, case-folded, contains any default signal.
pub fn detect(title: &str, body: &str) -> bool {
    detect_with(DEFAULT_SIGNALS, title, body)
}

pub fn detect_with<S: AsRef<str>>(signals: &[S], title: &str, body: &str) -> bool {
    let title = title.to_lowercase();
    let body = body.to_lowercase();
    signals.iter().any(|signal| {
        let signal = signal.as_ref().to_lowercase();
        title.contains(&signal) || body.contains(&signal)
    })
}

/// What a blocked page asks the privileged context to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryRequest {
    /// Scope of the origin-bound data clear.
    pub origin: String,
    /// Page reopened in the isolated context.
    pub url: String,
    pub tab: Option<TabId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Data cleared and the page reopened in an isolated context.
    Reopened {
        cookies_cleared: usize,
        context: TabId,
    },
    /// Data cleared but the isolated context could not be created.
    ReloadedAfterOpenFailure { cookies_cleared: usize },
    /// A clearing step failed; the tab was reloaded after the short delay.
    ReloadedAfterError,
    /// No tab to reopen or reload; only the data clear ran.
    ClearedOnly { cookies_cleared: Option<usize> },
}

/// The privileged half of recovery, run against a [`DataClearer`].
#[derive(Clone)]
pub struct RecoverySequence {
    clearer: Arc<dyn DataClearer>,
    reopen_delay: Duration,
    fallback_delay: Duration,
}

impl RecoverySequence {
    pub fn new(clearer: Arc<dyn DataClearer>, config: &RecoveryConfig) -> Self {
        Self {
            clearer,
            reopen_delay: config.reopen_delay(),
            fallback_delay: config.fallback_delay(),
        }
    }

    /// Steps run strictly in order: all cookies, origin data, global data,
    /// in-page storage, then the delayed reopen.
    pub async fn run(&self, request: RecoveryRequest) -> RecoveryOutcome {
        let reopen_at = Instant::now() + self.reopen_delay;
        info!("Handling blocked page for: {}", request.origin);

        let cookies_cleared = match self.clear_data(&request).await {
            Ok(count) => count,
            Err(e) => {
                error!("Error clearing data: {}", e);
                let Some(tab) = &request.tab else {
                    return RecoveryOutcome::ClearedOnly {
                        cookies_cleared: None,
                    };
                };
                sleep(self.fallback_delay).await;
                self.reload_bypassing_cache(tab).await;
                return RecoveryOutcome::ReloadedAfterError;
            }
        };

        let Some(tab) = &request.tab else {
            return RecoveryOutcome::ClearedOnly {
                cookies_cleared: Some(cookies_cleared),
            };
        };

        sleep_until(reopen_at).await;
        match self.clearer.open_isolated_context(&request.url).await {
            Ok(context) => {
                info!("Reopened {} in isolated context {}", request.url, context);
                if let Err(e) = self.clearer.close_context(tab).await {
                    warn!("Could not close blocked tab {}: {}", tab, e);
                }
                RecoveryOutcome::Reopened {
                    cookies_cleared,
                    context,
                }
            }
            Err(e) => {
                warn!("Could not open isolated context, reloading: {}", e);
                self.reload_bypassing_cache(tab).await;
                RecoveryOutcome::ReloadedAfterOpenFailure { cookies_cleared }
            }
        }
    }

    /// Run the sequence detached from the caller.
    pub fn spawn(&self, request: RecoveryRequest) -> JoinHandle<RecoveryOutcome> {
        let sequence = self.clone();
        tokio::spawn(async move { sequence.run(request).await })
    }

    async fn clear_data(&self, request: &RecoveryRequest) -> Result<usize, HostError> {
        // All domains: tracking cookies may live outside the blocked origin.
        let count = self.clearer.clear_cookies_all().await?;
        info!("Cleared {} cookies", count);

        self.clearer
            .clear_browsing_data(DataScope::Origin(request.origin.clone()), ORIGIN_CATEGORIES)
            .await?;
        self.clearer
            .clear_browsing_data(DataScope::Global, GLOBAL_CATEGORIES)
            .await?;
        info!("Cleared all browsing data");

        if let Some(tab) = &request.tab {
            match self.clearer.inject_script(tab, CLEAR_CLIENT_STORAGE_JS).await {
                Ok(_) => info!("Cleared client-side storage"),
                Err(e) => warn!("Script injection failed: {}", e),
            }
        }

        Ok(count)
    }

    async fn reload_bypassing_cache(&self, tab: &TabId) {
        if let Err(e) = self.clearer.reload(tab, true).await {
            error!("Fallback reload of {} failed: {}", tab, e);
        }
    }
}

/// Result of the per-load blocked-page check.
pub enum RecoveryCheck {
    Clear,
    Blocked(JoinHandle<RecoveryOutcome>),
}

impl RecoveryCheck {
    pub fn is_blocked(&self) -> bool {
        matches!(self, RecoveryCheck::Blocked(_))
    }
}

/// Page-side half of recovery: detect, warn, hand off to the sequence.
#[derive(Clone)]
pub struct RecoveryHandler {
    signals: Vec<String>,
    sequence: RecoverySequence,
    banner_duration: Duration,
}

impl RecoveryHandler {
    pub fn new(clearer: Arc<dyn DataClearer>, config: &RecoveryConfig) -> Self {
        Self {
            signals: config.signals.clone(),
            sequence: RecoverySequence::new(clearer, config),
            banner_duration: config.reopen_delay(),
        }
    }

    pub fn detect(&self, title: &str, body: &str) -> bool {
        detect_with(self.signals.as_slice(), title, body)
    }

    pub async fn check(
        &self,
        page: &dyn PageContext,
        notifier: &dyn Notifier,
    ) -> Result<RecoveryCheck, HostError> {
        let title = page.title().await?;
        let body = page.body_text().await?;
        if !self.detect(&title, &body) {
            return Ok(RecoveryCheck::Clear);
        }

        let url = page.url().await?;
        warn!("403 Forbidden detected on {}. Clearing cookies and cache...", url);
        if let Err(e) = notifier
            .show_banner(BLOCKED_BANNER, self.banner_duration)
            .await
        {
            warn!("Could not show blocked-page banner: {}", e);
        }

        let request = RecoveryRequest {
            origin: origin_of(&url).unwrap_or_else(|| url.clone()),
            url,
            tab: page.tab_id().await,
        };
        Ok(RecoveryCheck::Blocked(self.sequence.spawn(request)))
    }
}
