use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vigil_engine::host::HostError;

/// Overrides the browser profile directory; it is kept after shutdown.
pub const USER_DATA_DIR_ENV: &str = "VIGIL_USER_DATA_DIR";
pub const CHROME_BIN_ENV: &str = "CHROME_BIN";

/// Reloads keep running while the monitored tab is in the background.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
];

struct Profile {
    dir: PathBuf,
    temporary: bool,
}

impl Profile {
    fn resolve() -> Result<Self, HostError> {
        let (dir, temporary) = match std::env::var(USER_DATA_DIR_ENV) {
            Ok(dir) => (PathBuf::from(dir), false),
            Err(_) => {
                let nanos = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| HostError::Other(format!("System clock error: {}", e)))?
                    .as_nanos();
                let name = format!("vigil-profile-{}-{}", std::process::id(), nanos);
                (std::env::temp_dir().join(name), true)
            }
        };
        std::fs::create_dir_all(&dir)
            .map_err(|e| HostError::Other(format!("Cannot create {}: {}", dir.display(), e)))?;
        info!("Browser profile: {}", dir.display());
        Ok(Self { dir, temporary })
    }

    fn remove(&self) {
        if !self.temporary {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            debug!("Could not remove profile {}: {}", self.dir.display(), e);
        }
    }
}

/// A launched Chromium, its CDP pump and the isolated contexts opened for
/// blocked-page recovery.
pub struct CdpClient {
    browser: Browser,
    pump: JoinHandle<()>,
    profile: Profile,
    contexts: Mutex<Vec<BrowserContextId>>,
}

impl CdpClient {
    /// Launch the browser and open the tab the session will monitor.
    pub async fn launch(visible: bool) -> Result<(Self, Page), HostError> {
        let profile = Profile::resolve()?;
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(&profile.dir)
            .args(LAUNCH_ARGS.iter().copied());
        if visible {
            builder = builder.with_head();
        }
        if let Ok(bin) = std::env::var(CHROME_BIN_ENV) {
            info!("Using Chrome binary: {}", bin);
            builder = builder.chrome_executable(bin);
        }
        let config = builder
            .build()
            .map_err(|e| HostError::Other(format!("Invalid browser config: {}", e)))?;

        let (browser, mut handler) = match Browser::launch(config).await {
            Ok(launched) => launched,
            Err(e) => {
                profile.remove();
                return Err(HostError::Other(format!("Failed to launch browser: {}", e)));
            }
        };
        let pump = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    error!("CDP handler error: {}", e);
                }
            }
            debug!("CDP handler finished");
        });
        info!(
            "Chromium running ({})",
            if visible { "visible" } else { "headless" }
        );

        let client = Self {
            browser,
            pump,
            profile,
            contexts: Mutex::new(Vec::new()),
        };
        let page = client
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| HostError::Other(format!("Failed to create page: {}", e)))?;
        Ok((client, page))
    }

    /// Open `url` in a fresh browser context that shares no cookies or
    /// storage with the default profile.
    pub async fn open_isolated(&self, url: &str) -> Result<Page, HostError> {
        let context = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| HostError::Other(format!("Cannot create browser context: {}", e)))?
            .result
            .browser_context_id;
        self.contexts.lock().await.push(context.clone());

        let mut target = CreateTargetParams::new(url);
        target.browser_context_id = Some(context);
        self.browser
            .new_page(target)
            .await
            .map_err(|e| HostError::Navigation(format!("Cannot open {}: {}", url, e)))
    }

    pub async fn close(mut self) -> Result<(), HostError> {
        for context in self.contexts.lock().await.drain(..) {
            if let Err(e) = self
                .browser
                .execute(DisposeBrowserContextParams::new(context))
                .await
            {
                warn!("Could not dispose browser context: {}", e);
            }
        }

        let closed = self.browser.close().await;
        if let Err(e) = (&mut self.pump).await {
            debug!("CDP handler task ended abnormally: {}", e);
        }
        self.profile.remove();
        closed.map_err(|e| HostError::Other(format!("Error closing browser: {}", e)))?;
        Ok(())
    }
}
