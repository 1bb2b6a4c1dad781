//! Monitor Controller: the evaluate/reload state machine of one page context.
//!
//! ```text
//! Idle ──page load / start──▶ Evaluating ──met──▶ ConditionSatisfied
//!   ▲                           │    ▲
//!   │ stop                 not met   │ timer fires: hard reload
//!   │                           ▼    │
//!   └─────────────────────────── Armed
//! page load on a blocked page ──▶ Recovering
//! ```
//!
//! At most one reload timer is outstanding. Every timer carries a generation
//! number and fires by sending it over a channel; fires from a cancelled
//! generation are dropped.

use crate::config::schema::MonitorConfig;
use crate::host::{HostError, Notifier, PageContext};
use crate::recovery::{RecoveryCheck, RecoveryHandler, RecoveryOutcome};
use crate::store::{SessionStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use vigil_common::condition::{evaluate_session, preview};
use vigil_common::error::SessionError;
use vigil_common::protocol::Message;
use vigil_common::session::{MonitorMode, MonitorSession, SessionPatch};

pub const CONDITION_MET_BANNER: &str = "Condition Met!";

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
    #[error("Invalid session: {0}")]
    Session(#[from] SessionError),
    #[error("Element not found with selector: {0}")]
    ElementNotFound(String),
    #[error("Host error: {0}")]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    /// A reload timer is pending.
    Armed,
    Evaluating,
    ConditionSatisfied,
    /// The page is blocked; the loop waits for recovery to finish.
    Recovering,
}

struct ReloadTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct MonitorController {
    store: Arc<dyn SessionStore>,
    page: Arc<dyn PageContext>,
    notifier: Arc<dyn Notifier>,
    recovery: Option<RecoveryHandler>,
    config: MonitorConfig,
    state: MonitorState,
    session: Option<MonitorSession>,
    timer: Option<ReloadTimer>,
    generation: u64,
    fired_tx: mpsc::UnboundedSender<u64>,
    fired_rx: mpsc::UnboundedReceiver<u64>,
    recovery_task: Option<JoinHandle<RecoveryOutcome>>,
}

impl MonitorController {
    pub fn new(
        store: Arc<dyn SessionStore>,
        page: Arc<dyn PageContext>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        Self {
            store,
            page,
            notifier,
            recovery: None,
            config: MonitorConfig::default(),
            state: MonitorState::Idle,
            session: None,
            timer: None,
            generation: 0,
            fired_tx,
            fired_rx,
            recovery_task: None,
        }
    }

    pub fn with_recovery(mut self, recovery: RecoveryHandler) -> Self {
        self.recovery = Some(recovery);
        self
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn session(&self) -> Option<&MonitorSession> {
        self.session.as_ref()
    }

    pub fn has_pending_timer(&self) -> bool {
        self.timer.is_some()
    }

    /// Resume monitoring after a page load if the stored session applies to
    /// this page. A blocked page enters `Recovering` instead of evaluating.
    pub async fn on_page_load(&mut self) -> Result<MonitorState, ControllerError> {
        self.cancel_timer();

        let record = self.store.get_all().await?;
        let Some(session) =
            MonitorSession::from_patch(&record, self.config.default_interval_secs)
        else {
            self.session = None;
            self.state = MonitorState::Idle;
            return Ok(self.state);
        };

        let url = self.page.url().await?;
        if !session.should_resume_on(&url) {
            debug!("Page {} is not monitored", url);
            self.session = Some(session);
            self.state = MonitorState::Idle;
            return Ok(self.state);
        }

        if let Some(recovery) = &self.recovery {
            match recovery
                .check(self.page.as_ref(), self.notifier.as_ref())
                .await
            {
                Ok(RecoveryCheck::Blocked(task)) => {
                    self.recovery_task = Some(task);
                    self.session = Some(session);
                    self.state = MonitorState::Recovering;
                    return Ok(self.state);
                }
                Ok(RecoveryCheck::Clear) => {}
                Err(e) => warn!("Blocked-page check failed: {}", e),
            }
        }

        self.begin(session).await
    }

    /// Overwrite the stored session with `session` and check it right away.
    /// Nothing is written when the session is invalid or its element is absent.
    pub async fn start(
        &mut self,
        session: MonitorSession,
    ) -> Result<MonitorState, ControllerError> {
        session.validate()?;
        if self.page.element_text(&session.selector).await?.is_none() {
            return Err(ControllerError::ElementNotFound(session.selector));
        }
        self.cancel_timer();
        self.store.set(session.to_patch()).await?;
        self.begin(session).await
    }

    /// Cancel any pending reload and mark the session inactive. Safe to call
    /// when nothing is running.
    pub async fn stop(&mut self) -> Result<(), ControllerError> {
        self.cancel_timer();
        self.store
            .set(SessionPatch {
                is_active: Some(false),
                ..Default::default()
            })
            .await?;
        if let Some(session) = &mut self.session {
            session.is_active = false;
        }
        self.state = MonitorState::Idle;
        info!("Monitoring stopped");
        Ok(())
    }

    /// Handle a message addressed to the page context. Returns `None` for
    /// messages the page does not act on.
    pub async fn handle_message(
        &mut self,
        message: Message,
    ) -> Result<Option<MonitorState>, ControllerError> {
        match message {
            Message::Start {
                selector,
                mode,
                search_text,
                interval,
                initial_content,
            } => {
                let initial_content = match initial_content {
                    Some(content) => content,
                    None if mode == MonitorMode::Change => {
                        return Err(SessionError::MissingInitialContent.into());
                    }
                    None => String::new(),
                };
                let url = self.page.url().await?;
                let session = MonitorSession::new(
                    selector,
                    mode,
                    search_text,
                    interval,
                    initial_content,
                    url,
                );
                self.start(session).await.map(Some)
            }
            Message::Stop => {
                self.stop().await?;
                Ok(Some(self.state))
            }
            _ => Ok(None),
        }
    }

    /// Wait for the pending reload timer. `None` when nothing is armed.
    pub async fn next_fire(&mut self) -> Option<u64> {
        loop {
            let current = self.timer.as_ref()?.generation;
            let fired = self.fired_rx.recv().await?;
            if fired == current {
                return Some(fired);
            }
            debug!("Dropping stale reload timer {}", fired);
        }
    }

    /// The armed timer fired: hard-reload the page, then evaluate it as a
    /// fresh load.
    pub async fn tick(&mut self) -> Result<MonitorState, ControllerError> {
        self.timer = None;
        self.state = MonitorState::Evaluating;
        if let Err(e) = self.page.reload().await {
            warn!("Reload failed: {}", e);
        }
        self.on_page_load().await
    }

    /// Wait for a running recovery sequence to finish.
    pub async fn await_recovery(&mut self) -> Option<RecoveryOutcome> {
        let task = self.recovery_task.take()?;
        match task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Recovery task failed: {}", e);
                None
            }
        }
    }

    /// Drive the loop until monitoring ends. Returns the final state:
    /// `ConditionSatisfied`, `Idle`, or `Recovering` when recovery left no
    /// page to resume on.
    pub async fn run(&mut self) -> Result<MonitorState, ControllerError> {
        loop {
            match self.state {
                MonitorState::Armed => {
                    if self.next_fire().await.is_some() {
                        self.tick().await?;
                    } else {
                        self.state = MonitorState::Idle;
                    }
                }
                MonitorState::Recovering => match self.await_recovery().await {
                    Some(RecoveryOutcome::ClearedOnly { .. }) | None => return Ok(self.state),
                    Some(outcome) => {
                        info!("Recovery finished: {:?}", outcome);
                        self.on_page_load().await?;
                    }
                },
                MonitorState::Idle
                | MonitorState::Evaluating
                | MonitorState::ConditionSatisfied => return Ok(self.state),
            }
        }
    }

    async fn begin(&mut self, session: MonitorSession) -> Result<MonitorState, ControllerError> {
        self.cancel_timer();
        self.state = MonitorState::Evaluating;

        let met = self.check_condition(&session).await;
        let interval = session.interval_secs;
        let selector = session.selector.clone();
        let mode = session.mode;
        self.session = Some(session);

        if met {
            self.condition_met().await?;
        } else {
            self.arm(Duration::from_secs(interval));
            info!(
                "Monitoring \"{}\" (mode: {}), refreshing in {}s",
                selector, mode, interval
            );
        }
        Ok(self.state)
    }

    async fn check_condition(&self, session: &MonitorSession) -> bool {
        let content = match self.page.element_text(&session.selector).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!("Element not found: {}", session.selector);
                return false;
            }
            Err(e) => {
                warn!("Could not read element {}: {}", session.selector, e);
                return false;
            }
        };

        let met = evaluate_session(&content, session);
        match session.mode {
            MonitorMode::Change => {
                debug!("Checking for change: {}", if met { "CHANGED!" } else { "no change" });
                if met {
                    debug!("Initial: \"{}...\"", preview(&session.initial_content, 100));
                    debug!("Current: \"{}...\"", preview(&content, 100));
                }
            }
            MonitorMode::Contains => debug!(
                "Checking for \"{}\": {}",
                session.search_text,
                if met { "FOUND!" } else { "not found" }
            ),
            MonitorMode::NotContains => debug!(
                "Checking \"{}\" disappeared: {}",
                session.search_text,
                if met { "GONE!" } else { "still there" }
            ),
        }
        met
    }

    async fn condition_met(&mut self) -> Result<(), ControllerError> {
        self.cancel_timer();
        self.store.set(SessionPatch::condition_met()).await?;
        if let Some(session) = &mut self.session {
            session.is_active = false;
            session.condition_met = true;
        }
        self.state = MonitorState::ConditionSatisfied;

        if let Err(e) = self.notifier.play_alert().await {
            error!("Error playing sound: {}", e);
        }
        if let Err(e) = self
            .notifier
            .show_banner(CONDITION_MET_BANNER, self.config.banner_duration())
            .await
        {
            warn!("Could not show banner: {}", e);
        }
        info!("Condition met! Stopped monitoring.");
        Ok(())
    }

    fn arm(&mut self, interval: Duration) {
        self.cancel_timer();
        self.generation += 1;
        let generation = self.generation;
        let fired_tx = self.fired_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = fired_tx.send(generation);
        });
        self.timer = Some(ReloadTimer { generation, handle });
        self.state = MonitorState::Armed;
    }

    fn cancel_timer(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for MonitorController {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
