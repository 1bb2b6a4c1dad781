//! The privileged background context: the receiving end of messages sent by
//! the monitored page and the element picker.

use crate::config::schema::RecoveryConfig;
use crate::control::record_selection;
use crate::host::{DataClearer, Notifier, TabId};
use crate::recovery::{RecoveryOutcome, RecoveryRequest, RecoverySequence};
use crate::store::{SessionStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use vigil_common::protocol::{Envelope, Message, TabIdResponse};
use vigil_common::session::origin_of;

#[derive(Debug, Error)]
pub enum BackgroundError {
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug)]
pub enum Reply {
    /// Notify-only message handled.
    Handled,
    TabId(TabIdResponse),
    /// Recovery is running for the sender's tab.
    Recovery(JoinHandle<RecoveryOutcome>),
    /// The message is addressed to the page context.
    Ignored,
}

pub struct Background {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    recovery: RecoverySequence,
}

impl Background {
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        clearer: Arc<dyn DataClearer>,
        config: &RecoveryConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            recovery: RecoverySequence::new(clearer, config),
        }
    }

    /// Route one message. `sender` is the tab it came from, when known.
    pub async fn handle(
        &self,
        message: Message,
        sender: Option<TabId>,
    ) -> Result<Reply, BackgroundError> {
        match message {
            Message::PlaySound => {
                if let Err(e) = self.notifier.play_alert().await {
                    error!("Error playing sound: {}", e);
                }
                Ok(Reply::Handled)
            }
            Message::ElementSelected { selector } => {
                record_selection(self.store.as_ref(), &selector).await?;
                info!("Selector saved: {}", selector);
                Ok(Reply::Handled)
            }
            Message::Clear403 { url } => {
                let request = RecoveryRequest {
                    origin: origin_of(&url).unwrap_or_else(|| url.clone()),
                    url,
                    tab: sender,
                };
                Ok(Reply::Recovery(self.recovery.spawn(request)))
            }
            Message::GetCurrentTabId => Ok(Reply::TabId(TabIdResponse { tab_id: sender })),
            Message::Start { .. } | Message::Stop => {
                debug!("Ignoring page-bound message");
                Ok(Reply::Ignored)
            }
        }
    }

    /// Handle a framed message and serialize the response when the sender
    /// waits for one. Recovery keeps running after this returns.
    pub async fn handle_envelope(
        &self,
        envelope: Envelope,
        sender: Option<TabId>,
    ) -> Result<Option<serde_json::Value>, BackgroundError> {
        let expects_response = envelope.expects_response;
        let reply = self.handle(envelope.message, sender).await?;
        if !expects_response {
            return Ok(None);
        }
        match reply {
            Reply::TabId(response) => Ok(Some(serde_json::to_value(response)?)),
            _ => Ok(Some(serde_json::Value::Null)),
        }
    }
}
