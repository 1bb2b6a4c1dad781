//! Messages exchanged between the control surface, the monitored page and
//! the privileged background context.
//!
//! Sends are notify-only unless [`Message::expects_response`] says otherwise.

use crate::session::MonitorMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a browsing context (tab/page) owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl TabId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Control surface → page: begin monitoring with this configuration.
    #[serde(rename_all = "camelCase")]
    Start {
        selector: String,
        mode: MonitorMode,
        #[serde(default)]
        search_text: String,
        interval: u64,
        /// Element text at start. Required in `change` mode.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_content: Option<String>,
    },
    /// Control surface → page: stop monitoring.
    Stop,
    /// Page → background: play the alert sound.
    PlaySound,
    /// Picker → background: persist the picked selector.
    ElementSelected { selector: String },
    /// Page → background: run blocked-page recovery for this origin.
    #[serde(rename = "clear403")]
    Clear403 { url: String },
    /// Page → background: which tab am I?
    GetCurrentTabId,
}

impl Message {
    pub fn expects_response(&self) -> bool {
        matches!(self, Message::GetCurrentTabId)
    }
}

/// A message plus its delivery framing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub message: Message,
    pub expects_response: bool,
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        let expects_response = message.expects_response();
        Self {
            message,
            expects_response,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabIdResponse {
    pub tab_id: Option<TabId>,
}
