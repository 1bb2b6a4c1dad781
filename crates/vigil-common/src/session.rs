//! The persisted monitoring session record and its partial (patch) form.
//!
//! The store only ever sees [`SessionPatch`]: absent keys mean "unset" and
//! default to `false`/empty when a full [`MonitorSession`] is rebuilt.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reload cadence used when a record carries no interval.
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MonitorMode {
    /// Fires once the element text differs from the snapshot taken at start.
    #[default]
    Change,
    /// Fires once the element text contains the search text.
    Contains,
    /// Fires once the search text is gone from the element text.
    NotContains,
}

impl MonitorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorMode::Change => "change",
            MonitorMode::Contains => "contains",
            MonitorMode::NotContains => "notContains",
        }
    }

    pub fn requires_search_text(&self) -> bool {
        !matches!(self, MonitorMode::Change)
    }
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "change" => Ok(MonitorMode::Change),
            "contains" => Ok(MonitorMode::Contains),
            "notContains" | "not-contains" | "not_contains" => Ok(MonitorMode::NotContains),
            other => Err(format!("Unknown monitor mode: {}", other)),
        }
    }
}

/// Keys of the persisted record, named as they are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    Selector,
    Mode,
    SearchText,
    Interval,
    InitialContent,
    IsActive,
    ConditionMet,
    MonitoringUrl,
}

impl SessionKey {
    pub const ALL: [SessionKey; 8] = [
        SessionKey::Selector,
        SessionKey::Mode,
        SessionKey::SearchText,
        SessionKey::Interval,
        SessionKey::InitialContent,
        SessionKey::IsActive,
        SessionKey::ConditionMet,
        SessionKey::MonitoringUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::Selector => "selector",
            SessionKey::Mode => "mode",
            SessionKey::SearchText => "searchText",
            SessionKey::Interval => "interval",
            SessionKey::InitialContent => "initialContent",
            SessionKey::IsActive => "isActive",
            SessionKey::ConditionMet => "conditionMet",
            SessionKey::MonitoringUrl => "monitoringUrl",
        }
    }
}

/// A partial session record. Writes merge present fields, last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<MonitorMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_met: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_url: Option<String>,
}

impl SessionPatch {
    /// The write performed when the watched condition fires.
    pub fn condition_met() -> Self {
        Self {
            is_active: Some(false),
            condition_met: Some(true),
            ..Default::default()
        }
    }

    /// The write performed by a user-initiated stop.
    pub fn stopped() -> Self {
        Self {
            is_active: Some(false),
            condition_met: Some(false),
            ..Default::default()
        }
    }

    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(false)
    }

    pub fn is_condition_met(&self) -> bool {
        self.condition_met.unwrap_or(false)
    }

    /// Copy every present field of `other` over this record.
    pub fn merge(&mut self, other: SessionPatch) {
        if other.selector.is_some() {
            self.selector = other.selector;
        }
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.search_text.is_some() {
            self.search_text = other.search_text;
        }
        if other.interval.is_some() {
            self.interval = other.interval;
        }
        if other.initial_content.is_some() {
            self.initial_content = other.initial_content;
        }
        if other.is_active.is_some() {
            self.is_active = other.is_active;
        }
        if other.condition_met.is_some() {
            self.condition_met = other.condition_met;
        }
        if other.monitoring_url.is_some() {
            self.monitoring_url = other.monitoring_url;
        }
    }

    /// Keep only the requested keys.
    pub fn select(&self, keys: &[SessionKey]) -> SessionPatch {
        let mut out = SessionPatch::default();
        for key in keys {
            match key {
                SessionKey::Selector => out.selector = self.selector.clone(),
                SessionKey::Mode => out.mode = self.mode,
                SessionKey::SearchText => out.search_text = self.search_text.clone(),
                SessionKey::Interval => out.interval = self.interval,
                SessionKey::InitialContent => out.initial_content = self.initial_content.clone(),
                SessionKey::IsActive => out.is_active = self.is_active,
                SessionKey::ConditionMet => out.condition_met = self.condition_met,
                SessionKey::MonitoringUrl => out.monitoring_url = self.monitoring_url.clone(),
            }
        }
        out
    }
}

/// The full monitoring session as the page context sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSession {
    pub selector: String,
    pub mode: MonitorMode,
    pub search_text: String,
    pub interval_secs: u64,
    pub initial_content: String,
    pub is_active: bool,
    pub condition_met: bool,
    pub monitoring_url: String,
}

impl MonitorSession {
    /// A freshly started, active session.
    pub fn new(
        selector: impl Into<String>,
        mode: MonitorMode,
        search_text: impl Into<String>,
        interval_secs: u64,
        initial_content: impl Into<String>,
        monitoring_url: impl Into<String>,
    ) -> Self {
        Self {
            selector: selector.into(),
            mode,
            search_text: search_text.into(),
            interval_secs,
            initial_content: initial_content.into(),
            is_active: true,
            condition_met: false,
            monitoring_url: monitoring_url.into(),
        }
    }

    /// Rebuild a session from a stored record, filling absent keys with
    /// their defaults. Returns `None` when no selector was ever stored.
    pub fn from_patch(patch: &SessionPatch, default_interval_secs: u64) -> Option<Self> {
        let selector = patch.selector.clone().filter(|s| !s.is_empty())?;
        Some(Self {
            selector,
            mode: patch.mode.unwrap_or_default(),
            search_text: patch.search_text.clone().unwrap_or_default(),
            interval_secs: patch
                .interval
                .filter(|i| *i > 0)
                .unwrap_or(default_interval_secs),
            initial_content: patch.initial_content.clone().unwrap_or_default(),
            is_active: patch.is_active(),
            condition_met: patch.is_condition_met(),
            monitoring_url: patch.monitoring_url.clone().unwrap_or_default(),
        })
    }

    pub fn to_patch(&self) -> SessionPatch {
        SessionPatch {
            selector: Some(self.selector.clone()),
            mode: Some(self.mode),
            search_text: Some(self.search_text.clone()),
            interval: Some(self.interval_secs),
            initial_content: Some(self.initial_content.clone()),
            is_active: Some(self.is_active),
            condition_met: Some(self.condition_met),
            monitoring_url: Some(self.monitoring_url.clone()),
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.selector.trim().is_empty() {
            return Err(SessionError::EmptySelector);
        }
        if self.mode.requires_search_text() && self.search_text.trim().is_empty() {
            return Err(SessionError::MissingSearchText(self.mode.to_string()));
        }
        if self.interval_secs == 0 {
            return Err(SessionError::ZeroInterval);
        }
        if self.is_active && self.condition_met {
            return Err(SessionError::ActiveAfterConditionMet);
        }
        Ok(())
    }

    /// Whether a page that just loaded at `url` should keep monitoring.
    pub fn should_resume_on(&self, url: &str) -> bool {
        self.is_active
            && !self.condition_met
            && !self.monitoring_url.is_empty()
            && url_matches(url, &self.monitoring_url)
    }
}

/// A page belongs to the session when its URL equals the monitored URL or
/// starts with the monitored URL stripped of its query string.
pub fn url_matches(current: &str, monitoring_url: &str) -> bool {
    if current == monitoring_url {
        return true;
    }
    let prefix = monitoring_url
        .split_once('?')
        .map(|(path, _)| path)
        .unwrap_or(monitoring_url);
    current.starts_with(prefix)
}

/// Scheme, host and port of `url`, e.g. `https://shop.example.com`.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let origin = parsed.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}
