//! Shared data types: the roster, watch identities and liveness signals.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel selector text meaning "every roster subject".
pub const ALL_SELECTOR: &str = "ALL";

/// An external monitored entity (one streaming channel).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Subject {
    /// Short stable key used in config and selectors.
    pub key: String,
    /// Provider-side channel id.
    pub id: String,
    /// Display name used in notifications.
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl Subject {
    fn answers_to(&self, text: &str) -> bool {
        [&self.key, &self.id, &self.name]
            .into_iter()
            .chain(self.aliases.iter())
            .any(|candidate| candidate.eq_ignore_ascii_case(text))
    }
}

/// The static list of subjects, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    subjects: Vec<Subject>,
}

impl Roster {
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self { subjects }
    }

    /// Resolves free-form selector text against key, id, name and aliases.
    pub fn resolve_text(&self, text: &str) -> Option<&Subject> {
        let text = text.trim();
        self.subjects.iter().find(|s| s.answers_to(text))
    }

    pub fn by_id(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|s| s.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.iter()
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// Which subjects a watch covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Selector {
    All,
    /// One subject, by provider id.
    Subject(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::All => f.write_str(ALL_SELECTOR),
            Selector::Subject(id) => f.write_str(id),
        }
    }
}

impl From<String> for Selector {
    fn from(value: String) -> Self {
        if value == ALL_SELECTOR {
            Selector::All
        } else {
            Selector::Subject(value)
        }
    }
}

impl From<Selector> for String {
    fn from(value: Selector) -> Self {
        value.to_string()
    }
}

/// Identity of one scheduled monitoring task: destination scope plus selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatchKey {
    /// Guild id when the request came from a guild, otherwise the channel id.
    pub scope: String,
    pub selector: Selector,
}

impl WatchKey {
    pub fn new(scope: impl Into<String>, selector: Selector) -> Self {
        Self {
            scope: scope.into(),
            selector,
        }
    }
}

impl fmt::Display for WatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.selector)
    }
}

/// A registered watch and who asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRecord {
    pub key: WatchKey,
    pub owner_user_id: String,
    /// Where notifications are delivered.
    pub channel_id: String,
    /// The selector as the owner typed it, `None` for "all".
    pub selector_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WatchRecord {
    /// Human label for acknowledgements: the typed selector or "all streamers".
    pub fn label(&self) -> String {
        self.selector_text
            .clone()
            .unwrap_or_else(|| "all streamers".to_string())
    }
}

/// Two-value liveness signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiveStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "CLOSE")]
    Close,
}

impl LiveStatus {
    pub fn is_live(self) -> bool {
        self == LiveStatus::Open
    }
}

impl fmt::Display for LiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiveStatus::Open => f.write_str("OPEN"),
            LiveStatus::Close => f.write_str("CLOSE"),
        }
    }
}

/// Rich metadata about a live broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveDetails {
    pub title: Option<String>,
    pub category: Option<String>,
    pub started_at: Option<String>,
    pub image_url: Option<String>,
}

/// StatusMemory identity: a watch plus one of the subjects it covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatusKey {
    pub watch: WatchKey,
    pub subject_id: String,
}

impl StatusKey {
    pub fn new(watch: WatchKey, subject_id: impl Into<String>) -> Self {
        Self {
            watch,
            subject_id: subject_id.into(),
        }
    }
}
