//! Observation state persisted between poll cycles.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel-assigned identifier of a relayed message, used to edit it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(String);

impl MessageHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the poll loop remembers about one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationState {
    /// Fingerprint of the watched region; unset until a baseline is taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fingerprint: Option<String>,

    /// Plain title of the last relayed announcement
    #[serde(default)]
    pub last_title: String,

    /// Plain body of the last relayed announcement
    #[serde(default)]
    pub last_body: String,

    /// Channel name to the message relaying the last announcement
    #[serde(default)]
    pub handles: BTreeMap<String, MessageHandle>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ObservationState {
    /// State holding only a baseline fingerprint.
    pub fn baseline(fingerprint: impl Into<String>) -> Self {
        Self {
            last_fingerprint: Some(fingerprint.into()),
            updated_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// Observation state of every source, keyed by source id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub sources: BTreeMap<String, ObservationState>,
}

impl StateSnapshot {
    pub fn get(&self, source_id: &str) -> Option<&ObservationState> {
        self.sources.get(source_id)
    }

    /// State of a source, created empty if missing.
    pub fn entry(&mut self, source_id: &str) -> &mut ObservationState {
        self.sources.entry(source_id.to_string()).or_default()
    }

    /// Fingerprint baseline of a source, if any.
    pub fn fingerprint(&self, source_id: &str) -> Option<&str> {
        self.get(source_id)
            .and_then(|state| state.last_fingerprint.as_deref())
    }
}
