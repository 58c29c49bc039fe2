// src/models/source.rs

//! Watched page definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A page monitored for announcements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchedSource {
    /// Unique identifier, used as the key of the persisted state
    pub id: String,

    /// Page URL
    pub url: String,

    /// Element whose markup is fingerprinted to detect changes
    pub region: String,

    /// First match is the title of the latest announcement
    pub title: String,

    /// First match is the body of the latest announcement
    pub body: String,

    /// Per-source poll interval; falls back to `poll.interval_secs`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

impl WatchedSource {
    /// Effective poll interval given the global default.
    pub fn interval(&self, default_secs: u64) -> Duration {
        Duration::from_secs(self.interval_secs.unwrap_or(default_secs))
    }

    /// All selectors of this source, labelled for error messages.
    pub fn selectors(&self) -> [(&'static str, &str); 3] {
        [
            ("region", self.region.as_str()),
            ("title", self.title.as_str()),
            ("body", self.body.as_str()),
        ]
    }
}
