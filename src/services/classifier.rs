//! Change classification.
//!
//! A fingerprint change alone cannot tell a freshly published announcement
//! from a tweak to the one already relayed, so the new text is compared with
//! the text of the last relayed announcement.

use serde::Serialize;

use super::similarity::ratio;

/// Default similarity below which a change counts as a new announcement.
pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// Outcome of comparing the current page state with the last observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Nothing to relay
    NoChange,
    /// A different announcement appeared
    New,
    /// The last relayed announcement was corrected
    Edit,
}

/// Similarity of the new announcement to the last relayed one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub title: f64,
    pub body: f64,
}

impl Similarity {
    /// Compare new title/body texts against the last relayed ones.
    pub fn between(new_title: &str, new_body: &str, last_title: &str, last_body: &str) -> Self {
        Self {
            title: ratio(new_title, last_title),
            body: ratio(new_body, last_body),
        }
    }

    fn identical(&self) -> bool {
        self.title >= 1.0 && self.body >= 1.0
    }
}

/// Decides between new announcements and edits.
#[derive(Debug, Clone, Copy)]
pub struct ChangeClassifier {
    threshold: f64,
}

impl ChangeClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Classify a poll result.
    ///
    /// Equal fingerprints are always `NoChange`, whatever the texts say.
    pub fn classify(
        &self,
        old_fingerprint: &str,
        new_fingerprint: &str,
        new_title: &str,
        new_body: &str,
        last_title: &str,
        last_body: &str,
    ) -> ChangeKind {
        if old_fingerprint == new_fingerprint {
            return ChangeKind::NoChange;
        }
        let similarity = Similarity::between(new_title, new_body, last_title, last_body);
        self.classify_similarity(similarity)
    }

    /// Classify an already measured fingerprint change.
    ///
    /// A ratio equal to the threshold is an edit. Identical texts mean only
    /// the markup moved, which is not relayed.
    pub fn classify_similarity(&self, similarity: Similarity) -> ChangeKind {
        if similarity.title < self.threshold || similarity.body < self.threshold {
            ChangeKind::New
        } else if similarity.identical() {
            ChangeKind::NoChange
        } else {
            ChangeKind::Edit
        }
    }
}

impl Default for ChangeClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
