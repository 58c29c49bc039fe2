//! Service layer for the notifier application.
//!
//! This module contains the change-detection logic:
//! - Page fetching with retries (`PageFetcher`, `fetch_with_retry`)
//! - Region fingerprints (`fingerprint_region`)
//! - Announcement extraction (`extract`)
//! - New/edit classification (`ChangeClassifier`)

pub mod classifier;
pub mod document;
pub mod extractor;
pub mod fetcher;
pub mod fingerprint;
pub mod similarity;

pub use classifier::{ChangeClassifier, ChangeKind, Similarity};
pub use document::PageDocument;
pub use extractor::extract;
pub use fetcher::{HttpFetcher, PageFetcher, RetryPolicy, fetch_with_retry};
pub use fingerprint::{fingerprint, fingerprint_region};
