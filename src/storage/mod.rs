//! Persistence of observation state between runs.
//!
//! The whole [`StateSnapshot`] is stored as a single JSON document so a
//! restart resumes with the same baselines and message handles.

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::StateSnapshot;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

/// Trait for state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the last saved snapshot; empty when nothing was saved yet.
    async fn load(&self) -> Result<StateSnapshot>;

    /// Replace the saved snapshot.
    async fn save(&self, snapshot: &StateSnapshot) -> Result<()>;
}
