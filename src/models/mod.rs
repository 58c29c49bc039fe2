// src/models/mod.rs

//! Domain models for the notifier application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod announcement;
mod config;
mod source;
mod state;

// Re-export all public types
pub use announcement::{Announcement, RichText, Segment, Style};
pub use config::{
    Backoff, ChannelsConfig, Config, DiscordConfig, FetchConfig, LoggingConfig, PollConfig,
    StorageConfig, TelegramConfig,
};
pub use source::WatchedSource;
pub use state::{MessageHandle, ObservationState, StateSnapshot};
