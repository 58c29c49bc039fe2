// src/error.rs

//! Unified error handling for the notifier application.

use std::fmt;

use thiserror::Error;

/// Result type alias for notifier operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every fetch attempt for a page failed
    #[error("Fetching {url} failed after {attempts} attempts: {last_error}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    /// The page has no element matching a title/body selector
    #[error("No announcement found on {source_id}: nothing matches '{selector}'")]
    NoAnnouncement { source_id: String, selector: String },

    /// A channel failed even after the plain-text fallback
    #[error("Dispatch to {channel} failed: {source}")]
    Dispatch {
        channel: String,
        #[source]
        source: ChannelError,
    },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a missing-announcement error.
    pub fn no_announcement(source_id: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::NoAnnouncement {
            source_id: source_id.into(),
            selector: selector.into(),
        }
    }

    /// Create a dispatch error for a channel.
    pub fn dispatch(channel: impl Into<String>, source: ChannelError) -> Self {
        Self::Dispatch {
            channel: channel.into(),
            source,
        }
    }
}

/// Failure reported by a channel adapter.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The channel refused the message content (usually its markup)
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The channel answered with an error that is not about the content
    #[error("API error ({status}): {description}")]
    Api { status: u16, description: String },

    /// The request never got a usable answer
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A stored handle cannot be used with this channel
    #[error("invalid message handle '{0}'")]
    InvalidHandle(String),
}

impl ChannelError {
    /// Whether a plain-text retry could help.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
