//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::WatchedSource;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Poll cadence and change classification
    #[serde(default)]
    pub poll: PollConfig,

    /// HTTP fetch and retry behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Observation state persistence
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Messaging channel credentials
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Watched pages, in priority order
    #[serde(default = "defaults::default_sources")]
    pub sources: Vec<WatchedSource>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration if the file exists.
    ///
    /// A missing file is `None`; a file that cannot be read or parsed is an
    /// error rather than a silent fallback to defaults.
    pub fn load_optional(path: impl AsRef<Path>) -> Result<Option<Self>> {
        match Self::load(path) {
            Ok(config) => Ok(Some(config)),
            Err(AppError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Override values from the process environment (after `.env` is loaded).
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(token) = var("TELEGRAM_BOT_TOKEN") {
            self.channels.telegram_mut().bot_token = token;
        }
        if let Some(chat_id) = var("TELEGRAM_CHAT_ID") {
            self.channels.telegram_mut().chat_id = chat_id;
        }
        if let Some(webhook) = var("DISCORD_WEBHOOK_URL") {
            self.channels.discord = Some(DiscordConfig {
                webhook_url: webhook,
            });
        }
        if let Some(interval) = var("UPDATE_INTERVAL") {
            match interval.trim().parse() {
                Ok(secs) => self.poll.interval_secs = secs,
                Err(_) => log::warn!("Ignoring invalid UPDATE_INTERVAL '{}'", interval),
            }
        }
        if let Some(path) = var("STATE_PATH") {
            self.storage.state_path = Some(PathBuf::from(path));
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        self.validate_sources()?;
        self.channels.validate()
    }

    /// Validate everything except channel credentials.
    pub fn validate_sources(&self) -> Result<()> {
        if self.poll.interval_secs == 0 {
            return Err(AppError::validation("poll.interval_secs must be > 0"));
        }
        let threshold = self.poll.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(AppError::validation(
                "poll.similarity_threshold must be in (0, 1]",
            ));
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.fetch.max_attempts == 0 {
            return Err(AppError::validation("fetch.max_attempts must be > 0"));
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(AppError::validation("source id is empty"));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
            url::Url::parse(&source.url)?;
            if source.interval_secs == Some(0) {
                return Err(AppError::validation(format!(
                    "sources.{}.interval_secs must be > 0",
                    source.id
                )));
            }
            for (label, selector) in source.selectors() {
                Selector::parse(selector).map_err(|e| {
                    AppError::selector(selector, format!("{} of {}: {e:?}", label, source.id))
                })?;
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            fetch: FetchConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            channels: ChannelsConfig::default(),
            sources: defaults::default_sources(),
        }
    }
}

/// Poll loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between polls of a source
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,

    /// Below this title or body similarity a change is a new announcement
    #[serde(default = "defaults::similarity_threshold")]
    pub similarity_threshold: f64,

    /// Stop processing further sources in a cycle once one change was relayed
    #[serde(default = "defaults::exclusive_cycles")]
    pub exclusive_cycles: bool,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
            similarity_threshold: defaults::similarity_threshold(),
            exclusive_cycles: defaults::exclusive_cycles(),
        }
    }
}

/// Delay growth between fetch retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    Fixed,
    Exponential,
}

/// HTTP fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Attempts per page before giving up
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay after the first failed attempt
    #[serde(default = "defaults::retry_delay")]
    pub retry_delay_secs: u64,

    /// Upper bound for exponential delays
    #[serde(default = "defaults::max_retry_delay")]
    pub max_retry_delay_secs: u64,

    #[serde(default = "defaults::backoff")]
    pub backoff: Backoff,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_attempts: defaults::max_attempts(),
            retry_delay_secs: defaults::retry_delay(),
            max_retry_delay_secs: defaults::max_retry_delay(),
            backoff: defaults::backoff(),
        }
    }
}

/// State persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// JSON state file; state is kept in memory only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter when RUST_LOG is not set
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Append log lines to this file instead of stderr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            file: None,
        }
    }
}

/// Configured messaging channels.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<DiscordConfig>,
}

impl ChannelsConfig {
    fn telegram_mut(&mut self) -> &mut TelegramConfig {
        self.telegram.get_or_insert_with(TelegramConfig::default)
    }

    pub fn is_empty(&self) -> bool {
        self.telegram.is_none() && self.discord.is_none()
    }

    /// Validate channel credentials.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(AppError::validation("No channels configured"));
        }
        if let Some(telegram) = &self.telegram {
            if telegram.bot_token.trim().is_empty() {
                return Err(AppError::validation("channels.telegram.bot_token is empty"));
            }
            if telegram.chat_id.trim().is_empty() {
                return Err(AppError::validation("channels.telegram.chat_id is empty"));
            }
            url::Url::parse(&telegram.api_base)?;
        }
        if let Some(discord) = &self.discord {
            url::Url::parse(&discord.webhook_url)?;
        }
        Ok(())
    }
}

/// Telegram bot credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,

    /// Target chat or channel (`@name` or numeric id)
    #[serde(default)]
    pub chat_id: String,

    /// Bot API base URL
    #[serde(default = "defaults::telegram_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: defaults::telegram_api_base(),
        }
    }
}

/// Discord webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: String,
}

mod defaults {
    use super::{Backoff, WatchedSource};

    // Poll defaults
    pub fn interval() -> u64 {
        60
    }
    pub fn similarity_threshold() -> f64 {
        0.85
    }
    pub fn exclusive_cycles() -> bool {
        true
    }

    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_attempts() -> u32 {
        16
    }
    pub fn retry_delay() -> u64 {
        5
    }
    pub fn max_retry_delay() -> u64 {
        300
    }
    pub fn backoff() -> Backoff {
        Backoff::Exponential
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn telegram_api_base() -> String {
        "https://api.telegram.org".into()
    }

    // Source defaults
    pub fn default_sources() -> Vec<WatchedSource> {
        vec![
            WatchedSource {
                id: "studenti".to_string(),
                url: "https://odseknis.akademijanis.edu.rs/studenti/".to_string(),
                region: r#"div[class="timeline-body"]"#.to_string(),
                title: r#"h3[class="subheading"]"#.to_string(),
                body: r#"div[class="timeline-body"]"#.to_string(),
                interval_secs: None,
            },
            WatchedSource {
                id: "obavestenja".to_string(),
                url: "https://odseknis.akademijanis.edu.rs/obavestenja/".to_string(),
                region: "article".to_string(),
                title: r#"h1[class="entry-title"]"#.to_string(),
                body: r#"div[class="entry-content"]"#.to_string(),
                interval_secs: None,
            },
        ]
    }
}
