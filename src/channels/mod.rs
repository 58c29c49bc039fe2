//! Messaging channel adapters.
//!
//! Every channel pairs a [`Formatter`] for its markup dialect with a client
//! that can send, edit, and attach images. Channels are built once from
//! configuration and owned by the dispatcher.

pub mod discord;
pub mod render;
pub mod telegram;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::error::{ChannelError, Result};
use crate::models::{Announcement, ChannelsConfig, MessageHandle, RichText};

pub use discord::{DiscordChannel, DiscordFormatter};
pub use telegram::{TelegramChannel, TelegramFormatter};

/// Result type alias for channel adapter calls.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// Which rendering of a payload to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendering {
    /// Channel markup
    Rich,
    /// Unformatted text, used after the channel rejected the markup
    Plain,
}

/// An announcement rendered for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPayload {
    pub title: String,
    pub body: String,
    pub plain_title: String,
    pub plain_body: String,
    pub images: Vec<String>,
    /// Page the announcement came from
    pub link: String,
}

/// Renders announcements into a channel's markup dialect.
pub trait Formatter: Send + Sync {
    fn render_title(&self, title: &RichText) -> String;

    fn render_body(&self, body: &RichText) -> String;

    /// Images to send after the main message.
    fn extract_images(&self, announcement: &Announcement) -> Vec<String> {
        announcement.images.clone()
    }

    fn format(&self, announcement: &Announcement) -> ChannelPayload {
        ChannelPayload {
            title: self.render_title(&announcement.title),
            body: self.render_body(&announcement.body),
            plain_title: announcement.title.plain.clone(),
            plain_body: announcement.body.plain.clone(),
            images: self.extract_images(announcement),
            link: announcement.source_url.clone(),
        }
    }
}

/// A messaging destination.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable name, used as the key of stored message handles.
    fn name(&self) -> &str;

    fn formatter(&self) -> &dyn Formatter;

    /// Post a new message.
    async fn send(&self, payload: &ChannelPayload, rendering: Rendering)
    -> ChannelResult<MessageHandle>;

    /// Replace the content of a message posted earlier.
    async fn edit(
        &self,
        handle: &MessageHandle,
        payload: &ChannelPayload,
        rendering: Rendering,
    ) -> ChannelResult<MessageHandle>;

    /// Post an image by URL as its own message.
    async fn send_image(&self, url: &str, caption: Option<&str>) -> ChannelResult<()>;
}

/// Build every configured channel, Telegram first.
pub fn build_channels(
    config: &ChannelsConfig,
    client: &reqwest::Client,
) -> Result<Vec<Box<dyn Channel>>> {
    let mut channels: Vec<Box<dyn Channel>> = Vec::new();
    if let Some(telegram) = &config.telegram {
        channels.push(Box::new(TelegramChannel::new(client.clone(), telegram)));
    }
    if let Some(discord) = &config.discord {
        channels.push(Box::new(DiscordChannel::new(client.clone(), discord)?));
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscordConfig, TelegramConfig};

    #[test]
    fn test_build_channels_in_order() {
        let config = ChannelsConfig {
            telegram: Some(TelegramConfig {
                bot_token: "1:a".into(),
                chat_id: "@c".into(),
                ..TelegramConfig::default()
            }),
            discord: Some(DiscordConfig {
                webhook_url: "https://discord.com/api/webhooks/1/tok".into(),
            }),
        };
        let channels = build_channels(&config, &reqwest::Client::new()).unwrap();
        let names: Vec<&str> = channels.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["telegram", "discord"]);
    }

    #[test]
    fn test_build_channels_rejects_bad_webhook() {
        let config = ChannelsConfig {
            telegram: None,
            discord: Some(DiscordConfig {
                webhook_url: "not a url".into(),
            }),
        };
        assert!(build_channels(&config, &reqwest::Client::new()).is_err());
    }
}
