//! Discord webhook channel.
//!
//! Announcements are posted as embeds: the plain title becomes the embed
//! title linking to the source page and the body is rendered as Discord
//! markdown in the description. The plain-text fallback drops the embed and
//! uses the message content instead.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ChannelError, Result};
use crate::models::{DiscordConfig, MessageHandle, RichText, Segment};

use super::render::{split_edges, truncate_segments, truncate_text};
use super::{Channel, ChannelPayload, ChannelResult, Formatter, Rendering};

const TITLE_LIMIT: usize = 256;

/// Visible budget for the description; markers need the rest of the 4096.
const DESCRIPTION_BUDGET: usize = 3900;

const CONTENT_LIMIT: usize = 2000;

/// Discord markdown dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscordFormatter;

impl Formatter for DiscordFormatter {
    /// Embed titles do not render markdown.
    fn render_title(&self, title: &RichText) -> String {
        truncate_text(&title.plain, TITLE_LIMIT)
    }

    fn render_body(&self, body: &RichText) -> String {
        truncate_segments(&body.segments, DESCRIPTION_BUDGET)
            .iter()
            .map(render_segment)
            .collect()
    }
}

/// Backslash-escape characters Discord would read as markdown.
fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '*' | '_' | '~' | '`' | '|' | '[' | ']' | '>' | '#'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn render_segment(segment: &Segment) -> String {
    let style = &segment.style;
    if style.pre {
        let code = segment.text.replace("```", "`\u{200b}``");
        return format!("```\n{}\n```", code.trim_end_matches('\n'));
    }
    if style.is_plain() {
        return escape_markdown(&segment.text);
    }

    // markers must hug the text, whitespace stays outside
    let (lead, core, trail) = split_edges(&segment.text);
    if core.is_empty() {
        return segment.text.clone();
    }

    let mut out = if style.code {
        format!("`{}`", core.replace('`', "'"))
    } else {
        escape_markdown(core)
    };
    if style.strike {
        out = format!("~~{}~~", out);
    }
    if style.italic {
        out = format!("*{}*", out);
    }
    if style.underline {
        out = format!("__{}__", out);
    }
    if style.bold {
        out = format!("**{}**", out);
    }
    if let Some(href) = &style.link {
        out = format!("[{}]({})", out, href.replace(')', "%29"));
    }
    format!("{}{}{}", lead, out, trail)
}

#[derive(Serialize)]
struct Embed<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImage<'a>>,
}

#[derive(Serialize)]
struct EmbedImage<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct AllowedMentions {
    parse: [&'static str; 0],
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    content: String,
    embeds: Vec<Embed<'a>>,
    allowed_mentions: AllowedMentions,
}

impl<'a> WebhookMessage<'a> {
    fn new(content: String, embeds: Vec<Embed<'a>>) -> Self {
        Self {
            content,
            embeds,
            allowed_mentions: AllowedMentions { parse: [] },
        }
    }

    fn announcement(payload: &'a ChannelPayload, rendering: Rendering) -> Self {
        match rendering {
            Rendering::Rich => Self::new(
                String::new(),
                vec![Embed {
                    title: Some(&payload.title),
                    description: Some(&payload.body),
                    url: Some(&payload.link),
                    image: None,
                }],
            ),
            Rendering::Plain => Self::new(
                truncate_text(
                    &format!("{}\n{}", payload.plain_title, payload.plain_body),
                    CONTENT_LIMIT,
                ),
                Vec::new(),
            ),
        }
    }
}

#[derive(Deserialize)]
struct PostedMessage {
    id: String,
}

#[derive(Deserialize)]
struct ErrorReply {
    message: String,
}

/// Channel posting through one Discord webhook.
pub struct DiscordChannel {
    client: Client,
    webhook: Url,
    formatter: DiscordFormatter,
}

impl DiscordChannel {
    pub fn new(client: Client, config: &DiscordConfig) -> Result<Self> {
        Ok(Self {
            client,
            webhook: Url::parse(&config.webhook_url)?,
            formatter: DiscordFormatter,
        })
    }

    /// Webhook URL waiting for the created message.
    fn post_url(&self) -> Url {
        let mut url = self.webhook.clone();
        url.query_pairs_mut().append_pair("wait", "true");
        url
    }

    fn message_url(&self, handle: &MessageHandle) -> ChannelResult<Url> {
        let id = handle.as_str();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ChannelError::InvalidHandle(id.to_string()));
        }
        let mut url = self.webhook.clone();
        url.path_segments_mut()
            .map_err(|_| ChannelError::InvalidHandle(id.to_string()))?
            .pop_if_empty()
            .push("messages")
            .push(id);
        Ok(url)
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        body: &WebhookMessage<'_>,
        editing: bool,
    ) -> ChannelResult<Option<PostedMessage>> {
        // the webhook token is part of the URL and must not reach the logs
        let response = request
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.without_url()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ChannelError::Transport(e.without_url()))?;

        if status.is_success() {
            return Ok(serde_json::from_str(&text).ok());
        }
        let description = serde_json::from_str::<ErrorReply>(&text)
            .map(|reply| reply.message)
            .unwrap_or(text);
        Err(classify_failure(status, description, editing))
    }
}

/// Map a failed webhook call onto a channel error.
fn classify_failure(status: StatusCode, description: String, editing: bool) -> ChannelError {
    match status {
        StatusCode::BAD_REQUEST => ChannelError::Rejected(description),
        StatusCode::NOT_FOUND if editing => ChannelError::InvalidHandle(description),
        _ => ChannelError::Api {
            status: status.as_u16(),
            description,
        },
    }
}

#[async_trait]
impl Channel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    fn formatter(&self) -> &dyn Formatter {
        &self.formatter
    }

    async fn send(
        &self,
        payload: &ChannelPayload,
        rendering: Rendering,
    ) -> ChannelResult<MessageHandle> {
        let body = WebhookMessage::announcement(payload, rendering);
        let request = self.client.post(self.post_url());
        match self.execute(request, &body, false).await? {
            Some(posted) => Ok(MessageHandle::new(posted.id)),
            None => Err(ChannelError::Api {
                status: 200,
                description: "webhook response carried no message id".into(),
            }),
        }
    }

    async fn edit(
        &self,
        handle: &MessageHandle,
        payload: &ChannelPayload,
        rendering: Rendering,
    ) -> ChannelResult<MessageHandle> {
        let body = WebhookMessage::announcement(payload, rendering);
        let request = self.client.patch(self.message_url(handle)?);
        self.execute(request, &body, true).await?;
        Ok(handle.clone())
    }

    async fn send_image(&self, url: &str, caption: Option<&str>) -> ChannelResult<()> {
        let body = WebhookMessage::new(
            caption
                .map(|c| truncate_text(c, CONTENT_LIMIT))
                .unwrap_or_default(),
            vec![Embed {
                title: None,
                description: None,
                url: None,
                image: Some(EmbedImage { url }),
            }],
        );
        let request = self.client.post(self.post_url());
        self.execute(request, &body, false).await?;
        Ok(())
    }
}
