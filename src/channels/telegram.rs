//! Telegram Bot API channel.
//!
//! Messages use the HTML parse mode, which supports `b`, `i`, `u`, `s`,
//! `code`, `pre` and `a`. Headings arrive as bold segments.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::models::{Announcement, MessageHandle, RichText, Segment, TelegramConfig};

use super::render::{truncate_segments, truncate_text, visible_len};
use super::{Channel, ChannelPayload, ChannelResult, Formatter, Rendering};

/// Longest message text accepted by `sendMessage`.
pub const MESSAGE_LIMIT: usize = 4096;

/// Longest photo caption.
const CAPTION_LIMIT: usize = 1024;

/// Telegram HTML dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelegramFormatter;

impl TelegramFormatter {
    fn render_segments(segments: &[Segment]) -> String {
        segments.iter().map(render_segment).collect()
    }
}

impl Formatter for TelegramFormatter {
    fn render_title(&self, title: &RichText) -> String {
        Self::render_segments(&title.segments)
    }

    fn render_body(&self, body: &RichText) -> String {
        Self::render_segments(&truncate_segments(&body.segments, MESSAGE_LIMIT))
    }

    /// Title and body share one message, so the body gets what the title leaves.
    fn format(&self, announcement: &Announcement) -> ChannelPayload {
        let title = truncate_segments(&announcement.title.segments, MESSAGE_LIMIT / 4);
        let title_len: usize = title.iter().map(|s| visible_len(&s.text)).sum();
        let body_budget = MESSAGE_LIMIT.saturating_sub(title_len + 1);
        let body = truncate_segments(&announcement.body.segments, body_budget);

        ChannelPayload {
            title: Self::render_segments(&title),
            body: Self::render_segments(&body),
            plain_title: announcement.title.plain.clone(),
            plain_body: announcement.body.plain.clone(),
            images: self.extract_images(announcement),
            link: announcement.source_url.clone(),
        }
    }
}

fn render_segment(segment: &Segment) -> String {
    let style = &segment.style;
    let text = html_escape::encode_text(&segment.text);
    if style.pre {
        return format!("<pre>{}</pre>", text);
    }

    let mut out = text.into_owned();
    if style.code {
        out = format!("<code>{}</code>", out);
    }
    if style.strike {
        out = format!("<s>{}</s>", out);
    }
    if style.underline {
        out = format!("<u>{}</u>", out);
    }
    if style.italic {
        out = format!("<i>{}</i>", out);
    }
    if style.bold {
        out = format!("<b>{}</b>", out);
    }
    if let Some(href) = &style.link {
        out = format!(
            "<a href=\"{}\">{}</a>",
            html_escape::encode_double_quoted_attribute(href),
            out
        );
    }
    out
}

/// Message text for the requested rendering.
fn message_text(payload: &ChannelPayload, rendering: Rendering) -> String {
    match rendering {
        Rendering::Rich => format!("{}\n{}", payload.title, payload.body),
        Rendering::Plain => truncate_text(
            &format!("{}\n{}", payload.plain_title, payload.plain_body),
            MESSAGE_LIMIT,
        ),
    }
}

fn parse_mode(rendering: Rendering) -> Option<&'static str> {
    match rendering {
        Rendering::Rich => Some("HTML"),
        Rendering::Plain => None,
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Serialize)]
struct EditMessageText<'a> {
    chat_id: &'a str,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Serialize)]
struct SendPhoto<'a> {
    chat_id: &'a str,
    photo: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
}

#[derive(Deserialize)]
struct ApiReply<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Channel posting to one Telegram chat through a bot.
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
    formatter: TelegramFormatter,
}

impl TelegramChannel {
    pub fn new(client: Client, config: &TelegramConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            formatter: TelegramFormatter,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &impl Serialize,
    ) -> ChannelResult<T> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);
        // the bot token is part of the URL and must not reach the logs
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Transport(e.without_url()))?;
        let status = response.status();
        let reply: ApiReply<T> = response
            .json()
            .await
            .map_err(|e| ChannelError::Transport(e.without_url()))?;

        if reply.ok {
            if let Some(result) = reply.result {
                return Ok(result);
            }
        }
        let description = reply
            .description
            .unwrap_or_else(|| status.to_string());
        Err(classify_failure(status, description))
    }
}

/// Map a failed Bot API call onto a channel error.
fn classify_failure(status: StatusCode, description: String) -> ChannelError {
    let lower = description.to_lowercase();
    if lower.contains("message to edit not found")
        || lower.contains("message can't be edited")
        || lower.contains("message_id_invalid")
    {
        return ChannelError::InvalidHandle(description);
    }
    if status == StatusCode::BAD_REQUEST {
        return ChannelError::Rejected(description);
    }
    ChannelError::Api {
        status: status.as_u16(),
        description,
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn formatter(&self) -> &dyn Formatter {
        &self.formatter
    }

    async fn send(
        &self,
        payload: &ChannelPayload,
        rendering: Rendering,
    ) -> ChannelResult<MessageHandle> {
        let text = message_text(payload, rendering);
        let request = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            parse_mode: parse_mode(rendering),
        };
        let sent: SentMessage = self.call("sendMessage", &request).await?;
        Ok(MessageHandle::new(sent.message_id.to_string()))
    }

    async fn edit(
        &self,
        handle: &MessageHandle,
        payload: &ChannelPayload,
        rendering: Rendering,
    ) -> ChannelResult<MessageHandle> {
        let message_id: i64 = handle
            .as_str()
            .parse()
            .map_err(|_| ChannelError::InvalidHandle(handle.to_string()))?;
        let text = message_text(payload, rendering);
        let request = EditMessageText {
            chat_id: &self.chat_id,
            message_id,
            text: &text,
            parse_mode: parse_mode(rendering),
        };

        match self.call::<serde_json::Value>("editMessageText", &request).await {
            Ok(_) => Ok(handle.clone()),
            // re-sending identical text is not a failure
            Err(ChannelError::Rejected(description))
                if description.contains("message is not modified") =>
            {
                Ok(handle.clone())
            }
            Err(e) => Err(e),
        }
    }

    async fn send_image(&self, url: &str, caption: Option<&str>) -> ChannelResult<()> {
        let caption = caption.map(|c| truncate_text(c, CAPTION_LIMIT));
        let request = SendPhoto {
            chat_id: &self.chat_id,
            photo: url,
            caption: caption.as_deref(),
        };
        self.call::<serde_json::Value>("sendPhoto", &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::models::Style;

    fn announcement() -> Announcement {
        Announcement {
            source_id: "studenti".into(),
            source_url: "https://example.edu/studenti/".into(),
            title: RichText::from_segments(
                "<h3 class=\"subheading\">Raspored</h3>",
                vec![Segment::new("Raspored", Style::bold())],
            ),
            body: RichText::from_segments(
                "<div>...</div>",
                vec![
                    Segment::plain("Sala A<1> & "),
                    Segment::new("B", Style::bold()),
                    Segment::plain(", vidi "),
                    Segment::new(
                        "ovde",
                        Style {
                            link: Some("https://example.edu/?a=1&b=2".into()),
                            ..Style::default()
                        },
                    ),
                ],
            ),
            images: vec!["https://example.edu/a.png".into()],
        }
    }

    fn channel(server: &MockServer) -> TelegramChannel {
        TelegramChannel::new(
            Client::new(),
            &TelegramConfig {
                bot_token: "123:abc".into(),
                chat_id: "@obavestenja".into(),
                api_base: server.uri(),
            },
        )
    }

    #[test]
    fn test_formats_html() {
        let payload = TelegramFormatter.format(&announcement());
        assert_eq!(payload.title, "<b>Raspored</b>");
        assert_eq!(
            payload.body,
            concat!(
                "Sala A&lt;1&gt; &amp; <b>B</b>, vidi ",
                "<a href=\"https://example.edu/?a=1&amp;b=2\">ovde</a>"
            )
        );
        assert_eq!(payload.plain_body, "Sala A<1> & B, vidi ovde");
        assert_eq!(payload.images, vec!["https://example.edu/a.png".to_string()]);
    }

    #[test]
    fn test_nested_styles() {
        let style = Style {
            bold: true,
            italic: true,
            underline: true,
            ..Style::default()
        };
        assert_eq!(
            render_segment(&Segment::new("x", style)),
            "<b><i><u>x</u></i></b>"
        );
        let pre = Style {
            pre: true,
            bold: true,
            ..Style::default()
        };
        assert_eq!(render_segment(&Segment::new("a<b", pre)), "<pre>a&lt;b</pre>");
    }

    #[test]
    fn test_long_body_is_truncated_to_limit() {
        let mut long = announcement();
        long.body = RichText::from_segments("", vec![Segment::plain("x".repeat(10_000))]);
        let payload = TelegramFormatter.format(&long);
        let text = message_text(&payload, Rendering::Rich);
        // only the <b></b> tags of the title are markup
        assert!(visible_len(&text) - "<b></b>".len() <= MESSAGE_LIMIT);
        assert!(payload.body.ends_with('…'));

        let plain = message_text(&payload, Rendering::Plain);
        assert_eq!(visible_len(&plain), MESSAGE_LIMIT);
    }

    #[test]
    fn test_failure_classification() {
        assert!(matches!(
            classify_failure(
                StatusCode::BAD_REQUEST,
                "Bad Request: can't parse entities".into()
            ),
            ChannelError::Rejected(_)
        ));
        assert!(matches!(
            classify_failure(
                StatusCode::BAD_REQUEST,
                "Bad Request: message to edit not found".into()
            ),
            ChannelError::InvalidHandle(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, "Too Many Requests".into()),
            ChannelError::Api { status: 429, .. }
        ));
    }

    #[tokio::test]
    async fn test_send_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "@obavestenja",
                "parse_mode": "HTML",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 77 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let channel = channel(&server);
        let payload = TelegramFormatter.format(&announcement());
        let handle = channel.send(&payload, Rendering::Rich).await.unwrap();
        assert_eq!(handle, MessageHandle::new("77"));
    }

    #[tokio::test]
    async fn test_bad_markup_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities: unsupported start tag \"h3\""
            })))
            .mount(&server)
            .await;

        let channel = channel(&server);
        let payload = TelegramFormatter.format(&announcement());
        let err = channel.send(&payload, Rendering::Rich).await.unwrap_err();
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn test_plain_send_has_no_parse_mode() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "text": "Raspored\nSala A<1> & B, vidi ovde"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 5 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let channel = channel(&server);
        let payload = TelegramFormatter.format(&announcement());
        channel.send(&payload, Rendering::Plain).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert!(body.get("parse_mode").is_none());
    }

    #[tokio::test]
    async fn test_edit_not_modified_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/editMessageText"))
            .and(body_partial_json(serde_json::json!({ "message_id": 77 })))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message is not modified"
            })))
            .mount(&server)
            .await;

        let channel = channel(&server);
        let payload = TelegramFormatter.format(&announcement());
        let handle = MessageHandle::new("77");
        let edited = channel.edit(&handle, &payload, Rendering::Rich).await.unwrap();
        assert_eq!(edited, handle);
    }

    #[tokio::test]
    async fn test_uneditable_message_is_invalid_handle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/editMessageText"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: message can't be edited"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let channel = channel(&server);
        let payload = TelegramFormatter.format(&announcement());
        let err = channel
            .edit(&MessageHandle::new("77"), &payload, Rendering::Rich)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidHandle(_)));
        assert!(!err.is_rejection());
    }

    #[tokio::test]
    async fn test_edit_with_foreign_handle() {
        let server = MockServer::start().await;
        let channel = channel(&server);
        let payload = TelegramFormatter.format(&announcement());
        let err = channel
            .edit(&MessageHandle::new("abc"), &payload, Rendering::Rich)
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::InvalidHandle(_)));
    }

    #[tokio::test]
    async fn test_send_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendPhoto"))
            .and(body_partial_json(serde_json::json!({
                "photo": "https://example.edu/a.png"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 78 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let channel = channel(&server);
        channel
            .send_image("https://example.edu/a.png", None)
            .await
            .unwrap();
    }
}
