//! Fan-out of announcements to every configured channel.

use std::collections::BTreeMap;

use crate::channels::{Channel, ChannelPayload, ChannelResult, Rendering};
use crate::error::{AppError, ChannelError};
use crate::models::{Announcement, MessageHandle};
use crate::services::ChangeKind;

/// What happened to one announcement across the channels.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Handle of the delivered message, per channel name
    pub handles: BTreeMap<String, MessageHandle>,
    /// Channels that failed after their fallback
    pub failures: Vec<AppError>,
    /// Number of channels tried
    pub attempted: usize,
}

impl DispatchReport {
    pub fn any_delivered(&self) -> bool {
        !self.handles.is_empty()
    }
}

/// Owns the channels and relays announcements to them in order.
pub struct Dispatcher {
    channels: Vec<Box<dyn Channel>>,
}

impl Dispatcher {
    pub fn new(channels: Vec<Box<dyn Channel>>) -> Self {
        Self { channels }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Relay `announcement` as a new message or as an edit of `known` handles.
    ///
    /// Channels are independent: a failing channel is recorded in the report
    /// and the next one is still tried.
    pub async fn dispatch(
        &self,
        announcement: &Announcement,
        kind: ChangeKind,
        known: &BTreeMap<String, MessageHandle>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();
        if kind == ChangeKind::NoChange {
            return report;
        }

        for channel in &self.channels {
            let channel = channel.as_ref();
            let payload = channel.formatter().format(announcement);
            report.attempted += 1;

            let result = match (kind, known.get(channel.name())) {
                (ChangeKind::Edit, Some(handle)) => {
                    match edit_with_fallback(channel, handle, &payload).await {
                        Err(ChannelError::InvalidHandle(id)) => {
                            log::warn!(
                                "{}: message {} can no longer be edited, sending a new one",
                                channel.name(),
                                id
                            );
                            send_new(channel, &payload).await
                        }
                        other => other,
                    }
                }
                _ => send_new(channel, &payload).await,
            };

            match result {
                Ok(handle) => {
                    log::info!(
                        "{}: relayed {} from {} (message {})",
                        channel.name(),
                        kind_label(kind),
                        announcement.source_id,
                        handle
                    );
                    report.handles.insert(channel.name().to_string(), handle);
                }
                Err(e) => {
                    let error = AppError::dispatch(channel.name(), e);
                    log::error!("{}", error);
                    report.failures.push(error);
                }
            }
        }
        report
    }
}

fn kind_label(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::New => "new announcement",
        ChangeKind::Edit => "edit",
        ChangeKind::NoChange => "nothing",
    }
}

/// Send a new message, then its images.
async fn send_new(channel: &dyn Channel, payload: &ChannelPayload) -> ChannelResult<MessageHandle> {
    let handle = match channel.send(payload, Rendering::Rich).await {
        Err(e) if e.is_rejection() => {
            log::warn!("{}: {}, retrying as plain text", channel.name(), e);
            channel.send(payload, Rendering::Plain).await?
        }
        other => other?,
    };

    for url in &payload.images {
        if let Err(e) = channel.send_image(url, None).await {
            log::warn!("{}: image {} not sent: {}", channel.name(), url, e);
        }
    }
    Ok(handle)
}

async fn edit_with_fallback(
    channel: &dyn Channel,
    handle: &MessageHandle,
    payload: &ChannelPayload,
) -> ChannelResult<MessageHandle> {
    match channel.edit(handle, payload, Rendering::Rich).await {
        Err(e) if e.is_rejection() => {
            log::warn!("{}: {}, retrying edit as plain text", channel.name(), e);
            channel.edit(handle, payload, Rendering::Plain).await
        }
        other => other,
    }
}
