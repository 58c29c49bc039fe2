//! Recording channel for dispatcher and poll loop tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::models::MessageHandle;

use super::{Channel, ChannelPayload, ChannelResult, Formatter, Rendering, TelegramFormatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Accept,
    /// Refuses rich messages, accepts plain ones
    RejectRich,
    RejectAll,
    /// Every call fails with a server error
    Fail,
    /// Messages go through, images fail
    FailImages,
    /// Edits report the handle as unknown
    StaleHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Send(Rendering),
    Edit(String, Rendering),
    Image(String),
}

pub(crate) struct MockChannel {
    name: String,
    behavior: Behavior,
    calls: Arc<Mutex<Vec<Call>>>,
    next_id: AtomicU64,
    formatter: TelegramFormatter,
}

impl MockChannel {
    pub(crate) fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(100),
            formatter: TelegramFormatter,
        }
    }

    /// Shared view of the calls, usable after the channel is boxed.
    pub(crate) fn recorder(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn deliver(&self, rendering: Rendering) -> ChannelResult<()> {
        match (self.behavior, rendering) {
            (Behavior::RejectAll, _) | (Behavior::RejectRich, Rendering::Rich) => {
                Err(ChannelError::Rejected("can't parse entities".into()))
            }
            (Behavior::Fail, _) => Err(ChannelError::Api {
                status: 502,
                description: "Bad Gateway".into(),
            }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Channel for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn formatter(&self) -> &dyn Formatter {
        &self.formatter
    }

    async fn send(
        &self,
        _payload: &ChannelPayload,
        rendering: Rendering,
    ) -> ChannelResult<MessageHandle> {
        self.record(Call::Send(rendering));
        self.deliver(rendering)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageHandle::new(id.to_string()))
    }

    async fn edit(
        &self,
        handle: &MessageHandle,
        _payload: &ChannelPayload,
        rendering: Rendering,
    ) -> ChannelResult<MessageHandle> {
        self.record(Call::Edit(handle.to_string(), rendering));
        if self.behavior == Behavior::StaleHandle {
            return Err(ChannelError::InvalidHandle(handle.to_string()));
        }
        self.deliver(rendering)?;
        Ok(handle.clone())
    }

    async fn send_image(&self, url: &str, _caption: Option<&str>) -> ChannelResult<()> {
        self.record(Call::Image(url.to_string()));
        match self.behavior {
            Behavior::Fail | Behavior::FailImages => Err(ChannelError::Api {
                status: 400,
                description: "wrong file identifier/HTTP URL specified".into(),
            }),
            _ => Ok(()),
        }
    }
}
