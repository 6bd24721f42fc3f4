//! In-process publish/subscribe transport over `embassy-sync` channels.
//!
//! A [`Link`] holds two bounded channels, one per direction, shared via
//! `Rc` between the coordinator's [`ChannelTransport`] and whatever plays
//! the device (the [`runtime`](crate::runtime) simulator in practice).
//!
//! ```text
//! ┌──────────────┐  to_device       ┌──────────────┐
//! │ Coordinator  │────────────────▶│    Device    │
//! │ (publish)    │◀────────────────│  (simulated) │
//! └──────────────┘  to_coordinator  └──────────────┘
//! ```
//!
//! Publishing never blocks: a full channel is reported as
//! [`TransportError::Busy`] and the message is dropped, matching the
//! at-most-once delivery of a real broker.

use core::cell::Cell;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use crate::app::ports::{TransportError, TransportPort};

/// Channel depth in each direction.
pub const LINK_DEPTH: usize = 16;

/// One message on either channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
}

/// Both directions of an in-process link, plus its up/down flag.
pub struct Link {
    pub to_device: Channel<NoopRawMutex, Message, LINK_DEPTH>,
    pub to_coordinator: Channel<NoopRawMutex, Message, LINK_DEPTH>,
    up: Cell<bool>,
}

impl Default for Link {
    fn default() -> Self {
        Self::new()
    }
}

impl Link {
    pub fn new() -> Self {
        Self {
            to_device: Channel::new(),
            to_coordinator: Channel::new(),
            up: Cell::new(false),
        }
    }

    pub fn set_up(&self, up: bool) {
        self.up.set(up);
    }

    pub fn is_up(&self) -> bool {
        self.up.get()
    }
}

/// Coordinator-side end of a [`Link`].
pub struct ChannelTransport {
    link: Rc<Link>,
    subscriptions: Vec<String>,
}

impl ChannelTransport {
    pub fn new(link: Rc<Link>) -> Self {
        Self {
            link,
            subscriptions: Vec::new(),
        }
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.iter().any(|t| t == topic)
    }

    pub fn link(&self) -> &Rc<Link> {
        &self.link
    }
}

impl TransportPort for ChannelTransport {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), TransportError> {
        if !self.link.is_up() {
            return Err(TransportError::NotConnected);
        }
        let msg = Message {
            topic: topic.to_string(),
            payload: payload.to_string(),
        };
        if self.link.to_device.try_send(msg).is_err() {
            warn!("Transport: outbound channel full, dropping '{}'", topic);
            return Err(TransportError::Busy);
        }
        debug!("Transport: published to '{}': {}", topic, payload);
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.is_subscribed(topic) {
            self.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn unsubscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.subscriptions.retain(|t| t != topic);
        Ok(())
    }
}
