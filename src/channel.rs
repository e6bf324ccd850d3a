//! Realtime channel abstraction.
//!
//! A hosted pub/sub service with presence sits behind these traits. The
//! session never registers callbacks: it pulls typed [`ChannelMessage`]s and
//! handles each one against its own state.

use std::fmt;

use crate::error::ChannelError;
use crate::state::presence::{PresenceEvent, PresenceMeta};

/// Subscription status reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeStatus {
    Subscribed,
    TimedOut,
    ChannelError,
    Closed,
}

impl SubscribeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscribed => "SUBSCRIBED",
            Self::TimedOut => "TIMED_OUT",
            Self::ChannelError => "CHANNEL_ERROR",
            Self::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for SubscribeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything the channel delivers to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    Status(SubscribeStatus),
    Presence(PresenceEvent),
    Broadcast {
        event: String,
        payload: serde_json::Value,
    },
}

/// One subscription to a room topic.
pub trait RealtimeChannel {
    fn topic(&self) -> &str;

    /// Join the topic. Confirmation arrives later as a `Status` message.
    fn subscribe(&mut self) -> Result<(), ChannelError>;

    /// Announce presence metadata under this channel's presence key.
    fn track(&mut self, meta: PresenceMeta) -> Result<(), ChannelError>;

    /// Send an ephemeral message to every other subscriber.
    fn broadcast(&mut self, event: &str, payload: serde_json::Value) -> Result<(), ChannelError>;

    /// Leave the topic, releasing the presence slot.
    fn unsubscribe(&mut self) -> Result<(), ChannelError>;

    /// Next queued message, without waiting.
    fn try_next(&mut self) -> Option<ChannelMessage>;
}

/// Factory for room channels.
pub trait RealtimeClient {
    type Channel: RealtimeChannel;

    /// Open a channel on `topic` with `presence_key` as this client's key.
    fn open(&self, topic: &str, presence_key: &str) -> Result<Self::Channel, ChannelError>;
}
