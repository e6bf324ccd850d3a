//! In-process realtime hub and event log.
//!
//! Same delivery rules as the hosted service: presence changes reach every
//! subscriber of the topic (join or leave first, then a full sync), and
//! broadcasts reach everyone except the sender. Each channel's inbox is an
//! unbounded tokio mpsc queue drained with [`RealtimeChannel::try_next`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::channel::{ChannelMessage, RealtimeChannel, RealtimeClient, SubscribeStatus};
use crate::error::{ChannelError, EventLogError};
use crate::event_log::EventLog;
use crate::state::presence::{PresenceEntry, PresenceEvent, PresenceMeta};

#[derive(Debug)]
struct Subscriber {
    id: u64,
    key: String,
    tx: mpsc::UnboundedSender<ChannelMessage>,
    meta: Option<PresenceMeta>,
}

#[derive(Debug, Default)]
struct Topic {
    subscribers: Vec<Subscriber>,
    /// Presence keys in the order they were first tracked
    presence_order: Vec<String>,
}

impl Topic {
    fn snapshot(&self) -> Vec<PresenceEntry> {
        self.presence_order
            .iter()
            .map(|key| PresenceEntry {
                key: key.clone(),
                metas: self
                    .subscribers
                    .iter()
                    .filter(|s| &s.key == key)
                    .filter_map(|s| s.meta.clone())
                    .collect(),
            })
            .collect()
    }

    fn send_all(&self, message: &ChannelMessage) {
        for sub in &self.subscribers {
            let _ = sub.tx.send(message.clone());
        }
    }

    fn send_sync(&self) {
        self.send_all(&ChannelMessage::Presence(PresenceEvent::Sync {
            state: self.snapshot(),
        }));
    }
}

#[derive(Debug, Default)]
struct Hub {
    topics: HashMap<String, Topic>,
}

/// Shared in-process realtime service.
#[derive(Debug, Clone, Default)]
pub struct MemoryRealtime {
    hub: Arc<Mutex<Hub>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryRealtime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Hub>, ChannelError> {
        self.hub
            .lock()
            .map_err(|_| ChannelError::new("Realtime hub lock poisoned"))
    }

    /// Presence snapshot of `topic`.
    pub fn presence(&self, topic: &str) -> Vec<PresenceEntry> {
        self.lock()
            .ok()
            .and_then(|hub| hub.topics.get(topic).map(Topic::snapshot))
            .unwrap_or_default()
    }

    /// Push a raw message into one subscriber's inbox.
    pub fn deliver(&self, topic: &str, key: &str, message: ChannelMessage) -> Result<(), ChannelError> {
        let hub = self.lock()?;
        let sub = hub
            .topics
            .get(topic)
            .and_then(|t| t.subscribers.iter().find(|s| s.key == key))
            .ok_or_else(|| ChannelError::new(format!("No subscriber {} on {}", key, topic)))?;
        let _ = sub.tx.send(message);
        Ok(())
    }

    fn join(&self, topic: &str, id: u64, key: &str, tx: mpsc::UnboundedSender<ChannelMessage>) -> Result<(), ChannelError> {
        let mut hub = self.lock()?;
        let topic = hub.topics.entry(topic.to_string()).or_default();
        let _ = tx.send(ChannelMessage::Status(SubscribeStatus::Subscribed));
        topic.subscribers.push(Subscriber {
            id,
            key: key.to_string(),
            tx,
            meta: None,
        });
        Ok(())
    }

    fn track(&self, topic: &str, id: u64, meta: PresenceMeta) -> Result<(), ChannelError> {
        let mut hub = self.lock()?;
        let topic = hub
            .topics
            .get_mut(topic)
            .ok_or_else(|| ChannelError::new("Topic not joined"))?;
        let sub = topic
            .subscribers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ChannelError::new("Channel not subscribed"))?;

        sub.meta = Some(meta.clone());
        let key = sub.key.clone();
        if !topic.presence_order.contains(&key) {
            topic.presence_order.push(key.clone());
        }

        debug!(key = %key, "Presence tracked");
        topic.send_all(&ChannelMessage::Presence(PresenceEvent::Join {
            key,
            new_presences: vec![meta],
        }));
        topic.send_sync();
        Ok(())
    }

    fn broadcast(&self, topic: &str, id: u64, event: &str, payload: serde_json::Value) -> Result<(), ChannelError> {
        let hub = self.lock()?;
        let topic = hub
            .topics
            .get(topic)
            .ok_or_else(|| ChannelError::new("Topic not joined"))?;

        let message = ChannelMessage::Broadcast {
            event: event.to_string(),
            payload,
        };
        for sub in topic.subscribers.iter().filter(|s| s.id != id) {
            let _ = sub.tx.send(message.clone());
        }
        trace!(event, "Broadcast sent");
        Ok(())
    }

    fn leave(&self, topic_name: &str, id: u64) -> Result<(), ChannelError> {
        let mut hub = self.lock()?;
        let Some(topic) = hub.topics.get_mut(topic_name) else {
            return Ok(());
        };
        let Some(pos) = topic.subscribers.iter().position(|s| s.id == id) else {
            return Ok(());
        };
        let sub = topic.subscribers.remove(pos);

        if let Some(meta) = sub.meta {
            if !topic.subscribers.iter().any(|s| s.key == sub.key && s.meta.is_some()) {
                topic.presence_order.retain(|k| k != &sub.key);
            }
            debug!(key = %sub.key, "Presence left");
            topic.send_all(&ChannelMessage::Presence(PresenceEvent::Leave {
                key: sub.key,
                left_presences: vec![meta],
            }));
            topic.send_sync();
        }

        if topic.subscribers.is_empty() {
            hub.topics.remove(topic_name);
        }
        Ok(())
    }
}

impl RealtimeClient for MemoryRealtime {
    type Channel = MemoryChannel;

    fn open(&self, topic: &str, presence_key: &str) -> Result<MemoryChannel, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(MemoryChannel {
            hub: self.clone(),
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            topic: topic.to_string(),
            key: presence_key.to_string(),
            tx,
            rx,
            subscribed: false,
        })
    }
}

/// A subscription on a [`MemoryRealtime`] hub.
///
/// Dropping the channel releases its presence slot.
#[derive(Debug)]
pub struct MemoryChannel {
    hub: MemoryRealtime,
    id: u64,
    topic: String,
    key: String,
    tx: mpsc::UnboundedSender<ChannelMessage>,
    rx: mpsc::UnboundedReceiver<ChannelMessage>,
    subscribed: bool,
}

impl MemoryChannel {
    fn ensure_subscribed(&self) -> Result<(), ChannelError> {
        if self.subscribed {
            Ok(())
        } else {
            Err(ChannelError::new(format!("Channel {} is not subscribed", self.topic)))
        }
    }
}

impl RealtimeChannel for MemoryChannel {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn subscribe(&mut self) -> Result<(), ChannelError> {
        if self.subscribed {
            return Err(ChannelError::new("Channel already subscribed"));
        }
        self.hub.join(&self.topic, self.id, &self.key, self.tx.clone())?;
        self.subscribed = true;
        Ok(())
    }

    fn track(&mut self, meta: PresenceMeta) -> Result<(), ChannelError> {
        self.ensure_subscribed()?;
        self.hub.track(&self.topic, self.id, meta)
    }

    fn broadcast(&mut self, event: &str, payload: serde_json::Value) -> Result<(), ChannelError> {
        self.ensure_subscribed()?;
        self.hub.broadcast(&self.topic, self.id, event, payload)
    }

    fn unsubscribe(&mut self) -> Result<(), ChannelError> {
        if !self.subscribed {
            return Ok(());
        }
        self.subscribed = false;
        self.hub.leave(&self.topic, self.id)
    }

    fn try_next(&mut self) -> Option<ChannelMessage> {
        self.rx.try_recv().ok()
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        let _ = self.unsubscribe();
    }
}

/// An event accepted by [`MemoryEventLog`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedEvent {
    pub room_id: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
}

/// Event store kept in memory. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventLog {
    entries: Arc<Mutex<Vec<LoggedEvent>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following append fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn entries(&self) -> Vec<LoggedEvent> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Event types in append order.
    pub fn event_types(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.event_type).collect()
    }
}

impl EventLog for MemoryEventLog {
    fn append(
        &self,
        room_id: &str,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<(), EventLogError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(EventLogError::new("Event store unavailable"));
        }

        self.entries
            .lock()
            .map_err(|_| EventLogError::new("Event store lock poisoned"))?
            .push(LoggedEvent {
                room_id: room_id.to_string(),
                event_type: event_type.to_string(),
                event_data,
            });
        Ok(())
    }
}
