//! Room session lifecycle.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────┐ subscribe ┌─────────────┐ subscribed ┌────────┐
//! │ Idle │──────────▶│ Subscribing │───────────▶│ Active │
//! └──┬───┘           └──────┬──────┘            └───┬────┘
//!    │                      │                       │
//!    │                      ├── evict (room full) ──┤──▶ Evicted
//!    │ close                │ close                 │ close
//!    ▼                      ▼                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │                        Closed                         │
//! └──────────────────────────────────────────────────────┘
//! ```

use std::fmt;

/// Where a room session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Channel not opened yet
    #[default]
    Idle,

    /// Subscribe requested, waiting for confirmation
    Subscribing { topic: String },

    /// Subscribed and presence announced
    Active { topic: String },

    /// Room was full; the local client left (terminal)
    Evicted,

    /// Session ended by the local client (terminal)
    Closed,
}

impl SessionPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    /// Whether the channel subscription is still held.
    pub fn holds_channel(&self) -> bool {
        matches!(self, Self::Subscribing { .. } | Self::Active { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Evicted | Self::Closed)
    }

    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::Subscribing { topic } | Self::Active { topic } => Some(topic),
            _ => None,
        }
    }

    /// Apply an event, returning the new phase or an error.
    pub fn apply(&self, event: SessionEvent) -> Result<Self, InvalidTransition> {
        self.transition(&event)
    }

    /// Apply an event in place.
    pub fn apply_mut(&mut self, event: SessionEvent) -> Result<(), InvalidTransition> {
        *self = self.transition(&event)?;
        Ok(())
    }

    fn transition(&self, event: &SessionEvent) -> Result<Self, InvalidTransition> {
        use SessionEvent::*;
        use SessionPhase::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.clone(),
            event: event.clone(),
            reason,
        };

        match (self, event) {
            (Idle, Subscribe { topic }) => Ok(Subscribing {
                topic: topic.clone(),
            }),
            (_, Subscribe { .. }) => Err(invalid("Channel already opened")),

            (Subscribing { topic }, Subscribed) => Ok(Active {
                topic: topic.clone(),
            }),
            (Active { .. }, Subscribed) => Err(invalid("Already subscribed")),
            (_, Subscribed) => Err(invalid("No subscription pending")),

            (Subscribing { .. } | Active { .. }, Evict) => Ok(Evicted),
            (_, Evict) => Err(invalid("Not in a room")),

            (Idle | Subscribing { .. } | Active { .. }, Close) => Ok(Closed),
            (Evicted, Close) => Err(invalid("Already left the room")),
            (Closed, Close) => Err(invalid("Already closed")),
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Subscribing { topic } => write!(f, "Subscribing({})", topic),
            Self::Active { topic } => write!(f, "Active({})", topic),
            Self::Evicted => write!(f, "Evicted"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Subscribe { topic: String },
    Subscribed,
    Evict,
    Close,
}

/// Error when a lifecycle transition is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: SessionPhase,
    pub event: SessionEvent,
    pub reason: &'static str,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid transition from {} via {:?}: {}",
            self.from, self.event, self.reason
        )
    }
}

impl std::error::Error for InvalidTransition {}
