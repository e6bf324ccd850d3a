//! Best-effort game event logging.
//!
//! Lifecycle events go to an append-only store. Writes never block play and
//! failures stop here: they are reported with `warn!` and dropped.

use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument, warn};

use crate::error::EventLogError;
use crate::state::board::{Mark, Winner};

/// A game lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    PlayerMove { player: Mark, position: usize },
    GameEnd { winner: Winner },
    GameReset,
    PlayerJoin { player: String },
    PlayerLeave { player: String },
}

impl GameEvent {
    /// Event type string stored alongside the payload.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::PlayerMove { .. } => "player_move",
            Self::GameEnd { .. } => "game_end",
            Self::GameReset => "game_reset",
            Self::PlayerJoin { .. } => "player_join",
            Self::PlayerLeave { .. } => "player_leave",
        }
    }

    pub fn event_data(&self) -> serde_json::Value {
        match self {
            Self::PlayerMove { player, position } => serde_json::json!({
                "player": player.as_str(),
                "position": position
            }),
            Self::GameEnd { winner } => serde_json::json!({"winner": winner.as_str()}),
            Self::GameReset => serde_json::json!({}),
            Self::PlayerJoin { player } | Self::PlayerLeave { player } => {
                serde_json::json!({"player": player})
            }
        }
    }
}

/// Append-only event store.
///
/// Appends run on the logger's writer thread, so a slow store only delays
/// later log entries.
pub trait EventLog: Send + 'static {
    fn append(
        &self,
        room_id: &str,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<(), EventLogError>;
}

enum Command {
    Append {
        event_type: &'static str,
        event_data: serde_json::Value,
    },
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget front for an optional [`EventLog`].
///
/// `record` only queues the event. A writer thread drains the queue into the
/// store in order and reports failures with `warn!`.
pub struct EventLogger {
    room_id: String,
    queue: Option<mpsc::UnboundedSender<Command>>,
}

impl EventLogger {
    /// Logger writing to `sink`. `None` turns every record into a no-op.
    pub fn new(room_id: impl Into<String>, sink: Option<Box<dyn EventLog>>) -> Self {
        let room_id = room_id.into();
        let queue = sink.and_then(|sink| spawn_writer(room_id.clone(), sink));
        Self { room_id, queue }
    }

    pub fn disabled(room_id: impl Into<String>) -> Self {
        Self::new(room_id, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.queue.is_some()
    }

    /// Queue an event for the store. Never fails and never waits.
    #[instrument(level = "debug", skip(self), fields(room_id = %self.room_id))]
    pub fn record(&self, event: GameEvent) {
        let Some(queue) = &self.queue else {
            return;
        };

        let command = Command::Append {
            event_type: event.event_type(),
            event_data: event.event_data(),
        };
        if queue.send(command).is_err() {
            warn!(event_type = event.event_type(), "Event writer stopped, event dropped");
        }
    }

    /// Block until every event queued so far has reached the store.
    pub fn flush(&self) {
        let Some(queue) = &self.queue else {
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if queue.send(Command::Flush(done_tx)).is_err() || done_rx.blocking_recv().is_err() {
            warn!(room_id = %self.room_id, "Event writer stopped before flush");
        }
    }
}

fn spawn_writer(
    room_id: String,
    sink: Box<dyn EventLog>,
) -> Option<mpsc::UnboundedSender<Command>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
    let name = format!("event-log-{}", room_id);

    let spawned = thread::Builder::new().name(name).spawn(move || {
        while let Some(command) = rx.blocking_recv() {
            match command {
                Command::Append {
                    event_type,
                    event_data,
                } => match sink.append(&room_id, event_type, event_data) {
                    Ok(()) => debug!(room_id = %room_id, event_type, "Game event logged"),
                    Err(e) => warn!(
                        room_id = %room_id,
                        event_type,
                        error = %e,
                        "Error logging game event"
                    ),
                },
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!(room_id = %room_id, "Event writer stopped");
    });

    match spawned {
        Ok(_) => Some(tx),
        Err(e) => {
            warn!(error = %e, "Could not start event writer, logging disabled");
            None
        }
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("room_id", &self.room_id)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEventLog;
    use std::time::{Duration, Instant};

    #[test]
    fn test_event_types() {
        assert_eq!(GameEvent::GameReset.event_type(), "game_reset");
        assert_eq!(
            GameEvent::PlayerMove {
                player: Mark::O,
                position: 4
            }
            .event_data(),
            serde_json::json!({"player": "O", "position": 4})
        );
        assert_eq!(
            GameEvent::GameEnd {
                winner: Winner::Draw
            }
            .event_data(),
            serde_json::json!({"winner": "Draw"})
        );
    }

    #[test]
    fn test_record_appends() {
        let log = MemoryEventLog::new();
        let logger = EventLogger::new("lobby", Some(Box::new(log.clone())));

        logger.record(GameEvent::PlayerJoin {
            player: "Alice".to_string(),
        });
        logger.flush();

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].room_id, "lobby");
        assert_eq!(entries[0].event_type, "player_join");
    }

    #[test]
    fn test_record_swallows_failures() {
        let log = MemoryEventLog::new();
        log.set_failing(true);
        let logger = EventLogger::new("lobby", Some(Box::new(log.clone())));

        logger.record(GameEvent::GameReset);
        logger.flush();
        assert!(log.entries().is_empty());

        log.set_failing(false);
        logger.record(GameEvent::GameReset);
        logger.flush();
        assert_eq!(log.event_types(), vec!["game_reset"]);
    }

    #[test]
    fn test_disabled_logger() {
        let logger = EventLogger::disabled("lobby");
        assert!(!logger.is_enabled());
        logger.record(GameEvent::GameReset);
        logger.flush();
    }

    /// Store that takes its time on every append.
    struct SlowLog {
        delay: Duration,
        inner: MemoryEventLog,
    }

    impl EventLog for SlowLog {
        fn append(
            &self,
            room_id: &str,
            event_type: &str,
            event_data: serde_json::Value,
        ) -> Result<(), EventLogError> {
            thread::sleep(self.delay);
            self.inner.append(room_id, event_type, event_data)
        }
    }

    #[test]
    fn test_record_does_not_wait_on_slow_store() {
        let log = MemoryEventLog::new();
        let sink = SlowLog {
            delay: Duration::from_millis(300),
            inner: log.clone(),
        };
        let logger = EventLogger::new("lobby", Some(Box::new(sink)));

        let started = Instant::now();
        logger.record(GameEvent::GameReset);
        logger.record(GameEvent::GameEnd {
            winner: Winner::X,
        });
        assert!(started.elapsed() < Duration::from_millis(100));

        logger.flush();
        assert_eq!(log.event_types(), vec!["game_reset", "game_end"]);
    }
}
