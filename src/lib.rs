//! Tic-Tac-Toe Room State Library
//!
//! This crate keeps a two-player tic-tac-toe room in step across clients
//! that share a hosted realtime channel (presence plus broadcast).
//!
//! # Overview
//!
//! - **Win Detection** - Eight fixed lines scanned in order; full board with
//!   no line is a draw.
//!
//! - **Game State** - Board, turn flag and result, replaced wholesale on
//!   every move or reset.
//!
//! - **Presence** - Up to two occupants in join order. The first plays X,
//!   the second O; a third is turned away.
//!
//! - **Turn Arbitration** - Only the occupant holding the current mark may
//!   move when identity gating is on.
//!
//! - **Room Sessions** - Subscribe, announce presence, broadcast the full
//!   state after each local change and apply every state a peer sends.
//!
//! - **Event Logging** - Optional, best-effort writes of lifecycle events.
//!
//! # Design Principles
//!
//! 1. **State is pure** - `state` never touches the network.
//!
//! 2. **Full-state replication** - Peers exchange whole states, never moves,
//!    so a late joiner converges on the next update.
//!
//! 3. **One message at a time** - Sessions pull typed messages from their
//!    channel and handle each to completion.
//!
//! # Example
//!
//! ```rust
//! use tictac_room_state::{
//!     config::RoomConfig,
//!     identity::AuthenticatedUser,
//!     memory::MemoryRealtime,
//!     session::RoomSession,
//!     Mark,
//! };
//!
//! let hub = MemoryRealtime::new();
//! let alice = AuthenticatedUser::new("alice").with_username("Alice");
//! let bob = AuthenticatedUser::new("bob").with_username("Bob");
//!
//! let mut x = RoomSession::start(&hub, &alice, None, "lobby", RoomConfig::default()).unwrap();
//! x.pump().unwrap();
//! let mut o = RoomSession::start(&hub, &bob, None, "lobby", RoomConfig::default()).unwrap();
//! o.pump().unwrap();
//! x.pump().unwrap();
//!
//! assert_eq!(o.local_mark(), Some(Mark::O));
//!
//! // Alice takes the centre; Bob sees it and now holds the turn.
//! assert!(x.click(4).unwrap());
//! o.pump().unwrap();
//! assert_eq!(o.game().board.get(4), Some(Mark::X));
//! assert!(o.is_local_turn());
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod event_log;
pub mod identity;
pub mod memory;
pub mod session;
pub mod state;
pub mod view;

// Re-export everything from state module at crate root
pub use state::*;

pub use channel::{ChannelMessage, RealtimeChannel, RealtimeClient, SubscribeStatus};
pub use config::RoomConfig;
pub use error::{ChannelError, ConfigError, EventLogError, SessionError};
pub use event_log::{EventLog, EventLogger, GameEvent};
pub use identity::{Anonymous, AuthenticatedUser, IdentityProvider, LocalIdentity};
pub use session::{RoomNotice, RoomSession};
pub use view::RoomView;
