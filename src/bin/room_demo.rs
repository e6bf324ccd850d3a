//! Plays a scripted game between two sessions on an in-process hub.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tictac_room_state::{
    memory::{MemoryChannel, MemoryEventLog, MemoryRealtime},
    AuthenticatedUser, RoomConfig, RoomNotice, RoomSession,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Two players, one room, one scripted game
#[derive(Parser, Debug)]
#[command(name = "room_demo")]
#[command(version)]
struct Cli {
    /// Room identifier
    #[arg(long, default_value = "lobby")]
    room: String,

    /// Optional TOML room config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cells to play, alternating X and O
    #[arg(long, value_delimiter = ',', default_value = "0,4,1,5,2")]
    moves: Vec<usize>,
}

fn pump_all(sessions: &mut [&mut RoomSession<MemoryChannel>]) -> Result<()> {
    for session in sessions.iter_mut() {
        for notice in session.pump()? {
            match notice {
                RoomNotice::PlayerJoined { name } => {
                    info!(who = %session.identity().name, "{} joined the room", name)
                }
                other => info!(who = %session.identity().name, notice = ?other, "Room notice"),
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RoomConfig::from_file(path)?,
        None => RoomConfig::default(),
    };

    let hub = MemoryRealtime::new();
    let log = MemoryEventLog::new();
    let alice = AuthenticatedUser::new("alice").with_username("Alice");
    let bob = AuthenticatedUser::new("bob").with_username("Bob");

    let mut x = RoomSession::start(
        &hub,
        &alice,
        Some(Box::new(log.clone())),
        &cli.room,
        config.clone(),
    )?;
    pump_all(&mut [&mut x])?;
    let mut o = RoomSession::start(&hub, &bob, Some(Box::new(log.clone())), &cli.room, config)?;
    pump_all(&mut [&mut x, &mut o])?;

    for (turn, index) in cli.moves.iter().copied().enumerate() {
        let player = if turn % 2 == 0 { &mut x } else { &mut o };
        if !player.click(index)? {
            info!(index, "Move ignored");
        }
        pump_all(&mut [&mut x, &mut o])?;
    }

    x.flush_events();
    o.flush_events();
    println!("{}", x.view());
    println!("{}", serde_json::to_string_pretty(&o.view().to_json())?);
    info!(events = ?log.event_types(), "Event log");

    o.end()?;
    x.end()?;
    Ok(())
}
