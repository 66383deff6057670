//! # Grid-Snake Game Server Library
//!
//! Authoritative server for the multiplayer grid-snake game. It owns the
//! canonical world state, advances it on a fixed tick, and broadcasts the
//! result to every connected client over a line-based text protocol.
//!
//! ## Architecture
//!
//! The simulation is single-threaded: one tick-loop task owns
//! the [`game::GameState`] exclusively and is the only code that mutates
//! it. Sessions communicate with it by message passing: a command
//! channel carries Join/Leave/SetDirection intents in, and per-session
//! outbound queues carry STATE/CHAT/GAMEOVER lines out. This removes any
//! need for a lock around the world and makes ticks deterministic modulo
//! intent-arrival order.
//!
//! Each accepted TCP connection gets a reader task (blocking line reads,
//! protocol state machine) and, once its JOIN handshake succeeds, a
//! writer task draining its own queue. A stalled peer therefore only
//! stalls itself; the tick loop never performs socket I/O.
//!
//! ## Module Organization
//!
//! - [`game`]: snake entities, the apple, and the per-tick rules for
//!   movement, apple consumption, the collision priority order, and
//!   scoring.
//! - [`session`]: the registry of active sessions and broadcast fan-out.
//! - [`network`]: TCP acceptor, per-connection protocol tasks, and the
//!   tick loop that drives everything.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new("127.0.0.1:5000", Duration::from_millis(120)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Limitations
//!
//! Nothing is persisted; a process crash loses all in-flight games. A
//! hung but still-open connection is only reclaimed when the OS reports
//! a socket error, as there is no application-level read timeout.

pub mod game;
pub mod network;
pub mod session;
