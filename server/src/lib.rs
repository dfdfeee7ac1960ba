//! # Maze Arena session server
//!
//! Server half of a real-time multiplayer maze session. It accepts
//! WebSocket connections, elects the first connection as the session lead,
//! generates the shared maze when the lead starts a match, and relays the
//! aggregated player state to every connection at a fixed cadence.
//!
//! ## Architecture
//!
//! The server is split between a network layer and one session task:
//!
//! - **Network module (`network`)**: the TCP accept loop and per-connection
//!   reader/writer tasks. Frames are parsed concurrently across
//!   connections, but every parsed message becomes a [`session::SessionCommand`]
//!   on a single channel.
//! - **Session module (`session`)**: the one task that owns all mutable
//!   session state (player map, running flag, maze, lead identity) and the
//!   broadcast loop. Commands are applied strictly one at a time, which is
//!   what makes the shared maps race-free without locks.
//! - **Registry module (`registry`)**: the connection roster. Assigns
//!   identities, elects the lead, and routes outbound frames.
//!
//! The protocol is client-authoritative for player state: reports are
//! stored verbatim and broadcast as-is, with no server-side physics or
//! plausibility checks. The maze is the only world state the server owns;
//! clients build their local geometry and collision structures from the
//! snapshot they receive on connect or start.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use server::network::Listener;
//! use server::session::Session;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (command_tx, command_rx) = mpsc::unbounded_channel();
//!
//!     // The session task owns all shared state; the listener feeds it.
//!     tokio::spawn(Session::new(Duration::from_millis(50)).run(command_rx));
//!
//!     let listener = Listener::bind("127.0.0.1:5000").await?;
//!     listener.run(command_tx).await;
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod registry;
pub mod session;
