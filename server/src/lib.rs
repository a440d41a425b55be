//! # Jetpack Game Server Library
//!
//! This library provides the authoritative server for a small multiplayer
//! side-scroller. Players fly a jetpack through a tile map, collect coins and
//! avoid electric hazards; the server owns the only copy of the game state and
//! clients simply render what it broadcasts.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the definitive version of the physics and rules on a fixed
//! tick (20 Hz by default). Clients only report which controls are held; every
//! position, score and death is decided here.
//!
//! ### Session Management
//! Handles the lifecycle of client connections:
//! - Accepting connections up to the configured capacity
//! - The `CONNECT`/`WELCOME` handshake and player id assignment
//! - Refusing late connections once a round is under way
//! - Treating any I/O failure as that one client's disconnect
//!
//! ### State Broadcasting
//! Every tick of a running round ends with a `GAME_STATE` snapshot sent to
//! every client, followed by a single `GAME_END` when the round is decided.
//!
//! ## Architecture Design
//!
//! ### Single Control Loop
//! All game state is mutated from one task that multiplexes new connections,
//! decoded client frames and the tick timer. Per-connection reader and writer
//! tasks only move bytes, so the registry and the map need no locking.
//!
//! ### TCP Framing
//! Messages travel over TCP in the frame format of the `shared` crate. A frame
//! with a bad header closes its connection; a frame with a bad payload is
//! logged and skipped.
//!
//! ## Module Organization
//!
//! - `map`: tile grid loaded from a text file
//! - `physics`: fixed-point player movement
//! - `game`: round state machine, collisions and end-of-round rules
//! - `client_manager`: the session registry
//! - `broadcast`: encoding of every server-to-client frame
//! - `network`: the listener, connection tasks and the control loop
//! - `config`: runtime settings
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::map::GameMap;
//! use server::network::Server;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let map = GameMap::load(Path::new("maps/default.txt"))?;
//!     let config = ServerConfig {
//!         port: 4242,
//!         max_clients: 2,
//!         ..ServerConfig::default()
//!     };
//!
//!     // Waits for two players, plays one round, then returns
//!     let mut server = Server::bind(config, map).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod client_manager;
pub mod config;
pub mod game;
pub mod map;
pub mod network;
pub mod physics;
pub mod utils;
