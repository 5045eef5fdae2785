//! # Coin Rush Server Library
//!
//! Authoritative server for a small real-time coin collecting game. Clients
//! send a movement direction over a WebSocket; the server owns the world,
//! advances it on a fixed tick, resolves player/coin pickups and broadcasts
//! the full world state to every connected client after each tick.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Positions, scores and coins are only ever written by the simulation loop.
//! Clients submit intent (a unit direction per axis) and render whatever
//! state they receive.
//!
//! ### Session Lifecycle
//! Every accepted connection becomes a session with a server-issued
//! `PlayerId`. A session ends when the client disconnects or when a snapshot
//! can no longer be delivered to it; whichever happens first removes the
//! player, and the other path becomes a no-op.
//!
//! ### State Broadcasting
//! Each tick produces one snapshot, encoded once and shared by every
//! recipient's outbound queue.
//!
//! ## Architecture Design
//!
//! ### Tasks
//! - **Acceptor**: upgrades incoming TCP connections to WebSockets
//! - **Connection handler** (one per client): decodes input and sets that
//!   player's direction
//! - **Writer** (one per client): drains the outbound queue into the socket
//! - **Simulation loop** (one): step, collide, spawn, snapshot, broadcast
//!
//! ### Shared State
//! `WorldState` and `SessionRegistry` are shared behind `parking_lot`
//! mutexes. Locks are held only for the duration of a synchronous operation
//! and never across an `.await`.
//!
//! ## Module Organization
//!
//! - `config`: server settings and defaults
//! - `world`: players, coins and the per-tick rules
//! - `session`: connection to player mapping and the cleanup guard
//! - `handler`: per-connection receive loop and input validation
//! - `simulation`: fixed-rate tick driver with broadcast and pruning
//! - `network`: listener, WebSocket upgrade and outbound writer
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 8000,
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = Server::bind(config).await?;
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Limits
//!
//! There is no receive timeout: a silent client keeps its session until the
//! transport reports the connection closed.

pub mod config;
pub mod error;
pub mod handler;
pub mod network;
pub mod session;
pub mod simulation;
pub mod world;
