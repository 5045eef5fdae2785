//! # Terminal Client Library
//!
//! A minimal text client for the coin collecting server. It reads movement
//! commands from stdin, forwards them as `input` messages and prints each
//! world snapshot the server broadcasts. The client never simulates anything
//! locally; what it prints is exactly what the server sent.
//!
//! ## Modules
//!
//! - `input`: maps typed commands to movement directions
//! - `network`: WebSocket connection, sending input and receiving snapshots
//! - `rendering`: formats a snapshot as text
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("ws://127.0.0.1:8000", 0).await?;
//!     client.run().await
//! }
//! ```

pub mod input;
pub mod network;
pub mod rendering;
