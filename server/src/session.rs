//! Session registry mapping live connections to player identities
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Issuing a fresh `PlayerId` for every accepted connection
//! - Holding each connection's outbound frame queue for broadcasts
//! - Releasing a session exactly once, whichever cleanup path gets there first
//!
//! A session can end in two places: the connection handler finishing (the
//! client closed or errored) and the simulation loop failing to queue a
//! snapshot for it. Both go through [`SessionRegistry::release`], and only the
//! call that actually removes the registry entry goes on to remove the player
//! from the world.

use crate::world::{SharedWorld, WorldState};
use log::info;
use parking_lot::Mutex;
use shared::PlayerId;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// An encoded server message, shared by every recipient of a broadcast
pub type Frame = Arc<str>;

/// Transport-level identity of one accepted socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of offering a frame to a connection's outbound queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The queue is full; this frame is skipped for this recipient only.
    Skipped,
    /// The writer side is gone. The session should be pruned.
    Failed,
}

/// Handle used to push frames towards one client
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    outbound: mpsc::Sender<Frame>,
}

impl Connection {
    /// Wraps the sending half of a connection's outbound queue
    pub fn new(id: ConnectionId, peer: SocketAddr, outbound: mpsc::Sender<Frame>) -> Self {
        Self { id, peer, outbound }
    }

    /// Identity assigned by the accept loop
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address of the socket
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queues a frame without waiting
    pub fn offer(&self, frame: &Frame) -> Delivery {
        match self.outbound.try_send(Arc::clone(frame)) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => Delivery::Skipped,
            Err(TrySendError::Closed(_)) => Delivery::Failed,
        }
    }
}

struct Session {
    connection: Connection,
    player: PlayerId,
}

struct Registry {
    /// Ordered by connection id so snapshots iterate in accept order
    sessions: BTreeMap<ConnectionId, Session>,
    next_player_id: u32,
}

/// Tracks every live session
///
/// All methods take `&self` and lock internally for the duration of a single
/// map operation, so the registry can be shared as `Arc<SessionRegistry>`
/// between handlers and the simulation loop.
pub struct SessionRegistry {
    inner: Mutex<Registry>,
}

impl SessionRegistry {
    /// Creates an empty registry. Player ids start at 1.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registry {
                sessions: BTreeMap::new(),
                next_player_id: 1,
            }),
        }
    }

    /// Records a connection and returns the identity issued to it
    ///
    /// Registering a connection id that is already present keeps the original
    /// session and returns its identity.
    pub fn register(&self, connection: Connection) -> PlayerId {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.sessions.get(&connection.id) {
            return existing.player;
        }

        let player = PlayerId(inner.next_player_id);
        inner.next_player_id += 1;

        info!(
            "Player {} joined from {} (connection {})",
            player, connection.peer, connection.id
        );
        inner
            .sessions
            .insert(connection.id, Session { connection, player });

        player
    }

    /// Removes the association if present and returns the identity it held
    pub fn unregister(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.inner
            .lock()
            .sessions
            .remove(&connection)
            .map(|session| session.player)
    }

    /// Ends a session: unregisters it and, if this call was the one that
    /// removed it, removes its player from the world
    pub fn release(&self, connection: ConnectionId, world: &Mutex<WorldState>) -> Option<PlayerId> {
        let player = self.unregister(connection)?;
        world.lock().remove_player(player);
        Some(player)
    }

    /// Point-in-time copy of every registered connection
    pub fn all_connections(&self) -> Vec<Connection> {
        self.inner
            .lock()
            .sessions
            .values()
            .map(|session| session.connection.clone())
            .collect()
    }

    /// Gets the player bound to a connection
    ///
    /// # Returns
    /// * `Some(PlayerId)` while the session is live
    /// * `None` after it has been released
    pub fn player_for(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.inner
            .lock()
            .sessions
            .get(&connection)
            .map(|session| session.player)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Whether no session is live
    pub fn is_empty(&self) -> bool {
        self.inner.lock().sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Scope owning one session from registration until drop
///
/// Dropping the guard releases the session on every exit path of the
/// connection handler, including early returns and task cancellation.
pub struct SessionGuard {
    connection: ConnectionId,
    player: PlayerId,
    sessions: Arc<SessionRegistry>,
    world: SharedWorld,
}

impl SessionGuard {
    /// Registers the connection and spawns its player
    pub fn open(sessions: Arc<SessionRegistry>, world: SharedWorld, connection: Connection) -> Self {
        let id = connection.id();
        let player = sessions.register(connection);
        world.lock().add_player(player);

        Self {
            connection: id,
            player,
            sessions,
            world,
        }
    }

    /// Player issued to this session
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Connection this session was opened for
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// World the player lives in
    pub fn world(&self) -> &SharedWorld {
        &self.world
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(player) = self.sessions.release(self.connection, &self.world) {
            info!("Player {} disconnected", player);
        }
    }
}
