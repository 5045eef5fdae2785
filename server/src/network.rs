//! Server network layer: WebSocket accept loop, per-connection tasks and the
//! simulation task

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handler;
use crate::session::{Connection, ConnectionId, Frame, SessionGuard, SessionRegistry};
use crate::simulation::Simulation;
use crate::world::{SharedWorld, WorldState};
use futures_util::{Sink, SinkExt, StreamExt};
use log::{debug, error, info};
use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Main server owning the listener, the world and the session registry
pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    world: SharedWorld,
    sessions: Arc<SessionRegistry>,
    next_connection: u64,
}

impl Server {
    /// Validates the config, binds the listener and creates an empty world
    ///
    /// # Errors
    /// * `ServerError::Config` if the config is rejected
    /// * `ServerError::Io` if the address cannot be bound
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_addr()).await?;
        info!("Server listening on ws://{}", listener.local_addr()?);

        let world = match config.seed {
            Some(seed) => WorldState::with_seed(config.world.clone(), seed),
            None => WorldState::new(config.world.clone()),
        };

        Ok(Server {
            listener,
            config,
            world: world.into_shared(),
            sessions: Arc::new(SessionRegistry::new()),
            next_connection: 0,
        })
    }

    /// Address actually bound, useful when the configured port is 0
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared world state
    pub fn world(&self) -> &SharedWorld {
        &self.world
    }

    /// Registry of live sessions
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Runs until the process is stopped
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections and ticks the simulation until `shutdown` resolves
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let simulation = Simulation::new(Arc::clone(&self.world), Arc::clone(&self.sessions));
        let simulation = tokio::spawn(simulation.run());

        info!(
            "Server started at {} ticks/s on a {}x{} map",
            self.config.world.tick_rate, self.config.world.map_size, self.config.world.map_size
        );
        if !self.config.latency.is_zero() {
            info!("Simulating {:?} latency per frame", self.config.latency);
        }

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = &mut shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        simulation.abort();
        Ok(())
    }

    fn spawn_connection(&mut self, stream: TcpStream, peer: SocketAddr) {
        self.next_connection += 1;
        let id = ConnectionId(self.next_connection);
        let sessions = Arc::clone(&self.sessions);
        let world = Arc::clone(&self.world);
        let latency = self.config.latency;
        let capacity = self.config.outbound_capacity;

        tokio::spawn(async move {
            if let Err(e) =
                serve_connection(stream, peer, id, sessions, world, latency, capacity).await
            {
                error!("Connection {} from {} failed: {}", id, peer, e);
            }
        });
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
    sessions: Arc<SessionRegistry>,
    world: SharedWorld,
    latency: Duration,
    capacity: usize,
) -> Result<(), ServerError> {
    let socket = accept_async(stream).await?;
    debug!("WebSocket handshake complete for {} ({})", peer, id);

    let (sink, inbound) = socket.split();
    let (outbound, frames) = mpsc::channel(capacity);

    let guard = SessionGuard::open(sessions, world, Connection::new(id, peer, outbound));
    tokio::spawn(write_frames(sink, frames, latency, capacity, id));

    // Returning drops the guard, which releases the session and with it the
    // last sender feeding the writer task.
    handler::run(guard, inbound, latency).await;
    Ok(())
}

/// Forwards queued frames to the socket, each held back by `latency`
///
/// Frames are stamped when they leave the queue, so the delay does not
/// throttle throughput. At most `capacity` frames wait here; beyond that the
/// queue backs up and broadcasts start skipping this connection. When the
/// queue closes, frames already waiting are still sent before the socket is
/// closed. A failed
/// write ends the task, which closes the queue and lets the next broadcast
/// prune the session.
async fn write_frames<S>(
    mut sink: S,
    mut frames: mpsc::Receiver<Frame>,
    latency: Duration,
    capacity: usize,
    id: ConnectionId,
) where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let mut pending: VecDeque<(Instant, Frame)> = VecDeque::with_capacity(capacity);
    let mut open = true;

    loop {
        let next_due = pending.front().map(|(due, _)| *due);
        // Once the queue is closed, frames already taken still go out on time
        if !open && next_due.is_none() {
            break;
        }

        tokio::select! {
            frame = frames.recv(), if open && pending.len() < capacity => match frame {
                Some(frame) => pending.push_back((Instant::now() + latency, frame)),
                None => open = false,
            },
            _ = sleep_until(next_due.unwrap_or_else(Instant::now)), if next_due.is_some() => {
                if let Some((_, frame)) = pending.pop_front() {
                    if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                        debug!("Write to {} failed: {}", id, e);
                        return;
                    }
                }
            }
        }
    }

    if let Err(e) = sink.close().await {
        debug!("Closing {} failed: {}", id, e);
    }
}
