//! Fixed-rate simulation loop: advance the world, then broadcast one snapshot

use crate::session::{Delivery, Frame, SessionRegistry};
use crate::world::{Coin, Pickup, SharedWorld};
use log::{debug, error, warn};
use shared::{codec, PlayerId, ServerMessage};
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

/// What happened during one tick
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub pickups: Vec<Pickup>,
    pub spawned: Option<Coin>,
    /// Connections the snapshot was queued for
    pub recipients: usize,
    /// Connections whose queue was full this tick
    pub skipped: usize,
    /// Players removed because their connection could not be sent to
    pub pruned: Vec<PlayerId>,
}

/// Drives the world forward and broadcasts each tick's snapshot
///
/// There is exactly one simulation per server. It is the only writer of
/// positions, scores and coins.
pub struct Simulation {
    world: SharedWorld,
    sessions: Arc<SessionRegistry>,
    tick: u64,
}

impl Simulation {
    /// Creates a simulation that has not ticked yet
    pub fn new(world: SharedWorld, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            world,
            sessions,
            tick: 0,
        }
    }

    /// Number of ticks run so far
    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Runs one tick: step, collisions, spawn, snapshot, broadcast, prune.
    pub fn tick(&mut self) -> TickReport {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };

        let snapshot = {
            let mut world = self.world.lock();
            let dt = world.config().dt();
            world.step(dt);
            report.pickups = world.resolve_collisions();
            report.spawned = world.maybe_spawn_coin();
            world.snapshot()
        };

        let frame: Frame = match codec::encode(&ServerMessage::State(snapshot)) {
            Ok(text) => Arc::from(text),
            Err(e) => {
                error!("Failed to encode snapshot for tick {}: {}", self.tick, e);
                return report;
            }
        };

        let mut failed = Vec::new();
        for connection in self.sessions.all_connections() {
            match connection.offer(&frame) {
                Delivery::Queued => report.recipients += 1,
                Delivery::Skipped => {
                    debug!(
                        "Outbound queue full for {}, skipping tick {}",
                        connection.id(),
                        self.tick
                    );
                    report.skipped += 1;
                }
                Delivery::Failed => failed.push(connection.id()),
            }
        }

        for connection in failed {
            if let Some(player) = self.sessions.release(connection, &self.world) {
                warn!("Dropped player {}: send to {} failed", player, connection);
                report.pruned.push(player);
            }
        }

        report
    }

    /// Ticks forever at the configured rate. Late ticks push the schedule
    /// back instead of bursting to catch up.
    pub async fn run(mut self) {
        let (period, tick_rate) = {
            let world = self.world.lock();
            (world.config().tick_duration(), world.config().tick_rate as u64)
        };

        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;
            let report = self.tick();

            if report.tick % tick_rate == 0 && report.recipients > 0 {
                let world = self.world.lock();
                debug!(
                    "Tick {}: {} sessions, {} players, {} coins",
                    report.tick,
                    report.recipients,
                    world.players().len(),
                    world.coins().len()
                );
            }
        }
    }
}
