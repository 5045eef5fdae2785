//! Authoritative world state: players, coins and the per-tick rules that move them
//!
//! `WorldState` is owned by the server and shared behind a single mutex
//! between connection handlers (which only add/remove players and set their
//! direction) and the simulation loop (the only writer of positions, scores
//! and coins). Every operation here is synchronous and never awaits, so the
//! lock is never held across a suspension point.

use crate::error::ConfigError;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    CoinView, Direction, PlayerId, PlayerView, StateSnapshot, COIN_RADIUS, COIN_SPAWN_SECS,
    MAP_SIZE, PLAYER_RADIUS, PLAYER_SPEED, TICK_RATE,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

pub type SharedWorld = Arc<Mutex<WorldState>>;

/// Gameplay tuning shared by every rule in the world
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Side length of the square map
    pub map_size: f32,
    /// Movement speed in units per second
    pub player_speed: f32,
    pub player_radius: f32,
    pub coin_radius: f32,
    /// Expected seconds between coin spawns
    pub coin_spawn_secs: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            map_size: MAP_SIZE,
            player_speed: PLAYER_SPEED,
            player_radius: PLAYER_RADIUS,
            coin_radius: COIN_RADIUS,
            coin_spawn_secs: COIN_SPAWN_SECS,
        }
    }
}

impl WorldConfig {
    /// Checks that the tick rate is non-zero and every size, speed and
    /// interval is finite and positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::TickRate(self.tick_rate));
        }

        let positive = [
            ("map size", self.map_size),
            ("player speed", self.player_speed),
            ("player radius", self.player_radius),
            ("coin radius", self.coin_radius),
            ("coin spawn interval", self.coin_spawn_secs),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }

        Ok(())
    }

    /// Fixed simulation step in seconds
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    /// Wall-clock period between ticks
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate as f64)
    }

    /// Per-tick spawn chance, scaled so the expected gap between coins is
    /// `coin_spawn_secs` regardless of tick rate.
    pub fn coin_spawn_probability(&self) -> f64 {
        (1.0 / (self.tick_rate as f64 * self.coin_spawn_secs as f64)).min(1.0)
    }

    fn pickup_distance(&self) -> f32 {
        self.player_radius + self.coin_radius
    }
}

/// One connected player as the simulation sees it
///
/// Positions are in map units with the origin at the top-left corner.
/// `direction` is written by the connection handler; everything else only
/// by the simulation loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub direction: Direction,
    pub score: u32,
}

impl PlayerState {
    fn distance_sq_to(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }

    fn view(&self) -> PlayerView {
        PlayerView {
            x: self.x,
            y: self.y,
            vx: self.direction.vx() as i32,
            vy: self.direction.vy() as i32,
            score: self.score,
        }
    }
}

/// A collectible on the map. Ids start at 1 and are never reused.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coin {
    pub id: u64,
    pub x: f32,
    pub y: f32,
}

/// A coin awarded to a player during collision resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pickup {
    pub coin_id: u64,
    pub player: PlayerId,
}

/// Players, coins and the RNG used for spawning
pub struct WorldState {
    config: WorldConfig,
    /// Ordered by id; this is also the tie-break order for coin awards.
    players: BTreeMap<PlayerId, PlayerState>,
    coins: Vec<Coin>,
    next_coin_id: u64,
    rng: StdRng,
}

impl WorldState {
    /// Creates an empty world seeded from OS entropy
    pub fn new(config: WorldConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Creates a world whose spawns are reproducible for a given seed
    pub fn with_seed(config: WorldConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: WorldConfig, rng: StdRng) -> Self {
        Self {
            config,
            players: BTreeMap::new(),
            coins: Vec::new(),
            next_coin_id: 1,
            rng,
        }
    }

    /// Wraps the world for sharing between tasks
    pub fn into_shared(self) -> SharedWorld {
        Arc::new(Mutex::new(self))
    }

    /// Tuning this world was created with
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// All players, in ascending id order
    ///
    /// This is the order `resolve_collisions` uses to pick a winner when
    /// several players reach the same coin.
    pub fn players(&self) -> &BTreeMap<PlayerId, PlayerState> {
        &self.players
    }

    /// Looks up one player. `None` once the player has been removed.
    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    /// Coins currently on the map, oldest first
    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    /// Inserts a player at a random spawn point with no velocity and no score.
    ///
    /// Identities are unique per session, so a duplicate is logged and the
    /// existing player is returned untouched.
    pub fn add_player(&mut self, id: PlayerId) -> &PlayerState {
        if self.players.contains_key(&id) {
            warn!("Player {} already present, ignoring duplicate add", id);
        } else {
            let (x, y) = self.random_point();
            info!("Added player {} at ({:.1}, {:.1})", id, x, y);
            self.players.insert(
                id,
                PlayerState {
                    id,
                    x,
                    y,
                    direction: Direction::STOP,
                    score: 0,
                },
            );
        }
        &self.players[&id]
    }

    /// Removes a player and returns its final state
    ///
    /// Removing an absent player returns `None` and changes nothing, so both
    /// cleanup paths may call this safely.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<PlayerState> {
        let removed = self.players.remove(&id);
        if let Some(player) = &removed {
            info!("Removed player {} (score {})", id, player.score);
        }
        removed
    }

    /// Sets a player's direction. Returns false when the player is gone,
    /// which happens when input races with disconnect cleanup.
    pub fn apply_input(&mut self, id: PlayerId, direction: Direction) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.direction = direction;
                true
            }
            None => false,
        }
    }

    /// Moves every player `player_speed * dt` along its direction and clamps
    /// the result to the map
    ///
    /// # Panics
    ///
    /// Panics if a position is still outside the map after clamping, which
    /// can only happen with a non-finite position.
    pub fn step(&mut self, dt: f32) {
        let size = self.config.map_size;
        let distance = self.config.player_speed * dt;

        for player in self.players.values_mut() {
            player.x += player.direction.vx() as f32 * distance;
            player.y += player.direction.vy() as f32 * distance;
            player.x = player.x.clamp(0.0, size);
            player.y = player.y.clamp(0.0, size);

            assert!(
                (0.0..=size).contains(&player.x) && (0.0..=size).contains(&player.y),
                "player {} left the map at ({}, {})",
                player.id,
                player.x,
                player.y
            );
        }
    }

    /// Awards each coin to the first player (by ascending id) within pickup
    /// range, then removes awarded coins in a separate pass.
    pub fn resolve_collisions(&mut self) -> Vec<Pickup> {
        let reach = self.config.pickup_distance();
        let reach_sq = reach * reach;
        let mut pickups = Vec::new();

        for coin in &self.coins {
            let winner = self
                .players
                .values_mut()
                .find(|player| player.distance_sq_to(coin.x, coin.y) <= reach_sq);

            if let Some(player) = winner {
                player.score += 1;
                pickups.push(Pickup {
                    coin_id: coin.id,
                    player: player.id,
                });
            }
        }

        if !pickups.is_empty() {
            let collected: HashSet<u64> = pickups.iter().map(|p| p.coin_id).collect();
            self.coins.retain(|coin| !collected.contains(&coin.id));

            for pickup in &pickups {
                info!("Player {} collected coin {}", pickup.player, pickup.coin_id);
            }
        }

        pickups
    }

    /// Rolls the per-tick spawn chance and spawns a coin on success
    pub fn maybe_spawn_coin(&mut self) -> Option<Coin> {
        let probability = self.config.coin_spawn_probability();
        if self.rng.gen_bool(probability) {
            Some(self.spawn_coin())
        } else {
            None
        }
    }

    /// Spawns a coin at a random point on the map
    pub fn spawn_coin(&mut self) -> Coin {
        let (x, y) = self.random_point();
        self.spawn_coin_at(x, y)
    }

    /// Places a coin with the next unused id. Ids are never reused.
    pub fn spawn_coin_at(&mut self, x: f32, y: f32) -> Coin {
        let size = self.config.map_size;
        let coin = Coin {
            id: self.next_coin_id,
            x: x.clamp(0.0, size),
            y: y.clamp(0.0, size),
        };
        self.next_coin_id += 1;
        self.coins.push(coin);
        debug!("Spawned coin {} at ({:.1}, {:.1})", coin.id, coin.x, coin.y);
        coin
    }

    /// Copies players and coins into a detached wire view
    ///
    /// The result holds no references into the world, so it can be encoded
    /// after the lock is released.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            players: self
                .players
                .iter()
                .map(|(id, player)| (*id, player.view()))
                .collect(),
            coins: self
                .coins
                .iter()
                .map(|coin| CoinView {
                    id: coin.id,
                    x: coin.x,
                    y: coin.y,
                })
                .collect(),
        }
    }

    fn random_point(&mut self) -> (f32, f32) {
        let size = self.config.map_size;
        (
            self.rng.gen_range(0.0..=size),
            self.rng.gen_range(0.0..=size),
        )
    }
}
