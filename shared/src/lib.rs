use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub mod codec;

pub const TICK_RATE: u32 = 30;
pub const MAP_SIZE: f32 = 500.0;
pub const PLAYER_SPEED: f32 = 120.0;
pub const PLAYER_RADIUS: f32 = 20.0;
pub const COIN_RADIUS: f32 = 12.0;
/// Expected seconds between coin spawns, independent of tick rate.
pub const COIN_SPAWN_SECS: f32 = 5.0;
pub const DEFAULT_PORT: u16 = 8000;

/// Server-issued player identity. Appears as a decimal string in snapshot maps.
///
/// Deserializes from either a number or a decimal string. Map keys inside a
/// tagged message are buffered by serde and reach the visitor as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PlayerIdVisitor;

        impl<'de> Visitor<'de> for PlayerIdVisitor {
            type Value = PlayerId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a player id as an integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<PlayerId, E> {
                u32::try_from(v)
                    .map(PlayerId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<PlayerId, E> {
                u32::try_from(v)
                    .map(PlayerId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PlayerId, E> {
                v.parse::<u32>()
                    .map(PlayerId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(PlayerIdVisitor)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit movement direction with each axis in `{-1, 0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Direction {
    vx: i8,
    vy: i8,
}

impl Direction {
    pub const STOP: Direction = Direction { vx: 0, vy: 0 };

    /// Returns `None` when either component is outside `{-1, 0, 1}`.
    pub fn new(vx: i32, vy: i32) -> Option<Self> {
        let axis = |v: i32| match v {
            -1 | 0 | 1 => Some(v as i8),
            _ => None,
        };
        Some(Self {
            vx: axis(vx)?,
            vy: axis(vy)?,
        })
    }

    pub fn vx(&self) -> i8 {
        self.vx
    }

    pub fn vy(&self) -> i8 {
        self.vy
    }
}

/// Messages sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Input { vx: i32, vy: i32 },
}

impl ClientMessage {
    pub fn input(direction: Direction) -> Self {
        ClientMessage::Input {
            vx: direction.vx as i32,
            vy: direction.vy as i32,
        }
    }
}

/// Messages sent from the server to every client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    State(StateSnapshot),
}

/// Point-in-time copy of the whole world as clients see it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub players: BTreeMap<PlayerId, PlayerView>,
    pub coins: Vec<CoinView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub vx: i32,
    pub vy: i32,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinView {
    pub id: u64,
    pub x: f32,
    pub y: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_direction_accepts_unit_components() {
        for vx in -1..=1 {
            for vy in -1..=1 {
                let dir = Direction::new(vx, vy).unwrap();
                assert_eq!(dir.vx() as i32, vx);
                assert_eq!(dir.vy() as i32, vy);
            }
        }
    }

    #[test]
    fn test_direction_rejects_out_of_range() {
        assert!(Direction::new(2, 0).is_none());
        assert!(Direction::new(0, -2).is_none());
        assert!(Direction::new(i32::MAX, i32::MIN).is_none());
    }

    #[test]
    fn test_input_message_wire_shape() {
        let msg = ClientMessage::input(Direction::new(-1, 1).unwrap());
        let json = codec::encode(&msg).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "input");
        assert_eq!(value["vx"], -1);
        assert_eq!(value["vy"], 1);
    }

    #[test]
    fn test_state_message_wire_shape() {
        let mut snapshot = StateSnapshot::default();
        snapshot.players.insert(
            PlayerId(7),
            PlayerView {
                x: 10.5,
                y: 20.0,
                vx: 1,
                vy: 0,
                score: 3,
            },
        );
        snapshot.coins.push(CoinView {
            id: 1,
            x: 100.0,
            y: 200.0,
        });

        let json = codec::encode(&ServerMessage::State(snapshot)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["type"], "state");
        assert_eq!(value["players"]["7"]["score"], 3);
        assert_eq!(value["players"]["7"]["vx"], 1);
        assert_approx_eq!(value["players"]["7"]["x"].as_f64().unwrap(), 10.5, 1e-6);
        assert_eq!(value["coins"][0]["id"], 1);
    }

    #[test]
    fn test_state_message_decodes_string_keys() {
        let json = r#"{"type":"state","players":{"12":{"x":1.0,"y":2.0,"vx":0,"vy":-1,"score":0}},"coins":[]}"#;
        let ServerMessage::State(snapshot) = codec::decode::<ServerMessage>(json).unwrap();

        let player = snapshot.players.get(&PlayerId(12)).unwrap();
        assert_eq!(player.vy, -1);
        assert!(snapshot.coins.is_empty());
    }

    #[test]
    fn test_state_message_survives_encode_decode() {
        let mut snapshot = StateSnapshot::default();
        for (id, score) in [(1, 0), (2, 4), (10, 1)] {
            snapshot.players.insert(
                PlayerId(id),
                PlayerView {
                    x: 50.0,
                    y: 75.5,
                    vx: -1,
                    vy: 0,
                    score,
                },
            );
        }
        snapshot.coins.push(CoinView {
            id: 3,
            x: 1.0,
            y: 2.0,
        });

        let json = codec::encode(&ServerMessage::State(snapshot.clone())).unwrap();
        let decoded = codec::decode::<ServerMessage>(&json).unwrap();

        assert_eq!(decoded, ServerMessage::State(snapshot));
    }

    #[test]
    fn test_player_id_rejects_bad_keys() {
        for bad in [r#""abc""#, r#""-1""#, "4294967296", "-3"] {
            assert!(serde_json::from_str::<PlayerId>(bad).is_err(), "{}", bad);
        }
        assert_eq!(serde_json::from_str::<PlayerId>("9").unwrap(), PlayerId(9));
        assert_eq!(serde_json::from_str::<PlayerId>(r#""9""#).unwrap(), PlayerId(9));
    }
}
