//! Per-connection receive loop

use crate::session::SessionGuard;
use crate::world::WorldState;
use futures_util::{Stream, StreamExt};
use log::{debug, warn};
use parking_lot::Mutex;
use shared::{codec, ClientMessage, Direction, PlayerId};
use std::time::Duration;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// What one inbound transport event means to the handler
#[derive(Debug, PartialEq)]
enum Inbound {
    Text(String),
    /// Control frames and undecodable payloads; the loop carries on
    Skip,
    Closed,
}

fn classify(item: Option<Result<Message, WsError>>) -> Inbound {
    match item {
        Some(Ok(Message::Text(text))) => Inbound::Text(text),
        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
            Ok(text) => Inbound::Text(text),
            Err(_) => Inbound::Skip,
        },
        Some(Ok(Message::Close(_))) | None => Inbound::Closed,
        Some(Ok(_)) => Inbound::Skip,
        Some(Err(WsError::Utf8)) | Some(Err(WsError::Capacity(_))) => Inbound::Skip,
        Some(Err(e)) => {
            debug!("Treating receive error as closure: {}", e);
            Inbound::Closed
        }
    }
}

/// Outcome of handling one decoded text frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Applied(Direction),
    /// Decoded, but a component was outside `{-1, 0, 1}`
    OutOfRange,
    Malformed,
    /// The player was already removed by broadcast cleanup
    Stale,
}

/// Decodes one text frame and applies it to `player`
///
/// Malformed and out-of-range messages are logged and dropped; the world is
/// left unchanged.
pub fn handle_message(world: &Mutex<WorldState>, player: PlayerId, text: &str) -> InputOutcome {
    let message = match codec::decode::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping malformed message from player {}: {}", player, e);
            return InputOutcome::Malformed;
        }
    };

    match message {
        ClientMessage::Input { vx, vy } => {
            let Some(direction) = Direction::new(vx, vy) else {
                warn!(
                    "Dropping out-of-range input ({}, {}) from player {}",
                    vx, vy, player
                );
                return InputOutcome::OutOfRange;
            };

            if world.lock().apply_input(player, direction) {
                InputOutcome::Applied(direction)
            } else {
                InputOutcome::Stale
            }
        }
    }
}

/// Runs until the connection closes, then releases the session by dropping
/// the guard.
pub async fn run<S>(guard: SessionGuard, mut inbound: S, latency: Duration)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let player = guard.player();

    loop {
        let item = inbound.next().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match classify(item) {
            Inbound::Text(text) => {
                handle_message(guard.world(), player, &text);
            }
            Inbound::Skip => {}
            Inbound::Closed => break,
        }
    }

    debug!("Receive loop for player {} finished", player);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Connection, ConnectionId, SessionRegistry};
    use crate::world::{SharedWorld, WorldConfig};
    use futures_util::stream;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_test::{assert_pending, assert_ready, task};

    fn test_world() -> SharedWorld {
        WorldState::with_seed(WorldConfig::default(), 11).into_shared()
    }

    fn text(s: &str) -> Result<Message, WsError> {
        Ok(Message::Text(s.to_string()))
    }

    fn open_session(
        registry: &Arc<SessionRegistry>,
        world: &SharedWorld,
    ) -> (SessionGuard, mpsc::Receiver<crate::session::Frame>) {
        let (tx, rx) = mpsc::channel(4);
        let conn = Connection::new(ConnectionId(1), "127.0.0.1:9000".parse().unwrap(), tx);
        let guard = SessionGuard::open(Arc::clone(registry), Arc::clone(world), conn);
        (guard, rx)
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Some(text("hi"))), Inbound::Text("hi".into()));
        assert_eq!(
            classify(Some(Ok(Message::Binary(b"{}".to_vec())))),
            Inbound::Text("{}".into())
        );
        assert_eq!(
            classify(Some(Ok(Message::Binary(vec![0xff, 0xfe])))),
            Inbound::Skip
        );
        assert_eq!(classify(Some(Ok(Message::Ping(vec![1])))), Inbound::Skip);
        assert_eq!(classify(Some(Ok(Message::Close(None)))), Inbound::Closed);
        assert_eq!(classify(Some(Err(WsError::ConnectionClosed))), Inbound::Closed);
        assert_eq!(classify(Some(Err(WsError::Utf8))), Inbound::Skip);
        assert_eq!(classify(None), Inbound::Closed);
    }

    #[test]
    fn test_handle_valid_input() {
        let world = test_world();
        let player = PlayerId(1);
        world.lock().add_player(player);

        let outcome = handle_message(&world, player, r#"{"type":"input","vx":-1,"vy":1}"#);

        let expected = Direction::new(-1, 1).unwrap();
        assert_eq!(outcome, InputOutcome::Applied(expected));
        assert_eq!(world.lock().player(player).unwrap().direction, expected);
    }

    #[test]
    fn test_handle_out_of_range_input() {
        let world = test_world();
        let player = PlayerId(1);
        world.lock().add_player(player);
        handle_message(&world, player, r#"{"type":"input","vx":1,"vy":0}"#);

        let outcome = handle_message(&world, player, r#"{"type":"input","vx":5,"vy":0}"#);

        assert_eq!(outcome, InputOutcome::OutOfRange);
        assert_eq!(
            world.lock().player(player).unwrap().direction,
            Direction::new(1, 0).unwrap()
        );
    }

    #[test]
    fn test_handle_malformed_input() {
        let world = test_world();
        let player = PlayerId(1);
        world.lock().add_player(player);

        for bad in ["", "nope", r#"{"type":"input","vx":"1"}"#, r#"{"type":"jump"}"#] {
            assert_eq!(handle_message(&world, player, bad), InputOutcome::Malformed);
        }
        assert_eq!(world.lock().player(player).unwrap().direction, Direction::STOP);
    }

    #[test]
    fn test_handle_input_for_removed_player() {
        let world = test_world();

        let outcome = handle_message(&world, PlayerId(42), r#"{"type":"input","vx":0,"vy":1}"#);

        assert_eq!(outcome, InputOutcome::Stale);
        assert!(world.lock().players().is_empty());
    }

    #[tokio::test]
    async fn test_run_survives_bad_messages_and_cleans_up() {
        let registry = Arc::new(SessionRegistry::new());
        let world = test_world();
        let (guard, _rx) = open_session(&registry, &world);
        let player = guard.player();

        let inbound = stream::iter(vec![
            text("garbage"),
            text(r#"{"type":"input","vx":9,"vy":9}"#),
            Ok(Message::Pong(vec![])),
            text(r#"{"type":"input","vx":0,"vy":-1}"#),
        ]);

        run(guard, inbound, Duration::ZERO).await;

        assert!(world.lock().player(player).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_run_applies_input_before_close() {
        let registry = Arc::new(SessionRegistry::new());
        let world = test_world();
        let (guard, _rx) = open_session(&registry, &world);
        let player = guard.player();

        let (tx, rx) = mpsc::unbounded_channel();
        let mut task = task::spawn(run(guard, tokio_stream_from(rx), Duration::ZERO));

        tx.send(text(r#"{"type":"input","vx":1,"vy":0}"#)).unwrap();
        assert_pending!(task.poll());
        assert_eq!(
            world.lock().player(player).unwrap().direction,
            Direction::new(1, 0).unwrap()
        );

        drop(tx);
        assert!(task.is_woken());
        assert_ready!(task.poll());
        assert!(world.lock().player(player).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_run_after_prune_does_not_double_remove() {
        let registry = Arc::new(SessionRegistry::new());
        let world = test_world();
        let (guard, _rx) = open_session(&registry, &world);
        let player = guard.player();
        let other = PlayerId(99);
        world.lock().add_player(other);

        registry.release(ConnectionId(1), &world);
        let inbound = stream::iter(vec![text(r#"{"type":"input","vx":1,"vy":1}"#)]);
        run(guard, inbound, Duration::ZERO).await;

        let world = world.lock();
        assert!(world.player(player).is_none());
        assert!(world.player(other).is_some());
    }

    fn tokio_stream_from(
        mut rx: mpsc::UnboundedReceiver<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        Box::pin(stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }
}
