use crate::input::{parse_command, HELP};
use crate::rendering::render_state;
use futures_util::{SinkExt, StreamExt};
use log::{info, warn};
use shared::{codec, ClientMessage, Direction, ServerMessage, StateSnapshot};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// WebSocket connection to a game server
///
/// `fake_ping_ms` simulates a round trip: half of it is spent before each
/// send and half after each received snapshot.
pub struct Client {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    fake_ping_ms: u64,
}

impl Client {
    /// Connects to a server URL such as `ws://127.0.0.1:8000`
    pub async fn connect(url: &str, fake_ping_ms: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let (socket, _) = connect_async(url).await?;
        info!("Connected to {}", url);

        Ok(Client {
            socket,
            fake_ping_ms,
        })
    }

    async fn fake_delay(&self) {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }
    }

    /// Sends an `input` message for `direction`
    pub async fn send_direction(
        &mut self,
        direction: Direction,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.send_message(&ClientMessage::input(direction)).await
    }

    /// Encodes and sends any client message
    pub async fn send_message(
        &mut self,
        message: &ClientMessage,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.send_text(codec::encode(message)?).await
    }

    /// Sends a raw text frame, bypassing the codec
    pub async fn send_text(&mut self, text: String) -> Result<(), Box<dyn std::error::Error>> {
        self.fake_delay().await;
        self.socket.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Waits for the next world snapshot. Returns `None` once the server
    /// closes the connection.
    pub async fn next_state(&mut self) -> Result<Option<StateSnapshot>, Box<dyn std::error::Error>> {
        let state = self.read_state().await?;
        self.fake_delay().await;
        Ok(state)
    }

    /// Reads until a snapshot arrives, without the simulated delay.
    ///
    /// Only awaits the socket itself, so dropping this future between
    /// messages loses nothing.
    async fn read_state(&mut self) -> Result<Option<StateSnapshot>, Box<dyn std::error::Error>> {
        while let Some(message) = self.socket.next().await {
            let text = match message? {
                Message::Text(text) => text,
                Message::Close(_) => return Ok(None),
                _ => continue,
            };

            match codec::decode::<ServerMessage>(&text) {
                Ok(ServerMessage::State(snapshot)) => return Ok(Some(snapshot)),
                Err(e) => warn!("Ignoring undecodable server message: {}", e),
            }
        }
        Ok(None)
    }

    /// Starts the close handshake; errors are only logged
    pub async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            warn!("Error closing connection: {}", e);
        }
    }

    /// Reads commands from stdin and prints every snapshot until the user
    /// quits or the server goes away
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        println!("{}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    match parse_command(&line) {
                        Some(direction) => self.send_direction(direction).await?,
                        None => break,
                    }
                },
                // A stdin line may cancel the read, so the delay runs here
                state = self.read_state() => {
                    let state = state?;
                    self.fake_delay().await;
                    match state {
                        Some(snapshot) => println!("{}", render_state(&snapshot)),
                        None => {
                            info!("Server closed the connection");
                            return Ok(());
                        }
                    }
                },
            }
        }

        self.close().await;
        Ok(())
    }
}
