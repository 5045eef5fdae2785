use thiserror::Error;

/// Rejected gameplay or transport settings.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tick rate must be at least 1 (got {0})")]
    TickRate(u32),
    #[error("{name} must be a positive finite number (got {value})")]
    NotPositive { name: &'static str, value: f32 },
    #[error("outbound queue capacity must be at least 1")]
    QueueCapacity,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
