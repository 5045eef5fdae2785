use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use server::world::WorldConfig;
use shared::{COIN_RADIUS, DEFAULT_PORT, MAP_SIZE, PLAYER_RADIUS, PLAYER_SPEED, TICK_RATE};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = TICK_RATE)]
    tick_rate: u32,

    /// Side length of the square map
    #[arg(long, default_value_t = MAP_SIZE)]
    map_size: f32,

    /// Player speed in units per second
    #[arg(long, default_value_t = PLAYER_SPEED)]
    player_speed: f32,

    #[arg(long, default_value_t = PLAYER_RADIUS)]
    player_radius: f32,

    #[arg(long, default_value_t = COIN_RADIUS)]
    coin_radius: f32,

    /// Simulate network latency in milliseconds on every frame
    #[arg(short = 'l', long, default_value = "0")]
    latency_ms: u64,

    /// Seed for spawn positions
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            port: self.port,
            world: WorldConfig {
                tick_rate: self.tick_rate,
                map_size: self.map_size,
                player_speed: self.player_speed,
                player_radius: self.player_radius,
                coin_radius: self.coin_radius,
                ..WorldConfig::default()
            },
            latency: Duration::from_millis(self.latency_ms),
            seed: self.seed,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let server = Server::bind(args.into_config()).await?;

    server
        .run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                Err(e) => {
                    error!("Unable to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        })
        .await?;

    Ok(())
}
