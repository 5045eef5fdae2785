use crate::error::ConfigError;
use crate::world::WorldConfig;
use shared::DEFAULT_PORT;
use std::time::Duration;

/// Everything needed to start a server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub world: WorldConfig,
    /// Artificial delay applied to every inbound and outbound frame
    pub latency: Duration,
    /// Frames buffered per connection before broadcasts start skipping it
    pub outbound_capacity: usize,
    /// Fixed RNG seed for reproducible spawns
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            world: WorldConfig::default(),
            latency: Duration::ZERO,
            outbound_capacity: 64,
            seed: None,
        }
    }
}

impl ServerConfig {
    /// `host:port` string passed to the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the world tuning and the outbound queue capacity
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        if self.outbound_capacity == 0 {
            return Err(ConfigError::QueueCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
        assert_eq!(config.latency, Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = ServerConfig {
            outbound_capacity: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::QueueCapacity));
    }

    #[test]
    fn test_validate_checks_world() {
        let mut config = ServerConfig::default();
        config.world.tick_rate = 0;
        assert_eq!(config.validate(), Err(ConfigError::TickRate(0)));
    }

    #[test]
    fn test_bind_addr_ipv6() {
        let config = ServerConfig {
            host: "[::1]".to_string(),
            port: 9000,
            ..ServerConfig::default()
        };
        assert!(config.bind_addr().parse::<std::net::SocketAddr>().is_ok());
    }
}
