//! Server configuration

use std::time::Duration;

pub const DEFAULT_SIGNALING_PORT: u16 = 3000;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);
const COMMAND_BUFFER: usize = 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to
    pub bind_addr: String,
    /// Interval between keep-alive pings on each connection
    pub ping_interval: Duration,
    /// How long a connection may go without answering a ping
    pub pong_timeout: Duration,
    /// Capacity of the router actor's command queue
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_SIGNALING_PORT),
            ping_interval: PING_INTERVAL,
            pong_timeout: PONG_TIMEOUT,
            command_buffer: COMMAND_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Build from process arguments: the first positional argument, if any,
    /// replaces the bind address.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Self {
        let mut config = Self::default();
        if let Some(addr) = args.into_iter().nth(1) {
            config.bind_addr = addr;
        }
        config
    }

    pub fn with_bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_all_interfaces() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.ping_interval, Duration::from_secs(30));
    }

    #[test]
    fn first_argument_overrides_bind_addr() {
        let args = vec!["rendezvous".to_string(), "127.0.0.1:9000".to_string()];
        assert_eq!(ServerConfig::from_args(args).bind_addr, "127.0.0.1:9000");
    }

    #[test]
    fn program_name_alone_keeps_default() {
        let args = vec!["rendezvous".to_string()];
        assert_eq!(ServerConfig::from_args(args).bind_addr, "0.0.0.0:3000");
    }
}
