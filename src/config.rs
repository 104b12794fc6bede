//! # Configuration Management
//!
//! Centralized configuration for the game protocol server.
//!
//! ## Configuration Sources
//! - TOML files via [`ProtocolConfig::from_file`]
//! - Direct instantiation with defaults
//! - Environment overrides via [`ProtocolConfig::from_env`] (`GAME_PROTOCOL_*`)
//!
//! ## Wire Limits
//! The packet limits below are properties of the client, not tunables: a
//! frame larger than [`MAX_PACKET_SIZE`] crashes it. The configurable
//! `max_packet_size` may only lower the limit.

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Largest frame the client accepts, framing included
pub const MAX_PACKET_SIZE: usize = 2048;

/// `[len][opcode][reserved]`
pub const TCP_HEADER_SIZE: usize = 4;

/// `[len][sequence][opcode][reserved]`
pub const UDP_HEADER_SIZE: usize = 6;

/// Largest payload that still fits a frame on either transport
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - UDP_HEADER_SIZE;

/// Number of packets kept per session for post-mortem logging
pub const PACKET_HISTORY_SIZE: usize = 16;

/// Default coalescing buffer per transport
pub const DEFAULT_SEND_BUFFER_SIZE: usize = 2048;

/// UDP is considered lost after this long without a ping while in world
pub const UDP_CONFIRM_TIMEOUT: Duration = Duration::from_secs(24);

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProtocolConfig {
    /// Listener and identity settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Framing, queueing and UDP settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("GAME_PROTOCOL_TCP_ADDRESS") {
            config.server.tcp_address = addr;
        }

        if let Ok(addr) = std::env::var("GAME_PROTOCOL_UDP_ADDRESS") {
            config.server.udp_address = Some(addr);
        }

        if let Ok(name) = std::env::var("GAME_PROTOCOL_SERVER_NAME") {
            config.server.server_name = name;
        }

        if let Ok(size) = std::env::var("GAME_PROTOCOL_SEND_BUFFER_SIZE") {
            if let Ok(val) = size.parse::<usize>() {
                config.transport.send_buffer_size = val;
            }
        }

        if let Ok(flag) = std::env::var("GAME_PROTOCOL_IGNORE_OVERSIZED_OUTGOING") {
            if let Ok(val) = flag.parse::<bool>() {
                config.transport.ignore_oversized_outgoing = val;
            }
        }

        if let Ok(timeout) = std::env::var("GAME_PROTOCOL_UDP_CONFIRM_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.transport.udp_confirm_timeout = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Non-fatal findings, logged at startup
    pub fn warnings(&self) -> Vec<String> {
        self.transport.warnings()
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Listener and server identity configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// TCP listen address (e.g., "0.0.0.0:10300")
    pub tcp_address: String,

    /// UDP bind address; `None` disables the UDP channel entirely
    pub udp_address: Option<String>,

    /// Maximum number of concurrent connections
    pub max_connections: usize,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Full server name
    pub server_name: String,

    /// Short server name sent in login and position packets
    pub server_name_short: String,

    /// Server id byte sent in login and region packets
    pub server_id: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tcp_address: String::from("127.0.0.1:10300"),
            udp_address: Some(String::from("127.0.0.1:10400")),
            max_connections: 1500,
            shutdown_timeout: Duration::from_secs(10),
            server_name: String::from("Game Server"),
            server_name_short: String::from("GAMESRV"),
            server_id: 0x0C,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.tcp_address.is_empty() {
            errors.push("TCP address cannot be empty".to_string());
        } else if self.tcp_address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid TCP address format: '{}' (expected format: '0.0.0.0:10300')",
                self.tcp_address
            ));
        }

        if let Some(ref udp) = self.udp_address {
            if udp.parse::<std::net::SocketAddr>().is_err() {
                errors.push(format!(
                    "Invalid UDP address format: '{udp}' (expected format: '0.0.0.0:10400')"
                ));
            }
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        } else if self.max_connections > 100_000 {
            errors.push(format!(
                "Max connections very high: {} (ensure system resources can support this)",
                self.max_connections
            ));
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        if self.server_name_short.is_empty() {
            errors.push("Short server name cannot be empty".to_string());
        } else if self.server_name_short.len() > u8::MAX as usize {
            errors.push("Short server name longer than 255 bytes".to_string());
        }

        errors
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Coalescing buffer size per transport; one write never exceeds it
    pub send_buffer_size: usize,

    /// Largest outbound frame accepted (never above 2048)
    pub max_packet_size: usize,

    /// Initial capacity of the per-connection reassembly buffer
    pub receive_buffer_size: usize,

    /// Warn and drop oversized outbound packets instead of disconnecting
    #[serde(default)]
    pub ignore_oversized_outgoing: bool,

    /// Lifetime of a UDP confirmation without a fresh ping
    #[serde(with = "duration_serde")]
    pub udp_confirm_timeout: Duration,

    /// Handlers slower than this are logged
    #[serde(with = "duration_serde")]
    pub slow_handler_threshold: Duration,

    /// Number of send buffers kept warm in the shared pool
    pub buffer_pool_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: DEFAULT_SEND_BUFFER_SIZE,
            max_packet_size: MAX_PACKET_SIZE,
            receive_buffer_size: MAX_PACKET_SIZE,
            ignore_oversized_outgoing: false,
            udp_confirm_timeout: UDP_CONFIRM_TIMEOUT,
            slow_handler_threshold: Duration::from_secs(10),
            buffer_pool_size: 256,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_packet_size == 0 {
            errors.push("Max packet size cannot be 0".to_string());
        } else if self.max_packet_size > MAX_PACKET_SIZE {
            errors.push(format!(
                "Max packet size {} exceeds the client limit of {MAX_PACKET_SIZE} bytes",
                self.max_packet_size
            ));
        }

        if self.send_buffer_size < self.max_packet_size {
            errors.push(format!(
                "Send buffer size {} is smaller than max packet size {}",
                self.send_buffer_size, self.max_packet_size
            ));
        } else if self.send_buffer_size > 1024 * 1024 {
            errors.push(format!(
                "Send buffer size too large: {} bytes (maximum recommended: 1 MB)",
                self.send_buffer_size
            ));
        }

        if self.receive_buffer_size < MAX_PACKET_SIZE {
            errors.push(format!(
                "Receive buffer size too small: {} (minimum: {MAX_PACKET_SIZE})",
                self.receive_buffer_size
            ));
        }

        if self.udp_confirm_timeout.as_millis() < 1000 {
            errors.push("UDP confirm timeout too short (minimum: 1s)".to_string());
        }

        if self.slow_handler_threshold.as_millis() < 10 {
            errors.push("Slow handler threshold too short (minimum: 10ms)".to_string());
        }

        errors
    }

    /// Settings that are valid but loosen protocol enforcement
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.ignore_oversized_outgoing {
            warnings.push(
                "Oversized outgoing packets are dropped instead of disconnecting".to_string(),
            );
        }
        warnings
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Dump the last packets of a session when it fails an integrity check
    pub log_packet_history: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("game-protocol"),
            log_level: Level::INFO,
            json_format: false,
            log_packet_history: true,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
