//! Integration tests for configuration validation

#![allow(clippy::unwrap_used, clippy::expect_used)]

use game_protocol::config::{
    LoggingConfig, ProtocolConfig, ServerConfig, TransportConfig, MAX_PACKET_SIZE,
};
use std::time::Duration;
use tracing::Level;

#[test]
fn test_default_config_validates() {
    let config = ProtocolConfig::default();
    let errors = config.validate();
    assert!(
        errors.is_empty(),
        "Default config should be valid, but got errors: {:?}",
        errors
    );
}

#[test]
fn test_invalid_tcp_address() {
    let mut config = ProtocolConfig::default();
    config.server.tcp_address = "invalid_address".to_string();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid TCP address")));
}

#[test]
fn test_empty_tcp_address() {
    let mut config = ProtocolConfig::default();
    config.server.tcp_address = String::new();

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("cannot be empty")));
}

#[test]
fn test_invalid_udp_address() {
    let mut config = ProtocolConfig::default();
    config.server.udp_address = Some("nowhere".to_string());

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("Invalid UDP address")));
}

#[test]
fn test_udp_disabled_is_valid() {
    let mut config = ProtocolConfig::default();
    config.server.udp_address = None;
    assert!(config.validate().is_empty());
}

#[test]
fn test_zero_max_connections() {
    let mut config = ProtocolConfig::default();
    config.server.max_connections = 0;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Max connections must be greater than 0")));
}

#[test]
fn test_short_name_too_long() {
    let mut config = ProtocolConfig::default();
    config.server.server_name_short = "x".repeat(300);

    let errors = config.validate();
    assert!(errors.iter().any(|e| e.contains("longer than 255")));
}

#[test]
fn test_packet_size_above_client_limit() {
    let mut config = ProtocolConfig::default();
    config.transport.max_packet_size = MAX_PACKET_SIZE + 1;
    config.transport.send_buffer_size = 4096;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("exceeds the client limit")));
}

#[test]
fn test_send_buffer_smaller_than_packet() {
    let mut config = ProtocolConfig::default();
    config.transport.send_buffer_size = 1500;

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("smaller than max packet size")));
}

#[test]
fn test_short_udp_confirm_timeout() {
    let mut config = ProtocolConfig::default();
    config.transport.udp_confirm_timeout = Duration::from_millis(200);

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("UDP confirm timeout too short")));
}

#[test]
fn test_ignore_oversized_warning() {
    let mut config = ProtocolConfig::default();
    config.transport.ignore_oversized_outgoing = true;

    assert!(config.validate().is_empty());
    assert!(config.validate_strict().is_ok());
    assert!(config
        .warnings()
        .iter()
        .any(|w| w.contains("Oversized outgoing")));
    assert!(ProtocolConfig::default().warnings().is_empty());
}

#[test]
fn test_empty_app_name() {
    let mut config = ProtocolConfig::default();
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(errors
        .iter()
        .any(|e| e.contains("Application name cannot be empty")));
}

#[test]
fn test_validate_strict_with_invalid_config() {
    let mut config = ProtocolConfig::default();
    config.server.tcp_address = String::new();

    let err = config.validate_strict().unwrap_err();
    assert!(err.to_string().contains("Configuration validation failed"));
}

#[test]
fn test_multiple_validation_errors() {
    let mut config = ProtocolConfig::default();
    config.server.tcp_address = String::new();
    config.server.max_connections = 0;
    config.transport.max_packet_size = 0;
    config.logging.app_name = String::new();

    let errors = config.validate();
    assert!(
        errors.len() >= 4,
        "Expected at least 4 errors, got {}: {:?}",
        errors.len(),
        errors
    );
}

#[test]
fn test_toml_round_trip_keeps_durations() {
    let config = ProtocolConfig::default_with_overrides(|c| {
        c.transport.udp_confirm_timeout = Duration::from_secs(30);
        c.logging.log_level = Level::DEBUG;
    });
    let text = toml::to_string_pretty(&config).unwrap();
    assert!(text.contains("udp_confirm_timeout = 30000"));

    let parsed = ProtocolConfig::from_toml(&text).unwrap();
    assert_eq!(parsed.transport.udp_confirm_timeout, Duration::from_secs(30));
    assert_eq!(parsed.logging.log_level, Level::DEBUG);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = ProtocolConfig::from_toml(
        r#"
        [logging]
        app_name = "realm-1"
        log_level = "warn"
        json_format = true
        log_packet_history = false
        "#,
    )
    .unwrap();
    assert_eq!(config.logging.app_name, "realm-1");
    assert_eq!(config.logging.log_level, Level::WARN);
    assert_eq!(config.transport.max_packet_size, MAX_PACKET_SIZE);
}

#[test]
fn test_bad_log_level_rejected() {
    let err = ProtocolConfig::from_toml(
        r#"
        [logging]
        app_name = "x"
        log_level = "loud"
        json_format = false
        log_packet_history = true
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("Failed to parse TOML"));
}

#[test]
fn test_valid_production_config() {
    let config = ProtocolConfig {
        server: ServerConfig {
            tcp_address: "0.0.0.0:10300".to_string(),
            udp_address: Some("0.0.0.0:10400".to_string()),
            max_connections: 3000,
            shutdown_timeout: Duration::from_secs(15),
            server_name: "Camelot".to_string(),
            server_name_short: "CAMELOT".to_string(),
            server_id: 0x0C,
        },
        transport: TransportConfig {
            send_buffer_size: 16 * 1024,
            max_packet_size: MAX_PACKET_SIZE,
            receive_buffer_size: 8 * 1024,
            ignore_oversized_outgoing: false,
            udp_confirm_timeout: Duration::from_secs(24),
            slow_handler_threshold: Duration::from_millis(500),
            buffer_pool_size: 512,
        },
        logging: LoggingConfig {
            app_name: "camelot".to_string(),
            log_level: Level::INFO,
            json_format: true,
            log_packet_history: true,
        },
    };

    let errors = config.validate();
    assert!(errors.is_empty(), "Production config should be valid, got: {:?}", errors);
}

#[test]
fn test_example_config_parses_back() {
    let example = ProtocolConfig::example_config();
    let parsed = ProtocolConfig::from_toml(&example).unwrap();
    assert!(parsed.validate().is_empty());
    assert_eq!(parsed.transport.max_packet_size, MAX_PACKET_SIZE);
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!("game-protocol-{}.toml", std::process::id()));
    let config = ProtocolConfig::default_with_overrides(|c| {
        c.server.server_name_short = "TESTREALM".to_string();
        c.server.server_id = 0x21;
    });
    config.save_to_file(&path).unwrap();

    let loaded = ProtocolConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded.server.server_name_short, "TESTREALM");
    assert_eq!(loaded.server.server_id, 0x21);
}

#[test]
fn test_missing_file_is_config_error() {
    let err = ProtocolConfig::from_file("/definitely/not/here.toml").unwrap_err();
    assert!(err.to_string().contains("Failed to open config file"));
}

#[test]
fn test_env_overrides() {
    std::env::set_var("GAME_PROTOCOL_UDP_CONFIRM_TIMEOUT_MS", "40000");
    std::env::set_var("GAME_PROTOCOL_IGNORE_OVERSIZED_OUTGOING", "true");
    let config = ProtocolConfig::from_env().unwrap();
    std::env::remove_var("GAME_PROTOCOL_UDP_CONFIRM_TIMEOUT_MS");
    std::env::remove_var("GAME_PROTOCOL_IGNORE_OVERSIZED_OUTGOING");

    assert_eq!(config.transport.udp_confirm_timeout, Duration::from_secs(40));
    assert!(config.transport.ignore_oversized_outgoing);
}

#[test]
fn test_logging_installs_once() {
    let config = LoggingConfig::default();
    game_protocol::utils::logging::init_logging(&config).unwrap();
    assert!(game_protocol::utils::logging::init_logging(&config).is_err());
}
