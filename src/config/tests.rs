use std::io::Write;

use serial_test::serial;
use tokio::sync::Semaphore;

use super::{BrokerSettings, Settings, load_config, load_config_from};

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8000);
    assert_eq!(settings.server.websocket_port, None);
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.broker.outbound_queue_capacity, 256);
    assert_eq!(settings.broker.write_timeout_ms, 5000);
    assert_eq!(settings.broker.max_frame_bytes, 65536);
    assert_eq!(settings.logging.level, "info");
}

#[test]
fn test_addresses() {
    let mut settings = Settings::default();
    assert_eq!(settings.server.tcp_addr(), "127.0.0.1:8000");
    assert_eq!(settings.server.websocket_addr(), None);

    settings.server.websocket_port = Some(8001);
    assert_eq!(
        settings.server.websocket_addr().as_deref(),
        Some("127.0.0.1:8001")
    );
}

#[test]
#[serial]
fn test_default_file_matches_defaults() {
    let settings = load_config().unwrap();
    assert_eq!(settings, Settings::default());
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let stem = dir.path().join("absent");

    assert!(load_config_from(stem.to_str().unwrap()).is_err());
}

#[test]
#[serial]
fn test_partial_file_is_merged_over_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hubsub.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "[server]\nport = 9000\nwebsocket_port = 9001\n\n[broker]\noutbound_queue_capacity = 8"
    )
    .unwrap();

    let settings = load_config_from(path.to_str().unwrap()).unwrap();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 9000);
    assert_eq!(settings.server.websocket_port, Some(9001));
    assert_eq!(settings.broker.outbound_queue_capacity, 8);
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.logging.level, "info");
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hubsub.toml");
    std::fs::write(&path, "[server]\nport = 9000\n").unwrap();

    temp_env::with_vars(
        [
            ("HUBSUB_SERVER__PORT", Some("9100")),
            ("HUBSUB_BROKER__MAX_CONNECTIONS", Some("5")),
            ("HUBSUB_LOGGING__LEVEL", Some("debug")),
        ],
        || {
            let settings = load_config_from(path.to_str().unwrap()).unwrap();
            assert_eq!(settings.server.port, 9100);
            assert_eq!(settings.broker.max_connections, 5);
            assert_eq!(settings.logging.level, "debug");
        },
    );
}

fn empty_config_file(dir: &tempfile::TempDir) -> String {
    let path = dir.path().join("hubsub.toml");
    std::fs::write(&path, "").unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
#[serial]
fn test_invalid_value_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = empty_config_file(&dir);

    temp_env::with_var("HUBSUB_SERVER__PORT", Some("not-a-port"), || {
        assert!(load_config_from(&path).is_err());
    });
}

#[test]
#[serial]
fn test_zero_queue_capacity_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = empty_config_file(&dir);

    temp_env::with_var("HUBSUB_BROKER__OUTBOUND_QUEUE_CAPACITY", Some("0"), || {
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("broker.outbound_queue_capacity"));
    });
}

#[test]
#[serial]
fn test_connection_limit_above_permit_maximum_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = empty_config_file(&dir);
    let too_many = (Semaphore::MAX_PERMITS + 1).to_string();

    temp_env::with_var("HUBSUB_BROKER__MAX_CONNECTIONS", Some(too_many.as_str()), || {
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("broker.max_connections"));
    });
}

#[test]
fn test_validate_accepts_defaults() {
    assert!(BrokerSettings::default().validate().is_ok());
    let none = BrokerSettings {
        max_connections: 0,
        ..BrokerSettings::default()
    };
    assert!(none.validate().is_err());
}
