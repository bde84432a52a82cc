use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use tokio::sync::Semaphore;

/// Top-level configuration settings for the application.
///
/// Includes settings for the listeners, the broker and logging.
#[derive(Debug, Default, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Where the broker listens.
///
/// The line protocol always binds `host:port`; the WebSocket listener is
/// only started when `websocket_port` is set.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub websocket_port: Option<u16>,
}

/// Configuration settings for the broker.
///
/// Bounds the number of live connections and how much a slow subscriber is
/// allowed to fall behind before it is disconnected.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub max_connections: usize,
    pub outbound_queue_capacity: usize,
    pub write_timeout_ms: u64,
    pub max_frame_bytes: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub websocket_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub outbound_queue_capacity: Option<usize>,
    pub write_timeout_ms: Option<u64>,
    pub max_frame_bytes: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

impl ServerSettings {
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn websocket_addr(&self) -> Option<String> {
        self.websocket_port
            .map(|port| format!("{}:{}", self.host, port))
    }
}

impl BrokerSettings {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Rejects limits the runtime cannot honour. Both the connection limit
    /// and the queue capacity become semaphore permits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = [
            ("broker.max_connections", self.max_connections),
            ("broker.outbound_queue_capacity", self.outbound_queue_capacity),
        ];

        for (key, value) in limits {
            if value == 0 || value > Semaphore::MAX_PERMITS {
                return Err(ConfigError::Message(format!(
                    "{key} must be between 1 and {}, got {value}",
                    Semaphore::MAX_PERMITS
                )));
            }
        }
        Ok(())
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            websocket_port: None,
        }
    }
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            outbound_queue_capacity: 256,
            write_timeout_ms: 5000,
            max_frame_bytes: 64 * 1024,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge_over(self, defaults: Settings) -> Settings {
        let server = self.server;
        let broker = self.broker;
        let logging = self.logging;

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .unwrap_or(defaults.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(defaults.server.port),
                websocket_port: server
                    .as_ref()
                    .and_then(|s| s.websocket_port)
                    .or(defaults.server.websocket_port),
            },
            broker: BrokerSettings {
                max_connections: broker
                    .as_ref()
                    .and_then(|b| b.max_connections)
                    .unwrap_or(defaults.broker.max_connections),
                outbound_queue_capacity: broker
                    .as_ref()
                    .and_then(|b| b.outbound_queue_capacity)
                    .unwrap_or(defaults.broker.outbound_queue_capacity),
                write_timeout_ms: broker
                    .as_ref()
                    .and_then(|b| b.write_timeout_ms)
                    .unwrap_or(defaults.broker.write_timeout_ms),
                max_frame_bytes: broker
                    .as_ref()
                    .and_then(|b| b.max_frame_bytes)
                    .unwrap_or(defaults.broker.max_frame_bytes),
            },
            logging: LoggingSettings {
                level: logging
                    .and_then(|l| l.level)
                    .unwrap_or(defaults.logging.level),
            },
        }
    }
}
