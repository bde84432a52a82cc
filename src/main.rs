//! CLI for hubsub
//!
//! Subcommands:
//! - `serve`: run the broker
//! - `subscribe`: print every payload published to a topic
//! - `publish`: publish one JSON object to a topic

use clap::{Parser, Subcommand};
use hubsub::broker::Broker;
use hubsub::client::PubSubClient;
use hubsub::config::{Settings, load_config, load_config_from};
use hubsub::transport::message::Payload;
use hubsub::utils::error::BrokerError;
use hubsub::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "hubsub", version, about = "Topic-based publish/subscribe broker")]
struct Cli {
    /// Configuration file to load instead of `config/default`
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace); overrides the configuration
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the broker
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// Also accept WebSocket connections on this port
        #[arg(long)]
        ws_port: Option<u16>,
    },
    /// Subscribe to a topic and print each payload as a JSON line
    Subscribe {
        topic: String,
        /// Broker address (default: the configured host and port)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Publish a JSON object to a topic
    Publish {
        topic: String,
        /// Payload, e.g. '{"headline": "hi"}'
        data: String,
        /// Broker address (default: the configured host and port)
        #[arg(long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    logging::init(cli.log_level.as_deref().unwrap_or(&settings.logging.level));

    let result = match cli.command {
        Command::Serve {
            host,
            port,
            ws_port,
        } => run_server(settings, host, port, ws_port).await,
        Command::Subscribe { topic, addr } => {
            let addr = addr.unwrap_or_else(|| settings.server.tcp_addr());
            run_subscribe(&addr, &topic).await
        }
        Command::Publish { topic, data, addr } => {
            let addr = addr.unwrap_or_else(|| settings.server.tcp_addr());
            run_publish(&addr, &topic, &data).await
        }
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn load_settings(path: Option<&str>) -> Result<Settings, BrokerError> {
    let settings = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(settings)
}

async fn run_server(
    mut settings: Settings,
    host: Option<String>,
    port: Option<u16>,
    ws_port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(host) = host {
        settings.server.host = host;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }
    if ws_port.is_some() {
        settings.server.websocket_port = ws_port;
    }

    let broker = Broker::new(settings.broker.clone());

    tokio::select! {
        result = broker.run(&settings.server) => {
            result?;
            error!("Broker exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
            broker.shutdown();
        }
    }

    Ok(())
}

async fn run_subscribe(addr: &str, topic: &str) -> Result<(), Box<dyn std::error::Error>> {
    let subscription = PubSubClient::new(addr).subscribe(topic).await?;
    info!(topic, addr, "subscribed, waiting for payloads");

    subscription
        .for_each(|payload| println!("{}", serde_json::Value::Object(payload)))
        .await?;
    Ok(())
}

async fn run_publish(addr: &str, topic: &str, data: &str) -> Result<(), Box<dyn std::error::Error>> {
    let payload: Payload = serde_json::from_str(data)?;
    PubSubClient::new(addr).publish(topic, payload).await?;
    info!(topic, addr, "published");
    Ok(())
}
