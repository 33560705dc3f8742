//! Horizon binary entry point.
//!
//! Usage: horizon [--url <wss://...>] [--token <token>] [--config <file>]
//!
//! Reads one event per line from stdin and delivers it through the client:
//!
//! ```text
//! {"event": "episode_played", "properties": {"speed": 1.5}}
//! {"event": "app_opened", "timestamp": "2024-01-15T10:30:00Z"}
//! :signin | :signout | :status
//! ```

use chrono::{DateTime, Utc};
use clap::Parser;
use event_horizon::{
    HorizonClient, HorizonConfig, HorizonError, HorizonResult, Properties, PropertyValue,
    StaticToken, TokenSource, WsTransport,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info, warn};

/// Horizon: deliver analytics events to a collector over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "horizon")]
#[command(about = "Best-effort analytics event delivery over a persistent WebSocket")]
struct Args {
    /// Collector WebSocket URL.
    #[arg(long, env = "HORIZON_URL")]
    url: Option<String>,

    /// Auth token appended to the collector URL.
    #[arg(long, env = "HORIZON_TOKEN")]
    token: Option<String>,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start signed out; use `:signin` to connect.
    #[arg(long)]
    signed_out: bool,

    /// Seconds to keep running after stdin closes so buffered events can flush.
    #[arg(long, default_value = "0")]
    linger_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write JSON logs to this file.
    #[arg(long, env = "HORIZON_LOG_FILE")]
    log_file: Option<PathBuf>,
}

/// One stdin line describing an event.
#[derive(Debug, Deserialize)]
struct InputEvent {
    event: String,
    #[serde(default)]
    properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl InputEvent {
    fn properties(&self) -> Properties {
        self.properties
            .iter()
            .map(|(key, value)| (key.clone(), PropertyValue::from_json(value)))
            .collect()
    }
}

fn load_config(args: &Args) -> HorizonResult<HorizonConfig> {
    let mut config = match &args.config {
        Some(path) => HorizonConfig::load(path)?,
        None => HorizonConfig::new(),
    };
    if let Some(url) = &args.url {
        config.collector_url = url.clone();
    }
    Ok(config)
}

async fn handle_line(client: &HorizonClient, sign_in: &watch::Sender<bool>, line: &str) {
    match line {
        "" => {}
        ":signin" => {
            sign_in.send_replace(true);
        }
        ":signout" => {
            sign_in.send_replace(false);
        }
        ":status" => match client.status().await {
            Ok(status) => println!(
                "state={:?} desired={} attempts={} reconnect_pending={} buffered={}",
                status.state,
                status.desired,
                status.attempts,
                status.reconnect_pending,
                status.buffered
            ),
            Err(e) => warn!(error = %e, "Status unavailable"),
        },
        _ => match serde_json::from_str::<InputEvent>(line) {
            Ok(input) => {
                let properties = input.properties();
                match input.timestamp {
                    Some(at) => client.on_event_at(input.event, at, properties),
                    None => client.on_event(input.event, properties),
                }
            }
            Err(e) => warn!(error = %e, "Skipping malformed event line"),
        },
    }
}

#[tokio::main]
async fn main() -> HorizonResult<()> {
    let args = Args::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "horizon".into(),
        default_level: args.log_level.clone(),
        log_path: args.log_file.clone(),
        also_stderr: true,
    })
    .map_err(|e| HorizonError::Config(format!("logging: {}", e)))?;

    let config = load_config(&args)?;
    info!(
        url = %config.collector_url,
        platform = %config.platform,
        buffer_capacity = config.buffer_capacity,
        "Configuration loaded"
    );

    let tokens: Arc<dyn TokenSource> = match args.token.clone() {
        Some(token) => Arc::new(StaticToken(token)),
        None => {
            warn!("No token configured, connection attempts will fail");
            Arc::new(|| -> Option<String> { None })
        }
    };

    let (sign_in, sign_in_rx) = watch::channel(!args.signed_out);
    let transport = WsTransport::from_config(&config);
    let client = HorizonClient::start(config, transport, tokens, WatchStream::new(sign_in_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_line(&client, &sign_in, line.trim()).await,
                Ok(None) => {
                    info!("Input closed");
                    if args.linger_secs > 0 {
                        tokio::time::sleep(Duration::from_secs(args.linger_secs)).await;
                    }
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Failed to read input");
                    break;
                }
            },
            _ = &mut ctrl_c => {
                info!("Received shutdown signal, exiting...");
                break;
            }
        }
    }

    client.shutdown().await;
    Ok(())
}
