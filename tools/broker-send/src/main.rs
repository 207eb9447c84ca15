//! broker-send: publish messages to a broker host channel over a named pipe.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use broker_runtime::RemotePublisher;
use clap::Parser;
use pipe_transport::TransportConfig;
use shared_bus::MessagePublisher;
use shared_types::BrokeredMessage;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Publish a message to a channel hosted by `broker-host`
#[derive(Parser, Debug)]
#[command(name = "broker-send")]
#[command(about = "Publish messages to a broker host channel")]
struct Args {
    /// Channel to publish to
    channel: String,

    /// Message content. Parsed as JSON when possible, sent as a string otherwise
    content: String,

    /// Header as key=value, may be repeated
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Number of copies to send
    #[arg(short, long, default_value = "1")]
    count: u32,

    /// Socket directory (Unix only; defaults to BROKER_PIPE_DIR or the temp dir)
    #[arg(long)]
    pipe_dir: Option<PathBuf>,

    /// Connection attempts before giving up
    #[arg(long)]
    attempts: Option<u32>,
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("header must be key=value, got {raw:?}"),
    }
}

fn parse_content(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let mut transport = TransportConfig::from_env();
    if let Some(dir) = args.pipe_dir {
        transport.pipe_dir = dir;
    }
    if let Some(attempts) = args.attempts {
        transport.connect_attempts = attempts;
    }
    transport.validate().context("Invalid transport settings")?;

    let headers = args
        .headers
        .iter()
        .map(|raw| parse_header(raw))
        .collect::<Result<Vec<_>>>()?;
    let content = parse_content(&args.content);
    let publisher = RemotePublisher::new(&args.channel, transport);

    for n in 0..args.count {
        let mut message = BrokeredMessage::new(&args.channel, content.clone());
        for (key, value) in &headers {
            message = message.with_header(key, value);
        }
        let id = message.id;
        publisher
            .publish(message)
            .await
            .with_context(|| format!("Failed to publish message {} to {}", n + 1, args.channel))?;
        debug!(channel = %args.channel, id = %id, "Sent");
    }

    info!(channel = %args.channel, count = args.count, "Published");
    println!("published {} message(s) to {}", args.count, args.channel);
    Ok(())
}
