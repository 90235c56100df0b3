//! `race18-server`: runs a Race to 18 game server.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use race18::prelude::*;
use tracing_subscriber::EnvFilter;

/// Race to 18 game server.
#[derive(Parser, Debug)]
#[command(name = "race18-server", version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "RACE18_BIND", default_value = race18::DEFAULT_BIND_ADDR)]
    bind: String,

    /// Maximum players per room
    #[arg(
        long,
        env = "RACE18_MAX_PLAYERS",
        default_value_t = 4,
        value_parser = clap::value_parser!(u16).range(2..=16)
    )]
    max_players: u16,

    /// Seconds before an under-filled room is closed
    #[arg(long, env = "RACE18_IDLE_TIMEOUT_SECS", default_value_t = 30 * 60)]
    idle_timeout_secs: u64,

    /// Seconds between sweeps for idle rooms
    #[arg(
        long,
        env = "RACE18_SWEEP_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    sweep_interval_secs: u64,

    /// Log output format
    #[arg(long, env = "RACE18_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind.clone(),
            room: RoomConfig {
                max_players: usize::from(self.max_players),
                idle_timeout: Duration::from_secs(self.idle_timeout_secs),
                sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            },
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Race18Error> {
    let args = Args::parse();
    init_tracing(args.log_format);

    let config = args.server_config();
    tracing::info!(?config, "starting");

    let server = Race18Server::builder().config(config).build().await?;
    server.run().await
}
