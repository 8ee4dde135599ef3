//! Beacon command-line tool: record analytics from scripts and inspect the
//! local queue.

mod commands;

use std::path::PathBuf;

use beacon_config_and_utils::{init_logging_in, Config, Paths};
use clap::{Parser, Subcommand, ValueEnum};

/// Beacon analytics command-line interface.
#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Record analytics and manage the local Beacon request queue")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the config's
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config and the database. Defaults to ~/.beacon
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Only queue requests; do not contact the collector
    #[arg(long, global = true)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file
    Init {
        #[arg(long)]
        server_url: String,
        #[arg(long)]
        app_key: String,
    },
    #[command(flatten)]
    Sdk(SdkCommand),
}

/// Commands that run against an open SDK instance.
#[derive(Subcommand)]
enum SdkCommand {
    /// Record a custom event
    Event {
        key: String,
        #[arg(long, default_value_t = 1)]
        count: i64,
        #[arg(long)]
        sum: Option<f64>,
        #[arg(long)]
        duration: Option<f64>,
        /// Segmentation entry, `key=value` (repeatable)
        #[arg(short, long = "segment", value_parser = commands::parse_segment)]
        segments: Vec<(String, String)>,
    },
    /// Record a view opening or closing
    View {
        action: ViewAction,
        name: String,
        /// Mark the view as the first one of the session
        #[arg(long)]
        first: bool,
    },
    /// Report a 1 to 5 star rating
    Rating {
        rating: u8,
        #[arg(long, default_value = std::env::consts::OS)]
        platform: String,
        #[arg(long)]
        app_version: String,
    },
    /// Send a crash report
    Crash {
        message: String,
        #[arg(long, default_value = "")]
        stack_trace: String,
        #[arg(long)]
        fatal: bool,
    },
    /// Run a session for the given number of seconds
    Session {
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
    /// Deliver everything queued
    Flush,
    /// Show device id, queue, and buffer state
    Status,
    /// Print the cached remote config
    RemoteConfig {
        /// Fetch from the collector first
        #[arg(long)]
        refresh: bool,
    },
    /// Drop every queued request and buffered event
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewAction {
    Open,
    Close,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };

    let level = match &cli.log_level {
        Some(level) => level.clone(),
        None => Config::load(&paths)
            .map(|config| config.log_level)
            .unwrap_or_else(|_| "info".to_string()),
    };
    init_logging_in(&paths, &level);

    match cli.command {
        Commands::Init {
            server_url,
            app_key,
        } => commands::init(&paths, &server_url, &app_key),
        Commands::Sdk(command) => run(command, &paths, cli.offline).await,
    }
}

async fn run(
    command: SdkCommand,
    paths: &Paths,
    offline: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(paths)?;
    // Sessions only exist inside `session`.
    config.manual_session_handling = true;
    let beacon = beacon_sdk::Beacon::open(config, paths).await?;

    match command {
        SdkCommand::Event {
            key,
            count,
            sum,
            duration,
            segments,
        } => commands::event(&beacon, key, count, sum, duration, segments).await?,
        SdkCommand::View { action, name, first } => match action {
            ViewAction::Open => beacon.open_view(&name, first).await?,
            ViewAction::Close => beacon.close_view(&name).await?,
        },
        SdkCommand::Rating {
            rating,
            platform,
            app_version,
        } => {
            beacon
                .report_star_rating(&platform, &app_version, rating)
                .await?
        }
        SdkCommand::Crash {
            message,
            stack_trace,
            fatal,
        } => {
            beacon
                .send_crash_report(&message, &stack_trace, None, !fatal)
                .await?
        }
        SdkCommand::Session { seconds } => {
            return commands::session(&beacon, seconds, offline).await;
        }
        SdkCommand::Flush => return commands::flush(&beacon).await,
        SdkCommand::Status => {
            commands::status(&beacon).await;
            return Ok(());
        }
        SdkCommand::RemoteConfig { refresh } => {
            return commands::remote_config(&beacon, refresh && !offline).await;
        }
        SdkCommand::Clear => {
            beacon.clear().await;
            println!("Cleared");
            return Ok(());
        }
    }

    if offline {
        beacon.aggregator().flush_all().await?;
        println!("Queued ({} requests waiting)", beacon.queue().count().await);
        Ok(())
    } else {
        commands::flush(&beacon).await
    }
}
