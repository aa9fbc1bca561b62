//! partlib - Command-line tool for device library elements
//!
//! Creates devices, prints them, checks them for broken invariants, and
//! edits their pad to signal map.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "partlib")]
#[command(about = "Create, inspect, and check device library elements")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "partlib.toml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new device in DIR
    New {
        dir: PathBuf,
        /// English name of the device
        #[arg(long)]
        name: String,
        /// Author, defaults to the configured one
        #[arg(long)]
        author: Option<String>,
        /// English description
        #[arg(long, default_value = "")]
        description: String,
        /// UUID of the component
        #[arg(long)]
        component: Uuid,
        /// UUID of the package
        #[arg(long)]
        package: Uuid,
    },
    /// Print a device
    Show {
        dir: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Load and validate devices
    Check {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Rewrite device files in canonical form
    Fmt {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,
    },
    /// Edit the pad to signal map
    #[command(subcommand)]
    Map(MapCommand),
}

#[derive(Subcommand, Debug)]
enum MapCommand {
    /// Map PAD to SIGNAL
    Add { dir: PathBuf, pad: Uuid, signal: Uuid },
    /// Remove the mapping of PAD
    Remove { dir: PathBuf, pad: Uuid },
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // The config file may set the level, so read it before logging is up
    let config = config::load_config(&args.config)?;
    let level = parse_level(args.log_level.as_deref().unwrap_or(&config.logging.level));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    debug!("partlib v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::New {
            dir,
            name,
            author,
            description,
            component,
            package,
        } => {
            let uuid = commands::new_device(
                &dir,
                commands::NewDevice {
                    name: &name,
                    author: author.as_deref(),
                    description: &description,
                    component,
                    package,
                },
                &config,
            )?;
            println!("{}", uuid);
        }
        Command::Show { dir, json } => commands::show(&dir, json)?,
        Command::Check { dirs } => {
            if !commands::check(&dirs) {
                std::process::exit(1);
            }
        }
        Command::Fmt { dirs } => commands::fmt(&dirs)?,
        Command::Map(MapCommand::Add { dir, pad, signal }) => {
            commands::map_add(&dir, pad, signal)?
        }
        Command::Map(MapCommand::Remove { dir, pad }) => commands::map_remove(&dir, pad)?,
    }

    Ok(())
}
