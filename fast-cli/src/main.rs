//! # onefast
//!
//! Track intermittent fasts from the terminal, kept in step with a paired
//! device.
//!
//! ## Commands
//!
//! - `start`: Open a fast (now, or backdated)
//! - `stop`: Close the current fast
//! - `status`: Show progress of the current fast
//! - `goal`: Select a fasting goal
//! - `goals`: List the preset goals
//! - `edit-start`: Move the start of the current fast
//! - `watch`: Live elapsed-time readout
//! - `listen`: Accept a paired device and apply its updates
//!
//! ## Example
//!
//! ```bash
//! # Start a fast that began 90 minutes ago
//! onefast start --ago 90
//!
//! # Pick the 18:6 goal and check progress
//! onefast goal 18:6
//! onefast status
//!
//! # On the paired machine
//! onefast listen
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod device;

use commands::{edit, goal, listen, start, status, stop, watch, StartTime};

/// Track intermittent fasts.
#[derive(Parser, Debug)]
#[command(name = "onefast")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the database and onefast.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Do not contact the paired device
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a fast
    Start {
        /// Minutes ago the fast began (default: now)
        #[arg(long, conflicts_with = "at")]
        ago: Option<u64>,

        /// Exact start time, epoch milliseconds
        #[arg(long)]
        at: Option<i64>,
    },

    /// Close the current fast
    Stop,

    /// Show progress of the current fast
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Select a fasting goal
    Goal {
        /// Goal id (see `goals`)
        id: String,
    },

    /// List the preset goals
    Goals,

    /// Move the start of the current fast
    EditStart {
        /// Minutes ago the fast began
        #[arg(long, conflicts_with = "at", required_unless_present = "at")]
        ago: Option<u64>,

        /// Exact start time, epoch milliseconds
        #[arg(long)]
        at: Option<i64>,
    },

    /// Live elapsed-time readout (Ctrl-C to quit)
    Watch,

    /// Accept paired devices and apply their updates (Ctrl-C to quit)
    Listen {
        /// Override sync.listen_address from onefast.toml
        #[arg(long)]
        address: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,onefast_client=info,onefast=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    match cli.command {
        Commands::Start { ago, at } => {
            start::run(&data_dir, cli.offline, StartTime::from_args(ago, at)).await?;
        }
        Commands::Stop => {
            stop::run(&data_dir, cli.offline).await?;
        }
        Commands::Status { json } => {
            status::run(&data_dir, json).await?;
        }
        Commands::Goal { id } => {
            goal::set(&data_dir, cli.offline, &id).await?;
        }
        Commands::Goals => {
            goal::list();
        }
        Commands::EditStart { ago, at } => {
            edit::run(&data_dir, cli.offline, StartTime::from_args(ago, at)).await?;
        }
        Commands::Watch => {
            watch::run(&data_dir, cli.offline).await?;
        }
        Commands::Listen { address } => {
            listen::run(&data_dir, address).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for onefast.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("app", "onefast", "onefast")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn start_accepts_ago() {
        let cli = Cli::try_parse_from(["onefast", "start", "--ago", "90"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Start {
                ago: Some(90),
                at: None
            }
        ));
    }

    #[test]
    fn start_rejects_ago_and_at_together() {
        let result = Cli::try_parse_from(["onefast", "start", "--ago", "5", "--at", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn edit_start_requires_a_time() {
        assert!(Cli::try_parse_from(["onefast", "edit-start"]).is_err());
        assert!(Cli::try_parse_from(["onefast", "edit-start", "--at", "1705000000000"]).is_ok());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["onefast", "stop", "--offline", "--data-dir", "/tmp/x"])
            .unwrap();
        assert!(cli.offline);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/x")));
    }
}
