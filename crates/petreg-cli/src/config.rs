use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "petreg")]
#[command(
    author,
    version,
    about = "Sync and inspect the petreg breed registry"
)]
#[command(after_help = "Examples:
  petreg migrate
  petreg sync                 # all enabled vendors
  petreg sync --vendor dog
  petreg breeds --species Cat
  petreg species")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Path to breed_sync.toml (defaults to the user config directory)
    #[arg(long, env = "BREED_SYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Identifies this process in the scheduler lock table
    #[arg(long, env = "INSTANCE_ID")]
    pub instance_id: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Lock holder name: `INSTANCE_ID` or `petreg-cli-<pid>`.
    pub fn holder(&self) -> String {
        self.instance_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("petreg-cli-{}", std::process::id()))
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run a one-shot breed sync, taking the same lock as the server scheduler
    #[command(after_help = "Examples:
  petreg sync                 # every enabled vendor, one after another
  petreg sync --vendor cat    # a single vendor by name")]
    Sync {
        /// Vendor name from breed_sync.toml
        #[arg(short, long, value_name = "NAME")]
        vendor: Option<String>,
    },
    /// List stored breeds
    Breeds {
        /// Only breeds of this species
        #[arg(short, long, value_name = "NAME")]
        species: Option<String>,
    },
    /// List species with their breed counts
    Species,
    /// Create or update the database schema
    Migrate,
}
