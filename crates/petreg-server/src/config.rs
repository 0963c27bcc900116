use clap::Parser;
use std::path::PathBuf;

/// Server configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug, Clone)]
#[command(name = "petreg-server")]
#[command(author, version, about = "REST API server and breed sync scheduler for petreg")]
pub struct ServerConfig {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Bearer token for admin endpoints. Admin endpoints are disabled when unset.
    #[arg(long, env = "PETREG_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Path to breed_sync.toml (defaults to the user config directory)
    #[arg(long, env = "BREED_SYNC_CONFIG")]
    pub breed_sync_config: Option<PathBuf>,

    /// Allowed CORS origins, comma separated, or "*"
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Do not run every vendor once at startup
    #[arg(long, env = "SKIP_STARTUP_SYNC", default_value_t = false)]
    pub skip_startup_sync: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Identifies this replica in the scheduler lock table
    #[arg(long, env = "INSTANCE_ID")]
    pub instance_id: Option<String>,

    /// Maximum database connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value = "10")]
    pub db_max_connections: u32,
}

impl ServerConfig {
    /// Admin token, with blank values treated as unset.
    pub fn admin_token(&self) -> Option<String> {
        self.admin_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    }

    /// Lock holder name: `INSTANCE_ID` or `petreg-server-<pid>`.
    pub fn holder(&self) -> String {
        self.instance_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("petreg-server-{}", std::process::id()))
    }
}
