//! Configuration types for petreg components.
//!
//! Process-level settings (database URL, bind address, admin token) are read
//! by the binaries through clap. Everything about the breed sync itself lives
//! in `breed_sync.toml`, loaded by [`load_sync_config`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::AppError;

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

impl DbConfig {
    /// Reads `DB_MAX_CONNECTIONS`, falling back to the default.
    pub fn from_env() -> Self {
        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        Self { max_connections }
    }
}

// =============================================================================
// HTTP Configuration
// =============================================================================

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_user_agent() -> String {
    format!("petreg-breed-sync/{}", env!("CARGO_PKG_VERSION"))
}

/// HTTP client configuration for vendor API calls (`[http]` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

// =============================================================================
// Vendor Configuration
// =============================================================================

/// Which vendor API a `[[vendors]]` entry talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorKind {
    /// TheCatAPI: string ids such as `"abys"`.
    Cat,
    /// TheDogAPI: integer ids.
    Dog,
}

impl VendorKind {
    /// Public base URL of the vendor.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Cat => "https://api.thecatapi.com",
            Self::Dog => "https://api.thedogapi.com",
        }
    }

    /// Species seeded for this vendor.
    pub fn default_species(&self) -> &'static str {
        match self {
            Self::Cat => "Cat",
            Self::Dog => "Dog",
        }
    }
}

impl fmt::Display for VendorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cat => write!(f, "cat"),
            Self::Dog => write!(f, "dog"),
        }
    }
}

impl FromStr for VendorKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cat" => Ok(Self::Cat),
            "dog" => Ok(Self::Dog),
            _ => Err(AppError::ConfigError(format!(
                "Unknown vendor kind: '{}'. Valid options: cat, dog",
                s
            ))),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_cron() -> String {
    "0 0 3 * * *".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_lock_min_hold_secs() -> u64 {
    60
}

fn default_lock_max_hold_secs() -> u64 {
    1800
}

/// Circuit breaker knobs for one vendor (`[vendors.circuit_breaker]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub failure_window_secs: u64,
    pub recovery_timeout_secs: u64,
    pub call_timeout_secs: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        let base = CircuitBreakerConfig::default();
        Self {
            failure_threshold: base.failure_threshold,
            failure_window_secs: base.failure_window.as_secs(),
            recovery_timeout_secs: base.recovery_timeout.as_secs(),
            call_timeout_secs: base.call_timeout.as_secs(),
        }
    }
}

impl CircuitBreakerSettings {
    /// Builds the runtime breaker config, keeping the rate-limit defaults.
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.max(1),
            failure_window: Duration::from_secs(self.failure_window_secs),
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            ..CircuitBreakerConfig::default()
        }
    }
}

/// A single vendor entry in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorEntry {
    /// Vendor key, used for `--vendor <name>`, `POST /sync/<name>` and the
    /// lock name `breed_sync_<name>`.
    pub name: String,

    pub kind: VendorKind,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Defaults to the vendor's public API.
    pub base_url: Option<String>,

    /// Sent as `x-api-key` when present.
    pub api_key: Option<String>,

    /// Species the breeds belong to. Defaults per kind (`Cat`, `Dog`).
    pub species: Option<String>,

    /// Six-field cron expression, seconds first.
    #[serde(default = "default_cron")]
    pub cron: String,

    /// IANA timezone the cron expression is evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_lock_min_hold_secs")]
    pub lock_min_hold_secs: u64,

    #[serde(default = "default_lock_max_hold_secs")]
    pub lock_max_hold_secs: u64,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerSettings,
}

impl VendorEntry {
    /// Creates an enabled entry with every optional field at its default.
    pub fn new(name: impl Into<String>, kind: VendorKind) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            base_url: None,
            api_key: None,
            species: None,
            cron: default_cron(),
            timezone: default_timezone(),
            lock_min_hold_secs: default_lock_min_hold_secs(),
            lock_max_hold_secs: default_lock_max_hold_secs(),
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }

    pub fn species(&self) -> &str {
        self.species
            .as_deref()
            .unwrap_or_else(|| self.kind.default_species())
    }

    pub fn lock_min_hold(&self) -> Duration {
        Duration::from_secs(self.lock_min_hold_secs)
    }

    pub fn lock_max_hold(&self) -> Duration {
        Duration::from_secs(self.lock_max_hold_secs)
    }
}

/// Root configuration structure for breed_sync.toml.
///
/// # Example
///
/// ```toml
/// [http]
/// timeout_secs = 15
///
/// [[vendors]]
/// name = "cat"
/// kind = "cat"
/// cron = "0 0 3 * * *"
/// timezone = "Europe/Madrid"
///
/// [vendors.circuit_breaker]
/// failure_threshold = 3
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub vendors: Vec<VendorEntry>,
}

impl SyncSettings {
    /// Settings used when no configuration file is available: both public
    /// vendors, enabled, with default schedules.
    pub fn builtin() -> Self {
        Self {
            http: HttpConfig::default(),
            vendors: vec![
                VendorEntry::new("cat", VendorKind::Cat),
                VendorEntry::new("dog", VendorKind::Dog),
            ],
        }
    }

    /// Returns only enabled vendors.
    pub fn enabled_vendors(&self) -> Vec<&VendorEntry> {
        self.vendors.iter().filter(|v| v.enabled).collect()
    }

    /// Find a vendor by name (case-insensitive).
    pub fn find_vendor(&self, name: &str) -> Option<&VendorEntry> {
        self.vendors
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Rejects duplicate vendor names and inverted lock holds.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut seen = std::collections::HashSet::new();
        for vendor in &self.vendors {
            if !seen.insert(vendor.name.to_lowercase()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate vendor name: '{}'",
                    vendor.name
                )));
            }
            if vendor.lock_min_hold_secs > vendor.lock_max_hold_secs {
                return Err(AppError::ConfigError(format!(
                    "Vendor '{}': lock_min_hold_secs ({}) exceeds lock_max_hold_secs ({})",
                    vendor.name, vendor.lock_min_hold_secs, vendor.lock_max_hold_secs
                )));
            }
        }
        Ok(())
    }
}

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "breed_sync.toml";

/// Returns the default configuration directory path: `~/.config/petreg/`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("petreg"))
}

/// Returns the default configuration file path.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

/// Default template content for a new breed_sync.toml file.
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Petreg Breed Sync Configuration
#
# Each [[vendors]] entry becomes one independent sync job with its own
# schedule, lock (breed_sync_<name>) and circuit breaker.
#
# cron uses six fields, seconds first: "sec min hour day month weekday".

[http]
timeout_secs = 30
max_retries = 3
retry_base_delay_ms = 500

[[vendors]]
name = "cat"
kind = "cat"
species = "Cat"
cron = "0 0 3 * * *"
timezone = "UTC"
# api_key = "..."

[vendors.circuit_breaker]
failure_threshold = 5
failure_window_secs = 60
recovery_timeout_secs = 30
call_timeout_secs = 20

[[vendors]]
name = "dog"
kind = "dog"
species = "Dog"
cron = "0 30 3 * * *"
timezone = "UTC"
"#;

/// Load sync configuration from a TOML file.
///
/// # Arguments
/// * `path` - Optional custom path. If `None`, uses default XDG path.
///
/// # Returns
/// * `Ok(Some(settings))` - Configuration loaded successfully
/// * `Ok(None)` - No configuration file found and none could be created
/// * `Err(e)` - Configuration file exists but is invalid
///
/// # Behavior
/// If no configuration file exists at the default path, a template file
/// is automatically created.
pub fn load_sync_config(path: Option<PathBuf>) -> Result<Option<SyncSettings>, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path {
        Some(p) => p,
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    if !config_path.exists() {
        if using_default_path {
            if let Err(e) = create_default_config(&config_path) {
                tracing::warn!("Could not create default config template: {}", e);
                return Ok(None);
            }
        } else {
            return Err(AppError::ConfigError(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    let settings: SyncSettings = toml::from_str(&content).map_err(|e| {
        AppError::ConfigError(format!(
            "Invalid TOML in '{}': {}",
            config_path.display(),
            e
        ))
    })?;
    settings.validate()?;

    Ok(Some(settings))
}

fn create_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    tracing::info!("Created default config template at: {}", path.display());

    Ok(())
}
