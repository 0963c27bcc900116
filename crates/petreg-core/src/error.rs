use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents all errors that can occur while synchronizing breed
/// reference data and serving it. It uses `thiserror` for ergonomic error
/// handling and automatic conversion from underlying library errors.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Examples
///
/// ```no_run
/// use petreg_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::SpeciesNotFound("Cat".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// Wraps all errors from SQLx, including connection failures and
    /// query errors. Per-row uniqueness conflicts during bulk inserts are
    /// handled in SQL and never surface as this variant.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP client request failed in a way that is not a status code,
    /// timeout or connection problem (e.g. an undecodable body).
    #[error("API Client error: {0}")]
    ClientError(String),

    /// A vendor API answered with a non-success status code.
    #[error("Upstream returned HTTP {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The species a vendor syncs into is missing from the store.
    ///
    /// Species rows come from seed data. A missing row aborts that vendor's
    /// run; the next scheduled tick retries naturally.
    #[error("Species not found: {0}")]
    SpeciesNotFound(String),

    /// Breed not found in the database.
    #[error("Breed not found: {0}")]
    BreedNotFound(String),

    /// Network or connection error.
    ///
    /// This error occurs when a network request fails due to connectivity issues,
    /// DNS resolution failures, or the remote server being unreachable.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// Configuration error.
    ///
    /// Raised when breed_sync.toml is unreadable or malformed, or when a
    /// vendor entry carries an invalid cron expression or timezone.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The scheduler lock backend failed (not contention, which is `Ok(None)`).
    #[error("Lock error: {0}")]
    LockError(String),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Try: docker-compose up -d".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ClientError(msg) => format!("Vendor API error: {}", msg),
            AppError::UpstreamStatus { status, url } => match status {
                401 | 403 => format!(
                    "Vendor API rejected the request (HTTP {}).\n   Check the api_key for {}.",
                    status, url
                ),
                _ => format!(
                    "Vendor API returned HTTP {} for {}.\n   Try again later.",
                    status, url
                ),
            },
            AppError::SpeciesNotFound(name) => format!(
                "Species '{}' is missing.\n   Run `petreg migrate` to seed species rows.",
                name
            ),
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The vendor may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your breed_sync.toml file.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use petreg_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::SpeciesNotFound("Cat".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded => true,
            AppError::UpstreamStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error should trip the circuit breaker.
    ///
    /// Any failure of the vendor itself counts: network issues, timeouts, rate
    /// limits, every non-2xx status and undecodable response bodies. Local
    /// configuration and storage problems do not.
    ///
    /// # Examples
    ///
    /// ```
    /// use petreg_core::error::AppError;
    ///
    /// assert!(AppError::Timeout(10).should_trip_circuit());
    /// assert!(AppError::UpstreamStatus { status: 503, url: "x".into() }.should_trip_circuit());
    /// assert!(AppError::UpstreamStatus { status: 401, url: "x".into() }.should_trip_circuit());
    /// assert!(!AppError::InvalidUrl("x".into()).should_trip_circuit());
    /// ```
    pub fn should_trip_circuit(&self) -> bool {
        match self {
            AppError::NetworkError(_)
            | AppError::Timeout(_)
            | AppError::RateLimitExceeded
            | AppError::UpstreamStatus { .. }
            | AppError::ClientError(_)
            | AppError::SerializationError(_) => true,

            AppError::DatabaseError(_)
            | AppError::InvalidUrl(_)
            | AppError::SpeciesNotFound(_)
            | AppError::BreedNotFound(_)
            | AppError::ConfigError(_)
            | AppError::LockError(_)
            | AppError::Generic(_) => false,
        }
    }
}
