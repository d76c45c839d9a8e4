//! API configuration.

use std::time::Duration;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8081;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Externally reachable base URL; worker callbacks are built from it
    pub public_base_url: String,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Timeout for caller webhook delivery
    pub notify_timeout: Duration,
    /// Force-fail running jobs silent for this long; `None` disables the watchdog
    pub job_timeout: Option<Duration>,
    /// Interval between watchdog sweeps
    pub watchdog_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            public_base_url: format!("http://localhost:{}", DEFAULT_PORT),
            cors_origins: vec!["*".to_string()],
            max_body_size: 1024 * 1024, // 1MB
            environment: "development".to_string(),
            notify_timeout: Duration::from_secs(10),
            job_timeout: None,
            watchdog_interval: Duration::from_secs(30),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = std::env::var("VIDEO_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            host: std::env::var("VIDEO_HOST").unwrap_or(defaults.host),
            port,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            notify_timeout: std::env::var("NOTIFY_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.notify_timeout),
            job_timeout: std::env::var("JOB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            watchdog_interval: std::env::var("WATCHDOG_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.watchdog_interval),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Where the worker reports progress for `job_id`.
    pub fn progress_url(&self, job_id: &str) -> String {
        format!("{}/jobs/{}/progress", self.public_base_url, job_id)
    }

    /// Where the worker reports completion or failure.
    pub fn callback_url(&self) -> String {
        format!("{}/internal/callback", self.public_base_url)
    }

    /// Polling URL handed back to the caller.
    pub fn status_url(&self, job_id: &str) -> String {
        format!("{}/jobs/{}", self.public_base_url, job_id)
    }
}
