//! Configuration for the remote catalog, the sync loop and the triggers.

use crate::error::{SyncError, SyncResult};
use chrono::NaiveTime;
use std::time::Duration;

/// Connection settings for the remote catalog API.
///
/// Passed to the client at construction; credentials never live in
/// process-wide state.
#[derive(Clone)]
pub struct CatalogConfig {
    /// Base URL, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// API user, sent as the `user` query parameter.
    pub user: String,
    /// API secret, sent as the `secret` query parameter.
    pub secret: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl CatalogConfig {
    /// Creates a new catalog configuration.
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            user: user.into(),
            secret: secret.into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the listing URL for a path segment, tolerating trailing slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Checks the configuration is usable.
    pub fn validate(&self) -> SyncResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(SyncError::InvalidConfig("base_url is empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(SyncError::InvalidConfig(format!(
                "base_url must be http(s): {}",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(SyncError::InvalidConfig("timeout must be > 0".into()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Configuration for a sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pause between successive page fetches.
    pub page_delay: Duration,
    /// Consecutive failed pages tolerated before aborting a run that has not
    /// inserted anything yet.
    pub max_consecutive_failures: u32,
    /// Per-page retry policy.
    pub retry: RetryConfig,
    /// Optional cap on page indexes visited per run.
    pub max_pages: Option<u32>,
}

impl SyncConfig {
    /// Creates the default run configuration.
    pub fn new() -> Self {
        Self {
            page_delay: Duration::from_millis(100),
            max_consecutive_failures: 10,
            retry: RetryConfig::no_retry(),
            max_pages: None,
        }
    }

    /// Sets the inter-page delay.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Sets the consecutive failure budget.
    pub fn with_max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    /// Sets the per-page retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Caps the number of page indexes visited per run.
    pub fn with_max_pages(mut self, max: u32) -> Self {
        self.max_pages = Some(max);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for retrying a single page fetch.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts per page, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// A failed page is skipped immediately.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_secs = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// When the triggers start runs.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Time of day (UTC) of the daily full refresh.
    pub daily_at: NaiveTime,
    /// Whether to sync empty entity types on startup.
    pub sync_on_startup: bool,
}

impl ScheduleConfig {
    /// Creates a schedule firing daily at `daily_at` UTC.
    pub fn new(daily_at: NaiveTime) -> Self {
        Self {
            daily_at,
            sync_on_startup: true,
        }
    }

    /// Enables or disables the startup check.
    pub fn with_sync_on_startup(mut self, enabled: bool) -> Self {
        self.sync_on_startup = enabled;
        self
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::new(NaiveTime::from_hms_opt(3, 0, 0).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_config_defaults_and_endpoint() {
        let config = CatalogConfig::new("https://api.example.com/v1/", "u", "s");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(
            config.endpoint("players"),
            "https://api.example.com/v1/players"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn catalog_config_rejects_bad_urls() {
        assert!(CatalogConfig::new("", "u", "s").validate().is_err());
        assert!(CatalogConfig::new("ftp://x", "u", "s").validate().is_err());
        assert!(CatalogConfig::new("https://x", "u", "s")
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn secret_is_not_debug_printed() {
        let config = CatalogConfig::new("https://x", "user", "hunter2");
        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("user"));
    }

    #[test]
    fn sync_config_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.page_delay, Duration::from_millis(100));
        assert_eq!(config.max_consecutive_failures, 10);
        assert_eq!(config.retry.max_attempts, 1);
        assert!(config.max_pages.is_none());
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
    }

    #[test]
    fn schedule_default_is_three_am() {
        let schedule = ScheduleConfig::default();
        assert_eq!(schedule.daily_at, NaiveTime::from_hms_opt(3, 0, 0).unwrap());
        assert!(schedule.sync_on_startup);
    }
}
