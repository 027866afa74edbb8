use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    ///
    /// `memory` selects the in-process store (nothing survives a restart);
    /// anything else is handed to SQLite.
    pub database_url: String,

    // =========================
    // Scraping
    // =========================
    /// Per-request timeout for the HTTP scraper. A timed out scrape is a
    /// soft skip, not a failure.
    pub scraper_timeout: Duration,

    // =========================
    // Refresh job
    // =========================
    /// Cadence of the background pass that re-ingests every tracked url.
    pub refresh_interval: Duration,

    /// Discount rate (percent) at or above which tracked users receive a
    /// threshold notification.
    pub discount_threshold: Decimal,

    /// Urls ingested on the first refresh pass even if they are not tracked yet.
    pub tracked_urls: Vec<String>,

    /// Emit JSON logs instead of the pretty format.
    pub json_logs: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://price_tracker.db?mode=rwc".to_string(),
            scraper_timeout: Duration::from_secs(10),
            refresh_interval: Duration::from_secs(3_600),
            discount_threshold: Decimal::from(40),
            tracked_urls: Vec::new(),
            json_logs: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Missing keys take the default;
    /// malformed values take the default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        let scraper_timeout = parse_or("SCRAPER_TIMEOUT_SECS", &lookup, 10u64);
        let refresh_interval = parse_or("REFRESH_INTERVAL_SECS", &lookup, 3_600u64);
        let discount_threshold =
            parse_or("DISCOUNT_THRESHOLD", &lookup, defaults.discount_threshold);

        let tracked_urls = lookup("TRACKED_URLS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let json_logs = Self::json_logs_from(&lookup);

        Self {
            database_url,
            scraper_timeout: Duration::from_secs(scraper_timeout),
            refresh_interval: Duration::from_secs(refresh_interval.max(1)),
            discount_threshold,
            tracked_urls,
            json_logs,
        }
    }

    /// Log format only. Read before the logger exists, so that the warnings
    /// `from_env` may emit have a subscriber to land in.
    pub fn json_logs_from_env() -> bool {
        Self::json_logs_from(&|key: &str| std::env::var(key).ok())
    }

    fn json_logs_from(lookup: &impl Fn(&str) -> Option<String>) -> bool {
        lookup("APP_ENV").is_some_and(|v| v == "production")
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == "memory"
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };

    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!(key, value = %raw, default = %default, "malformed config value; using default");
            default
        }
    }
}
