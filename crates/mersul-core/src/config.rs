use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// Settings shared by every front end that runs a [`ScrapeService`](crate::scrape::ScrapeService).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub db_dir: PathBuf,
    pub cache_ttl: Duration,
    pub cache_capacity: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            db_dir: PathBuf::from("./db"),
            cache_ttl: Duration::from_secs(30),
            cache_capacity: 10_000,
        }
    }
}

impl ServiceConfig {
    /// Read configuration from environment variables.
    ///
    /// - `DB_DIR` (optional, defaults to `./db`)
    /// - `MERSUL_CACHE_TTL_SECS` (optional, defaults to 30)
    /// - `MERSUL_CACHE_CAPACITY` (optional, defaults to 10000)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let db_dir = lookup("DB_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map_or(defaults.db_dir, PathBuf::from);

        let cache_ttl = match lookup("MERSUL_CACHE_TTL_SECS") {
            None => defaults.cache_ttl,
            Some(raw) => Duration::from_secs(positive(&raw, "MERSUL_CACHE_TTL_SECS")?),
        };

        let cache_capacity = match lookup("MERSUL_CACHE_CAPACITY") {
            None => defaults.cache_capacity,
            Some(raw) => positive(&raw, "MERSUL_CACHE_CAPACITY")?,
        };

        Ok(Self {
            db_dir,
            cache_ttl,
            cache_capacity,
        })
    }
}

fn positive(raw: &str, name: &str) -> Result<u64, AppError> {
    let parsed: u64 = raw.trim().parse().map_err(|_| {
        AppError::Config(format!("Invalid {name} '{raw}': must be a positive integer"))
    })?;
    if parsed == 0 {
        return Err(AppError::Config(format!("{name} must be at least 1")));
    }
    Ok(parsed)
}
