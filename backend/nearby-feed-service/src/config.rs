/// Configuration management for Nearby Feed Service
///
/// Loaded from environment variables (optionally seeded from a `.env` file by
/// `main`). Every tunable has a default so the service boots with no env set.
use crate::spatial::SpatialConfig;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Document store settings
    pub store: StoreConfig,
    /// Query execution tunables
    pub engine: EngineConfig,
    /// Tier selection tunables
    pub spatial: SpatialConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
    /// `json` for structured logs, anything else for human-readable output
    pub log_format: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Database URL
    pub database_url: String,
    /// Max connections in pool
    pub max_connections: u32,
    /// Collection holding post documents
    pub collection: String,
    /// JSON array of documents upserted at startup
    pub seed_file: Option<String>,
}

/// Query execution tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tokens per membership query (`M`); capped by the store's own ceiling
    pub max_membership_tokens: usize,
    /// Chunks in flight per wave
    pub concurrency: usize,
    pub overfetch_multiplier: usize,
    pub overfetch_floor: usize,
    pub per_chunk_ceiling: usize,
    /// Whole-request budget for store calls
    pub deadline_ms: u64,
    /// `Cache-Control: max-age` on feed and search responses
    pub cache_max_age_secs: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_membership_tokens: 30,
            concurrency: 5,
            overfetch_multiplier: 4,
            overfetch_floor: 50,
            per_chunk_ceiling: 500,
            deadline_ms: 3_000,
            cache_max_age_secs: 15,
        }
    }
}

impl EngineConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    /// Per-chunk fetch size for a page of `limit` posts.
    pub fn per_chunk_limit(&self, limit: usize) -> usize {
        limit
            .saturating_mul(self.overfetch_multiplier)
            .max(self.overfetch_floor)
            .min(self.per_chunk_ceiling)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_membership_tokens == 0 {
            return Err("QUERY_MAX_MEMBERSHIP_TOKENS must be greater than 0".to_string());
        }
        if self.concurrency == 0 {
            return Err("QUERY_CONCURRENCY must be greater than 0".to_string());
        }
        if self.overfetch_multiplier == 0 {
            return Err("QUERY_OVERFETCH_MULTIPLIER must be greater than 0".to_string());
        }
        if self.overfetch_floor > self.per_chunk_ceiling {
            return Err(format!(
                "QUERY_OVERFETCH_FLOOR ({}) must not exceed QUERY_PER_CHUNK_CEILING ({})",
                self.overfetch_floor, self.per_chunk_ceiling
            ));
        }
        if self.deadline_ms == 0 {
            return Err("QUERY_DEADLINE_MS must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let defaults = EngineConfig::default();
        let spatial_defaults = SpatialConfig::default();

        let config = Config {
            app: AppConfig {
                env: app_env.clone(),
                host: std::env::var("NEARBY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or_default("NEARBY_PORT", 8090)?,
                log_format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string()),
            },
            store: {
                let backend = parse_env_or_default("STORE_BACKEND", StoreBackend::Postgres)?;
                let database_url = match std::env::var("DATABASE_URL") {
                    Ok(value) => value,
                    Err(_)
                        if backend == StoreBackend::Postgres
                            && app_env.eq_ignore_ascii_case("production") =>
                    {
                        return Err("DATABASE_URL must be set in production".to_string())
                    }
                    Err(_) => "postgresql://localhost/nearby".to_string(),
                };

                StoreConfig {
                    backend,
                    database_url,
                    max_connections: parse_env_or_default("DATABASE_MAX_CONNECTIONS", 10)?,
                    collection: std::env::var("STORE_COLLECTION")
                        .unwrap_or_else(|_| crate::store::DEFAULT_COLLECTION.to_string()),
                    seed_file: std::env::var("STORE_SEED_FILE")
                        .ok()
                        .filter(|v| !v.trim().is_empty()),
                }
            },
            engine: EngineConfig {
                max_membership_tokens: parse_env_or_default(
                    "QUERY_MAX_MEMBERSHIP_TOKENS",
                    defaults.max_membership_tokens,
                )?,
                concurrency: parse_env_or_default("QUERY_CONCURRENCY", defaults.concurrency)?,
                overfetch_multiplier: parse_env_or_default(
                    "QUERY_OVERFETCH_MULTIPLIER",
                    defaults.overfetch_multiplier,
                )?,
                overfetch_floor: parse_env_or_default(
                    "QUERY_OVERFETCH_FLOOR",
                    defaults.overfetch_floor,
                )?,
                per_chunk_ceiling: parse_env_or_default(
                    "QUERY_PER_CHUNK_CEILING",
                    defaults.per_chunk_ceiling,
                )?,
                deadline_ms: parse_env_or_default("QUERY_DEADLINE_MS", defaults.deadline_ms)?,
                cache_max_age_secs: parse_env_or_default(
                    "FEED_CACHE_MAX_AGE_SECS",
                    defaults.cache_max_age_secs,
                )?,
            },
            spatial: SpatialConfig {
                max_rings_metro: parse_env_or_default(
                    "SPATIAL_MAX_RINGS_METRO",
                    spatial_defaults.max_rings_metro,
                )?,
                max_rings_district: parse_env_or_default(
                    "SPATIAL_MAX_RINGS_DISTRICT",
                    spatial_defaults.max_rings_district,
                )?,
                max_rings_neighborhood: parse_env_or_default(
                    "SPATIAL_MAX_RINGS_NEIGHBORHOOD",
                    spatial_defaults.max_rings_neighborhood,
                )?,
                max_input_cells: parse_env_or_default(
                    "SPATIAL_MAX_INPUT_CELLS",
                    spatial_defaults.max_input_cells,
                )?,
                default_radius_km: parse_env_or_default(
                    "SPATIAL_DEFAULT_RADIUS_KM",
                    spatial_defaults.default_radius_km,
                )?,
            },
        };

        config.engine.validate()?;
        if config.spatial.max_input_cells == 0 {
            return Err("SPATIAL_MAX_INPUT_CELLS must be greater than 0".to_string());
        }
        let radius = config.spatial.default_radius_km;
        if !radius.is_finite() || radius <= 0.0 {
            return Err("SPATIAL_DEFAULT_RADIUS_KM must be positive".to_string());
        }

        Ok(config)
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.deadline(), Duration::from_secs(3));
    }

    #[test]
    fn test_per_chunk_limit_is_clamped() {
        let config = EngineConfig::default();
        assert_eq!(config.per_chunk_limit(5), 50);
        assert_eq!(config.per_chunk_limit(20), 80);
        assert_eq!(config.per_chunk_limit(100), 400);
        assert_eq!(config.per_chunk_limit(1_000), 500);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.overfetch_floor = 600;
        assert!(config
            .validate()
            .unwrap_err()
            .contains("QUERY_OVERFETCH_FLOOR"));
    }

    #[test]
    fn test_parse_env_or_default() {
        std::env::set_var("NEARBY_TEST_PARSE_OK", "42");
        std::env::set_var("NEARBY_TEST_PARSE_BAD", "forty-two");

        assert_eq!(parse_env_or_default("NEARBY_TEST_PARSE_OK", 1usize), Ok(42));
        assert_eq!(parse_env_or_default("NEARBY_TEST_PARSE_MISSING", 7usize), Ok(7));
        let err = parse_env_or_default("NEARBY_TEST_PARSE_BAD", 1usize).unwrap_err();
        assert!(err.contains("NEARBY_TEST_PARSE_BAD"));
    }

    #[test]
    fn test_store_backend_from_str() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("Postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("mongo".parse::<StoreBackend>().is_err());
    }
}
