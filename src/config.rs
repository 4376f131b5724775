use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Sesión
    pub standby_timeout_secs: u64, // Desconexión por inactividad
    pub default_volume: u8,        // 0-100
    pub max_queue_size: usize,

    // Resolución
    pub cache_ttl_secs: u64,           // TTL del caché query -> stream
    pub max_cached_artifacts: usize,   // Archivos de audio en disco
    pub max_consecutive_failures: u32, // Corta el auto-skip en cascada

    // Paths
    pub cache_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Sesión
            standby_timeout_secs: std::env::var("STANDBY_TIMEOUT")
                .unwrap_or_else(|_| "900".to_string()) // 15 minutos
                .parse()?,
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,

            // Resolución
            cache_ttl_secs: std::env::var("CACHE_TTL")
                .unwrap_or_else(|_| "3600".to_string()) // 1 hora
                .parse()?,
            max_cached_artifacts: std::env::var("AUDIO_CACHE_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            max_consecutive_failures: std::env::var("MAX_CONSECUTIVE_FAILURES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,

            // Paths
            cache_dir: std::env::var("CACHE_DIR")
                .unwrap_or_else(|_| "/app/cache".to_string())
                .into(),
        };

        std::fs::create_dir_all(&config.cache_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0 and 100 (user-facing percentage)
    /// - Cache TTL and artifact bound must be greater than 0
    /// - Queue size and failure cap must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 100 {
            anyhow::bail!(
                "Default volume must be between 0 and 100, got: {}",
                self.default_volume
            );
        }

        if self.standby_timeout_secs == 0 {
            anyhow::bail!("Standby timeout must be greater than 0");
        }

        if self.cache_ttl_secs == 0 {
            anyhow::bail!("Cache TTL must be greater than 0");
        }

        if self.max_cached_artifacts == 0 {
            anyhow::bail!("Audio cache size must be greater than 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_consecutive_failures == 0 {
            anyhow::bail!("Max consecutive failures must be greater than 0");
        }

        Ok(())
    }

    pub fn standby_timeout(&self) -> Duration {
        Duration::from_secs(self.standby_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Session: {}s standby, {}% vol, {} queue\n  \
            Resolver: {}s TTL, {} artifacts, {} failure cap\n  \
            Cache dir: {}",
            self.standby_timeout_secs,
            self.default_volume,
            self.max_queue_size,
            self.cache_ttl_secs,
            self.max_cached_artifacts,
            self.max_consecutive_failures,
            self.cache_dir.display(),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            standby_timeout_secs: 900, // 15 minutos
            default_volume: 30,
            max_queue_size: 1000,
            cache_ttl_secs: 3600, // 1 hora
            max_cached_artifacts: 50,
            max_consecutive_failures: 3,
            cache_dir: "/app/cache".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.standby_timeout(), Duration::from_secs(900));
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn rejects_volume_above_limit() {
        let config = Config {
            default_volume: 150,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_bounds() {
        let bad = [
            Config { cache_ttl_secs: 0, ..Config::default() },
            Config { max_cached_artifacts: 0, ..Config::default() },
            Config { max_queue_size: 0, ..Config::default() },
            Config { max_consecutive_failures: 0, ..Config::default() },
        ];
        for config in bad {
            assert!(config.validate().is_err());
        }
    }
}
