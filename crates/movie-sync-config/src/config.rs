use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueConfig {
    // Cheap, frequent reads (listings, details, genres)
    #[serde(default = "default_light_lane")]
    pub light: LaneSettings,
    // Expensive search and recommendation calls
    #[serde(default = "default_heavy_lane")]
    pub heavy: LaneSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LaneSettings {
    pub max_concurrent: usize,
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_jitter_ms")]
    pub max_jitter_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_true")]
    pub persist_snapshot: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UiConfig {
    #[serde(default)]
    pub theme: Theme,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(Theme::System),
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(format!("Invalid theme: {}. Use 'system', 'light', or 'dark'", s)),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    std::env::var("REELVIEW_API_URL").unwrap_or_else(|_| "http://localhost:5000/api".to_string())
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_cache_capacity() -> usize {
    200
}

fn default_cache_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_light_lane() -> LaneSettings {
    LaneSettings { max_concurrent: 6, delay_ms: 0 }
}

fn default_heavy_lane() -> LaneSettings {
    LaneSettings { max_concurrent: 2, delay_ms: 400 }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_jitter_ms() -> u64 {
    1000
}

fn default_stale_after_secs() -> u64 {
    600 // 10 minutes
}

fn default_refresh_interval_secs() -> u64 {
    300 // 5 minutes
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            light: default_light_lane(),
            heavy: default_heavy_lane(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_jitter_ms: default_max_jitter_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            persist_snapshot: default_true(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config file if present, otherwise fall back to defaults
    pub fn load_or_default(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://")) {
            return Err(anyhow::anyhow!("api.base_url must start with http:// or https://"));
        }
        if self.api.timeout_secs == 0 {
            return Err(anyhow::anyhow!("api.timeout_secs must be greater than zero"));
        }
        if self.cache.capacity == 0 {
            return Err(anyhow::anyhow!("cache.capacity must be greater than zero"));
        }
        if self.queue.light.max_concurrent == 0 {
            return Err(anyhow::anyhow!("queue.light.max_concurrent must be greater than zero"));
        }
        if self.queue.heavy.max_concurrent == 0 {
            return Err(anyhow::anyhow!("queue.heavy.max_concurrent must be greater than zero"));
        }
        if self.sync.refresh_interval_secs == 0 {
            return Err(anyhow::anyhow!("sync.refresh_interval_secs must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_load_and_save() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.api.base_url = "https://movies.example.com/api".to_string();
        config.queue.heavy = LaneSettings { max_concurrent: 1, delay_ms: 750 };
        config.ui.theme = Theme::Dark;

        let path = file.path().to_path_buf();
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.api.base_url, "https://movies.example.com/api");
        assert_eq!(loaded.queue.heavy, LaneSettings { max_concurrent: 1, delay_ms: 750 });
        assert_eq!(loaded.ui.theme, Theme::Dark);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[api]\nbase_url = \"https://x.test\"\n").unwrap();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.sync.stale_after_secs, 600);
        assert_eq!(config.sync.refresh_interval_secs, 300);
        assert_eq!(config.queue.heavy.delay_ms, 400);
    }

    #[test]
    fn test_config_validate() {
        let mut config = Config::default();
        config.api.base_url = "https://movies.example.com".to_string();
        assert!(config.validate().is_ok());

        config.queue.light.max_concurrent = 0;
        assert!(config.validate().is_err());

        config.queue.light.max_concurrent = 4;
        config.api.base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_theme_from_str() {
        assert_eq!("DARK".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("sepia".parse::<Theme>().is_err());
    }
}
