pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{ApiConfig, CacheConfig, Config, LaneSettings, QueueConfig, RetryConfig, SyncConfig, Theme, UiConfig};
pub use credentials::CredentialStore;
pub use paths::{PathManager, container_base_path};
