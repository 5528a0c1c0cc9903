use color_eyre::eyre::eyre;
use color_eyre::Result;
use movie_sync_client::{ApiError, LaneConfig, Lanes, MovieApi, ResponseCache, RetryPolicy, Session, Transport};
use movie_sync_config::{Config, CredentialStore, PathManager};
use movie_sync_core::{CollectionStore, InitState, SnapshotStore, StoreError, SyncCoordinator, SyncSettings};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything a command needs, built once from config and stored credentials.
pub struct App {
    pub config: Config,
    pub paths: PathManager,
    pub api: MovieApi,
    pub coordinator: SyncCoordinator,
    signed_in_at_start: bool,
}

pub fn load_config(paths: &PathManager) -> Result<Config> {
    let config_file = paths.config_file();
    let config = Config::load_or_default(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    config
        .validate()
        .map_err(|e| eyre!("Invalid configuration in {}: {}", config_file.display(), e))?;
    Ok(config)
}

pub fn load_credentials(paths: &PathManager) -> Result<CredentialStore> {
    let credentials_file = paths.credentials_file();
    let mut store = CredentialStore::new(credentials_file.clone());
    store
        .load()
        .map_err(|e| eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;
    Ok(store)
}

fn lane(settings: &movie_sync_config::LaneSettings) -> LaneConfig {
    LaneConfig::new(settings.max_concurrent, Duration::from_millis(settings.delay_ms))
}

impl App {
    pub fn load() -> Result<Self> {
        let paths = PathManager::default();
        let config = load_config(&paths)?;
        let credentials = load_credentials(&paths)?;
        let token = credentials.valid_access_token().cloned();
        if token.is_none() && credentials.get_access_token().is_some() {
            debug!(operation = "credentials", "Stored token is past its expiry, ignoring it");
        }
        Self::build(config, paths, token)
    }

    pub fn build(config: Config, paths: PathManager, token: Option<String>) -> Result<Self> {
        let session = Arc::new(match &token {
            Some(token) => Session::with_token(token.clone()),
            None => Session::new(),
        });

        let retry = RetryPolicy {
            max_retries: config.retry.max_retries,
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
            max_jitter: Duration::from_millis(config.retry.max_jitter_ms),
        };
        let transport = Transport::with_timeout(
            config.api.base_url.clone(),
            Arc::clone(&session),
            Duration::from_secs(config.api.timeout_secs),
        )
        .map_err(|e| eyre!("Failed to create HTTP transport: {}", e))?
        .with_retry_policy(retry);

        let api = MovieApi::with_parts(
            Arc::new(transport),
            ResponseCache::new(config.cache.capacity, Duration::from_secs(config.cache.ttl_secs)),
            Lanes::new(lane(&config.queue.light), lane(&config.queue.heavy)),
        );

        let store = CollectionStore::new(Arc::new(api.clone()));
        let snapshots = SnapshotStore::from_paths(&paths);
        let coordinator = SyncCoordinator::new(
            store,
            session,
            SyncSettings::from(&config.sync),
            Some(snapshots),
        );

        Ok(Self {
            config,
            paths,
            api,
            coordinator,
            signed_in_at_start: token.is_some(),
        })
    }

    pub fn store(&self) -> &CollectionStore {
        self.coordinator.store()
    }

    pub fn is_signed_in(&self) -> bool {
        self.coordinator.session().is_authenticated()
    }

    /// Restore the snapshot, initialize the session and refresh stale
    /// collections. Collection commands call this before reading or mutating.
    pub async fn prepare_collections(&self) -> Result<()> {
        if !self.is_signed_in() {
            return Err(eyre!("Not signed in. Run 'reelview login' first."));
        }

        match self.coordinator.load_snapshot() {
            Ok(true) => debug!(operation = "snapshot_restored", "Collections restored from snapshot"),
            Ok(false) => {}
            Err(e) => warn!(operation = "snapshot_restore", error = %e, "Ignoring unreadable snapshot"),
        }

        if self.coordinator.init_state() != InitState::Initialized {
            self.coordinator.initialize().await.map_err(api_report)?;
        }
        self.coordinator.sync_with_server(false).await.map_err(api_report)?;
        Ok(())
    }

    /// Drops a stored credential the backend has rejected during this run
    pub fn forget_expired_credentials(&self) -> Result<()> {
        if !self.signed_in_at_start || self.is_signed_in() {
            return Ok(());
        }
        let mut credentials = load_credentials(&self.paths)?;
        credentials.clear_session();
        credentials
            .save()
            .map_err(|e| eyre!("Failed to save credentials: {}", e))?;
        info!(operation = "credentials_cleared", "Stored session token rejected by the server and removed");
        Ok(())
    }
}

/// Consumer-facing message for an API failure
pub fn api_report(err: ApiError) -> color_eyre::Report {
    debug!(error = %err, "API call failed");
    eyre!(err.user_message())
}

pub fn store_report(err: StoreError) -> color_eyre::Report {
    debug!(error = %err, "Collection operation failed");
    eyre!(err.user_message())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_collections_require_sign_in() {
        let dir = TempDir::new().unwrap();
        let paths = PathManager::with_base(dir.path().to_path_buf());
        let app = App::build(Config::default(), paths, None).unwrap();

        let err = app.prepare_collections().await.unwrap_err();
        assert!(err.to_string().contains("reelview login"));
    }

    #[tokio::test]
    async fn test_build_with_token_is_signed_in() {
        let dir = TempDir::new().unwrap();
        let paths = PathManager::with_base(dir.path().to_path_buf());
        let app = App::build(Config::default(), paths, Some("abc".to_string())).unwrap();

        assert!(app.is_signed_in());
        assert!(app.forget_expired_credentials().is_ok());
    }

    #[test]
    fn test_load_config_defaults_when_missing() {
        let dir = TempDir::new().unwrap();
        let paths = PathManager::with_base(dir.path().to_path_buf());
        let config = load_config(&paths).unwrap();
        assert_eq!(config.cache.capacity, 200);
    }
}
