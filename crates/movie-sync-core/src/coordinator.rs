use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use movie_sync_client::{ApiError, Session, SessionEvent};
use movie_sync_config::SyncConfig;
use movie_sync_models::MinimalProfile;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, trace, warn};

use crate::snapshot::{Collections, SnapshotStore};
use crate::store::{CollectionStore, SyncState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    Uninitialized,
    Initializing,
    Initialized,
    /// Settled failure; only `retry_initialize` leaves it
    InitError,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    /// Collections older than this are refreshed by the background task
    pub stale_after: Duration,
    pub refresh_interval: Duration,
    pub persist_snapshot: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(600),
            refresh_interval: Duration::from_secs(300),
            persist_snapshot: true,
        }
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            stale_after: Duration::from_secs(config.stale_after_secs),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs.max(1)),
            persist_snapshot: config.persist_snapshot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSummary {
    pub favorites: usize,
    pub watched: usize,
    pub watchlists: usize,
    pub reviews: usize,
    pub synced_at: DateTime<Utc>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Data was fresh (or the session ended mid-sync); nothing changed
    Skipped { last_sync_at: Option<DateTime<Utc>> },
    Synced(SyncSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorStatus {
    pub init_state: InitState,
    pub profile: Option<MinimalProfile>,
    pub active: bool,
    pub session_expired: bool,
    pub is_stale: bool,
    pub sync: SyncState,
}

type SharedInit = Shared<BoxFuture<'static, Result<MinimalProfile, ApiError>>>;

struct CoordinatorState {
    init: InitState,
    profile: Option<MinimalProfile>,
    init_error: Option<ApiError>,
    in_flight: Option<SharedInit>,
    active: bool,
    session_expired: bool,
    /// When the store last matched the server, on the runtime clock
    fresh_since: Option<Instant>,
    /// Bumped on logout so work started before it is dropped
    epoch: u64,
}

impl Default for CoordinatorState {
    fn default() -> Self {
        Self {
            init: InitState::Uninitialized,
            profile: None,
            init_error: None,
            in_flight: None,
            active: false,
            session_expired: false,
            fresh_since: None,
            epoch: 0,
        }
    }
}

struct CoordinatorInner {
    store: CollectionStore,
    session: Arc<Session>,
    snapshots: Option<SnapshotStore>,
    settings: SyncSettings,
    state: Mutex<CoordinatorState>,
    /// Serializes full syncs
    sync_lock: tokio::sync::Mutex<()>,
}

/// Drives first-load initialization, full syncs and the background refresh.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl SyncCoordinator {
    pub fn new(
        store: CollectionStore,
        session: Arc<Session>,
        settings: SyncSettings,
        snapshots: Option<SnapshotStore>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                session,
                snapshots,
                settings,
                state: Mutex::new(CoordinatorState::default()),
                sync_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn downgrade(&self) -> Weak<CoordinatorInner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<CoordinatorInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn store(&self) -> &CollectionStore {
        &self.inner.store
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    pub fn settings(&self) -> SyncSettings {
        self.inner.settings
    }

    pub fn init_state(&self) -> InitState {
        self.lock().init
    }

    /// Restores collections from the local snapshot, if there is one.
    ///
    /// Staleness is carried over from the snapshot's last sync time, so an
    /// old snapshot is refreshed on the next background tick.
    pub fn load_snapshot(&self) -> Result<bool> {
        let Some(snapshots) = &self.inner.snapshots else {
            return Ok(false);
        };
        let Some(loaded) = snapshots.load()? else {
            return Ok(false);
        };

        let fresh_since = if loaded.needs_refetch() {
            None
        } else {
            loaded
                .snapshot
                .last_sync_at
                .and_then(|at| (Utc::now() - at).to_std().ok())
                .and_then(|age| Instant::now().checked_sub(age))
        };
        self.inner.store.restore(loaded);
        self.lock().fresh_since = fresh_since;
        Ok(true)
    }

    /// Loads the minimal profile once.
    ///
    /// Concurrent callers share one request. A failure settles into
    /// `InitError` and is returned again until `retry_initialize` is called.
    pub async fn initialize(&self) -> Result<MinimalProfile, ApiError> {
        let pending = {
            let mut state = self.lock();
            let existing = match state.init {
                InitState::Initialized => match &state.profile {
                    Some(profile) => return Ok(profile.clone()),
                    None => None,
                },
                InitState::InitError => {
                    return Err(state
                        .init_error
                        .clone()
                        .unwrap_or_else(|| ApiError::Internal("initialization failed".to_string())));
                }
                InitState::Initializing => state.in_flight.clone(),
                InitState::Uninitialized => None,
            };
            match existing {
                Some(in_flight) => in_flight,
                None => {
                    let started = self.start_initialize(state.epoch);
                    state.init = InitState::Initializing;
                    state.in_flight = Some(started.clone());
                    started
                }
            }
        };

        pending.await
    }

    /// Leaves `InitError` and tries again
    pub async fn retry_initialize(&self) -> Result<MinimalProfile, ApiError> {
        {
            let mut state = self.lock();
            if state.init == InitState::InitError {
                state.init = InitState::Uninitialized;
                state.init_error = None;
                debug!("Retrying initialization");
            }
        }
        self.initialize().await
    }

    fn start_initialize(&self, epoch: u64) -> SharedInit {
        let remote = Arc::clone(self.inner.store.remote());
        let handle = tokio::spawn(async move { remote.fetch_minimal_profile().await });
        let coordinator = self.clone();
        async move {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => Err(ApiError::Internal(format!("initialization task failed: {}", e))),
            };
            coordinator.finish_initialize(epoch, &result);
            result
        }
        .boxed()
        .shared()
    }

    fn finish_initialize(&self, epoch: u64, result: &Result<MinimalProfile, ApiError>) {
        let mut state = self.lock();
        if state.epoch != epoch || state.init != InitState::Initializing {
            return;
        }
        state.in_flight = None;
        match result {
            Ok(profile) => {
                state.init = InitState::Initialized;
                state.profile = Some(profile.clone());
                state.session_expired = false;
                self.inner.store.set_initialized(true);
                info!(operation = "initialized", user = %profile.username, "Session initialized");
            }
            Err(e) => {
                state.init = InitState::InitError;
                state.init_error = Some(e.clone());
                warn!(operation = "initialize_failed", error = %e, "Initialization failed");
            }
        }
    }

    pub fn is_stale(&self) -> bool {
        match self.lock().fresh_since {
            Some(at) => at.elapsed() >= self.inner.settings.stale_after,
            None => true,
        }
    }

    /// Fetches profile, watchlists and reviews together and replaces the
    /// local collections with them. Skipped when data is fresh unless forced.
    #[instrument(skip(self))]
    pub async fn sync_with_server(&self, force_refresh: bool) -> Result<SyncOutcome, ApiError> {
        let _serial = self.inner.sync_lock.lock().await;

        if !force_refresh && !self.is_stale() {
            debug!("Collections are fresh, skipping sync");
            return Ok(SyncOutcome::Skipped {
                last_sync_at: self.inner.store.last_sync_at(),
            });
        }

        let epoch = self.lock().epoch;
        let started = Instant::now();
        let remote = self.inner.store.remote();
        let (profile, watchlists, reviews) = tokio::try_join!(
            remote.fetch_profile(),
            remote.fetch_watchlists(),
            remote.fetch_user_reviews()
        )?;

        if self.lock().epoch != epoch {
            info!("Session ended during sync, discarding fetched collections");
            return Ok(SyncOutcome::Skipped { last_sync_at: None });
        }

        let synced_at = Utc::now();
        let (id, username) = (profile.id, profile.username);
        self.inner.store.replace_all(
            Collections {
                favorites: profile.favorites,
                watched: profile.watched,
                watchlists,
                reviews,
            },
            synced_at,
        );

        // Counts come from the deduplicated store
        let stats = self.inner.store.stats();
        let summary = SyncSummary {
            favorites: stats.total_favorites,
            watched: stats.total_watched,
            watchlists: stats.total_watchlists,
            reviews: stats.total_reviews,
            synced_at,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        let minimal = MinimalProfile {
            id,
            username,
            favorites_count: stats.total_favorites,
            watched_count: stats.total_watched,
        };

        {
            let mut state = self.lock();
            state.fresh_since = Some(Instant::now());
            state.profile = Some(minimal);
            if state.init != InitState::Initialized {
                state.init = InitState::Initialized;
                state.init_error = None;
                state.in_flight = None;
                self.inner.store.set_initialized(true);
            }
        }

        self.persist();
        info!(
            operation = "sync_complete",
            favorites = summary.favorites,
            watched = summary.watched,
            watchlists = summary.watchlists,
            reviews = summary.reviews,
            duration_ms = summary.duration_ms,
            "Collections synced from server"
        );
        Ok(SyncOutcome::Synced(summary))
    }

    /// Writes local collections to the snapshot file when persistence is on.
    /// Failures are logged, never returned.
    pub fn persist(&self) {
        if !self.inner.settings.persist_snapshot {
            return;
        }
        if let Some(snapshots) = &self.inner.snapshots {
            if let Err(e) = snapshots.save(&self.inner.store.snapshot()) {
                warn!("Failed to persist collections snapshot: {}", e);
            }
        }
    }

    /// Background refresh only runs while the coordinator is active
    pub fn set_active(&self, active: bool) {
        self.lock().active = active;
        debug!(active, "Coordinator activity changed");
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    /// One background tick: sync when active, signed in and stale.
    /// Failures are logged and swallowed.
    pub async fn refresh_if_stale(&self) -> bool {
        let (active, expired) = {
            let state = self.lock();
            (state.active, state.session_expired)
        };
        if !active || expired || !self.inner.session.is_authenticated() {
            trace!(active, expired, "Background refresh skipped");
            return false;
        }
        if !self.is_stale() {
            return false;
        }

        match self.sync_with_server(false).await {
            Ok(SyncOutcome::Synced(_)) => true,
            Ok(SyncOutcome::Skipped { .. }) => false,
            Err(e) => {
                warn!(operation = "background_refresh", error = %e, "Background refresh failed");
                false
            }
        }
    }

    /// Ticks every `refresh_interval`. The task ends once the coordinator is dropped.
    pub fn spawn_background_refresh(&self) -> JoinHandle<()> {
        let weak = self.downgrade();
        let period = self.inner.settings.refresh_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(coordinator) = Self::upgrade(&weak) else {
                    break;
                };
                coordinator.refresh_if_stale().await;
            }
        })
    }

    /// Watches the session for expiry; the UI decides what to do about it
    pub fn spawn_session_listener(&self) -> JoinHandle<()> {
        let mut events = self.inner.session.subscribe();
        let weak = self.downgrade();
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Session listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(coordinator) = Self::upgrade(&weak) else {
                    break;
                };
                match event {
                    SessionEvent::Expired => {
                        coordinator.lock().session_expired = true;
                        warn!(operation = "session_expired", "Session expired, background refresh paused");
                    }
                    SessionEvent::SignedIn => coordinator.lock().session_expired = false,
                    SessionEvent::SignedOut => {}
                }
            }
        })
    }

    /// Clears the credential, local collections, cached responses and the snapshot
    pub fn logout(&self) -> Result<()> {
        self.inner.session.clear();
        {
            let mut state = self.lock();
            let epoch = state.epoch + 1;
            let active = state.active;
            *state = CoordinatorState {
                epoch,
                active,
                ..CoordinatorState::default()
            };
        }
        self.inner.store.reset();
        self.inner.store.remote().clear_cache();
        if let Some(snapshots) = &self.inner.snapshots {
            snapshots.clear()?;
        }
        info!(operation = "logout", "Signed out and cleared local data");
        Ok(())
    }

    pub fn status(&self) -> CoordinatorStatus {
        let is_stale = self.is_stale();
        let state = self.lock();
        CoordinatorStatus {
            init_state: state.init,
            profile: state.profile.clone(),
            active: state.active,
            session_expired: state.session_expired,
            is_stale,
            sync: self.inner.store.sync_state(),
        }
    }
}
