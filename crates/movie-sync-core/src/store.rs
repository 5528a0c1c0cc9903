use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use movie_sync_client::{ApiError, CollectionRemote};
use movie_sync_models::{
    dedup_by_movie_id, CollectionEntry, CollectionStats, MovieId, NewReview, Review, Watchlist, WatchlistDraft,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::optimistic::{CollectionKey, Inverse, MutationKey, MutationRecord};
use crate::snapshot::{Collections, LoadedSnapshot, Snapshot};
use crate::stats;

const MIN_RATING: f32 = 0.5;
const MAX_RATING: f32 = 10.0;
const PROVISIONAL_PREFIX: &str = "local-";

/// Result of an optimistic change.
///
/// The local state has already changed by the time this value exists. The
/// remote call runs on the runtime whether or not the `Mutation` is awaited;
/// awaiting it yields the settled outcome (after any rollback).
#[must_use = "await the mutation to learn whether the server accepted it"]
pub struct Mutation<T = ()> {
    outcome: BoxFuture<'static, Result<T, StoreError>>,
}

impl<T: Send + 'static> Mutation<T> {
    fn rejected(err: StoreError) -> Self {
        debug!(error = %err, "mutation rejected locally");
        Self {
            outcome: futures::future::ready(Err(err)).boxed(),
        }
    }

    /// Starts the remote half right away when a runtime is available
    fn launch(task: BoxFuture<'static, Result<T, StoreError>>) -> Self {
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let handle = runtime.spawn(task);
                Self {
                    outcome: async move {
                        handle.await.map_err(|e| {
                            StoreError::Remote(ApiError::Internal(format!("mutation task failed: {}", e)))
                        })?
                    }
                    .boxed(),
                }
            }
            Err(_) => Self { outcome: task },
        }
    }
}

impl<T> Future for Mutation<T> {
    type Output = Result<T, StoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.outcome.as_mut().poll(cx)
    }
}

/// Snapshot of the store's bookkeeping for status displays
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncState {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub is_initialized: bool,
    pub pending_optimistic_keys: Vec<MutationKey>,
    /// Some local collection was discarded and must come from the server again
    pub needs_refetch: bool,
}

struct PendingMutation {
    ticket: u64,
    record: MutationRecord,
}

#[derive(Default)]
struct StoreState {
    collections: Collections,
    stats: CollectionStats,
    pending: BTreeMap<MutationKey, PendingMutation>,
    last_sync_at: Option<DateTime<Utc>>,
    is_initialized: bool,
    needs_refetch: bool,
}

impl StoreState {
    fn refresh_stats(&mut self) {
        let c = &self.collections;
        self.stats = stats::compute(&c.favorites, &c.watched, &c.watchlists, &c.reviews);
    }

    fn watchlist_index(&self, watchlist_id: &str) -> Option<usize> {
        self.collections.watchlists.iter().position(|list| list.id == watchlist_id)
    }

    /// The entry list behind a collection key, if that collection exists
    fn entries(&self, collection: &CollectionKey) -> Option<&Vec<CollectionEntry>> {
        match collection {
            CollectionKey::Favorites => Some(&self.collections.favorites),
            CollectionKey::Watched => Some(&self.collections.watched),
            CollectionKey::Watchlist(id) => self
                .collections
                .watchlists
                .iter()
                .find(|list| &list.id == id)
                .map(|list| &list.movies),
        }
    }

    fn entries_mut(&mut self, collection: &CollectionKey) -> Option<&mut Vec<CollectionEntry>> {
        match collection {
            CollectionKey::Favorites => Some(&mut self.collections.favorites),
            CollectionKey::Watched => Some(&mut self.collections.watched),
            CollectionKey::Watchlist(id) => self
                .collections
                .watchlists
                .iter_mut()
                .find(|list| &list.id == id)
                .map(|list| &mut list.movies),
        }
    }

    fn sync_counts(&mut self) {
        self.collections.watchlists.iter_mut().for_each(Watchlist::sync_count);
    }

    /// Inverses are applied idempotently; a full sync may already have
    /// replaced the state they were computed against.
    fn apply_inverse(&mut self, inverse: Inverse) {
        match inverse {
            Inverse::RemoveEntry { collection, movie_id } => {
                if let Some(entries) = self.entries_mut(&collection) {
                    entries.retain(|entry| entry.movie_id != movie_id);
                }
            }
            Inverse::RestoreEntry { collection, index, entry } => {
                if let Some(entries) = self.entries_mut(&collection) {
                    if !entries.iter().any(|e| e.movie_id == entry.movie_id) {
                        let index = index.min(entries.len());
                        entries.insert(index, entry);
                    }
                }
            }
            Inverse::RemoveWatchlist { id } => {
                self.collections.watchlists.retain(|list| list.id != id);
            }
            Inverse::RestoreWatchlist { index, watchlist } => match self.watchlist_index(&watchlist.id) {
                Some(existing) => self.collections.watchlists[existing] = watchlist,
                None => {
                    let index = index.min(self.collections.watchlists.len());
                    self.collections.watchlists.insert(index, watchlist);
                }
            },
            Inverse::RestoreWatchlistDetails { id, name, description, is_public } => {
                if let Some(list) = self.collections.watchlists.iter_mut().find(|list| list.id == id) {
                    list.name = name;
                    list.description = description;
                    list.is_public = is_public;
                }
            }
        }
        self.sync_counts();
    }

    fn has_pending_in(&self, collection: &CollectionKey) -> bool {
        self.pending.keys().any(|key| &key.collection == collection)
    }
}

struct StoreInner {
    remote: Arc<dyn CollectionRemote>,
    state: Mutex<StoreState>,
    next_ticket: AtomicU64,
}

/// Local, optimistic view of the user's favorites, watched list, watchlists
/// and reviews.
///
/// Cloning is cheap; every clone shares the same state.
#[derive(Clone)]
pub struct CollectionStore {
    inner: Arc<StoreInner>,
}

fn validate_entry(entry: &CollectionEntry) -> Result<(), StoreError> {
    if entry.title.trim().is_empty() {
        return Err(StoreError::Invalid("title must not be empty".to_string()));
    }
    if let Some(rating) = entry.rating {
        validate_rating(rating)?;
    }
    Ok(())
}

fn validate_rating(rating: f32) -> Result<(), StoreError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(StoreError::Invalid(format!(
            "rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, rating
        )));
    }
    Ok(())
}

fn validate_draft(draft: &WatchlistDraft) -> Result<WatchlistDraft, StoreError> {
    let name = draft.name.trim();
    if name.is_empty() {
        return Err(StoreError::Invalid("watchlist name must not be empty".to_string()));
    }
    Ok(WatchlistDraft {
        name: name.to_string(),
        description: draft
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
        is_public: draft.is_public,
    })
}

impl CollectionStore {
    pub fn new(remote: Arc<dyn CollectionRemote>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                remote,
                state: Mutex::new(StoreState::default()),
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    pub fn remote(&self) -> &Arc<dyn CollectionRemote> {
        &self.inner.remote
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ticket(&self) -> u64 {
        self.inner.next_ticket.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a pending mutation; caller holds the state lock
    fn register(state: &mut StoreState, ticket: u64, key: MutationKey, inverse: Inverse) {
        let record = MutationRecord::pending(key.clone(), inverse);
        state.pending.insert(key, PendingMutation { ticket, record });
        state.refresh_stats();
    }

    /// Commits or rolls back a pending mutation once the server answered.
    ///
    /// A record that is gone (store reset) or replaced by a newer ticket is
    /// left alone; the remote error is still reported.
    fn settle<T>(&self, ticket: u64, key: &MutationKey, result: Result<T, ApiError>) -> Result<T, StoreError> {
        let mut state = self.lock();
        let owned = state.pending.get(key).map(|p| p.ticket) == Some(ticket);
        if !owned {
            debug!(mutation = %key, "settled mutation no longer tracked");
            return result.map_err(StoreError::from);
        }
        let Some(mut pending) = state.pending.remove(key) else {
            return result.map_err(StoreError::from);
        };

        match result {
            Ok(value) => {
                pending.record.commit()?;
                state.refresh_stats();
                info!(operation = "mutation_committed", mutation = %key, "Change confirmed by server");
                Ok(value)
            }
            Err(err) => {
                let inverse = pending.record.roll_back()?;
                state.apply_inverse(inverse);
                state.refresh_stats();
                warn!(
                    operation = "mutation_rolled_back",
                    mutation = %key,
                    error = %err,
                    "Server rejected change, local state restored"
                );
                Err(StoreError::Remote(err))
            }
        }
    }

    // Generic collection operations

    pub fn contains(&self, collection: &CollectionKey, movie_id: &MovieId) -> bool {
        self.lock()
            .entries(collection)
            .map(|entries| entries.iter().any(|entry| &entry.movie_id == movie_id))
            .unwrap_or(false)
    }

    /// Optimistically add `entry` to `collection`
    pub fn add(&self, collection: CollectionKey, entry: CollectionEntry) -> Mutation {
        if let Err(err) = validate_entry(&entry) {
            return Mutation::rejected(err);
        }

        let ticket = self.ticket();
        let key = MutationKey::movie(collection.clone(), entry.movie_id.clone());
        {
            let mut state = self.lock();
            let Some(entries) = state.entries(&collection) else {
                return Mutation::rejected(watchlist_missing(&collection));
            };
            if entries.iter().any(|e| e.movie_id == entry.movie_id) {
                return Mutation::rejected(StoreError::AlreadyExists);
            }
            if state.pending.contains_key(&key) || state.pending.contains_key(&MutationKey::collection(collection.clone())) {
                return Mutation::rejected(StoreError::MutationPending);
            }

            if let Some(entries) = state.entries_mut(&collection) {
                entries.push(entry.clone());
            }
            state.sync_counts();
            let inverse = Inverse::RemoveEntry {
                collection: collection.clone(),
                movie_id: entry.movie_id.clone(),
            };
            Self::register(&mut state, ticket, key.clone(), inverse);
        }

        let store = self.clone();
        let remote = Arc::clone(&self.inner.remote);
        Mutation::launch(
            async move {
                let result = match &collection {
                    CollectionKey::Favorites => remote.add_favorite(&entry).await,
                    CollectionKey::Watched => remote.add_watched(&entry).await,
                    CollectionKey::Watchlist(id) => remote.add_to_watchlist(id, &entry).await,
                };
                store.settle(ticket, &key, result)
            }
            .boxed(),
        )
    }

    /// Optimistically remove `movie_id` from `collection`
    pub fn remove(&self, collection: CollectionKey, movie_id: MovieId) -> Mutation {
        let ticket = self.ticket();
        let key = MutationKey::movie(collection.clone(), movie_id.clone());
        {
            let mut state = self.lock();
            let Some(entries) = state.entries(&collection) else {
                return Mutation::rejected(watchlist_missing(&collection));
            };
            let Some(index) = entries.iter().position(|e| e.movie_id == movie_id) else {
                return Mutation::rejected(StoreError::NotFound);
            };
            if state.pending.contains_key(&key) || state.pending.contains_key(&MutationKey::collection(collection.clone())) {
                return Mutation::rejected(StoreError::MutationPending);
            }

            let Some(entries) = state.entries_mut(&collection) else {
                return Mutation::rejected(watchlist_missing(&collection));
            };
            let entry = entries.remove(index);
            state.sync_counts();
            let inverse = Inverse::RestoreEntry {
                collection: collection.clone(),
                index,
                entry,
            };
            Self::register(&mut state, ticket, key.clone(), inverse);
        }

        let store = self.clone();
        let remote = Arc::clone(&self.inner.remote);
        Mutation::launch(
            async move {
                let result = match &collection {
                    CollectionKey::Favorites => remote.remove_favorite(&movie_id).await,
                    CollectionKey::Watched => remote.remove_watched(&movie_id).await,
                    CollectionKey::Watchlist(id) => remote.remove_from_watchlist(id, &movie_id).await,
                };
                store.settle(ticket, &key, result)
            }
            .boxed(),
        )
    }

    // Favorites

    pub fn add_favorite(&self, entry: CollectionEntry) -> Mutation {
        self.add(CollectionKey::Favorites, entry)
    }

    pub fn remove_favorite(&self, movie_id: MovieId) -> Mutation {
        self.remove(CollectionKey::Favorites, movie_id)
    }

    pub fn contains_favorite(&self, movie_id: &MovieId) -> bool {
        self.contains(&CollectionKey::Favorites, movie_id)
    }

    pub fn favorites(&self) -> Vec<CollectionEntry> {
        self.lock().collections.favorites.clone()
    }

    // Watched

    pub fn add_watched(&self, entry: CollectionEntry) -> Mutation {
        self.add(CollectionKey::Watched, entry)
    }

    pub fn remove_watched(&self, movie_id: MovieId) -> Mutation {
        self.remove(CollectionKey::Watched, movie_id)
    }

    pub fn contains_watched(&self, movie_id: &MovieId) -> bool {
        self.contains(&CollectionKey::Watched, movie_id)
    }

    pub fn watched(&self) -> Vec<CollectionEntry> {
        self.lock().collections.watched.clone()
    }

    // Watchlists

    pub fn add_to_watchlist(&self, watchlist_id: &str, entry: CollectionEntry) -> Mutation {
        self.add(CollectionKey::Watchlist(watchlist_id.to_string()), entry)
    }

    pub fn remove_from_watchlist(&self, watchlist_id: &str, movie_id: MovieId) -> Mutation {
        self.remove(CollectionKey::Watchlist(watchlist_id.to_string()), movie_id)
    }

    pub fn contains_in_watchlist(&self, watchlist_id: &str, movie_id: &MovieId) -> bool {
        self.contains(&CollectionKey::Watchlist(watchlist_id.to_string()), movie_id)
    }

    pub fn watchlists(&self) -> Vec<Watchlist> {
        self.lock().collections.watchlists.clone()
    }

    pub fn watchlist(&self, watchlist_id: &str) -> Option<Watchlist> {
        let state = self.lock();
        state.watchlist_index(watchlist_id).map(|i| state.collections.watchlists[i].clone())
    }

    /// Watchlists holding `movie_id`
    pub fn watchlists_containing(&self, movie_id: &MovieId) -> Vec<String> {
        self.lock()
            .collections
            .watchlists
            .iter()
            .filter(|list| list.contains(movie_id))
            .map(|list| list.id.clone())
            .collect()
    }

    /// Adds a provisional watchlist right away and swaps in the server's copy
    /// once it is created
    pub fn create_watchlist(&self, draft: WatchlistDraft) -> Mutation<Watchlist> {
        let draft = match validate_draft(&draft) {
            Ok(draft) => draft,
            Err(err) => return Mutation::rejected(err),
        };

        let ticket = self.ticket();
        let provisional_id = format!("{}{}", PROVISIONAL_PREFIX, ticket);
        let key = MutationKey::collection(CollectionKey::Watchlist(provisional_id.clone()));
        {
            let mut state = self.lock();
            let mut provisional = Watchlist::new(provisional_id.clone(), draft.name.clone());
            provisional.description = draft.description.clone();
            provisional.is_public = draft.is_public;
            state.collections.watchlists.push(provisional);
            let inverse = Inverse::RemoveWatchlist {
                id: provisional_id.clone(),
            };
            Self::register(&mut state, ticket, key.clone(), inverse);
        }

        let store = self.clone();
        let remote = Arc::clone(&self.inner.remote);
        Mutation::launch(
            async move {
                let result = remote.create_watchlist(&draft).await;
                let mut created = store.settle(ticket, &key, result)?;
                created.sync_count();
                let mut state = store.lock();
                match state.watchlist_index(&provisional_id) {
                    Some(index) => state.collections.watchlists[index] = created.clone(),
                    None => {
                        if state.watchlist_index(&created.id).is_none() {
                            state.collections.watchlists.push(created.clone());
                        }
                    }
                }
                state.refresh_stats();
                Ok(created)
            }
            .boxed(),
        )
    }

    /// Renames or edits a watchlist's metadata; movies are untouched
    pub fn update_watchlist(&self, watchlist_id: &str, draft: WatchlistDraft) -> Mutation<Watchlist> {
        let draft = match validate_draft(&draft) {
            Ok(draft) => draft,
            Err(err) => return Mutation::rejected(err),
        };

        let collection = CollectionKey::Watchlist(watchlist_id.to_string());
        let ticket = self.ticket();
        let key = MutationKey::collection(collection.clone());
        let updated = {
            let mut state = self.lock();
            let Some(index) = state.watchlist_index(watchlist_id) else {
                return Mutation::rejected(StoreError::WatchlistNotFound(watchlist_id.to_string()));
            };
            if state.has_pending_in(&collection) {
                return Mutation::rejected(StoreError::MutationPending);
            }
            let list = &mut state.collections.watchlists[index];
            let previous = Inverse::RestoreWatchlistDetails {
                id: list.id.clone(),
                name: list.name.clone(),
                description: list.description.clone(),
                is_public: list.is_public,
            };
            list.name = draft.name.clone();
            list.description = draft.description.clone();
            list.is_public = draft.is_public;
            let updated = list.clone();
            Self::register(&mut state, ticket, key.clone(), previous);
            updated
        };

        let store = self.clone();
        let remote = Arc::clone(&self.inner.remote);
        let watchlist_id = watchlist_id.to_string();
        Mutation::launch(
            async move {
                let result = remote.update_watchlist(&watchlist_id, &draft).await;
                let server = store.settle(ticket, &key, result)?;
                let mut state = store.lock();
                let Some(index) = state.watchlist_index(&watchlist_id) else {
                    return Ok(updated);
                };
                let list = &mut state.collections.watchlists[index];
                list.name = server.name;
                list.description = server.description;
                list.is_public = server.is_public;
                Ok(list.clone())
            }
            .boxed(),
        )
    }

    pub fn delete_watchlist(&self, watchlist_id: &str) -> Mutation {
        let collection = CollectionKey::Watchlist(watchlist_id.to_string());
        let ticket = self.ticket();
        let key = MutationKey::collection(collection.clone());
        {
            let mut state = self.lock();
            let Some(index) = state.watchlist_index(watchlist_id) else {
                return Mutation::rejected(StoreError::WatchlistNotFound(watchlist_id.to_string()));
            };
            if state.has_pending_in(&collection) {
                return Mutation::rejected(StoreError::MutationPending);
            }
            let removed = state.collections.watchlists.remove(index);
            Self::register(&mut state, ticket, key.clone(), Inverse::RestoreWatchlist { index, watchlist: removed });
        }

        let store = self.clone();
        let remote = Arc::clone(&self.inner.remote);
        let watchlist_id = watchlist_id.to_string();
        Mutation::launch(
            async move {
                let result = remote.delete_watchlist(&watchlist_id).await;
                store.settle(ticket, &key, result)
            }
            .boxed(),
        )
    }

    // Reviews are not optimistic: the server assigns ids and like counts

    pub fn reviews(&self) -> Vec<Review> {
        self.lock().collections.reviews.clone()
    }

    pub async fn submit_review(&self, review: NewReview) -> Result<Review, StoreError> {
        validate_rating(review.rating)?;
        if review.content.trim().is_empty() {
            return Err(StoreError::Invalid("review content must not be empty".to_string()));
        }

        let created = self.inner.remote.submit_review(&review).await?;
        let mut state = self.lock();
        state.collections.reviews.retain(|r| r.id != created.id);
        state.collections.reviews.insert(0, created.clone());
        state.refresh_stats();
        info!(operation = "review_submitted", movie_id = %created.movie_id, "Review submitted");
        Ok(created)
    }

    pub async fn like_review(&self, review_id: &str) -> Result<(), StoreError> {
        let likes = self.inner.remote.like_review(review_id).await?;
        let mut state = self.lock();
        if let Some(review) = state.collections.reviews.iter_mut().find(|r| r.id == review_id) {
            review.likes = likes.unwrap_or(review.likes + 1);
        }
        Ok(())
    }

    pub async fn report_review(&self, review_id: &str, reason: &str) -> Result<(), StoreError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(StoreError::Invalid("a report needs a reason".to_string()));
        }
        self.inner.remote.report_review(review_id, reason).await?;
        info!(operation = "review_reported", review_id = %review_id, "Review reported");
        Ok(())
    }

    // Whole-store operations

    pub fn stats(&self) -> CollectionStats {
        self.lock().stats.clone()
    }

    pub fn is_pending(&self, key: &MutationKey) -> bool {
        self.lock().pending.contains_key(key)
    }

    pub fn sync_state(&self) -> SyncState {
        let state = self.lock();
        SyncState {
            last_sync_at: state.last_sync_at,
            is_initialized: state.is_initialized,
            pending_optimistic_keys: state.pending.keys().cloned().collect(),
            needs_refetch: state.needs_refetch,
        }
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.lock().last_sync_at
    }

    pub fn set_initialized(&self, initialized: bool) {
        self.lock().is_initialized = initialized;
    }

    /// Server wins: replaces every collection with the fetched state.
    ///
    /// Pending mutations stay registered and settle against the new state.
    pub fn replace_all(&self, collections: Collections, synced_at: DateTime<Utc>) {
        let mut collections = collections;
        dedup_by_movie_id(&mut collections.favorites);
        dedup_by_movie_id(&mut collections.watched);
        for list in &mut collections.watchlists {
            dedup_by_movie_id(&mut list.movies);
        }
        let mut state = self.lock();
        state.collections = collections;
        state.sync_counts();
        state.last_sync_at = Some(synced_at);
        state.needs_refetch = false;
        state.refresh_stats();
        debug!(
            pending = state.pending.len(),
            "Collections replaced from server"
        );
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot::new(state.collections.clone(), state.last_sync_at)
    }

    pub fn restore(&self, loaded: LoadedSnapshot) {
        let needs_refetch = loaded.needs_refetch();
        let mut state = self.lock();
        state.collections = loaded.snapshot.collections();
        state.sync_counts();
        state.last_sync_at = if needs_refetch { None } else { loaded.snapshot.last_sync_at };
        state.needs_refetch = needs_refetch;
        state.refresh_stats();
    }

    /// Forget everything (logout); in-flight mutations settle without effect
    pub fn reset(&self) {
        *self.lock() = StoreState::default();
        info!(operation = "store_reset", "Collection store cleared");
    }
}

fn watchlist_missing(collection: &CollectionKey) -> StoreError {
    match collection {
        CollectionKey::Watchlist(id) => StoreError::WatchlistNotFound(id.clone()),
        _ => StoreError::NotFound,
    }
}
