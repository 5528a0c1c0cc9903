use async_trait::async_trait;
use movie_sync_models::{
    CollectionEntry, MinimalProfile, MovieId, NewReview, Review, UserProfile, Watchlist, WatchlistDraft,
};

use crate::error::ApiError;

/// The user-scoped half of the backend: everything the collection store and
/// the sync coordinator need to read or change on the server.
///
/// `MovieApi` is the real implementation. Store and coordinator tests plug in
/// in-memory remotes that count calls or fail on demand.
#[async_trait]
pub trait CollectionRemote: Send + Sync {
    // Reads used by initialization and full sync
    async fn fetch_profile(&self) -> Result<UserProfile, ApiError>;
    async fn fetch_minimal_profile(&self) -> Result<MinimalProfile, ApiError>;
    async fn fetch_watchlists(&self) -> Result<Vec<Watchlist>, ApiError>;
    async fn fetch_user_reviews(&self) -> Result<Vec<Review>, ApiError>;

    // Favorites and watched list
    async fn add_favorite(&self, entry: &CollectionEntry) -> Result<(), ApiError>;
    async fn remove_favorite(&self, movie_id: &MovieId) -> Result<(), ApiError>;
    async fn add_watched(&self, entry: &CollectionEntry) -> Result<(), ApiError>;
    async fn remove_watched(&self, movie_id: &MovieId) -> Result<(), ApiError>;

    // Watchlists
    async fn create_watchlist(&self, draft: &WatchlistDraft) -> Result<Watchlist, ApiError>;
    async fn update_watchlist(&self, watchlist_id: &str, draft: &WatchlistDraft) -> Result<Watchlist, ApiError>;
    async fn delete_watchlist(&self, watchlist_id: &str) -> Result<(), ApiError>;
    async fn add_to_watchlist(&self, watchlist_id: &str, entry: &CollectionEntry) -> Result<(), ApiError>;
    async fn remove_from_watchlist(&self, watchlist_id: &str, movie_id: &MovieId) -> Result<(), ApiError>;

    // Reviews
    async fn submit_review(&self, review: &NewReview) -> Result<Review, ApiError>;

    /// Returns the new like count when the backend reports one
    async fn like_review(&self, review_id: &str) -> Result<Option<u32>, ApiError>;

    async fn report_review(&self, review_id: &str, reason: &str) -> Result<(), ApiError>;

    /// Drop anything cached on behalf of the current user (logout)
    fn clear_cache(&self) {}
}
