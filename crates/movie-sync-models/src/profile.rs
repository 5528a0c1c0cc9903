use serde::{Deserialize, Serialize};
use crate::entry::CollectionEntry;

/// Full profile as returned by `GET /users/profile`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, alias = "favoriteMovies")]
    pub favorites: Vec<CollectionEntry>,
    #[serde(default, alias = "watchedMovies")]
    pub watched: Vec<CollectionEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<CollectionStats>,
}

/// Lightweight profile used for first-load initialization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MinimalProfile {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub favorites_count: usize,
    #[serde(default)]
    pub watched_count: usize,
}

/// Totals and derived values shown next to the user's collections
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    #[serde(default)]
    pub total_favorites: usize,
    #[serde(default)]
    pub total_watched: usize,
    #[serde(default)]
    pub total_watchlists: usize,
    #[serde(default)]
    pub total_watchlist_movies: usize,
    #[serde(default)]
    pub total_reviews: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f32>,
}
