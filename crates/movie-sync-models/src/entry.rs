use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use crate::movie_id::MovieId;

/// A movie inside one of the user's collections (favorites, watched, or a watchlist)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionEntry {
    #[serde(alias = "movie_id", alias = "id")]
    pub movie_id: MovieId,
    pub title: String,
    #[serde(default, alias = "poster_path", skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    // watchedAt for the watched list, addedAt everywhere else
    #[serde(default = "Utc::now", alias = "watchedAt", alias = "added_at")]
    pub added_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>, // Only set on watched entries
}

impl CollectionEntry {
    pub fn new(movie_id: MovieId, title: impl Into<String>) -> Self {
        Self {
            movie_id,
            title: title.into(),
            poster_path: None,
            added_at: Utc::now(),
            rating: None,
        }
    }

    pub fn with_poster(mut self, poster_path: impl Into<String>) -> Self {
        self.poster_path = Some(poster_path.into());
        self
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_added_at(mut self, added_at: DateTime<Utc>) -> Self {
        self.added_at = added_at;
        self
    }
}

/// Keeps the first entry for each movie. The backend mixes numeric and
/// string ids, so duplicates only show up after normalization.
pub fn dedup_by_movie_id(entries: &mut Vec<CollectionEntry>) {
    let mut seen: HashSet<MovieId> = HashSet::new();
    entries.retain(|entry| seen.insert(entry.movie_id.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_accepts_numeric_movie_id() {
        let entry: CollectionEntry = serde_json::from_value(json!({
            "movieId": 603,
            "title": "The Matrix",
            "posterPath": "/matrix.jpg",
            "watchedAt": "2024-03-01T10:00:00Z",
            "rating": 9.0
        }))
        .unwrap();

        assert_eq!(entry.movie_id, "603");
        assert_eq!(entry.poster_path.as_deref(), Some("/matrix.jpg"));
        assert_eq!(entry.rating, Some(9.0));
    }

    #[test]
    fn test_entry_missing_id_fails() {
        let result: Result<CollectionEntry, _> = serde_json::from_value(json!({"title": "No id"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_dedup_keeps_first_of_mixed_id_forms() {
        let mut entries: Vec<CollectionEntry> = serde_json::from_value(json!([
            {"movieId": 42, "title": "First"},
            {"movieId": "42", "title": "Second"},
            {"movieId": 7, "title": "Other"}
        ]))
        .unwrap();

        dedup_by_movie_id(&mut entries);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "First");
        assert_eq!(entries[1].movie_id, "7");
    }
}
