use serde::{Deserialize, Serialize};
use crate::entry::CollectionEntry;
use crate::movie_id::MovieId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Watchlist {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "is_public")]
    pub is_public: bool,
    #[serde(default)]
    pub movies: Vec<CollectionEntry>,
    #[serde(default, alias = "movie_count")]
    pub movie_count: usize, // Always movies.len() once the store owns the list
}

impl Watchlist {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            is_public: false,
            movies: Vec::new(),
            movie_count: 0,
        }
    }

    pub fn contains(&self, movie_id: &MovieId) -> bool {
        self.movies.iter().any(|m| &m.movie_id == movie_id)
    }

    pub fn position(&self, movie_id: &MovieId) -> Option<usize> {
        self.movies.iter().position(|m| &m.movie_id == movie_id)
    }

    pub fn sync_count(&mut self) {
        self.movie_count = self.movies.len();
    }
}

/// Fields the user can set when creating or editing a watchlist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}
