use movie_sync_models::{CollectionEntry, MovieId, Watchlist};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::error::StoreError;

/// Which user collection a mutation targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CollectionKey {
    Favorites,
    Watched,
    Watchlist(String),
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKey::Favorites => f.write_str("favorites"),
            CollectionKey::Watched => f.write_str("watched"),
            CollectionKey::Watchlist(id) => write!(f, "watchlist:{}", id),
        }
    }
}

/// Identity of one in-flight mutation. Watchlist-level operations (create,
/// rename, delete) use `movie_id: None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MutationKey {
    pub collection: CollectionKey,
    pub movie_id: Option<MovieId>,
}

impl MutationKey {
    pub fn movie(collection: CollectionKey, movie_id: MovieId) -> Self {
        Self {
            collection,
            movie_id: Some(movie_id),
        }
    }

    pub fn collection(collection: CollectionKey) -> Self {
        Self {
            collection,
            movie_id: None,
        }
    }
}

impl fmt::Display for MutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.movie_id {
            Some(id) => write!(f, "{}/{}", self.collection, id),
            None => write!(f, "{}", self.collection),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationPhase {
    Pending,
    Committed,
    RolledBack,
}

/// What has to be put back if the remote call fails
#[derive(Debug, Clone, PartialEq)]
pub enum Inverse {
    /// Undo an add: drop the entry again
    RemoveEntry { collection: CollectionKey, movie_id: MovieId },
    /// Undo a remove: reinsert at the position it was taken from
    RestoreEntry { collection: CollectionKey, index: usize, entry: CollectionEntry },
    /// Undo a watchlist create: drop the provisional list
    RemoveWatchlist { id: String },
    /// Undo a watchlist delete: put the removed list back
    RestoreWatchlist { index: usize, watchlist: Watchlist },
    /// Undo a rename: only the metadata goes back, movies stay as synced
    RestoreWatchlistDetails {
        id: String,
        name: String,
        description: Option<String>,
        is_public: bool,
    },
}

/// One optimistic mutation and where it is in its lifecycle.
///
/// Only two transitions exist: `Pending -> Committed` and
/// `Pending -> RolledBack`. A settled record rejects further transitions.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    key: MutationKey,
    phase: MutationPhase,
    inverse: Inverse,
}

impl MutationRecord {
    pub fn pending(key: MutationKey, inverse: Inverse) -> Self {
        debug!(mutation = %key, "optimistic mutation applied");
        Self {
            key,
            phase: MutationPhase::Pending,
            inverse,
        }
    }

    pub fn key(&self) -> &MutationKey {
        &self.key
    }

    pub fn phase(&self) -> MutationPhase {
        self.phase
    }

    pub fn inverse(&self) -> &Inverse {
        &self.inverse
    }

    pub fn commit(&mut self) -> Result<(), StoreError> {
        self.transition(MutationPhase::Committed)
    }

    /// Marks the record rolled back and hands out the inverse to apply
    pub fn roll_back(&mut self) -> Result<Inverse, StoreError> {
        self.transition(MutationPhase::RolledBack)?;
        warn!(mutation = %self.key, "optimistic mutation rolled back");
        Ok(self.inverse.clone())
    }

    fn transition(&mut self, next: MutationPhase) -> Result<(), StoreError> {
        if self.phase != MutationPhase::Pending {
            return Err(StoreError::Invalid(format!(
                "mutation {} already settled as {:?}",
                self.key, self.phase
            )));
        }
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn favorite_key() -> MutationKey {
        MutationKey::movie(CollectionKey::Favorites, MovieId::from(42u32))
    }

    #[test]
    fn test_pending_commits_once() {
        let mut record = MutationRecord::pending(
            favorite_key(),
            Inverse::RemoveEntry {
                collection: CollectionKey::Favorites,
                movie_id: MovieId::from(42u32),
            },
        );
        assert_eq!(record.phase(), MutationPhase::Pending);

        record.commit().unwrap();
        assert_eq!(record.phase(), MutationPhase::Committed);
        assert!(record.commit().is_err());
        assert!(record.roll_back().is_err());
    }

    #[test]
    fn test_roll_back_returns_inverse() {
        let entry = CollectionEntry::new(MovieId::from(7u32), "Heat");
        let inverse = Inverse::RestoreEntry {
            collection: CollectionKey::Watched,
            index: 3,
            entry,
        };
        let mut record = MutationRecord::pending(favorite_key(), inverse.clone());

        assert_eq!(record.roll_back().unwrap(), inverse);
        assert_eq!(record.phase(), MutationPhase::RolledBack);
        assert!(record.commit().is_err());
    }

    #[test]
    fn test_key_display() {
        assert_eq!(favorite_key().to_string(), "favorites/42");
        let list = MutationKey::collection(CollectionKey::Watchlist("w1".to_string()));
        assert_eq!(list.to_string(), "watchlist:w1");
    }
}
