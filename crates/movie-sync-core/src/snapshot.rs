use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use movie_sync_config::PathManager;
use movie_sync_models::{dedup_by_movie_id, CollectionEntry, Review, Watchlist};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SNAPSHOT_VERSION: u64 = 2;

/// The user's collections as one unit, used for snapshots and full sync
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collections {
    pub favorites: Vec<CollectionEntry>,
    pub watched: Vec<CollectionEntry>,
    pub watchlists: Vec<Watchlist>,
    pub reviews: Vec<Review>,
}

/// On-disk form of the local collections (current version)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub saved_at: DateTime<Utc>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub favorites: Vec<CollectionEntry>,
    pub watched: Vec<CollectionEntry>,
    pub watchlists: Vec<Watchlist>,
    pub reviews: Vec<Review>,
}

impl Snapshot {
    pub fn new(collections: Collections, last_sync_at: Option<DateTime<Utc>>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            last_sync_at,
            favorites: collections.favorites,
            watched: collections.watched,
            watchlists: collections.watchlists,
            reviews: collections.reviews,
        }
    }

    pub fn collections(&self) -> Collections {
        Collections {
            favorites: self.favorites.clone(),
            watched: self.watched.clone(),
            watchlists: self.watchlists.clone(),
            reviews: self.reviews.clone(),
        }
    }
}

/// A snapshot that passed validation, plus what had to be dropped or upgraded
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSnapshot {
    pub snapshot: Snapshot,
    /// Set when the file was written by an older version
    pub migrated_from: Option<u64>,
    /// Collections thrown away because they failed validation
    pub discarded: Vec<&'static str>,
}

impl LoadedSnapshot {
    /// Some collection was unusable, so local data is incomplete until the next full sync
    pub fn needs_refetch(&self) -> bool {
        !self.discarded.is_empty()
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Unparseable(String),
    #[error("snapshot root is not an object")]
    NotAnObject,
    #[error("unknown snapshot version {0}")]
    UnknownVersion(u64),
}

struct CollectionField {
    name: &'static str,
    /// Keys accepted for this collection; the first is the current one
    keys: &'static [&'static str],
}

const FAVORITES: CollectionField = CollectionField {
    name: "favorites",
    keys: &["favorites", "favoriteMovies"],
};
const WATCHED: CollectionField = CollectionField {
    name: "watched",
    keys: &["watched", "watchedMovies"],
};
const WATCHLISTS: CollectionField = CollectionField {
    name: "watchlists",
    keys: &["watchlists"],
};
const REVIEWS: CollectionField = CollectionField {
    name: "reviews",
    keys: &["reviews", "userReviews"],
};
const LAST_SYNC_KEYS: &[&str] = &["last_sync_at", "lastSyncAt", "lastSync", "lastSyncTime"];

/// Validates a raw snapshot document and upgrades older layouts.
///
/// Version 1 and unversioned documents carry the collections at top level
/// under their old names. A collection that is not a list, or that holds any
/// entry without a usable id, is discarded as a whole.
pub fn migrate(document: Value) -> Result<LoadedSnapshot, SnapshotError> {
    let Value::Object(root) = document else {
        return Err(SnapshotError::NotAnObject);
    };

    let version = match root.get("version") {
        None | Some(Value::Null) => 1,
        Some(value) => value.as_u64().ok_or(SnapshotError::UnknownVersion(0))?,
    };
    let legacy = match version {
        1 => true,
        SNAPSHOT_VERSION => false,
        other => return Err(SnapshotError::UnknownVersion(other)),
    };

    let mut discarded = Vec::new();
    let mut favorites: Vec<CollectionEntry> = read_collection(&root, &FAVORITES, legacy, &mut discarded);
    let mut watched: Vec<CollectionEntry> = read_collection(&root, &WATCHED, legacy, &mut discarded);
    let mut watchlists: Vec<Watchlist> = read_collection(&root, &WATCHLISTS, legacy, &mut discarded);
    let reviews: Vec<Review> = read_collection(&root, &REVIEWS, legacy, &mut discarded);

    dedup_by_movie_id(&mut favorites);
    dedup_by_movie_id(&mut watched);
    for list in &mut watchlists {
        dedup_by_movie_id(&mut list.movies);
        list.sync_count();
    }

    let last_sync_keys = if legacy { LAST_SYNC_KEYS } else { &LAST_SYNC_KEYS[..1] };
    let last_sync_at = last_sync_keys
        .iter()
        .find_map(|key| root.get(*key))
        .and_then(parse_timestamp);
    let saved_at = root.get("saved_at").and_then(parse_timestamp).unwrap_or_else(Utc::now);

    Ok(LoadedSnapshot {
        snapshot: Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at,
            last_sync_at,
            favorites,
            watched,
            watchlists,
            reviews,
        },
        migrated_from: legacy.then_some(version),
        discarded,
    })
}

fn read_collection<T: DeserializeOwned>(
    root: &Map<String, Value>,
    field: &CollectionField,
    legacy: bool,
    discarded: &mut Vec<&'static str>,
) -> Vec<T> {
    let keys = if legacy { field.keys } else { &field.keys[..1] };
    let Some(raw) = keys.iter().find_map(|key| root.get(*key)) else {
        return Vec::new();
    };
    let Some(items) = raw.as_array() else {
        warn!(collection = field.name, "snapshot collection is not a list, discarding it");
        discarded.push(field.name);
        return Vec::new();
    };

    let mut parsed = Vec::with_capacity(items.len());
    for item in items {
        match T::deserialize(item) {
            Ok(value) => parsed.push(value),
            Err(e) => {
                warn!(
                    collection = field.name,
                    error = %e,
                    "snapshot collection has an invalid entry, discarding the whole list"
                );
                discarded.push(field.name);
                return Vec::new();
            }
        }
    }
    parsed
}

/// RFC 3339 strings, or epoch milliseconds as older files stored them
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Reads and writes the collections snapshot file
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_paths(path_manager: &PathManager) -> Self {
        Self::new(path_manager.snapshot_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the snapshot, upgrading it on disk when it was written in an
    /// older format. Unreadable or unknown files are deleted.
    pub fn load(&self) -> Result<Option<LoadedSnapshot>> {
        if !self.path.exists() {
            debug!("Snapshot miss: {:?} does not exist", self.path);
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to read snapshot {:?}: {}", self.path, e);
                return Ok(None);
            }
        };

        let loaded = serde_json::from_str::<Value>(&content)
            .map_err(|e| SnapshotError::Unparseable(e.to_string()))
            .and_then(migrate);

        match loaded {
            Ok(mut loaded) => {
                info!(
                    operation = "snapshot_loaded",
                    favorites = loaded.snapshot.favorites.len(),
                    watched = loaded.snapshot.watched.len(),
                    watchlists = loaded.snapshot.watchlists.len(),
                    reviews = loaded.snapshot.reviews.len(),
                    "Loaded collections snapshot"
                );
                if loaded.needs_refetch() {
                    // A rewritten file must not look freshly synced once the discard is forgotten
                    loaded.snapshot.last_sync_at = None;
                }
                if loaded.migrated_from.is_some() || loaded.needs_refetch() {
                    if let Err(e) = self.save(&loaded.snapshot) {
                        warn!("Failed to rewrite upgraded snapshot: {}", e);
                    }
                }
                Ok(Some(loaded))
            }
            Err(e) => {
                warn!("Snapshot corruption detected: {}. Deleting {:?}.", e, self.path);
                if let Err(rm_err) = std::fs::remove_file(&self.path) {
                    warn!("Failed to delete corrupted snapshot: {}", rm_err);
                }
                Ok(None)
            }
        }
    }

    /// Writes through a temporary file so a crash never leaves half a snapshot
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| anyhow!("Failed to serialize snapshot: {}", e))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| anyhow!("Failed to write snapshot: {}", e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| anyhow!("Failed to replace snapshot: {}", e))?;
        debug!(
            "Snapshot saved: {} favorites, {} watched, {} watchlists",
            snapshot.favorites.len(),
            snapshot.watched.len(),
            snapshot.watchlists.len()
        );
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("Removed collections snapshot {:?}", self.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use movie_sync_models::MovieId;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_current_version_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("cache").join("collections.json"));

        let mut list = Watchlist::new("w1", "Weekend");
        list.movies.push(CollectionEntry::new(MovieId::from(5u32), "E"));
        list.sync_count();
        let collections = Collections {
            favorites: vec![CollectionEntry::new(MovieId::from(42u32), "X")],
            watched: vec![],
            watchlists: vec![list],
            reviews: vec![],
        };
        let snapshot = Snapshot::new(collections.clone(), Some(Utc::now()));
        store.save(&snapshot).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.snapshot.collections(), collections);
        assert_eq!(loaded.migrated_from, None);
        assert!(!loaded.needs_refetch());
    }

    #[test]
    fn test_legacy_document_is_upgraded() {
        let legacy = json!({
            "favoriteMovies": [{"id": 42, "title": "X"}],
            "watchedMovies": [{"movieId": "7", "title": "Heat", "rating": 8.0, "watchedAt": "2024-03-01T10:00:00Z"}],
            "watchlists": [{"_id": "w1", "name": "Later", "movies": [{"movie_id": 9.0, "title": "Ronin"}]}],
            "lastSync": 1_700_000_000_000i64
        });

        let loaded = migrate(legacy).unwrap();
        let snapshot = loaded.snapshot;
        assert_eq!(loaded.migrated_from, Some(1));
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
        assert_eq!(snapshot.favorites[0].movie_id, "42");
        assert_eq!(snapshot.watched[0].rating, Some(8.0));
        assert_eq!(snapshot.watchlists[0].movies[0].movie_id, "9");
        assert_eq!(snapshot.watchlists[0].movie_count, 1);
        assert_eq!(snapshot.last_sync_at.unwrap().timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_corrupted_entry_discards_whole_collection() {
        let document = json!({
            "version": 2,
            "saved_at": "2024-03-01T10:00:00Z",
            "last_sync_at": null,
            "favorites": [{"movieId": "1", "title": "A"}, {"movieId": true, "title": "Broken"}],
            "watched": [{"movieId": "2", "title": "B"}],
            "watchlists": "not a list",
            "reviews": []
        });

        let loaded = migrate(document).unwrap();
        assert!(loaded.snapshot.favorites.is_empty());
        assert_eq!(loaded.snapshot.watched.len(), 1);
        assert!(loaded.snapshot.watchlists.is_empty());
        assert_eq!(loaded.discarded, vec!["favorites", "watchlists"]);
        assert!(loaded.needs_refetch());
    }

    #[test]
    fn test_duplicate_ids_are_collapsed() {
        let document = json!({
            "version": 2,
            "favorites": [{"movieId": 1, "title": "A"}, {"movieId": "1", "title": "A again"}]
        });
        let loaded = migrate(document).unwrap();
        assert_eq!(loaded.snapshot.favorites.len(), 1);
        assert_eq!(loaded.snapshot.favorites[0].title, "A");
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        assert_eq!(migrate(json!({"version": 9})), Err(SnapshotError::UnknownVersion(9)));
        assert_eq!(migrate(json!([1, 2])), Err(SnapshotError::NotAnObject));
    }

    #[test]
    fn test_unreadable_file_is_deleted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collections.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = SnapshotStore::new(path.clone());
        assert!(store.load().unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_upgraded_snapshot_is_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collections.json");
        std::fs::write(&path, r#"{"favorites": [{"id": 3, "title": "C"}]}"#).unwrap();

        let store = SnapshotStore::new(path.clone());
        store.load().unwrap().unwrap();

        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["version"], 2);
        assert_eq!(on_disk["favorites"][0]["movieId"], "3");
    }

    #[test]
    fn test_discarded_collection_stays_unsynced_after_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collections.json");
        let document = json!({
            "version": 2,
            "saved_at": Utc::now().to_rfc3339(),
            "last_sync_at": Utc::now().to_rfc3339(),
            "favorites": [{"movieId": true, "title": "Broken"}],
            "watched": [{"movieId": "2", "title": "B"}]
        });
        std::fs::write(&path, document.to_string()).unwrap();
        let store = SnapshotStore::new(path);

        let first = store.load().unwrap().unwrap();
        assert!(first.needs_refetch());
        assert!(first.snapshot.last_sync_at.is_none());

        let second = store.load().unwrap().unwrap();
        assert!(!second.needs_refetch());
        assert!(second.snapshot.last_sync_at.is_none());
        assert_eq!(second.snapshot.watched.len(), 1);
    }

    #[test]
    fn test_missing_file_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("collections.json"));
        assert!(store.load().unwrap().is_none());
        store.clear().unwrap();

        store.save(&Snapshot::new(Collections::default(), None)).unwrap();
        assert!(store.exists());
        store.clear().unwrap();
        assert!(!store.exists());
    }
}
