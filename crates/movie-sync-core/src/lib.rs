pub mod coordinator;
pub mod error;
pub mod optimistic;
pub mod snapshot;
pub mod stats;
pub mod store;

pub use coordinator::{CoordinatorStatus, InitState, SyncCoordinator, SyncOutcome, SyncSettings, SyncSummary};
pub use error::StoreError;
pub use optimistic::{CollectionKey, MutationKey, MutationPhase, MutationRecord};
pub use snapshot::{Collections, LoadedSnapshot, Snapshot, SnapshotStore, SNAPSHOT_VERSION};
pub use store::{CollectionStore, Mutation, SyncState};
