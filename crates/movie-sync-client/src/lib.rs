pub mod api;
pub mod cache;
pub mod coalesce;
pub mod error;
pub mod normalize;
pub mod queue;
pub mod session;
pub mod traits;
pub mod transport;

pub use api::{MovieApi, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
pub use cache::ResponseCache;
pub use coalesce::RequestCoalescer;
pub use error::ApiError;
pub use queue::{ConcurrencyQueue, LaneConfig, LaneKind, Lanes};
pub use session::{Session, SessionEvent};
pub use traits::CollectionRemote;
pub use transport::{ApiRequest, Backend, RequestOptions, RetryPolicy, Transport, DEFAULT_TIMEOUT};
