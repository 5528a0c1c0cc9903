use async_trait::async_trait;
use movie_sync_models::{
    CollectionEntry, Genre, MinimalProfile, MovieCategory, MovieDetail, MovieId, MoviePage, NewReview, Review,
    UserProfile, Watchlist, WatchlistDraft,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use crate::cache::ResponseCache;
use crate::coalesce::RequestCoalescer;
use crate::error::ApiError;
use crate::normalize;
use crate::queue::{LaneKind, Lanes};
use crate::traits::CollectionRemote;
use crate::transport::{ApiRequest, Backend};

pub const DEFAULT_CACHE_CAPACITY: usize = 200;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const GENRE_TTL: Duration = Duration::from_secs(3600);

fn segment(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(format!("failed to encode request: {}", e)))
}

/// Facade over the backend used by every consumer.
///
/// Idempotent reads go cache first, then through the coalescer and a lane.
/// User-scoped calls skip the cache but still respect lane limits. Cloning is
/// cheap and every clone shares the same cache, registry and lanes.
#[derive(Clone)]
pub struct MovieApi {
    backend: Arc<dyn Backend>,
    cache: Arc<ResponseCache<Value>>,
    coalescer: Arc<RequestCoalescer<Value>>,
    lanes: Lanes,
}

impl MovieApi {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self::with_parts(
            backend,
            ResponseCache::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL),
            Lanes::default(),
        )
    }

    pub fn with_parts(backend: Arc<dyn Backend>, cache: ResponseCache<Value>, lanes: Lanes) -> Self {
        Self {
            backend,
            cache: Arc::new(cache),
            coalescer: Arc::new(RequestCoalescer::new()),
            lanes,
        }
    }

    pub fn cache(&self) -> &ResponseCache<Value> {
        &self.cache
    }

    pub fn lanes(&self) -> &Lanes {
        &self.lanes
    }

    /// Drop cached responses and forget in-flight registrations
    pub fn reset(&self) {
        self.cache.clear();
        self.coalescer.clear();
        debug!(operation = "api_reset", "Response cache and coalescer cleared");
    }

    /// Cache, then coalesce, then queue. Only successful bodies are cached.
    async fn cached_read(
        &self,
        key: String,
        lane: LaneKind,
        ttl: Duration,
        request: ApiRequest,
    ) -> Result<Value, ApiError> {
        if let Some(hit) = self.cache.get(&key) {
            trace!(key = %key, "cache hit");
            return Ok(hit);
        }

        let backend = Arc::clone(&self.backend);
        let cache = Arc::clone(&self.cache);
        let queue = self.lanes.lane(lane).clone();
        let cache_key = key.clone();
        self.coalescer
            .run(&key, move || async move {
                let body = queue.enqueue(move || async move { backend.send(request).await }).await?;
                cache.set_with_ttl(cache_key, body.clone(), ttl);
                Ok(body)
            })
            .await
    }

    /// Reads a cached value and parses it; a body that fails to parse is evicted
    async fn read<T>(
        &self,
        key: String,
        lane: LaneKind,
        ttl: Duration,
        request: ApiRequest,
        parse: impl FnOnce(&Value) -> Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        let body = self.cached_read(key.clone(), lane, ttl, request).await?;
        parse(&body).map_err(|e| {
            self.cache.delete(&key);
            e
        })
    }

    /// Uncached call, still limited by the light lane
    async fn call(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let backend = Arc::clone(&self.backend);
        self.lanes
            .light
            .enqueue(move || async move { backend.send(request).await })
            .await
    }

    pub async fn discover(&self, category: MovieCategory, page: u32) -> Result<MoviePage, ApiError> {
        let page = page.max(1);
        let request = ApiRequest::get(format!("/movies/discover/{}", category.as_path()))
            .with_query("page", page.to_string());
        self.read(
            format!("discover:{}:{}", category, page),
            LaneKind::Light,
            self.cache.default_ttl(),
            request,
            |body| normalize::movie_page(body, page),
        )
        .await
    }

    pub async fn get_popular_movies(&self, page: u32) -> Result<MoviePage, ApiError> {
        self.discover(MovieCategory::Popular, page).await
    }

    pub async fn search_movies(&self, query: &str, page: u32) -> Result<MoviePage, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(MoviePage::single(Vec::new()));
        }
        let page = page.max(1);
        let request = ApiRequest::get("/movies/search")
            .with_query("query", query)
            .with_query("page", page.to_string());
        self.read(
            format!("search:{}:{}", query.to_lowercase(), page),
            LaneKind::Heavy,
            self.cache.default_ttl(),
            request,
            |body| normalize::movie_page(body, page),
        )
        .await
    }

    pub async fn get_movie(&self, movie_id: &MovieId) -> Result<MovieDetail, ApiError> {
        let request = ApiRequest::get(format!("/movies/{}", segment(movie_id.as_str())));
        self.read(
            format!("movie:{}", movie_id),
            LaneKind::Light,
            self.cache.default_ttl(),
            request,
            normalize::movie_detail,
        )
        .await
    }

    pub async fn get_recommendations(&self, movie_id: &MovieId) -> Result<MoviePage, ApiError> {
        let request = ApiRequest::get(format!("/movies/{}/recommendations", segment(movie_id.as_str())));
        self.read(
            format!("recommendations:{}", movie_id),
            LaneKind::Heavy,
            self.cache.default_ttl(),
            request,
            |body| normalize::movie_page(body, 1),
        )
        .await
    }

    pub async fn get_genres(&self) -> Result<Vec<Genre>, ApiError> {
        self.read(
            "genres".to_string(),
            LaneKind::Light,
            GENRE_TTL,
            ApiRequest::get("/movies/genres"),
            normalize::genres,
        )
        .await
    }

    pub async fn update_profile(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<UserProfile, ApiError> {
        let mut body = serde_json::Map::new();
        if let Some(username) = username {
            body.insert("username".to_string(), json!(username));
        }
        if let Some(email) = email {
            body.insert("email".to_string(), json!(email));
        }
        let response = self
            .call(ApiRequest::put("/users/profile", Value::Object(body)))
            .await?;
        normalize::profile(&response)
    }
}

#[async_trait]
impl CollectionRemote for MovieApi {
    async fn fetch_profile(&self) -> Result<UserProfile, ApiError> {
        let body = self.call(ApiRequest::get("/users/profile")).await?;
        normalize::profile(&body)
    }

    async fn fetch_minimal_profile(&self) -> Result<MinimalProfile, ApiError> {
        let body = self.call(ApiRequest::get("/users/profile/minimal")).await?;
        normalize::minimal_profile(&body)
    }

    async fn fetch_watchlists(&self) -> Result<Vec<Watchlist>, ApiError> {
        let body = self.call(ApiRequest::get("/watchlists")).await?;
        normalize::watchlists(&body)
    }

    async fn fetch_user_reviews(&self) -> Result<Vec<Review>, ApiError> {
        let body = self.call(ApiRequest::get("/reviews/user")).await?;
        normalize::reviews(&body)
    }

    async fn add_favorite(&self, entry: &CollectionEntry) -> Result<(), ApiError> {
        self.call(ApiRequest::post("/users/favorites", to_body(entry)?)).await?;
        Ok(())
    }

    async fn remove_favorite(&self, movie_id: &MovieId) -> Result<(), ApiError> {
        self.call(ApiRequest::delete(format!("/users/favorites/{}", segment(movie_id.as_str()))))
            .await?;
        Ok(())
    }

    async fn add_watched(&self, entry: &CollectionEntry) -> Result<(), ApiError> {
        self.call(ApiRequest::post("/users/watched", to_body(entry)?)).await?;
        Ok(())
    }

    async fn remove_watched(&self, movie_id: &MovieId) -> Result<(), ApiError> {
        self.call(ApiRequest::delete(format!("/users/watched/{}", segment(movie_id.as_str()))))
            .await?;
        Ok(())
    }

    async fn create_watchlist(&self, draft: &WatchlistDraft) -> Result<Watchlist, ApiError> {
        let body = self.call(ApiRequest::post("/watchlists", to_body(draft)?)).await?;
        normalize::watchlist(&body)
    }

    async fn update_watchlist(&self, watchlist_id: &str, draft: &WatchlistDraft) -> Result<Watchlist, ApiError> {
        let body = self
            .call(ApiRequest::put(format!("/watchlists/{}", segment(watchlist_id)), to_body(draft)?))
            .await?;
        normalize::watchlist(&body)
    }

    async fn delete_watchlist(&self, watchlist_id: &str) -> Result<(), ApiError> {
        self.call(ApiRequest::delete(format!("/watchlists/{}", segment(watchlist_id))))
            .await?;
        Ok(())
    }

    async fn add_to_watchlist(&self, watchlist_id: &str, entry: &CollectionEntry) -> Result<(), ApiError> {
        self.call(ApiRequest::post(
            format!("/watchlists/{}/movies", segment(watchlist_id)),
            to_body(entry)?,
        ))
        .await?;
        Ok(())
    }

    async fn remove_from_watchlist(&self, watchlist_id: &str, movie_id: &MovieId) -> Result<(), ApiError> {
        self.call(ApiRequest::delete(format!(
            "/watchlists/{}/movies/{}",
            segment(watchlist_id),
            segment(movie_id.as_str())
        )))
        .await?;
        Ok(())
    }

    async fn submit_review(&self, review: &NewReview) -> Result<Review, ApiError> {
        let body = self.call(ApiRequest::post("/reviews", to_body(review)?)).await?;
        normalize::review(&body)
    }

    async fn like_review(&self, review_id: &str) -> Result<Option<u32>, ApiError> {
        let body = self
            .call(ApiRequest::post(format!("/reviews/{}/like", segment(review_id)), json!({})))
            .await?;
        Ok(normalize::like_count(&body))
    }

    async fn report_review(&self, review_id: &str, reason: &str) -> Result<(), ApiError> {
        self.call(ApiRequest::post(
            format!("/reviews/{}/report", segment(review_id)),
            json!({ "reason": reason }),
        ))
        .await?;
        Ok(())
    }

    fn clear_cache(&self) {
        self.reset();
    }
}
