//! Per-endpoint parsers turning backend envelopes into fixed model types.
//!
//! The backend wraps payloads inconsistently (`data`, `user`, `results`,
//! `movies`, or a bare array). Each endpoint family gets one function here so
//! callers never look at the raw shape.

use crate::error::ApiError;
use movie_sync_models::{
    CollectionEntry, Genre, MinimalProfile, MovieDetail, MoviePage, MovieSummary, Review, UserProfile, Watchlist,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

/// Payload preference: `data`, then `results`/`movies`, then the body itself
pub fn unwrap_payload(body: &Value) -> &Value {
    for key in ["data", "results", "movies"] {
        if let Some(inner) = body.get(key) {
            if !inner.is_null() {
                return inner;
            }
        }
    }
    body
}

fn decode<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T, ApiError> {
    T::deserialize(value).map_err(|e| ApiError::Decode(format!("invalid {}: {}", what, e)))
}

/// Finds the list inside a payload, looking one level down under `keys`
fn find_list<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    let payload = unwrap_payload(body);
    if let Some(items) = payload.as_array() {
        return Some(items);
    }
    keys.iter().find_map(|key| payload.get(*key).and_then(Value::as_array))
}

/// Decodes each element on its own; malformed entries are skipped
fn decode_each<T: DeserializeOwned>(items: &[Value], what: &str) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "skipping malformed {}", what);
                None
            }
        })
        .collect()
}

/// Decodes an object whose movie lists are read entry by entry. Each group
/// of keys in `lists` is taken out of the object first, so one malformed
/// movie is skipped instead of failing the whole object.
fn decode_with_entries<T: DeserializeOwned>(
    value: &Value,
    lists: &[&[&str]],
    what: &str,
) -> Result<(T, Vec<Vec<CollectionEntry>>), ApiError> {
    let Value::Object(object) = value else {
        return Err(ApiError::Decode(format!("invalid {}: not an object", what)));
    };
    let mut object: Map<String, Value> = object.clone();
    let entries: Vec<Vec<CollectionEntry>> = lists
        .iter()
        .map(|keys| {
            keys.iter()
                .filter_map(|key| object.remove(*key))
                .filter_map(|list| match list {
                    Value::Array(items) => Some(decode_each::<CollectionEntry>(&items, "collection entry")),
                    _ => None,
                })
                .flatten()
                .collect::<Vec<_>>()
        })
        .collect();
    let parsed = decode(&Value::Object(object), what)?;
    Ok((parsed, entries))
}

fn u64_field(sources: &[&Value], keys: &[&str]) -> Option<u64> {
    sources
        .iter()
        .flat_map(|source| keys.iter().map(move |key| source.get(*key)))
        .find_map(|value| value.and_then(Value::as_u64))
}

/// Listing, search and recommendation responses.
///
/// Accepts a bare array, an envelope holding an array, or an envelope holding
/// a paged object. Missing paging fields fall back to the requested page.
pub fn movie_page(body: &Value, requested_page: u32) -> Result<MoviePage, ApiError> {
    let payload = unwrap_payload(body);
    let items = find_list(body, &["results", "movies"])
        .ok_or_else(|| ApiError::Decode("movie listing has no result list".to_string()))?;
    let results: Vec<MovieSummary> = decode_each(items, "movie summary");

    let sources = [payload, body];
    let page = u64_field(&sources, &["page"]).map(|p| p as u32).unwrap_or(requested_page.max(1));
    let total_pages = u64_field(&sources, &["total_pages", "totalPages"])
        .map(|p| p as u32)
        .unwrap_or(page);
    let total_results = u64_field(&sources, &["total_results", "totalResults"])
        .unwrap_or(results.len() as u64);

    Ok(MoviePage {
        page,
        total_pages,
        total_results,
        results,
    })
}

pub fn movie_detail(body: &Value) -> Result<MovieDetail, ApiError> {
    let payload = body.get("movie").unwrap_or_else(|| unwrap_payload(body));
    decode(payload, "movie detail")
}

pub fn genres(body: &Value) -> Result<Vec<Genre>, ApiError> {
    let items = find_list(body, &["genres"])
        .ok_or_else(|| ApiError::Decode("genre response has no list".to_string()))?;
    Ok(decode_each(items, "genre"))
}

/// Profile preference: `user`, then `data`, then the body
fn profile_payload(body: &Value) -> &Value {
    body.get("user")
        .or_else(|| body.get("data"))
        .filter(|v| !v.is_null())
        .unwrap_or(body)
}

pub fn profile(body: &Value) -> Result<UserProfile, ApiError> {
    let (mut profile, mut lists): (UserProfile, _) = decode_with_entries(
        profile_payload(body),
        &[&["favorites", "favoriteMovies"], &["watched", "watchedMovies"]],
        "user profile",
    )?;
    profile.watched = lists.pop().unwrap_or_default();
    profile.favorites = lists.pop().unwrap_or_default();
    Ok(profile)
}

fn watchlist_item(value: &Value) -> Result<Watchlist, ApiError> {
    let (mut list, mut movies): (Watchlist, _) = decode_with_entries(value, &[&["movies"]], "watchlist")?;
    list.movies = movies.pop().unwrap_or_default();
    list.sync_count();
    Ok(list)
}

pub fn minimal_profile(body: &Value) -> Result<MinimalProfile, ApiError> {
    decode(profile_payload(body), "minimal profile")
}

pub fn watchlists(body: &Value) -> Result<Vec<Watchlist>, ApiError> {
    let items = find_list(body, &["watchlists"])
        .ok_or_else(|| ApiError::Decode("watchlist response has no list".to_string()))?;
    Ok(items
        .iter()
        .filter_map(|item| match watchlist_item(item) {
            Ok(list) => Some(list),
            Err(e) => {
                debug!(error = %e, "skipping malformed watchlist");
                None
            }
        })
        .collect())
}

pub fn watchlist(body: &Value) -> Result<Watchlist, ApiError> {
    let payload = body.get("watchlist").unwrap_or_else(|| unwrap_payload(body));
    watchlist_item(payload)
}

pub fn reviews(body: &Value) -> Result<Vec<Review>, ApiError> {
    let items = find_list(body, &["reviews"])
        .ok_or_else(|| ApiError::Decode("review response has no list".to_string()))?;
    Ok(decode_each(items, "review"))
}

pub fn review(body: &Value) -> Result<Review, ApiError> {
    let payload = body.get("review").unwrap_or_else(|| unwrap_payload(body));
    decode(payload, "review")
}

/// Like count reported after liking a review, if the backend sent one
pub fn like_count(body: &Value) -> Option<u32> {
    let payload = unwrap_payload(body);
    [payload, body]
        .iter()
        .find_map(|v| v.get("likes").and_then(Value::as_u64))
        .map(|likes| likes as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use movie_sync_models::MovieId;
    use serde_json::json;

    #[test]
    fn test_movie_page_from_data_array() {
        let body = json!({
            "success": true,
            "data": [
                {"id": 603, "title": "The Matrix", "poster_path": "/m.jpg"},
                {"id": "604", "title": "The Matrix Reloaded"}
            ]
        });

        let page = movie_page(&body, 3).unwrap();
        assert_eq!(page.page, 3);
        assert_eq!(page.total_results, 2);
        assert_eq!(page.results[0].id, MovieId::from(603u32));
        assert_eq!(page.results[1].id, "604");
    }

    #[test]
    fn test_movie_page_from_paged_object() {
        let body = json!({
            "success": true,
            "data": {
                "page": 2,
                "total_pages": 40,
                "total_results": 800,
                "results": [{"id": 1, "title": "Alien"}]
            }
        });

        let page = movie_page(&body, 1).unwrap();
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 40);
        assert_eq!(page.total_results, 800);
        assert_eq!(page.results.len(), 1);
    }

    #[test]
    fn test_movie_page_from_movies_key_and_bare_array() {
        let enveloped = json!({"movies": [{"id": 1, "title": "Heat"}], "totalPages": 5});
        let page = movie_page(&enveloped, 1).unwrap();
        assert_eq!(page.total_pages, 5);

        let bare = json!([{"id": 2, "title": "Ronin"}]);
        assert_eq!(movie_page(&bare, 1).unwrap().results[0].title, "Ronin");
    }

    #[test]
    fn test_movie_page_skips_entries_without_valid_id() {
        let body = json!({"results": [
            {"id": 1.5, "title": "Bad"},
            {"title": "Missing"},
            {"id": 7, "title": "Good"}
        ]});
        let page = movie_page(&body, 1).unwrap();
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].title, "Good");
    }

    #[test]
    fn test_movie_page_without_list_is_decode_error() {
        let body = json!({"success": true, "data": {"message": "nothing"}});
        assert!(matches!(movie_page(&body, 1), Err(ApiError::Decode(_))));
    }

    #[test]
    fn test_profile_prefers_user_then_data() {
        let user = json!({"success": true, "user": {"_id": "u1", "username": "ana", "favoriteMovies": [
            {"movieId": 42, "title": "X"}
        ]}});
        let parsed = profile(&user).unwrap();
        assert_eq!(parsed.id, "u1");
        assert_eq!(parsed.favorites[0].movie_id, "42");

        let data = json!({"data": {"id": "u2", "username": "bo"}});
        assert_eq!(profile(&data).unwrap().username, "bo");

        let minimal = json!({"user": {"id": "u3", "username": "cy", "favoritesCount": 4}});
        assert_eq!(minimal_profile(&minimal).unwrap().favorites_count, 4);
    }

    #[test]
    fn test_malformed_profile_entry_is_skipped() {
        let body = json!({"user": {
            "_id": "u1",
            "username": "ana",
            "favoriteMovies": [{"movieId": true, "title": "Broken"}, {"movieId": 42, "title": "X"}],
            "watched": [{"title": "No id"}, {"movieId": "7", "title": "Y", "rating": 8.0}]
        }});
        let parsed = profile(&body).unwrap();
        assert_eq!(parsed.favorites.len(), 1);
        assert_eq!(parsed.favorites[0].movie_id, "42");
        assert_eq!(parsed.watched.len(), 1);
        assert_eq!(parsed.watched[0].rating, Some(8.0));

        let lists = watchlists(&json!({"watchlists": [{
            "id": "w1",
            "name": "Weekend",
            "movies": [{"movieId": null, "title": "Broken"}, {"movieId": 3, "title": "C"}]
        }]}))
        .unwrap();
        assert_eq!(lists[0].movies.len(), 1);
        assert_eq!(lists[0].movie_count, 1);

        assert!(profile(&json!({"user": {"username": "no id"}})).is_err());
    }

    #[test]
    fn test_watchlists_sync_movie_count() {
        let body = json!({"data": [{
            "_id": "w1",
            "name": "Weekend",
            "movieCount": 99,
            "movies": [{"movieId": "1", "title": "A"}, {"movieId": 2, "title": "B"}]
        }]});
        let lists = watchlists(&body).unwrap();
        assert_eq!(lists[0].movie_count, 2);

        let single = json!({"watchlist": {"id": "w2", "name": "Later"}});
        assert_eq!(watchlist(&single).unwrap().id, "w2");
    }

    #[test]
    fn test_reviews_and_like_count() {
        let body = json!({"reviews": [
            {"_id": "r1", "movieId": 603, "rating": 9.0, "content": "Great"}
        ]});
        let parsed = reviews(&body).unwrap();
        assert_eq!(parsed[0].movie_id, "603");

        assert_eq!(like_count(&json!({"data": {"likes": 4}})), Some(4));
        assert_eq!(like_count(&json!({"success": true})), None);
    }

    #[test]
    fn test_movie_detail_and_genres() {
        let detail = json!({"data": {"id": 603, "title": "The Matrix", "runtime": 136,
            "genres": [{"id": 28, "name": "Action"}]}});
        let parsed = movie_detail(&detail).unwrap();
        assert_eq!(parsed.runtime, Some(136));

        let list = json!({"genres": [{"id": 28, "name": "Action"}, {"id": 12, "name": "Adventure"}]});
        assert_eq!(genres(&list).unwrap().len(), 2);
    }
}
