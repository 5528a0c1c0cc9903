use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::movie_id::MovieId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "movie_id")]
    pub movie_id: MovieId,
    #[serde(default, alias = "movie_title", skip_serializing_if = "Option::is_none")]
    pub movie_title: Option<String>,
    pub rating: f32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub likes: u32,
    #[serde(default = "Utc::now", alias = "created_at")]
    pub created_at: DateTime<Utc>,
}

/// Payload for `POST /reviews`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub movie_id: MovieId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_title: Option<String>,
    pub rating: f32,
    pub content: String,
}
