use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::movie_id::MovieId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieSummary {
    pub id: MovieId,
    pub title: String,
    #[serde(default, alias = "posterPath")]
    pub poster_path: Option<String>,
    #[serde(default, alias = "releaseDate")]
    pub release_date: Option<String>,
    #[serde(default, alias = "voteAverage")]
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default, alias = "genreIds")]
    pub genre_ids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoviePage {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "first_page", alias = "totalPages")]
    pub total_pages: u32,
    #[serde(default, alias = "totalResults")]
    pub total_results: u64,
    #[serde(default)]
    pub results: Vec<MovieSummary>,
}

fn first_page() -> u32 {
    1
}

impl MoviePage {
    pub fn single(results: Vec<MovieSummary>) -> Self {
        Self {
            page: 1,
            total_pages: 1,
            total_results: results.len() as u64,
            results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieDetail {
    pub id: MovieId,
    pub title: String,
    #[serde(default, alias = "posterPath")]
    pub poster_path: Option<String>,
    #[serde(default, alias = "backdropPath")]
    pub backdrop_path: Option<String>,
    #[serde(default, alias = "releaseDate")]
    pub release_date: Option<String>,
    #[serde(default, alias = "voteAverage")]
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>, // minutes
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

/// Listing families served by `GET /movies/discover/{category}`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MovieCategory {
    Popular,
    TopRated,
    Upcoming,
    NowPlaying,
}

impl MovieCategory {
    pub fn as_path(&self) -> &'static str {
        match self {
            MovieCategory::Popular => "popular",
            MovieCategory::TopRated => "top_rated",
            MovieCategory::Upcoming => "upcoming",
            MovieCategory::NowPlaying => "now_playing",
        }
    }
}

impl fmt::Display for MovieCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for MovieCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "popular" => Ok(MovieCategory::Popular),
            "top_rated" => Ok(MovieCategory::TopRated),
            "upcoming" => Ok(MovieCategory::Upcoming),
            "now_playing" => Ok(MovieCategory::NowPlaying),
            _ => Err(format!("Unknown movie category: {}", s)),
        }
    }
}
