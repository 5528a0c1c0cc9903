pub mod movie_id;
pub mod entry;
pub mod watchlist;
pub mod review;
pub mod movie;
pub mod profile;

pub use movie_id::{InvalidMovieId, MovieId};
pub use entry::{dedup_by_movie_id, CollectionEntry};
pub use watchlist::{Watchlist, WatchlistDraft};
pub use review::{NewReview, Review};
pub use movie::{Genre, MovieCategory, MovieDetail, MoviePage, MovieSummary};
pub use profile::{CollectionStats, MinimalProfile, UserProfile};
