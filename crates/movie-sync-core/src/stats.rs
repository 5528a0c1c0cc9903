use movie_sync_models::{CollectionEntry, CollectionStats, Review, Watchlist};

/// Recompute collection totals from local state.
///
/// `average_rating` averages the ratings given on watched entries; it is
/// `None` when nothing has been rated.
pub fn compute(
    favorites: &[CollectionEntry],
    watched: &[CollectionEntry],
    watchlists: &[Watchlist],
    reviews: &[Review],
) -> CollectionStats {
    let ratings: Vec<f32> = watched.iter().filter_map(|entry| entry.rating).collect();
    let average_rating = if ratings.is_empty() {
        None
    } else {
        let sum: f32 = ratings.iter().sum();
        Some((sum / ratings.len() as f32 * 10.0).round() / 10.0)
    };

    CollectionStats {
        total_favorites: favorites.len(),
        total_watched: watched.len(),
        total_watchlists: watchlists.len(),
        total_watchlist_movies: watchlists.iter().map(|list| list.movies.len()).sum(),
        total_reviews: reviews.len(),
        average_rating,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use movie_sync_models::MovieId;

    #[test]
    fn test_compute_totals() {
        let favorites = vec![CollectionEntry::new(MovieId::from(1u32), "A")];
        let watched = vec![
            CollectionEntry::new(MovieId::from(2u32), "B").with_rating(8.0),
            CollectionEntry::new(MovieId::from(3u32), "C").with_rating(7.0),
            CollectionEntry::new(MovieId::from(4u32), "D"),
        ];
        let mut list = Watchlist::new("w1", "Weekend");
        list.movies.push(CollectionEntry::new(MovieId::from(5u32), "E"));
        list.movies.push(CollectionEntry::new(MovieId::from(6u32), "F"));

        let stats = compute(&favorites, &watched, &[list, Watchlist::new("w2", "Empty")], &[]);

        assert_eq!(stats.total_favorites, 1);
        assert_eq!(stats.total_watched, 3);
        assert_eq!(stats.total_watchlists, 2);
        assert_eq!(stats.total_watchlist_movies, 2);
        assert_eq!(stats.average_rating, Some(7.5));
    }

    #[test]
    fn test_empty_has_no_average() {
        let stats = compute(&[], &[], &[], &[]);
        assert_eq!(stats, CollectionStats::default());
    }
}
