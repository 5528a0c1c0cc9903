use crate::app::{api_report, store_report, App};
use crate::output::{entry_table, new_table, watchlist_table, Output};
use crate::{EntryCommands, WatchlistCommands};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::Cell;
use movie_sync_models::{CollectionEntry, MovieId, WatchlistDraft};
use owo_colors::OwoColorize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryCollection {
    Favorites,
    Watched,
}

impl EntryCollection {
    fn label(&self) -> &'static str {
        match self {
            EntryCollection::Favorites => "favorites",
            EntryCollection::Watched => "watched list",
        }
    }
}

/// Uses the given title, or looks the movie up so the entry has a real one
async fn resolve_entry(app: &App, movie_id: MovieId, title: Option<String>) -> Result<CollectionEntry> {
    if let Some(title) = title {
        return Ok(CollectionEntry::new(movie_id, title));
    }
    let detail = app.api.get_movie(&movie_id).await.map_err(api_report)?;
    let mut entry = CollectionEntry::new(detail.id, detail.title);
    if let Some(poster) = detail.poster_path {
        entry = entry.with_poster(poster);
    }
    Ok(entry)
}

pub async fn run_entries(collection: EntryCollection, cmd: EntryCommands, output: &Output) -> Result<()> {
    let app = App::load()?;
    let result = entries(&app, collection, cmd, output).await;
    app.forget_expired_credentials()?;
    result
}

async fn entries(app: &App, collection: EntryCollection, cmd: EntryCommands, output: &Output) -> Result<()> {
    app.prepare_collections().await?;
    let store = app.store();

    match cmd {
        EntryCommands::List => {
            let items = match collection {
                EntryCollection::Favorites => store.favorites(),
                EntryCollection::Watched => store.watched(),
            };
            output.data(&items);
            if items.is_empty() {
                output.info(format!("Your {} is empty", collection.label()));
            } else {
                output.table(&entry_table(&items));
            }
        }
        EntryCommands::Add { movie_id, title, rating } => {
            let mut entry = resolve_entry(app, movie_id, title).await?;
            let mutation = match collection {
                EntryCollection::Favorites => {
                    if rating.is_some() {
                        output.warn("Ratings are only kept on watched movies; ignoring --rating");
                    }
                    store.add_favorite(entry.clone())
                }
                EntryCollection::Watched => {
                    if let Some(rating) = rating {
                        entry = entry.with_rating(rating);
                    }
                    store.add_watched(entry.clone())
                }
            };
            mutation.await.map_err(store_report)?;
            app.coordinator.persist();
            output.success(format!("Added \"{}\" to your {}", entry.title, collection.label()));
        }
        EntryCommands::Remove { movie_id } => {
            let mutation = match collection {
                EntryCollection::Favorites => store.remove_favorite(movie_id.clone()),
                EntryCollection::Watched => store.remove_watched(movie_id.clone()),
            };
            mutation.await.map_err(store_report)?;
            app.coordinator.persist();
            output.success(format!("Removed {} from your {}", movie_id, collection.label()));
        }
    }
    Ok(())
}

pub async fn run_watchlist(cmd: WatchlistCommands, output: &Output) -> Result<()> {
    let app = App::load()?;
    let result = watchlist(&app, cmd, output).await;
    app.forget_expired_credentials()?;
    result
}

async fn watchlist(app: &App, cmd: WatchlistCommands, output: &Output) -> Result<()> {
    app.prepare_collections().await?;
    let store = app.store();

    match cmd {
        WatchlistCommands::List => {
            let lists = store.watchlists();
            output.data(&lists);
            if lists.is_empty() {
                output.info("You have no watchlists yet. Create one with 'reelview watchlist create <name>'");
            } else {
                output.table(&watchlist_table(&lists));
            }
        }
        WatchlistCommands::Show { watchlist_id } => {
            let list = store
                .watchlist(&watchlist_id)
                .ok_or_else(|| eyre!("Watchlist {} not found", watchlist_id))?;
            output.data(&list);
            output.println(format!("{}", list.name.bright_cyan().bold()));
            if let Some(description) = &list.description {
                output.println(format!("{}", description.bright_black()));
            }
            if list.movies.is_empty() {
                output.info("This watchlist is empty");
            } else {
                output.table(&entry_table(&list.movies));
            }
        }
        WatchlistCommands::Create { name, description, public } => {
            let draft = WatchlistDraft {
                name,
                description,
                is_public: public,
            };
            let created = store.create_watchlist(draft).await.map_err(store_report)?;
            app.coordinator.persist();
            output.data(&created);
            output.success(format!("Created watchlist \"{}\" ({})", created.name, created.id));
        }
        WatchlistCommands::Rename { watchlist_id, name, description, public } => {
            let current = store
                .watchlist(&watchlist_id)
                .ok_or_else(|| eyre!("Watchlist {} not found", watchlist_id))?;
            let draft = WatchlistDraft {
                name,
                description: description.or(current.description),
                is_public: public.unwrap_or(current.is_public),
            };
            let updated = store
                .update_watchlist(&watchlist_id, draft)
                .await
                .map_err(store_report)?;
            app.coordinator.persist();
            output.data(&updated);
            output.success(format!("Watchlist {} is now \"{}\"", updated.id, updated.name));
        }
        WatchlistCommands::Delete { watchlist_id } => {
            store.delete_watchlist(&watchlist_id).await.map_err(store_report)?;
            app.coordinator.persist();
            output.success(format!("Deleted watchlist {}", watchlist_id));
        }
        WatchlistCommands::Add { watchlist_id, movie_id, title } => {
            let entry = resolve_entry(app, movie_id, title).await?;
            let title = entry.title.clone();
            store
                .add_to_watchlist(&watchlist_id, entry)
                .await
                .map_err(store_report)?;
            app.coordinator.persist();
            output.success(format!("Added \"{}\" to watchlist {}", title, watchlist_id));
        }
        WatchlistCommands::Remove { watchlist_id, movie_id } => {
            store
                .remove_from_watchlist(&watchlist_id, movie_id.clone())
                .await
                .map_err(store_report)?;
            app.coordinator.persist();
            output.success(format!("Removed {} from watchlist {}", movie_id, watchlist_id));
        }
    }
    Ok(())
}

pub async fn run_stats(output: &Output) -> Result<()> {
    let app = App::load()?;
    let result = stats(&app, output).await;
    app.forget_expired_credentials()?;
    result
}

async fn stats(app: &App, output: &Output) -> Result<()> {
    app.prepare_collections().await?;
    let stats = app.store().stats();
    output.data(&stats);

    let mut table = new_table(&["Collection", "Total"]);
    table.add_row(vec![Cell::new("Favorites"), Cell::new(stats.total_favorites)]);
    table.add_row(vec![Cell::new("Watched"), Cell::new(stats.total_watched)]);
    table.add_row(vec![Cell::new("Watchlists"), Cell::new(stats.total_watchlists)]);
    table.add_row(vec![Cell::new("Movies in watchlists"), Cell::new(stats.total_watchlist_movies)]);
    table.add_row(vec![Cell::new("Reviews"), Cell::new(stats.total_reviews)]);
    table.add_row(vec![
        Cell::new("Average rating"),
        Cell::new(
            stats
                .average_rating
                .map(|r| format!("{:.1}", r))
                .unwrap_or_else(|| "-".to_string()),
        ),
    ]);
    output.table(&table);
    Ok(())
}
