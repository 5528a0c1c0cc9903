use crate::app::{api_report, App};
use crate::output::{movie_table, new_table, Output};
use color_eyre::Result;
use comfy_table::Cell;
use movie_sync_models::{MovieCategory, MovieId, MoviePage};
use owo_colors::OwoColorize;
use serde_json::json;

fn print_page(page: &MoviePage, heading: &str, output: &Output) {
    output.data(page);
    if !output.is_human() {
        return;
    }
    if page.results.is_empty() {
        output.info(format!("{}: no movies found", heading));
        return;
    }
    output.println(format!("{}", heading.bright_cyan().bold()));
    output.table(&movie_table(&page.results));
    output.println(format!(
        "{}",
        format!("Page {} of {} ({} results)", page.page, page.total_pages, page.total_results).bright_black()
    ));
}

pub async fn run_browse(category: MovieCategory, page: u32, output: &Output) -> Result<()> {
    let app = App::load()?;
    let result = app.api.discover(category, page).await.map_err(api_report)?;
    print_page(&result, &format!("Discover: {}", category), output);
    Ok(())
}

pub async fn run_search(query: String, page: u32, output: &Output) -> Result<()> {
    if query.trim().is_empty() {
        output.warn("Search query is empty");
        return Ok(());
    }
    let app = App::load()?;
    let result = app.api.search_movies(&query, page).await.map_err(api_report)?;
    print_page(&result, &format!("Search: \"{}\"", query.trim()), output);
    Ok(())
}

pub async fn run_movie(movie_id: MovieId, recommendations: bool, output: &Output) -> Result<()> {
    let app = App::load()?;
    let detail = app.api.get_movie(&movie_id).await.map_err(api_report)?;
    let similar = if recommendations {
        Some(app.api.get_recommendations(&movie_id).await.map_err(api_report)?)
    } else {
        None
    };

    if !output.is_human() {
        output.data(&json!({ "movie": detail, "recommendations": similar }));
        return Ok(());
    }

    let mut table = new_table(&["Field", "Value"]);
    table.add_row(vec![Cell::new("ID"), Cell::new(detail.id.as_str())]);
    table.add_row(vec![Cell::new("Title"), Cell::new(&detail.title)]);
    if let Some(tagline) = &detail.tagline {
        table.add_row(vec![Cell::new("Tagline"), Cell::new(tagline)]);
    }
    if let Some(date) = &detail.release_date {
        table.add_row(vec![Cell::new("Released"), Cell::new(date)]);
    }
    if let Some(runtime) = detail.runtime {
        table.add_row(vec![Cell::new("Runtime"), Cell::new(format!("{} min", runtime))]);
    }
    if let Some(score) = detail.vote_average {
        table.add_row(vec![Cell::new("Rating"), Cell::new(format!("{:.1}", score))]);
    }
    if !detail.genres.is_empty() {
        let names: Vec<&str> = detail.genres.iter().map(|g| g.name.as_str()).collect();
        table.add_row(vec![Cell::new("Genres"), Cell::new(names.join(", "))]);
    }
    if let Some(overview) = &detail.overview {
        table.add_row(vec![Cell::new("Overview"), Cell::new(overview)]);
    }
    output.table(&table);

    if let Some(page) = similar {
        print_page(&page, "Recommended", output);
    }
    Ok(())
}

pub async fn run_genres(output: &Output) -> Result<()> {
    let app = App::load()?;
    let genres = app.api.get_genres().await.map_err(api_report)?;
    output.data(&genres);

    let mut table = new_table(&["ID", "Genre"]);
    for genre in &genres {
        table.add_row(vec![Cell::new(genre.id), Cell::new(&genre.name)]);
    }
    output.table(&table);
    Ok(())
}
