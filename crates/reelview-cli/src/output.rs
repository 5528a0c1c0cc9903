use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, Attribute, Cell, Color, Table};
use movie_sync_models::{CollectionEntry, MovieSummary, Review, Watchlist};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    #[value(name = "json-pretty")]
    JsonPretty,
}

pub struct Output {
    format: OutputFormat,
    quiet: bool,
}

impl Output {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    pub fn is_human(&self) -> bool {
        self.format == OutputFormat::Human
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }

        match self.format {
            OutputFormat::Human => println!("{} {}", "✓".green(), msg.as_ref()),
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({ "type": "success", "message": msg.as_ref() }));
            }
        }
    }

    pub fn error(&self, msg: impl AsRef<str>) {
        // Errors are shown even in quiet mode
        match self.format {
            OutputFormat::Human => eprintln!("{} {}", "✗".red(), msg.as_ref()),
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({ "type": "error", "message": msg.as_ref() }));
            }
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }

        match self.format {
            OutputFormat::Human => println!("{}", msg.as_ref()),
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({ "type": "info", "message": msg.as_ref() }));
            }
        }
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        if self.quiet {
            return;
        }

        match self.format {
            OutputFormat::Human => println!("{} {}", "⚠".yellow(), msg.as_ref()),
            OutputFormat::Json | OutputFormat::JsonPretty => {
                self.print_json(&json!({ "type": "warning", "message": msg.as_ref() }));
            }
        }
    }

    /// Blank lines and decorations only make sense for humans
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.quiet || !self.is_human() {
            return;
        }
        println!("{}", msg.as_ref());
    }

    /// Structured result. In human mode the caller renders a table instead.
    pub fn data<T: Serialize>(&self, data: &T) {
        if self.is_human() {
            return;
        }
        match serde_json::to_value(data) {
            Ok(value) => self.print_json(&value),
            Err(e) => self.error(format!("Failed to serialize output: {}", e)),
        }
    }

    pub fn table(&self, table: &Table) {
        if self.quiet || !self.is_human() {
            return;
        }
        println!("{}", table);
    }

    fn print_json(&self, data: &serde_json::Value) {
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(data).unwrap_or_default()),
            OutputFormat::JsonPretty => {
                println!("{}", serde_json::to_string_pretty(data).unwrap_or_default())
            }
            OutputFormat::Human => println!("{}", data),
        }
    }
}

pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).fg(Color::Cyan).add_attribute(Attribute::Bold)),
    );
    table
}

fn year(release_date: Option<&str>) -> String {
    release_date
        .and_then(|d| d.get(..4))
        .unwrap_or("-")
        .to_string()
}

fn score(value: Option<f32>) -> String {
    value.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string())
}

pub fn movie_table(movies: &[MovieSummary]) -> Table {
    let mut table = new_table(&["ID", "Title", "Year", "Rating"]);
    for movie in movies {
        table.add_row(vec![
            Cell::new(movie.id.as_str()),
            Cell::new(&movie.title),
            Cell::new(year(movie.release_date.as_deref())),
            Cell::new(score(movie.vote_average)),
        ]);
    }
    table
}

pub fn entry_table(entries: &[CollectionEntry]) -> Table {
    let mut table = new_table(&["ID", "Title", "Added", "Rating"]);
    for entry in entries {
        table.add_row(vec![
            Cell::new(entry.movie_id.as_str()),
            Cell::new(&entry.title),
            Cell::new(entry.added_at.format("%Y-%m-%d").to_string()),
            Cell::new(score(entry.rating)),
        ]);
    }
    table
}

pub fn watchlist_table(watchlists: &[Watchlist]) -> Table {
    let mut table = new_table(&["ID", "Name", "Movies", "Public"]);
    for list in watchlists {
        table.add_row(vec![
            Cell::new(&list.id),
            Cell::new(&list.name),
            Cell::new(list.movie_count),
            Cell::new(if list.is_public { "yes" } else { "no" }),
        ]);
    }
    table
}

pub fn review_table(reviews: &[Review]) -> Table {
    let mut table = new_table(&["ID", "Movie", "Rating", "Likes", "Review"]);
    for review in reviews {
        let movie = review
            .movie_title
            .clone()
            .unwrap_or_else(|| review.movie_id.to_string());
        let mut content: String = review.content.chars().take(60).collect();
        if review.content.chars().count() > 60 {
            content.push('…');
        }
        table.add_row(vec![
            Cell::new(&review.id),
            Cell::new(movie),
            Cell::new(format!("{:.1}", review.rating)),
            Cell::new(review.likes),
            Cell::new(content),
        ]);
    }
    table
}
