use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::eyre;
use commands::collections::EntryCollection;
use commands::{auth, browse, clear, collections, config, daemon, reviews, sync};
use movie_sync_config::{PathManager, Theme};
use movie_sync_models::{MovieCategory, MovieId};

mod app;
mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "reelview")]
#[command(about = "Reelview - browse movies and keep your collections in sync")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse a movie listing
    Browse {
        /// popular, top_rated, upcoming or now_playing
        #[arg(default_value = "popular")]
        category: MovieCategory,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Search movies by title
    Search {
        query: String,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show details for one movie
    Movie {
        movie_id: MovieId,

        /// Also list recommended movies
        #[arg(long, action = ArgAction::SetTrue)]
        recommendations: bool,
    },
    /// List movie genres
    Genres,
    /// Manage your favorite movies
    Favorites {
        #[command(subcommand)]
        cmd: EntryCommands,
    },
    /// Manage movies you have watched
    Watched {
        #[command(subcommand)]
        cmd: EntryCommands,
    },
    /// Manage your watchlists
    Watchlist {
        #[command(subcommand)]
        cmd: WatchlistCommands,
    },
    /// Write, like and report reviews
    Reviews {
        #[command(subcommand)]
        cmd: ReviewCommands,
    },
    /// Show collection totals
    Stats,
    /// Sync collections with the server (one-time)
    #[command(long_about = "Fetch profile, watchlists and reviews together and replace the local collections with them. Skipped when the local copy is still fresh unless --force is given.")]
    Sync {
        /// Sync even when the local copy is fresh
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Show local sync state without contacting the server
    Status,
    /// Keep collections fresh in the foreground until interrupted
    #[command(long_about = "Run the background refresh loop in the foreground. Collections are re-synced whenever they become stale; logs are also written to a daily-rotated file.")]
    Daemon {
        /// Skip the sync normally run on startup
        #[arg(long, action = ArgAction::SetTrue)]
        no_startup_sync: bool,
    },
    /// Store an access token
    Login {
        /// Access token (prompted for when omitted)
        #[arg(long)]
        token: Option<String>,
    },
    /// Sign out and clear local collections
    Logout,
    /// View or change configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
    /// Clear cached data
    #[command(long_about = "Clear the local collections snapshot and cache directory (--cache), the stored login (--credentials), or both (--all).")]
    Clear {
        /// Clear cache and credentials
        #[arg(long, action = ArgAction::SetTrue, conflicts_with_all = ["cache", "credentials"])]
        all: bool,

        /// Clear the collections snapshot and cache directory
        #[arg(long, action = ArgAction::SetTrue)]
        cache: bool,

        /// Clear stored credentials
        #[arg(long, action = ArgAction::SetTrue)]
        credentials: bool,

        /// Do not ask for confirmation
        #[arg(short, long, action = ArgAction::SetTrue)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum EntryCommands {
    List,
    Add {
        movie_id: MovieId,

        /// Title to store (looked up when omitted)
        #[arg(long)]
        title: Option<String>,

        /// Your rating, 0.5 to 10 (watched only)
        #[arg(long)]
        rating: Option<f32>,
    },
    Remove {
        movie_id: MovieId,
    },
}

#[derive(Subcommand)]
enum WatchlistCommands {
    List,
    /// List the movies in one watchlist
    Show {
        watchlist_id: String,
    },
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, action = ArgAction::SetTrue)]
        public: bool,
    },
    /// Change a watchlist's name, description or visibility
    Rename {
        watchlist_id: String,
        name: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        public: Option<bool>,
    },
    Delete {
        watchlist_id: String,
    },
    Add {
        watchlist_id: String,
        movie_id: MovieId,

        #[arg(long)]
        title: Option<String>,
    },
    Remove {
        watchlist_id: String,
        movie_id: MovieId,
    },
}

#[derive(Subcommand)]
enum ReviewCommands {
    List,
    Write {
        movie_id: MovieId,

        /// Rating from 0.5 to 10
        #[arg(long)]
        rating: f32,

        content: String,

        #[arg(long)]
        title: Option<String>,
    },
    Like {
        review_id: String,
    },
    Report {
        review_id: String,

        #[arg(long)]
        reason: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration (masks the access token)
    Show {
        /// Show the full access token
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },
    /// Interactive configuration wizard
    Init,
    /// Set the color theme preference
    Theme {
        /// system, light or dark
        theme: Theme,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // The daemon also logs to a rotating file; keep its writer alive until exit
    let _log_guard = match &cli.command {
        Commands::Daemon { .. } => {
            let paths = PathManager::default();
            let log_file = app::load_config(&paths)?
                .ui
                .log_file
                .unwrap_or_else(|| paths.daemon_log_file());
            Some(
                logging::init_daemon_logging(cli.verbose, cli.quiet, &log_file)
                    .map_err(|e| eyre!("{}", e))?,
            )
        }
        _ => {
            logging::init_logging(cli.verbose, cli.quiet).map_err(|e| eyre!("{}", e))?;
            None
        }
    };

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Browse { category, page } => browse::run_browse(category, page, &output).await,
        Commands::Search { query, page } => browse::run_search(query, page, &output).await,
        Commands::Movie { movie_id, recommendations } => browse::run_movie(movie_id, recommendations, &output).await,
        Commands::Genres => browse::run_genres(&output).await,
        Commands::Favorites { cmd } => collections::run_entries(EntryCollection::Favorites, cmd, &output).await,
        Commands::Watched { cmd } => collections::run_entries(EntryCollection::Watched, cmd, &output).await,
        Commands::Watchlist { cmd } => collections::run_watchlist(cmd, &output).await,
        Commands::Reviews { cmd } => reviews::run_reviews(cmd, &output).await,
        Commands::Stats => collections::run_stats(&output).await,
        Commands::Sync { force } => sync::run_sync(force, &output).await,
        Commands::Status => sync::run_status(&output).await,
        Commands::Daemon { no_startup_sync } => daemon::run_daemon(no_startup_sync, &output).await,
        Commands::Login { token } => auth::run_login(token, &output).await,
        Commands::Logout => auth::run_logout(&output).await,
        Commands::Config { cmd } => config::run_config(cmd, &output).await,
        Commands::Clear { all, cache, credentials, yes } => clear::run_clear(all, cache, credentials, yes, &output).await,
    }
}
