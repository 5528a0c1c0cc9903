use super::prompts;
use super::sync_ui::is_interactive;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use movie_sync_config::PathManager;
use movie_sync_core::SnapshotStore;
use std::fs;

pub async fn run_clear(all: bool, cache: bool, credentials: bool, yes: bool, output: &Output) -> Result<()> {
    let path_manager = PathManager::default();
    let clear_cache_dir = all || cache;
    let clear_creds = all || credentials;

    if !clear_cache_dir && !clear_creds {
        output.warn("No clear option specified. Use --cache, --credentials, or --all");
        output.println("\nExample: reelview clear --cache");
        return Ok(());
    }

    if !yes && is_interactive() {
        let what = match (clear_cache_dir, clear_creds) {
            (true, true) => "local collections, cached data and your stored login",
            (true, false) => "local collections and cached data",
            _ => "your stored login",
        };
        if !prompts::prompt_yes_no(&format!("This removes {}. Continue?", what), Some(false))? {
            output.info("Nothing cleared");
            return Ok(());
        }
    }

    if clear_cache_dir {
        clear_cache(&path_manager, output)?;
    }
    if clear_creds {
        clear_credentials(&path_manager, output)?;
    }
    if all {
        output.success("All cached data and credentials cleared");
    }
    Ok(())
}

fn clear_cache(path_manager: &PathManager, output: &Output) -> Result<()> {
    let snapshots = SnapshotStore::from_paths(path_manager);
    if snapshots.exists() {
        snapshots
            .clear()
            .map_err(|e| eyre!("Failed to remove snapshot at {}: {}", snapshots.path().display(), e))?;
        output.success(format!("Cleared collections snapshot: {}", snapshots.path().display()));
    } else {
        output.info("No collections snapshot found to clear");
    }

    let cache_dir = path_manager.cache_dir();
    if cache_dir.exists() {
        fs::remove_dir_all(&cache_dir)
            .map_err(|e| eyre!("Failed to remove cache directory at {}: {}", cache_dir.display(), e))?;
        output.success(format!("Cleared cache directory: {}", cache_dir.display()));
    }
    Ok(())
}

fn clear_credentials(path_manager: &PathManager, output: &Output) -> Result<()> {
    let credentials_file = path_manager.credentials_file();

    if credentials_file.exists() {
        fs::remove_file(&credentials_file)
            .map_err(|e| eyre!("Failed to remove credentials file at {}: {}", credentials_file.display(), e))?;
        output.success(format!("Cleared credentials: {}", credentials_file.display()));
    } else {
        output.info("No credentials file found to clear");
    }
    Ok(())
}
