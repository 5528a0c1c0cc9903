use super::sync_ui::SyncUI;
use crate::app::{api_report, App};
use crate::output::{new_table, Output};
use color_eyre::Result;
use comfy_table::Cell;
use movie_sync_core::SyncOutcome;
use owo_colors::OwoColorize;

pub async fn run_sync(force: bool, output: &Output) -> Result<()> {
    tracing::debug!(force, "Sync command started");
    let app = App::load()?;
    let result = sync(&app, force, output).await;
    app.forget_expired_credentials()?;
    result
}

async fn sync(app: &App, force: bool, output: &Output) -> Result<()> {
    if !app.is_signed_in() {
        return Err(color_eyre::eyre::eyre!("Not signed in. Run 'reelview login' first."));
    }

    let ui = SyncUI::new(output.is_human() && !output.is_quiet());
    ui.set_message("Restoring local collections...");
    if let Err(e) = app.coordinator.load_snapshot() {
        tracing::warn!(operation = "snapshot_restore", error = %e, "Ignoring unreadable snapshot");
    }

    ui.set_message("Signing in...");
    app.coordinator.initialize().await.map_err(api_report)?;

    ui.set_message("Fetching profile, watchlists and reviews...");
    let outcome = app.coordinator.sync_with_server(force).await.map_err(api_report)?;
    ui.finish();

    output.data(&outcome);
    match outcome {
        SyncOutcome::Synced(summary) => {
            output.success(format!(
                "Sync completed in {} ms: {} favorites, {} watched, {} watchlists, {} reviews",
                summary.duration_ms, summary.favorites, summary.watched, summary.watchlists, summary.reviews
            ));
        }
        SyncOutcome::Skipped { last_sync_at } => {
            let when = last_sync_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            output.info(format!("Collections are up to date (last sync {}). Use --force to sync anyway.", when));
        }
    }
    Ok(())
}

/// Local view of the sync state. Never touches the network.
pub async fn run_status(output: &Output) -> Result<()> {
    let app = App::load()?;
    if let Err(e) = app.coordinator.load_snapshot() {
        tracing::warn!(operation = "snapshot_restore", error = %e, "Ignoring unreadable snapshot");
    }

    let status = app.coordinator.status();
    output.data(&status);

    let yes_no = |v: bool| if v { "yes".green().to_string() } else { "no".red().to_string() };
    let mut table = new_table(&["Status", "Value"]);
    table.add_row(vec![Cell::new("Signed in"), Cell::new(yes_no(app.is_signed_in()))]);
    table.add_row(vec![
        Cell::new("Last sync"),
        Cell::new(
            status
                .sync
                .last_sync_at
                .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "never".to_string()),
        ),
    ]);
    table.add_row(vec![Cell::new("Stale"), Cell::new(yes_no(status.is_stale))]);
    table.add_row(vec![Cell::new("Needs refetch"), Cell::new(yes_no(status.sync.needs_refetch))]);
    table.add_row(vec![
        Cell::new("Snapshot"),
        Cell::new(app.paths.snapshot_file().display().to_string()),
    ]);
    output.table(&table);
    Ok(())
}
