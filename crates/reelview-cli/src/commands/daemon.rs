use crate::app::{api_report, App};
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use movie_sync_client::SessionEvent;
use movie_sync_core::SyncOutcome;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// Keeps collections fresh in the foreground until interrupted.
///
/// The coordinator's refresh task ticks every `sync.refresh_interval_secs`
/// and syncs once data is older than `sync.stale_after_secs`. A 401 ends the
/// daemon since nothing can be refreshed without a new login.
pub async fn run_daemon(no_startup_sync: bool, output: &Output) -> Result<()> {
    let app = App::load()?;
    if !app.is_signed_in() {
        return Err(eyre!("Not signed in. Run 'reelview login' first."));
    }

    if let Err(e) = app.coordinator.load_snapshot() {
        warn!(operation = "snapshot_restore", error = %e, "Ignoring unreadable snapshot");
    }
    let mut session_events = app.coordinator.session().subscribe();

    let profile = app.coordinator.initialize().await.map_err(api_report)?;
    info!(
        operation = "daemon_started",
        user = %profile.username,
        refresh_interval_secs = app.config.sync.refresh_interval_secs,
        stale_after_secs = app.config.sync.stale_after_secs,
        "Refresh daemon started"
    );
    output.info(format!(
        "Refreshing collections for {} every {} s (Ctrl-C to stop)",
        profile.username, app.config.sync.refresh_interval_secs
    ));

    if !no_startup_sync {
        match app.coordinator.sync_with_server(false).await {
            Ok(SyncOutcome::Synced(summary)) => info!(
                operation = "startup_sync",
                duration_ms = summary.duration_ms,
                "Startup sync completed"
            ),
            Ok(SyncOutcome::Skipped { .. }) => info!(operation = "startup_sync", "Snapshot is fresh, startup sync skipped"),
            Err(e) => error!(operation = "startup_sync", error = %e, "Startup sync failed"),
        }
    }

    app.coordinator.set_active(true);
    let listener = app.coordinator.spawn_session_listener();
    let refresher = app.coordinator.spawn_background_refresh();

    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!(operation = "daemon_shutdown", "Interrupted, shutting down"),
                    Err(e) => error!(operation = "daemon_shutdown", error = %e, "Failed to listen for Ctrl-C"),
                }
                break Ok(());
            }
            event = session_events.recv() => match event {
                Ok(SessionEvent::Expired) => {
                    error!(operation = "daemon_shutdown", "Session expired, stopping refresh");
                    break Err(eyre!("Session expired. Run 'reelview login' and start the daemon again."));
                }
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    app.coordinator.set_active(false);
    refresher.abort();
    listener.abort();
    app.coordinator.persist();
    app.forget_expired_credentials()?;
    if result.is_ok() {
        output.success("Refresh daemon stopped");
    }
    result
}
