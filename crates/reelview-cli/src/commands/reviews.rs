use crate::app::{store_report, App};
use crate::output::{review_table, Output};
use crate::ReviewCommands;
use color_eyre::Result;
use movie_sync_models::NewReview;

pub async fn run_reviews(cmd: ReviewCommands, output: &Output) -> Result<()> {
    let app = App::load()?;
    let result = reviews(&app, cmd, output).await;
    app.forget_expired_credentials()?;
    result
}

async fn reviews(app: &App, cmd: ReviewCommands, output: &Output) -> Result<()> {
    app.prepare_collections().await?;
    let store = app.store();

    match cmd {
        ReviewCommands::List => {
            let reviews = store.reviews();
            output.data(&reviews);
            if reviews.is_empty() {
                output.info("You have not written any reviews yet");
            } else {
                output.table(&review_table(&reviews));
            }
        }
        ReviewCommands::Write { movie_id, rating, content, title } => {
            let review = NewReview {
                movie_id,
                movie_title: title,
                rating,
                content,
            };
            let created = store.submit_review(review).await.map_err(store_report)?;
            app.coordinator.persist();
            output.data(&created);
            output.success(format!("Review {} posted", created.id));
        }
        ReviewCommands::Like { review_id } => {
            store.like_review(&review_id).await.map_err(store_report)?;
            app.coordinator.persist();
            output.success(format!("Liked review {}", review_id));
        }
        ReviewCommands::Report { review_id, reason } => {
            store
                .report_review(&review_id, &reason)
                .await
                .map_err(store_report)?;
            output.success(format!("Reported review {}", review_id));
        }
    }
    Ok(())
}
