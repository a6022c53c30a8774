use anyhow::Context;
use shared::store::linemen::{SeedOutcome, seed_sample_linemen};
use shared::{init_tracing, initialize_db, load_config};
use tracing::info;

/// Loads the three sample Ahmedabad linemen into an empty `linemen` table.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(&config.logging).context("failed to initialize tracing")?;

    let pool = initialize_db(&config.postgres, true)
        .await
        .context("failed to connect to Postgres")?;

    match seed_sample_linemen(&pool)
        .await
        .context("failed to seed sample linemen")?
    {
        SeedOutcome::Inserted(count) => info!(count, "sample linemen inserted"),
        SeedOutcome::Skipped => info!("linemen table is not empty, nothing to do"),
    }

    pool.close().await;
    Ok(())
}
