use crate::{cli::actions::server::redact_dsn, store};
use anyhow::{Context, Result};
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
}

/// Create the accounts and sessions tables.
/// # Errors
/// Returns an error if the database is unreachable or a statement fails.
pub async fn execute(args: Args) -> Result<()> {
    info!("Applying schema to {}", redact_dsn(&args.dsn));

    store::apply_schema(&args.dsn)
        .await
        .context("Could not apply database schema")?;

    info!("Schema ready");

    Ok(())
}
