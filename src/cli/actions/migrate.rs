use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::auth::store::apply_schema;

#[derive(Debug)]
pub struct Args {
    pub dsn: SecretString,
}

/// Apply the credential store schema.
/// # Errors
/// Returns an error if the database is unreachable or a statement fails.
pub async fn execute(args: Args) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(args.dsn.expose_secret())
        .await
        .context("failed to connect to database")?;

    apply_schema(&pool).await?;
    info!("schema applied");
    println!("{}", serde_json::json!({ "migrated": true }));

    pool.close().await;
    Ok(())
}
