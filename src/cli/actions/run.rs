use crate::cli::actions::{Action, account, migrate};
use anyhow::Result;

/// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Migrate(args) => migrate::execute(args).await,
        Action::Account(args) => account::execute(args).await,
    }
}
