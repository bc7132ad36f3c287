//! Import command - bulk-imports a CSV file through the user service

use std::path::PathBuf;

use clap::Args;
use tracing::info;

/// Arguments for `users-api import`
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// CSV file with a header row (firstname, lastname, email, phone, status, provider, birth_date)
    pub file: PathBuf,
}

/// Import the file and print `{successCount, failedCount}` as JSON
pub async fn run(args: ImportArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    if !args.file.is_file() {
        anyhow::bail!("File not found: {}", args.file.display());
    }

    let service = crate::create_user_service(&config).await?;
    info!(file = %args.file.display(), "Importing users");

    let summary = service.import_file(&args.file).await?;
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}
