//! LinuxDo Keeper - console entry point
//!
//! Reads the account list from the environment, then runs one browsing
//! session per account, strictly in order.

use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = app_lib::init_logging();

    info!("Starting LinuxDo Keeper");
    if let Some(dir) = app_lib::log_dir() {
        info!("Log files saved to: {}", dir.display());
    }

    let config = app_lib::AppConfig::from_env()?;
    info!(
        "Loaded {} account(s) from {}",
        config.accounts.len(),
        app_lib::ACCOUNTS_ENV
    );

    app_lib::runner::run_all(&config).await;

    Ok(())
}
