//! Apply the lending schema migrations to the configured database.
//!
//! Reads `BORROWD_DATABASE_URL` (or `--database-url`) through the shared
//! settings loader and runs every pending embedded migration.

use borrowd::config::LendingSettings;
use borrowd::outbound::persistence::run_pending_migrations;
use color_eyre::eyre::{Context, Result, eyre};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(%error, "tracing init failed");
    }

    let settings = LendingSettings::load_from_iter(std::env::args_os())
        .wrap_err("failed to load settings")?;
    let url = settings
        .database_url
        .as_deref()
        .ok_or_else(|| eyre!("BORROWD_DATABASE_URL is not set"))?;

    let applied = run_pending_migrations(url).wrap_err("migration run failed")?;
    if applied.is_empty() {
        info!("schema already up to date");
    }
    for version in applied {
        info!(%version, "applied migration");
    }
    Ok(())
}
