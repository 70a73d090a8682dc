//! Record store database setup

use anyhow::{Context, Result};
use directories::ProjectDirs;
use sitewise_sweep_common::defaults::APP_NAME;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Database connection pool type alias
pub type DbPool = SqlitePool;

/// Default state database path under the user's local data directory
pub fn default_db_path() -> Result<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", APP_NAME).context("Failed to get project directories")?;

    let state_dir = proj_dirs.data_local_dir();
    fs::create_dir_all(state_dir).context("Failed to create state directory")?;

    Ok(state_dir.join("state.db"))
}

/// Open the state database at `path` (or the default path), creating it if
/// needed
pub async fn open_db(path: Option<&Path>) -> Result<DbPool> {
    let path = match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).context("Failed to create state directory")?;
            }
            path.to_path_buf()
        }
        None => default_db_path()?,
    };
    let db_url = format!("sqlite://{}?mode=rwc", path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open state database at {}", path.display()))?;

    setup_schema(&pool).await?;

    Ok(pool)
}

/// Create the record table if it does not exist
pub async fn setup_schema(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
