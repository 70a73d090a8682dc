//! Database test utilities
//!
//! In-memory SQLite pools for record store tests. Schema setup is done by the
//! consuming crate, which owns the schema.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

/// Database connection pool type alias
pub type TestDbPool = SqlitePool;

/// Create a fresh in-memory SQLite pool with no schema.
///
/// A single connection is used so every query sees the same in-memory
/// database.
pub async fn open_test_db() -> Result<TestDbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_test_db() {
        let pool = open_test_db().await.unwrap();

        let result: (i64,) = sqlx::query_as("SELECT 1 + 1")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(result.0, 2);
    }

    #[tokio::test]
    async fn test_pools_are_isolated() {
        let a = open_test_db().await.unwrap();
        let b = open_test_db().await.unwrap();

        sqlx::query("CREATE TABLE only_in_a (id INTEGER PRIMARY KEY)")
            .execute(&a)
            .await
            .unwrap();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='only_in_a'",
        )
        .fetch_one(&b)
        .await
        .unwrap();
        assert_eq!(count, 0);
    }
}
