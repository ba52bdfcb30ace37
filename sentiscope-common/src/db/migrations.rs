//! Database schema migrations
//!
//! Versioned migrations upgrade databases created by older builds without
//! data loss. Fresh databases already get the latest columns from the
//! `CREATE TABLE` statements; each migration checks before altering so all of
//! them are idempotent.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - they must stay stable for upgrades
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Use ALTER TABLE** - prefer it over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

/// Add a column unless it already exists
async fn add_column_if_missing(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    definition: &str,
) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = ?",
        table
    ))
    .bind(column)
    .fetch_one(pool)
    .await?;

    if has_column > 0 {
        info!("  {}.{} already exists - skipping", table, column);
        return Ok(());
    }

    match sqlx::query(&format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, definition))
        .execute(pool)
        .await
    {
        Ok(_) => {
            info!("  ✓ Added {}.{}", table, column);
            Ok(())
        }
        Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
            info!("  {}.{} added concurrently - skipping", table, column);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Migration v1: stored-file and AI-insight columns on analyses
///
/// The first schema kept only aggregate counts; file storage and AI insights
/// were added afterwards.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: file storage and insight columns on analyses");

    add_column_if_missing(pool, "analyses", "file_path", "TEXT").await?;
    add_column_if_missing(pool, "analyses", "file_url", "TEXT").await?;
    add_column_if_missing(pool, "analyses", "ai_insights", "TEXT").await?;

    Ok(())
}

/// Migration v2: keywords and explicit ordering on analysis items
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: keywords and position on analysis_items");

    add_column_if_missing(pool, "analysis_items", "keywords", "TEXT NOT NULL DEFAULT '[]'").await?;
    add_column_if_missing(pool, "analysis_items", "position", "INTEGER NOT NULL DEFAULT 0").await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analysis_items_analysis ON analysis_items(analysis_id, position)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
