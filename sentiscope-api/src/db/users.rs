//! User account persistence
//!
//! Soft-deleted accounts (`deleted_at` set) are invisible to every lookup.

use sentiscope_common::db::User;
use sentiscope_common::time::now_rfc3339;
use sentiscope_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password_hash, name, first_name, last_name, role, is_active, \
     email_verified, email_verified_at, avatar_url, last_login_at, created_at, updated_at, deleted_at";

/// Fields supplied at registration; `email` must already be lower-cased
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Profile fields a user may change; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

fn duplicate_email(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::InvalidInput("Email already registered".to_string())
        }
        _ => Error::Database(err),
    }
}

pub async fn create_user(pool: &SqlitePool, user: &NewUser) -> Result<User> {
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, first_name, last_name,
                           role, is_active, email_verified, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, 'user', 1, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.name)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(duplicate_email)?;

    find_by_id(pool, &id)
        .await?
        .ok_or_else(|| Error::Internal(format!("User {} vanished after insert", id)))
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = ? AND deleted_at IS NULL",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = ? AND deleted_at IS NULL",
        USER_COLUMNS
    ))
    .bind(email.to_lowercase())
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Whether a live account other than `except_id` uses `email`
pub async fn email_taken(pool: &SqlitePool, email: &str, except_id: Option<&str>) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users WHERE email = ? AND deleted_at IS NULL AND id != COALESCE(?, '')",
    )
    .bind(email.to_lowercase())
    .bind(except_id)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

pub async fn record_login(pool: &SqlitePool, id: &str) -> Result<()> {
    let now = now_rfc3339();
    sqlx::query("UPDATE users SET last_login_at = ?, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn touch(pool: &SqlitePool, id: &str) -> Result<()> {
    sqlx::query("UPDATE users SET updated_at = ? WHERE id = ? AND deleted_at IS NULL")
        .bind(now_rfc3339())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_password(pool: &SqlitePool, id: &str, password_hash: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(password_hash)
    .bind(now_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("User not found".to_string()));
    }
    Ok(())
}

pub async fn mark_email_verified(pool: &SqlitePool, id: &str) -> Result<()> {
    let now = now_rfc3339();
    let result = sqlx::query(
        r#"
        UPDATE users
        SET email_verified = 1, email_verified_at = ?, updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("User not found".to_string()));
    }
    Ok(())
}

/// Apply the given profile fields and return the updated row
pub async fn update_profile(pool: &SqlitePool, id: &str, update: &ProfileUpdate) -> Result<User> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET name = COALESCE(?, name),
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            email = COALESCE(?, email),
            updated_at = ?
        WHERE id = ? AND deleted_at IS NULL
        "#,
    )
    .bind(&update.name)
    .bind(&update.first_name)
    .bind(&update.last_name)
    .bind(update.email.as_ref().map(|e| e.to_lowercase()))
    .bind(now_rfc3339())
    .bind(id)
    .execute(pool)
    .await
    .map_err(duplicate_email)?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("User not found".to_string()));
    }

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))
}

pub async fn soft_delete(pool: &SqlitePool, id: &str) -> Result<()> {
    let now = now_rfc3339();
    let result = sqlx::query(
        "UPDATE users SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("User not found".to_string()));
    }
    Ok(())
}
