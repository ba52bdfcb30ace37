//! Chat transcript persistence

use sentiscope_common::db::{ChatMessage, MessageRole};
use sentiscope_common::time::now_rfc3339;
use sentiscope_common::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

async fn insert_message(
    conn: &mut SqliteConnection,
    analysis_id: &str,
    role: MessageRole,
    content: &str,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();

    sqlx::query(
        "INSERT INTO chat_messages (id, analysis_id, role, content, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(analysis_id)
    .bind(role)
    .bind(content)
    .bind(now_rfc3339())
    .execute(conn)
    .await?;

    Ok(id)
}

async fn fetch_message(pool: &SqlitePool, id: &str) -> Result<ChatMessage> {
    sqlx::query_as::<_, ChatMessage>(
        "SELECT id, analysis_id, role, content, created_at FROM chat_messages WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::Internal(format!("Chat message {} vanished after insert", id)))
}

/// Store a question and its answer together; neither is kept if either insert fails
pub async fn append_exchange(
    pool: &SqlitePool,
    analysis_id: &str,
    question: &str,
    reply: &str,
) -> Result<(ChatMessage, ChatMessage)> {
    let mut tx = pool.begin().await?;
    let question_id = insert_message(&mut *tx, analysis_id, MessageRole::User, question).await?;
    let reply_id = insert_message(&mut *tx, analysis_id, MessageRole::Assistant, reply).await?;
    tx.commit().await?;

    Ok((
        fetch_message(pool, &question_id).await?,
        fetch_message(pool, &reply_id).await?,
    ))
}

/// Oldest first
pub async fn list_messages(pool: &SqlitePool, analysis_id: &str) -> Result<Vec<ChatMessage>> {
    let messages = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT id, analysis_id, role, content, created_at
        FROM chat_messages
        WHERE analysis_id = ?
        ORDER BY created_at ASC, rowid ASC
        "#,
    )
    .bind(analysis_id)
    .fetch_all(pool)
    .await?;

    Ok(messages)
}
