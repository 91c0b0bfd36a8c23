//! Queries against the `chat_messages` table (spec §3's bounded chat
//! history, "L4").

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use taskforge_core::llm::ChatMessage;

use crate::models::{ChatMessageRow, chat_message_to_row, row_to_chat_message};

/// Append one message to a session's history.
pub async fn append_message(
    pool: &PgPool,
    session_id: Uuid,
    message: &ChatMessage,
    now: i64,
) -> Result<()> {
    let row = chat_message_to_row(message, session_id, now);
    sqlx::query(
        "INSERT INTO chat_messages (id, session_id, role, content, tool_calls, timestamp) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(row.id)
    .bind(row.session_id)
    .bind(&row.role)
    .bind(&row.content)
    .bind(&row.tool_calls)
    .bind(row.timestamp)
    .execute(pool)
    .await
    .context("failed to append chat message")?;

    Ok(())
}

/// List a session's full chat history, oldest first.
pub async fn list_messages(pool: &PgPool, session_id: Uuid) -> Result<Vec<ChatMessage>> {
    let rows: Vec<ChatMessageRow> = sqlx::query_as(
        "SELECT id, session_id, role, content, tool_calls, timestamp \
         FROM chat_messages WHERE session_id = $1 ORDER BY timestamp ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await
    .context("failed to list chat messages")?;

    Ok(rows.iter().map(row_to_chat_message).collect())
}

/// Delete a session's entire chat history.
pub async fn clear_messages(pool: &PgPool, session_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM chat_messages WHERE session_id = $1")
        .bind(session_id)
        .execute(pool)
        .await
        .context("failed to clear chat messages")?;

    Ok(())
}
