use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{database::error::QueryError, error::Error};

/// Marks a session id as logged out until the token would have expired anyway.
pub async fn revoke_session(
    pool: &Pool<Postgres>,
    session_id: &str,
    expires_at: i64,
) -> Result<(), Error> {
    sqlx::query(
        "
        INSERT INTO revoked_sessions (session_id, expires_at)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
    ",
    )
    .bind(session_id)
    .bind(expires_at)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    let purged = sqlx::query("DELETE FROM revoked_sessions WHERE expires_at < $1")
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await
        .map_err(QueryError::from)?;
    if purged.rows_affected() > 0 {
        log::debug!("Purged {} expired revocations", purged.rows_affected());
    }

    Ok(())
}

pub async fn is_session_revoked(pool: &Pool<Postgres>, session_id: &str) -> Result<bool, Error> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT session_id FROM revoked_sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row.is_some())
}
