use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::model::CooldownEntry;

/// Outcome of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Acquired,
    Held { remaining_secs: i64 },
}

/// Take the lock for `(subject_id, action_key)` if it is free or expired,
/// stamping a new expiry `hold` from now.
///
/// Two near-simultaneous attempts cannot both acquire: the first-ever
/// attempt wins the row through the insert, and every later attempt
/// re-reads the expiry under `FOR UPDATE`, so a racer blocks until the
/// winner commits and then sees the fresh expiry.
pub async fn acquire(
    pool: &PgPool,
    subject_id: i64,
    action_key: &str,
    hold: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<Acquire, sqlx::Error> {
    let expires_at = now + hold;
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO action_locks (subject_id, action_key, last_performed, expires_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (subject_id, action_key) DO NOTHING",
    )
    .bind(subject_id)
    .bind(action_key)
    .bind(now)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;
    if inserted {
        tx.commit().await?;
        return Ok(Acquire::Acquired);
    }

    let entry = sqlx::query_as::<_, CooldownEntry>(
        "SELECT * FROM action_locks \
         WHERE subject_id = $1 AND action_key = $2 \
         FOR UPDATE",
    )
    .bind(subject_id)
    .bind(action_key)
    .fetch_one(&mut *tx)
    .await?;
    if entry.is_held(now) {
        tx.rollback().await?;
        return Ok(Acquire::Held {
            remaining_secs: entry.remaining_secs(now),
        });
    }

    sqlx::query(
        "UPDATE action_locks SET last_performed = $3, expires_at = $4 \
         WHERE subject_id = $1 AND action_key = $2",
    )
    .bind(subject_id)
    .bind(action_key)
    .bind(now)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(Acquire::Acquired)
}

/// Stamp a lock unconditionally, creating or extending it. Used where the
/// caller has already established the right to act.
pub async fn record(
    pool: &PgPool,
    subject_id: i64,
    action_key: &str,
    hold: chrono::Duration,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO action_locks (subject_id, action_key, last_performed, expires_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (subject_id, action_key) \
         DO UPDATE SET last_performed = EXCLUDED.last_performed, \
                       expires_at = EXCLUDED.expires_at",
    )
    .bind(subject_id)
    .bind(action_key)
    .bind(now)
    .bind(now + hold)
    .execute(pool)
    .await?;
    Ok(())
}

/// Seconds left on a held lock, or `None` when the subject is free to act.
/// Read-only; expired rows are left in place for the next acquire to reuse.
pub async fn remaining_secs(
    pool: &PgPool,
    subject_id: i64,
    action_key: &str,
    now: DateTime<Utc>,
) -> Result<Option<i64>, sqlx::Error> {
    let entry = sqlx::query_as::<_, CooldownEntry>(
        "SELECT * FROM action_locks WHERE subject_id = $1 AND action_key = $2",
    )
    .bind(subject_id)
    .bind(action_key)
    .fetch_optional(pool)
    .await?;
    Ok(entry.and_then(|e| e.is_held(now).then(|| e.remaining_secs(now))))
}
