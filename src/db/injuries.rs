use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::model::Injury;

/// Gate a player's battle action on their injury state, clearing an
/// expired row on the way through. The check runs under `FOR UPDATE` so
/// two simultaneous checks of the same injury cannot disagree: one clears
/// it, the other waits and then sees it cleared. Returns the seconds left
/// when the player is still hurt.
pub async fn check_and_clear(
    pool: &PgPool,
    battle_id: i64,
    player_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<i64>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query_as::<_, Injury>(
        "SELECT battle_id, player_id, inflicted_at, expires_at, cleared_at \
         FROM battle_injuries \
         WHERE battle_id = $1 AND player_id = $2 AND cleared_at IS NULL \
         FOR UPDATE",
    )
    .bind(battle_id)
    .bind(player_id)
    .fetch_optional(&mut *tx)
    .await?;

    match row {
        None => {
            tx.commit().await?;
            Ok(None)
        }
        Some(injury) if injury.is_active(now) => {
            tx.rollback().await?;
            Ok(Some(injury.remaining_secs(now)))
        }
        Some(_) => {
            sqlx::query(
                "UPDATE battle_injuries SET cleared_at = $3 \
                 WHERE battle_id = $1 AND player_id = $2 AND cleared_at IS NULL",
            )
            .bind(battle_id)
            .bind(player_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            Ok(None)
        }
    }
}

/// Injure a player. A stale expired row is cleared first so the partial
/// unique index only ever blocks a genuinely active injury. Returns false
/// when the target is already hurt.
pub async fn inflict(
    conn: &mut PgConnection,
    battle_id: i64,
    player_id: i64,
    now: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    sqlx::query(
        "UPDATE battle_injuries SET cleared_at = $3 \
         WHERE battle_id = $1 AND player_id = $2 AND cleared_at IS NULL AND expires_at <= $3",
    )
    .bind(battle_id)
    .bind(player_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let done = sqlx::query(
        "INSERT INTO battle_injuries (battle_id, player_id, inflicted_at, expires_at) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (battle_id, player_id) WHERE cleared_at IS NULL DO NOTHING",
    )
    .bind(battle_id)
    .bind(player_id)
    .bind(now)
    .bind(until)
    .execute(conn)
    .await?;
    Ok(done.rows_affected() == 1)
}

/// Players in this battle currently locked out by an unexpired injury.
pub async fn hurt_players(
    pool: &PgPool,
    battle_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT player_id FROM battle_injuries \
         WHERE battle_id = $1 AND cleared_at IS NULL AND expires_at > $2",
    )
    .bind(battle_id)
    .bind(now)
    .fetch_all(pool)
    .await
}

/// Seconds left on a player's injury without clearing anything. View path.
pub async fn remaining_secs(
    pool: &PgPool,
    battle_id: i64,
    player_id: i64,
    now: DateTime<Utc>,
) -> Result<Option<i64>, sqlx::Error> {
    let row = sqlx::query_as::<_, Injury>(
        "SELECT battle_id, player_id, inflicted_at, expires_at, cleared_at \
         FROM battle_injuries \
         WHERE battle_id = $1 AND player_id = $2 AND cleared_at IS NULL",
    )
    .bind(battle_id)
    .bind(player_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.and_then(|i| i.is_active(now).then(|| i.remaining_secs(now))))
}
