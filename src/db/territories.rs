use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

use super::column_decode_err;
use crate::model::{Side, Territory};

impl sqlx::FromRow<'_, PgRow> for Territory {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Territory {
            battle_id: row.try_get("battle_id")?,
            name: row.try_get("name")?,
            control_bar: row.try_get("control_bar")?,
            captured_by: decode_side(row.try_get("captured_by")?)?,
            captured_at: row.try_get("captured_at")?,
        })
    }
}

fn decode_side(value: Option<String>) -> Result<Option<Side>, sqlx::Error> {
    value
        .map(|s| Side::parse(&s).ok_or_else(|| column_decode_err("captured_by", &s)))
        .transpose()
}

/// Create the territory rows for a battle if they do not exist yet.
/// Idempotent, so it is safe to call on every battle-phase read; rows that
/// already exist keep their bar and capture state.
pub async fn materialize(
    pool: &PgPool,
    battle_id: i64,
    names: &[String],
    starting_bar: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO territories (battle_id, name, control_bar) \
         SELECT $1, unnest($2::TEXT[]), $3 \
         ON CONFLICT (battle_id, name) DO NOTHING",
    )
    .bind(battle_id)
    .bind(names)
    .bind(starting_bar)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_all(pool: &PgPool, battle_id: i64) -> Result<Vec<Territory>, sqlx::Error> {
    sqlx::query_as::<_, Territory>(
        "SELECT * FROM territories WHERE battle_id = $1 ORDER BY name",
    )
    .bind(battle_id)
    .fetch_all(pool)
    .await
}

pub async fn fetch(
    pool: &PgPool,
    battle_id: i64,
    name: &str,
) -> Result<Option<Territory>, sqlx::Error> {
    sqlx::query_as::<_, Territory>(
        "SELECT * FROM territories WHERE battle_id = $1 AND name = $2",
    )
    .bind(battle_id)
    .bind(name)
    .fetch_optional(pool)
    .await
}

pub async fn count_captured(
    pool: &PgPool,
    battle_id: i64,
    side: Side,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM territories WHERE battle_id = $1 AND captured_by = $2",
    )
    .bind(battle_id)
    .bind(side.as_str())
    .fetch_one(pool)
    .await
}

/// Result of one bar push. `bar_after` is exact; `bar_before` and
/// `captured_by` come from the statement's snapshot and may trail a push
/// that committed in the same instant. They feed the audit log, not the
/// game rules.
#[derive(Debug, Clone)]
pub struct BarMove {
    pub bar_before: f64,
    pub bar_after: f64,
    pub captured_by: Option<Side>,
}

impl sqlx::FromRow<'_, PgRow> for BarMove {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(BarMove {
            bar_before: row.try_get("bar_before")?,
            bar_after: row.try_get("bar_after")?,
            captured_by: decode_side(row.try_get("captured_by")?)?,
        })
    }
}

/// Apply a signed, clamped push to the control bar in a single statement.
/// Under concurrent pushes Postgres re-evaluates the arithmetic against the
/// latest committed row, so no push is ever lost. The row stays locked on
/// this connection until the surrounding transaction ends.
pub async fn push_bar(
    conn: &mut PgConnection,
    battle_id: i64,
    name: &str,
    delta: f64,
) -> Result<Option<BarMove>, sqlx::Error> {
    sqlx::query_as::<_, BarMove>(
        "UPDATE territories t \
         SET control_bar = GREATEST(0, LEAST(100, t.control_bar + $3)) \
         FROM territories prev \
         WHERE t.battle_id = $1 AND t.name = $2 \
           AND prev.battle_id = t.battle_id AND prev.name = t.name \
         RETURNING prev.control_bar AS bar_before, \
                   t.control_bar AS bar_after, \
                   t.captured_by",
    )
    .bind(battle_id)
    .bind(name)
    .bind(delta)
    .fetch_optional(conn)
    .await
}

/// Mark a territory captured. First writer wins; once set, `captured_by`
/// never changes. Returns true only for the call that performed the write.
pub async fn capture(
    conn: &mut PgConnection,
    battle_id: i64,
    name: &str,
    side: Side,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let done = sqlx::query(
        "UPDATE territories SET captured_by = $3, captured_at = $4 \
         WHERE battle_id = $1 AND name = $2 AND captured_by IS NULL",
    )
    .bind(battle_id)
    .bind(name)
    .bind(side.as_str())
    .bind(now)
    .execute(conn)
    .await?;
    Ok(done.rows_affected() == 1)
}
