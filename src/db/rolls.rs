use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

use super::column_decode_err;
use crate::model::{RollOutcome, Side};

/// One audit entry for a battle action, written in the same transaction as
/// the bar push it describes.
pub struct NewRoll<'a> {
    pub battle_id: i64,
    pub territory: &'a str,
    pub player_id: i64,
    pub side: Side,
    pub roll: f64,
    pub outcome: RollOutcome,
    pub push: f64,
    pub bar_before: f64,
    pub bar_after: f64,
    pub injured_player_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(conn: &mut PgConnection, new: &NewRoll<'_>) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO battle_rolls \
            (battle_id, territory, player_id, side, roll, outcome, push, \
             bar_before, bar_after, injured_player_id, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING id",
    )
    .bind(new.battle_id)
    .bind(new.territory)
    .bind(new.player_id)
    .bind(new.side.as_str())
    .bind(new.roll)
    .bind(new.outcome.as_str())
    .bind(new.push)
    .bind(new.bar_before)
    .bind(new.bar_after)
    .bind(new.injured_player_id)
    .bind(new.created_at)
    .fetch_one(conn)
    .await
}

#[derive(Debug, Clone)]
pub struct RollRecord {
    pub id: i64,
    pub battle_id: i64,
    pub territory: String,
    pub player_id: i64,
    pub side: Side,
    pub roll: f64,
    pub outcome: RollOutcome,
    pub push: f64,
    pub bar_before: f64,
    pub bar_after: f64,
    pub injured_player_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, PgRow> for RollRecord {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let side_text: String = row.try_get("side")?;
        let side = Side::parse(&side_text).ok_or_else(|| column_decode_err("side", &side_text))?;
        let outcome_text: String = row.try_get("outcome")?;
        let outcome = RollOutcome::parse(&outcome_text)
            .ok_or_else(|| column_decode_err("outcome", &outcome_text))?;
        Ok(RollRecord {
            id: row.try_get("id")?,
            battle_id: row.try_get("battle_id")?,
            territory: row.try_get("territory")?,
            player_id: row.try_get("player_id")?,
            side,
            roll: row.try_get("roll")?,
            outcome,
            push: row.try_get("push")?,
            bar_before: row.try_get("bar_before")?,
            bar_after: row.try_get("bar_after")?,
            injured_player_id: row.try_get("injured_player_id")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Latest rolls for a battle, newest first.
pub async fn recent(
    pool: &PgPool,
    battle_id: i64,
    limit: i64,
) -> Result<Vec<RollRecord>, sqlx::Error> {
    sqlx::query_as::<_, RollRecord>(
        "SELECT * FROM battle_rolls WHERE battle_id = $1 ORDER BY id DESC LIMIT $2",
    )
    .bind(battle_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
