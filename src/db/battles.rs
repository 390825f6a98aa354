use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::column_decode_err;
use crate::model::{Battle, BattleKind, Side};

impl sqlx::FromRow<'_, PgRow> for Battle {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        let kind_text: String = row.try_get("kind")?;
        let kind =
            BattleKind::parse(&kind_text).ok_or_else(|| column_decode_err("kind", &kind_text))?;
        let winner_text: Option<String> = row.try_get("winner_side")?;
        let winner_side = winner_text
            .map(|s| Side::parse(&s).ok_or_else(|| column_decode_err("winner_side", &s)))
            .transpose()?;
        Ok(Battle {
            id: row.try_get("id")?,
            kind,
            kingdom_id: row.try_get("kingdom_id")?,
            attacking_from_kingdom_id: row.try_get("attacking_from_kingdom_id")?,
            initiator_id: row.try_get("initiator_id")?,
            initiator_name: row.try_get("initiator_name")?,
            start_time: row.try_get("start_time")?,
            pledge_end_time: row.try_get("pledge_end_time")?,
            attacker_ids: row.try_get("attacker_ids")?,
            defender_ids: row.try_get("defender_ids")?,
            resolved_at: row.try_get("resolved_at")?,
            attacker_victory: row.try_get("attacker_victory")?,
            winner_side,
        })
    }
}

/// Fields needed to create a battle. The initiator is seeded onto the
/// attacker roster by the insert itself.
pub struct NewBattle<'a> {
    pub kind: BattleKind,
    pub kingdom_id: i64,
    pub attacking_from_kingdom_id: Option<i64>,
    pub initiator_id: i64,
    pub initiator_name: &'a str,
    pub start_time: DateTime<Utc>,
    pub pledge_end_time: DateTime<Utc>,
}

pub async fn fetch(pool: &PgPool, battle_id: i64) -> Result<Option<Battle>, sqlx::Error> {
    sqlx::query_as::<_, Battle>("SELECT * FROM battles WHERE id = $1")
        .bind(battle_id)
        .fetch_optional(pool)
        .await
}

/// Insert a battle only if no conflicting unresolved battle exists: the
/// target kingdom must be idle in both roles, the attacking kingdom must
/// not already be invading elsewhere. The re-check runs inside the insert
/// statement, and the partial unique indexes catch the residual race
/// between two simultaneous inserts. Returns `None` when either guard
/// rejects the row.
pub async fn insert_guarded(
    pool: &PgPool,
    new: &NewBattle<'_>,
) -> Result<Option<i64>, sqlx::Error> {
    let result = sqlx::query_scalar::<_, i64>(
        "INSERT INTO battles \
            (kind, kingdom_id, attacking_from_kingdom_id, initiator_id, initiator_name, \
             start_time, pledge_end_time, attacker_ids) \
         SELECT $1, $2, $3, $4, $5, $6, $7, ARRAY[$4]::BIGINT[] \
         WHERE NOT EXISTS ( \
             SELECT 1 FROM battles \
             WHERE resolved_at IS NULL \
               AND (kingdom_id = $2 \
                    OR attacking_from_kingdom_id = $2 \
                    OR ($3::BIGINT IS NOT NULL AND attacking_from_kingdom_id = $3)) \
         ) \
         RETURNING id",
    )
    .bind(new.kind.as_str())
    .bind(new.kingdom_id)
    .bind(new.attacking_from_kingdom_id)
    .bind(new.initiator_id)
    .bind(new.initiator_name)
    .bind(new.start_time)
    .bind(new.pledge_end_time)
    .fetch_optional(pool)
    .await;

    match result {
        Ok(id) => Ok(id),
        Err(sqlx::Error::Database(e)) if is_busy_conflict(e.constraint()) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Unique-index names that mean another unresolved battle won the race.
fn is_busy_conflict(constraint: Option<&str>) -> bool {
    matches!(
        constraint,
        Some("battles_one_unresolved_target") | Some("battles_one_unresolved_source")
    )
}

/// True if the kingdom is tied up in any unresolved battle, in either role.
pub async fn kingdom_engaged(pool: &PgPool, kingdom_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS ( \
             SELECT 1 FROM battles \
             WHERE resolved_at IS NULL \
               AND (kingdom_id = $1 OR attacking_from_kingdom_id = $1) \
         )",
    )
    .bind(kingdom_id)
    .fetch_one(pool)
    .await
}

/// True if the kingdom is already the attacking source of an unresolved
/// battle.
pub async fn kingdom_attacking(pool: &PgPool, kingdom_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS ( \
             SELECT 1 FROM battles \
             WHERE resolved_at IS NULL AND attacking_from_kingdom_id = $1 \
         )",
    )
    .bind(kingdom_id)
    .fetch_one(pool)
    .await
}

/// True if the kingdom took part in a resolved battle of this kind, on
/// either side of the map, since `since`.
pub async fn kingdom_fought_recently(
    pool: &PgPool,
    kingdom_id: i64,
    kind: BattleKind,
    since: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS ( \
             SELECT 1 FROM battles \
             WHERE kind = $1 \
               AND (kingdom_id = $2 OR attacking_from_kingdom_id = $2) \
               AND resolved_at IS NOT NULL \
               AND resolved_at > $3 \
         )",
    )
    .bind(kind.as_str())
    .bind(kingdom_id)
    .bind(since)
    .fetch_one(pool)
    .await
}

/// The unresolved battle this player is pledged into, if any.
pub async fn player_active_battle(
    pool: &PgPool,
    player_id: i64,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT id FROM battles \
         WHERE resolved_at IS NULL \
           AND (attacker_ids @> ARRAY[$1]::BIGINT[] OR defender_ids @> ARRAY[$1]::BIGINT[]) \
         LIMIT 1",
    )
    .bind(player_id)
    .fetch_optional(pool)
    .await
}

/// Append a player to one roster. The statement re-checks everything the
/// write depends on: still unresolved, still in the pledge window, and the
/// player on neither roster yet. Returns false when any guard failed.
pub async fn append_member(
    pool: &PgPool,
    battle_id: i64,
    side: Side,
    player_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let sql = match side {
        Side::Attackers => {
            "UPDATE battles SET attacker_ids = attacker_ids || $2 \
             WHERE id = $1 AND resolved_at IS NULL AND $3 < pledge_end_time \
               AND NOT (attacker_ids @> ARRAY[$2]::BIGINT[] OR defender_ids @> ARRAY[$2]::BIGINT[])"
        }
        Side::Defenders => {
            "UPDATE battles SET defender_ids = defender_ids || $2 \
             WHERE id = $1 AND resolved_at IS NULL AND $3 < pledge_end_time \
               AND NOT (attacker_ids @> ARRAY[$2]::BIGINT[] OR defender_ids @> ARRAY[$2]::BIGINT[])"
        }
    };
    let done = sqlx::query(sql)
        .bind(battle_id)
        .bind(player_id)
        .bind(now)
        .execute(pool)
        .await?;
    Ok(done.rows_affected() == 1)
}

/// Claim the exclusive right to settle this battle. At most one caller
/// ever gets `true`; the statement auto-commits so the claim stands even
/// if the caller's settlement later fails.
pub async fn claim_resolution(
    pool: &PgPool,
    battle_id: i64,
    winner: Side,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let done = sqlx::query(
        "UPDATE battles \
         SET resolved_at = $2, winner_side = $3, attacker_victory = $4 \
         WHERE id = $1 AND resolved_at IS NULL",
    )
    .bind(battle_id)
    .bind(now)
    .bind(winner.as_str())
    .bind(winner == Side::Attackers)
    .execute(pool)
    .await?;
    Ok(done.rows_affected() == 1)
}
