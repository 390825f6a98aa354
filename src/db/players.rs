use sqlx::{PgConnection, PgPool};

/// Snapshot of a player's combat-relevant columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlayerStats {
    pub id: i64,
    pub name: String,
    pub gold: i64,
    pub attack: f64,
    pub defense: f64,
    pub leadership: f64,
}

pub async fn fetch(pool: &PgPool, player_id: i64) -> Result<Option<PlayerStats>, sqlx::Error> {
    sqlx::query_as::<_, PlayerStats>("SELECT * FROM players WHERE id = $1")
        .bind(player_id)
        .fetch_optional(pool)
        .await
}

/// Average defense across a set of players; 0 for an empty set.
pub async fn avg_defense(pool: &PgPool, ids: &[i64]) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(AVG(defense), 0)::DOUBLE PRECISION FROM players WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_one(pool)
    .await
}

/// Average leadership across a set of players; 0 for an empty set.
pub async fn avg_leadership(pool: &PgPool, ids: &[i64]) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE(AVG(leadership), 0)::DOUBLE PRECISION FROM players WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_one(pool)
    .await
}

/// A player's standing with one kingdom; 0 when they have no history there.
pub async fn reputation(
    pool: &PgPool,
    player_id: i64,
    kingdom_id: i64,
) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar::<_, f64>(
        "SELECT COALESCE( \
             (SELECT score FROM kingdom_reputation WHERE player_id = $1 AND kingdom_id = $2), \
             0)::DOUBLE PRECISION",
    )
    .bind(player_id)
    .bind(kingdom_id)
    .fetch_one(pool)
    .await
}

/// Take `gold / divisor` (integer division) from every listed player and
/// return the total collected. The per-player amount is computed inside the
/// statement, so the sum credited elsewhere always equals the sum deducted.
pub async fn forfeit_gold(
    conn: &mut PgConnection,
    ids: &[i64],
    divisor: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "WITH forfeits AS ( \
             UPDATE players p \
             SET gold = p.gold - p.gold / $2 \
             FROM players prev \
             WHERE p.id = ANY($1) AND prev.id = p.id \
             RETURNING prev.gold / $2 AS amount \
         ) \
         SELECT COALESCE(SUM(amount), 0)::BIGINT FROM forfeits",
    )
    .bind(ids)
    .bind(divisor)
    .fetch_one(conn)
    .await
}

/// Add a flat amount of gold to every listed player.
pub async fn grant_gold(
    conn: &mut PgConnection,
    ids: &[i64],
    amount: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE players SET gold = gold + $2 WHERE id = ANY($1)")
        .bind(ids)
        .bind(amount)
        .execute(conn)
        .await?;
    Ok(())
}

/// Knock a flat amount off attack, defense, and leadership, floored at 0.
pub async fn deduct_stats(
    conn: &mut PgConnection,
    ids: &[i64],
    amount: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE players \
         SET attack = GREATEST(0, attack - $2), \
             defense = GREATEST(0, defense - $2), \
             leadership = GREATEST(0, leadership - $2) \
         WHERE id = ANY($1)",
    )
    .bind(ids)
    .bind(amount)
    .execute(conn)
    .await?;
    Ok(())
}

/// Shift every listed player's reputation with one kingdom by `delta`,
/// creating missing rows at the delta value.
pub async fn add_reputation(
    conn: &mut PgConnection,
    ids: &[i64],
    kingdom_id: i64,
    delta: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO kingdom_reputation (player_id, kingdom_id, score) \
         SELECT unnest($1::BIGINT[]), $2, $3 \
         ON CONFLICT (player_id, kingdom_id) \
         DO UPDATE SET score = kingdom_reputation.score + EXCLUDED.score",
    )
    .bind(ids)
    .bind(kingdom_id)
    .bind(delta)
    .execute(conn)
    .await?;
    Ok(())
}
