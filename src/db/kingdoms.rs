use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool};

/// Snapshot of a kingdom row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Kingdom {
    pub id: i64,
    pub name: String,
    pub ruler_id: Option<i64>,
    pub ruler_since: Option<DateTime<Utc>>,
    pub treasury: i64,
    pub wall_level: i32,
    pub empire_id: Option<i64>,
}

pub async fn fetch(pool: &PgPool, kingdom_id: i64) -> Result<Option<Kingdom>, sqlx::Error> {
    sqlx::query_as::<_, Kingdom>("SELECT * FROM kingdoms WHERE id = $1")
        .bind(kingdom_id)
        .fetch_optional(pool)
        .await
}

/// Take `treasury / divisor` from a kingdom and return the amount taken,
/// computed inside the statement.
pub async fn forfeit_treasury(
    conn: &mut PgConnection,
    kingdom_id: i64,
    divisor: i64,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "WITH moved AS ( \
             UPDATE kingdoms k \
             SET treasury = k.treasury - k.treasury / $2 \
             FROM kingdoms prev \
             WHERE k.id = $1 AND prev.id = k.id \
             RETURNING prev.treasury / $2 AS amount \
         ) \
         SELECT COALESCE(SUM(amount), 0)::BIGINT FROM moved",
    )
    .bind(kingdom_id)
    .bind(divisor)
    .fetch_one(conn)
    .await
}

pub async fn credit_treasury(
    conn: &mut PgConnection,
    kingdom_id: i64,
    amount: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE kingdoms SET treasury = treasury + $2 WHERE id = $1")
        .bind(kingdom_id)
        .bind(amount)
        .execute(conn)
        .await?;
    Ok(())
}

/// Seat a new ruler and restart their tenure clock.
pub async fn crown_ruler(
    conn: &mut PgConnection,
    kingdom_id: i64,
    ruler_id: i64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE kingdoms SET ruler_id = $2, ruler_since = $3 WHERE id = $1")
        .bind(kingdom_id)
        .bind(ruler_id)
        .bind(now)
        .execute(conn)
        .await?;
    Ok(())
}

/// Fold a conquered kingdom into the conqueror's empire. A conqueror that
/// belongs to no empire becomes the seat of a new one.
pub async fn adopt_empire(
    conn: &mut PgConnection,
    kingdom_id: i64,
    conqueror_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE kingdoms \
         SET empire_id = COALESCE((SELECT empire_id FROM kingdoms WHERE id = $2), $2) \
         WHERE id = $1",
    )
    .bind(kingdom_id)
    .bind(conqueror_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Close the sitting ruler's open reign record, if one exists.
pub async fn close_reign(
    conn: &mut PgConnection,
    kingdom_id: i64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE kingdom_reigns SET ended_at = $2 \
         WHERE kingdom_id = $1 AND ended_at IS NULL",
    )
    .bind(kingdom_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// Open a reign record for a newly crowned ruler.
pub async fn open_reign(
    conn: &mut PgConnection,
    kingdom_id: i64,
    ruler_id: i64,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO kingdom_reigns (kingdom_id, ruler_id, started_at) VALUES ($1, $2, $3)",
    )
    .bind(kingdom_id)
    .bind(ruler_id)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}

/// One line in a kingdom's public feed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KingdomEvent {
    pub id: i64,
    pub kingdom_id: i64,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

pub async fn append_event<'e>(
    ex: impl PgExecutor<'e>,
    kingdom_id: i64,
    now: DateTime<Utc>,
    message: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO kingdom_events (kingdom_id, created_at, message) VALUES ($1, $2, $3)")
        .bind(kingdom_id)
        .bind(now)
        .bind(message)
        .execute(ex)
        .await?;
    Ok(())
}

/// Latest feed entries for a kingdom, newest first.
pub async fn recent_events(
    pool: &PgPool,
    kingdom_id: i64,
    limit: i64,
) -> Result<Vec<KingdomEvent>, sqlx::Error> {
    sqlx::query_as::<_, KingdomEvent>(
        "SELECT * FROM kingdom_events WHERE kingdom_id = $1 ORDER BY id DESC LIMIT $2",
    )
    .bind(kingdom_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
