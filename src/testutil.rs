//! Seeding and time-bending helpers for integration tests. Phase is always
//! derived from stored timestamps, so tests move a battle forward by
//! rewriting those timestamps instead of waiting out real clocks.
//!
//! Everything here panics on database errors; it only runs under test
//! harnesses that already own a live Postgres.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::engine::BattleEngine;
use crate::model::Side;

// ---------------------------------------------------------------------------
// Row seeding
// ---------------------------------------------------------------------------

/// Insert a player and return the id.
pub async fn seed_player(
    pool: &PgPool,
    name: &str,
    gold: i64,
    attack: f64,
    defense: f64,
    leadership: f64,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO players (name, gold, attack, defense, leadership) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(name)
    .bind(gold)
    .bind(attack)
    .bind(defense)
    .bind(leadership)
    .fetch_one(pool)
    .await
    .expect("seed player")
}

/// Insert a kingdom and return the id.
pub async fn seed_kingdom(
    pool: &PgPool,
    name: &str,
    ruler_id: Option<i64>,
    treasury: i64,
    wall_level: i32,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO kingdoms (name, ruler_id, ruler_since, treasury, wall_level) \
         VALUES ($1, $2, CASE WHEN $2::BIGINT IS NULL THEN NULL ELSE NOW() - INTERVAL '1 year' END, $3, $4) \
         RETURNING id",
    )
    .bind(name)
    .bind(ruler_id)
    .bind(treasury)
    .bind(wall_level)
    .fetch_one(pool)
    .await
    .expect("seed kingdom")
}

pub async fn set_reputation(pool: &PgPool, player_id: i64, kingdom_id: i64, score: f64) {
    sqlx::query(
        "INSERT INTO kingdom_reputation (player_id, kingdom_id, score) VALUES ($1, $2, $3) \
         ON CONFLICT (player_id, kingdom_id) DO UPDATE SET score = EXCLUDED.score",
    )
    .bind(player_id)
    .bind(kingdom_id)
    .bind(score)
    .execute(pool)
    .await
    .expect("set reputation");
}

pub async fn set_ruler_since(pool: &PgPool, kingdom_id: i64, since: DateTime<Utc>) {
    sqlx::query("UPDATE kingdoms SET ruler_since = $2 WHERE id = $1")
        .bind(kingdom_id)
        .bind(since)
        .execute(pool)
        .await
        .expect("set ruler_since");
}

// ---------------------------------------------------------------------------
// Time bending
// ---------------------------------------------------------------------------

/// Shove the pledge deadline into the past so the battle phase begins.
pub async fn end_pledge_phase(pool: &PgPool, battle_id: i64) {
    sqlx::query(
        "UPDATE battles SET pledge_end_time = NOW() - INTERVAL '1 hour' WHERE id = $1",
    )
    .bind(battle_id)
    .execute(pool)
    .await
    .expect("end pledge phase");
}

/// Backdate a resolved battle so the rematch buffer no longer applies.
pub async fn age_resolution(pool: &PgPool, battle_id: i64, days: i64) {
    sqlx::query(
        "UPDATE battles SET resolved_at = NOW() - ($2 * INTERVAL '1 day') WHERE id = $1",
    )
    .bind(battle_id)
    .bind(days)
    .execute(pool)
    .await
    .expect("age resolution");
}

/// Set a territory's control bar directly, bypassing the push path.
pub async fn set_bar(pool: &PgPool, battle_id: i64, territory: &str, value: f64) {
    sqlx::query("UPDATE territories SET control_bar = $3 WHERE battle_id = $1 AND name = $2")
        .bind(battle_id)
        .bind(territory)
        .bind(value)
        .execute(pool)
        .await
        .expect("set bar");
}

/// Drop every lock a subject holds so the next action is not throttled.
pub async fn clear_cooldowns(pool: &PgPool, subject_id: i64) {
    sqlx::query("DELETE FROM action_locks WHERE subject_id = $1")
        .bind(subject_id)
        .execute(pool)
        .await
        .expect("clear cooldowns");
}

/// Expire a player's open injury so they can act again.
pub async fn heal_injury(pool: &PgPool, battle_id: i64, player_id: i64) {
    sqlx::query(
        "UPDATE battle_injuries SET expires_at = NOW() - INTERVAL '1 second' \
         WHERE battle_id = $1 AND player_id = $2 AND cleared_at IS NULL",
    )
    .bind(battle_id)
    .bind(player_id)
    .execute(pool)
    .await
    .expect("heal injury");
}

// ---------------------------------------------------------------------------
// Scenario fixtures
// ---------------------------------------------------------------------------

/// A coup already through its pledge window: the initiator plus extra
/// attackers on one side, the ruler's loyalists on the other.
pub struct CoupFixture {
    pub battle_id: i64,
    pub kingdom_id: i64,
    pub ruler_id: i64,
    pub initiator_id: i64,
    pub attackers: Vec<i64>,
    pub defenders: Vec<i64>,
}

/// Build a kingdom, pledge both sides into a coup, and close the pledge
/// window. Every participant starts with 100 gold and even mid-tier stats.
pub async fn ready_coup(
    engine: &BattleEngine,
    extra_attackers: usize,
    defenders: usize,
) -> CoupFixture {
    let pool = engine.pool();
    let ruler_id = seed_player(pool, "ruler", 100, 5.0, 5.0, 5.0).await;
    let kingdom_id = seed_kingdom(pool, "Varnholm", Some(ruler_id), 1000, 0).await;

    let initiator_id = seed_player(pool, "initiator", 100, 5.0, 5.0, 20.0).await;
    set_reputation(pool, initiator_id, kingdom_id, 80.0).await;
    let battle_id = engine
        .initiate_coup(initiator_id, kingdom_id)
        .await
        .expect("initiate coup");

    let mut attackers = vec![initiator_id];
    for i in 0..extra_attackers {
        let id = seed_player(pool, &format!("attacker_{i}"), 100, 5.0, 5.0, 5.0).await;
        set_reputation(pool, id, kingdom_id, 50.0).await;
        engine
            .join_battle(battle_id, id, Side::Attackers)
            .await
            .expect("join attackers");
        attackers.push(id);
    }

    let mut defender_ids = Vec::new();
    for i in 0..defenders {
        let id = seed_player(pool, &format!("defender_{i}"), 100, 5.0, 5.0, 5.0).await;
        set_reputation(pool, id, kingdom_id, 50.0).await;
        engine
            .join_battle(battle_id, id, Side::Defenders)
            .await
            .expect("join defenders");
        defender_ids.push(id);
    }

    end_pledge_phase(pool, battle_id).await;
    CoupFixture {
        battle_id,
        kingdom_id,
        ruler_id,
        initiator_id,
        attackers,
        defenders: defender_ids,
    }
}

/// An invasion already through its pledge window. The attacking ruler
/// initiates; extra attackers and defenders pledge in.
pub struct InvasionFixture {
    pub battle_id: i64,
    pub target_kingdom_id: i64,
    pub attacking_kingdom_id: i64,
    pub target_ruler_id: i64,
    pub attacking_ruler_id: i64,
    pub attackers: Vec<i64>,
    pub defenders: Vec<i64>,
}

pub async fn ready_invasion(
    engine: &BattleEngine,
    extra_attackers: usize,
    defenders: usize,
) -> InvasionFixture {
    let pool = engine.pool();
    let target_ruler_id = seed_player(pool, "target_ruler", 100, 5.0, 5.0, 5.0).await;
    let target_kingdom_id = seed_kingdom(pool, "Varnholm", Some(target_ruler_id), 500, 0).await;
    let attacking_ruler_id = seed_player(pool, "attacking_ruler", 100, 5.0, 5.0, 20.0).await;
    let attacking_kingdom_id =
        seed_kingdom(pool, "Eastmarch", Some(attacking_ruler_id), 1000, 0).await;

    let battle_id = engine
        .declare_invasion(attacking_ruler_id, attacking_kingdom_id, target_kingdom_id)
        .await
        .expect("declare invasion");

    let mut attackers = vec![attacking_ruler_id];
    for i in 0..extra_attackers {
        let id = seed_player(pool, &format!("invader_{i}"), 100, 5.0, 5.0, 5.0).await;
        set_reputation(pool, id, target_kingdom_id, 50.0).await;
        engine
            .join_battle(battle_id, id, Side::Attackers)
            .await
            .expect("join attackers");
        attackers.push(id);
    }

    let mut defender_ids = Vec::new();
    for i in 0..defenders {
        let id = seed_player(pool, &format!("garrison_{i}"), 100, 5.0, 5.0, 5.0).await;
        set_reputation(pool, id, target_kingdom_id, 50.0).await;
        engine
            .join_battle(battle_id, id, Side::Defenders)
            .await
            .expect("join defenders");
        defender_ids.push(id);
    }

    end_pledge_phase(pool, battle_id).await;
    InvasionFixture {
        battle_id,
        target_kingdom_id,
        attacking_kingdom_id,
        target_ruler_id,
        attacking_ruler_id,
        attackers,
        defenders: defender_ids,
    }
}
