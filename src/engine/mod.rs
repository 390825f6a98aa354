//! Battle orchestration: eligibility gatekeeping, lifecycle, the combat
//! loop, and resolution. Methods are grouped one concern per file; all of
//! them hang off [`BattleEngine`].

pub mod combat;
pub mod eligibility;
pub mod lifecycle;
pub mod resolution;

pub use combat::RollReport;
pub use lifecycle::{BattleView, TerritoryView, ViewerStatus};

use sqlx::PgPool;

use crate::config::BattleConfig;
use crate::db;
use crate::error::BattleError;
use crate::model::Battle;

/// Entry point for every battle operation. Holds the connection pool and the
/// gameplay tuning; randomness always comes in through method arguments so
/// callers decide determinism.
pub struct BattleEngine {
    pool: PgPool,
    config: BattleConfig,
}

impl BattleEngine {
    pub fn new(pool: PgPool, config: BattleConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) async fn require_battle(&self, battle_id: i64) -> Result<Battle, BattleError> {
        db::battles::fetch(&self.pool, battle_id)
            .await?
            .ok_or(BattleError::UnknownBattle(battle_id))
    }

    pub(crate) async fn require_player(
        &self,
        player_id: i64,
    ) -> Result<db::players::PlayerStats, BattleError> {
        db::players::fetch(&self.pool, player_id)
            .await?
            .ok_or(BattleError::UnknownPlayer(player_id))
    }

    pub(crate) async fn require_kingdom(
        &self,
        kingdom_id: i64,
    ) -> Result<db::kingdoms::Kingdom, BattleError> {
        db::kingdoms::fetch(&self.pool, kingdom_id)
            .await?
            .ok_or(BattleError::UnknownKingdom(kingdom_id))
    }
}
