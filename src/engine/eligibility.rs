use chrono::{DateTime, Utc};

use super::BattleEngine;
use crate::config::BattleConfig;
use crate::db;
use crate::db::kingdoms::Kingdom;
use crate::db::players::PlayerStats;
use crate::error::{BattleError, EligibilityReason};
use crate::model::{Battle, BattleKind, cooldown};

impl BattleEngine {
    /// Gatekeeper for starting a battle. Checks run cheapest-first: kingdom
    /// conflicts, the rematch buffer, the initiator's own conflicts and
    /// cooldown, then the per-kind thresholds. These reads are advisory;
    /// the guarded insert re-checks the kingdom conflicts at write time.
    pub(crate) async fn check_initiate(
        &self,
        kind: BattleKind,
        initiator: &PlayerStats,
        target: &Kingdom,
        attacking_from: Option<&Kingdom>,
        now: DateTime<Utc>,
    ) -> Result<(), BattleError> {
        if db::battles::kingdom_engaged(&self.pool, target.id).await? {
            return Err(refuse(EligibilityReason::KingdomBusy {
                kingdom_id: target.id,
            }));
        }
        if let Some(attacking) = attacking_from {
            if db::battles::kingdom_attacking(&self.pool, attacking.id).await? {
                return Err(refuse(EligibilityReason::KingdomBusy {
                    kingdom_id: attacking.id,
                }));
            }
        }

        let buffer_start = now - chrono::Duration::days(self.config.rematch_buffer_days);
        if db::battles::kingdom_fought_recently(&self.pool, target.id, kind, buffer_start).await? {
            return Err(refuse(EligibilityReason::RecentBattle {
                kingdom_id: target.id,
            }));
        }

        if let Some(battle_id) = db::battles::player_active_battle(&self.pool, initiator.id).await?
        {
            return Err(refuse(EligibilityReason::AlreadyInBattle { battle_id }));
        }
        if let Some(remaining_secs) = db::locks::remaining_secs(
            &self.pool,
            initiator.id,
            &cooldown::initiate_key(kind),
            now,
        )
        .await?
        {
            return Err(refuse(EligibilityReason::InitiatorCooldown { remaining_secs }));
        }

        match kind {
            BattleKind::Coup => {
                let reputation =
                    db::players::reputation(&self.pool, initiator.id, target.id).await?;
                coup_requirements(initiator, reputation, target, &self.config).map_err(refuse)
            }
            BattleKind::Invasion => {
                let attacking = attacking_from.ok_or(BattleError::Ineligible(
                    EligibilityReason::NotRuler {
                        kingdom_id: target.id,
                    },
                ))?;
                invasion_requirements(initiator.id, attacking, target, now, &self.config)
                    .map_err(refuse)
            }
        }
    }

    /// Gatekeeper for pledging into an existing battle: not already on a
    /// roster here or anywhere else, and enough standing with the contested
    /// kingdom. Phase is checked by the caller and again by the write.
    pub(crate) async fn check_join(
        &self,
        battle: &Battle,
        player_id: i64,
    ) -> Result<(), BattleError> {
        if battle.side_of(player_id).is_some() {
            return Err(BattleError::AlreadyPledged {
                battle_id: battle.id,
                player_id,
            });
        }
        if let Some(battle_id) = db::battles::player_active_battle(&self.pool, player_id).await? {
            return Err(refuse(EligibilityReason::AlreadyInBattle { battle_id }));
        }
        let reputation = db::players::reputation(&self.pool, player_id, battle.kingdom_id).await?;
        if reputation < self.config.join_min_reputation {
            return Err(refuse(EligibilityReason::ReputationTooLow {
                required: self.config.join_min_reputation,
                actual: reputation,
            }));
        }
        Ok(())
    }
}

fn refuse(reason: EligibilityReason) -> BattleError {
    BattleError::Ineligible(reason)
}

/// Coup thresholds: leadership, standing with the kingdom, and not already
/// wearing the crown.
fn coup_requirements(
    initiator: &PlayerStats,
    reputation: f64,
    target: &Kingdom,
    config: &BattleConfig,
) -> Result<(), EligibilityReason> {
    if target.ruler_id == Some(initiator.id) {
        return Err(EligibilityReason::AlreadyRuler);
    }
    if initiator.leadership < config.coup_min_leadership {
        return Err(EligibilityReason::LeadershipTooLow {
            required: config.coup_min_leadership,
            actual: initiator.leadership,
        });
    }
    if reputation < config.coup_min_reputation {
        return Err(EligibilityReason::ReputationTooLow {
            required: config.coup_min_reputation,
            actual: reputation,
        });
    }
    Ok(())
}

/// Invasion thresholds: the initiator must hold the attacking crown, the
/// target must be a different kingdom, and a freshly seated target ruler is
/// protected for a grace period.
fn invasion_requirements(
    initiator_id: i64,
    attacking: &Kingdom,
    target: &Kingdom,
    now: DateTime<Utc>,
    config: &BattleConfig,
) -> Result<(), EligibilityReason> {
    if attacking.id == target.id {
        return Err(EligibilityReason::SelfInvasion);
    }
    if attacking.ruler_id != Some(initiator_id) {
        return Err(EligibilityReason::NotRuler {
            kingdom_id: attacking.id,
        });
    }
    if let (Some(_), Some(since)) = (target.ruler_id, target.ruler_since) {
        let protected_until =
            since + chrono::Duration::days(config.ruler_tenure_protection_days);
        if now < protected_until {
            return Err(EligibilityReason::RulerTenureProtected {
                remaining_secs: (protected_until - now).num_seconds().max(0),
            });
        }
    }
    Ok(())
}
