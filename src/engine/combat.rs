use chrono::Utc;
use rand::Rng;

use super::BattleEngine;
use crate::db;
use crate::db::locks::Acquire;
use crate::db::rolls::NewRoll;
use crate::error::{BattleError, EligibilityReason};
use crate::model::roll::{draw_roll, outcome_bands, push_amount};
use crate::model::{BattleKind, BattlePhase, RollOutcome, Side, cooldown, territory};

/// Everything one battle action did, for the caller to display.
#[derive(Debug, Clone)]
pub struct RollReport {
    pub outcome: RollOutcome,
    pub roll: f64,
    pub push: f64,
    pub bar_before: f64,
    pub bar_after: f64,
    /// True only for the call that wrote the capture.
    pub captured: bool,
    pub captured_by: Option<Side>,
    pub injured_player_id: Option<i64>,
    /// True only for the call that claimed the resolution.
    pub battle_resolved: bool,
    pub winner_side: Option<Side>,
}

impl BattleEngine {
    /// One battle action: gate on phase, membership, injury, and cooldown,
    /// roll an outcome, then push the territory bar, all effects of the
    /// push committing atomically. A push that lands the bar on the
    /// actor's boundary captures the territory; a capture that completes
    /// the majority resolves the battle.
    pub async fn perform_roll<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        battle_id: i64,
        player_id: i64,
        territory_name: &str,
    ) -> Result<RollReport, BattleError> {
        let now = Utc::now();
        let battle = self.require_battle(battle_id).await?;
        let phase = battle.phase_at(now);
        if phase != BattlePhase::Battle {
            return Err(BattleError::WrongPhase {
                expected: BattlePhase::Battle,
                actual: phase,
            });
        }
        let Some(side) = battle.side_of(player_id) else {
            return Err(BattleError::Ineligible(EligibilityReason::NotParticipant));
        };
        if !self
            .config
            .territories_for(battle.kind)
            .iter()
            .any(|n| n == territory_name)
        {
            return Err(BattleError::UnknownTerritory {
                battle_id,
                name: territory_name.to_string(),
            });
        }
        self.materialize_for(&battle).await?;

        if let Some(remaining_secs) =
            db::injuries::check_and_clear(&self.pool, battle_id, player_id, now).await?
        {
            return Err(BattleError::Injured { remaining_secs });
        }
        let acquired = db::locks::acquire(
            &self.pool,
            player_id,
            &cooldown::battle_action_key(battle_id),
            chrono::Duration::seconds(self.config.swing_cooldown_secs),
            now,
        )
        .await?;
        if let Acquire::Held { remaining_secs } = acquired {
            return Err(BattleError::Cooldown { remaining_secs });
        }

        // Outcome odds: actor's attack against the opposing side's average
        // defense, plus the wall when storming another kingdom.
        let actor = self.require_player(player_id).await?;
        let opponents = battle.members(side.opposite());
        let mut defense = db::players::avg_defense(&self.pool, opponents).await?;
        if battle.kind == BattleKind::Invasion && side == Side::Attackers {
            let target = self.require_kingdom(battle.kingdom_id).await?;
            defense += f64::from(target.wall_level) * self.config.wall_defense_per_level;
        }
        let bands = outcome_bands(actor.attack, defense);
        let (roll, outcome) = draw_roll(rng, &bands);

        let push = match outcome {
            RollOutcome::Miss => 0.0,
            RollOutcome::Hit | RollOutcome::Injure => {
                let leadership =
                    db::players::avg_leadership(&self.pool, battle.members(side)).await?;
                let base = push_amount(leadership, &self.config);
                if outcome == RollOutcome::Injure {
                    base * self.config.injure_push_bonus
                } else {
                    base
                }
            }
        };

        // Pick the injury target before opening the transaction; an
        // opponent already down is never hit twice.
        let injure_target = if outcome == RollOutcome::Injure {
            let hurt = db::injuries::hurt_players(&self.pool, battle_id, now).await?;
            let standing: Vec<i64> = opponents
                .iter()
                .copied()
                .filter(|id| !hurt.contains(id))
                .collect();
            pick(rng, &standing)
        } else {
            None
        };

        // The push, the injury, and the audit row commit together.
        let mut tx = self.pool.begin().await?;
        let (bar_before, bar_after, prior_captured_by) = match outcome {
            RollOutcome::Miss => {
                let t = db::territories::fetch(&self.pool, battle_id, territory_name)
                    .await?
                    .ok_or_else(|| BattleError::UnknownTerritory {
                        battle_id,
                        name: territory_name.to_string(),
                    })?;
                (t.control_bar, t.control_bar, t.captured_by)
            }
            _ => {
                let moved = db::territories::push_bar(
                    &mut tx,
                    battle_id,
                    territory_name,
                    territory::signed_push(side, push),
                )
                .await?
                .ok_or_else(|| BattleError::UnknownTerritory {
                    battle_id,
                    name: territory_name.to_string(),
                })?;
                (moved.bar_before, moved.bar_after, moved.captured_by)
            }
        };

        let mut captured = false;
        if outcome != RollOutcome::Miss
            && prior_captured_by.is_none()
            && territory::at_capture_bar(side, bar_after)
        {
            captured =
                db::territories::capture(&mut tx, battle_id, territory_name, side, now).await?;
        }
        let captured_by = if captured { Some(side) } else { prior_captured_by };

        let injured_player_id = match injure_target {
            Some(target) => {
                let until = now + chrono::Duration::seconds(self.config.injury_secs);
                db::injuries::inflict(&mut tx, battle_id, target, now, until)
                    .await?
                    .then_some(target)
            }
            None => None,
        };

        db::rolls::insert(
            &mut tx,
            &NewRoll {
                battle_id,
                territory: territory_name,
                player_id,
                side,
                roll,
                outcome,
                push,
                bar_before,
                bar_after,
                injured_player_id,
                created_at: now,
            },
        )
        .await?;
        tx.commit().await?;

        if captured {
            tracing::info!(
                battle_id,
                territory = territory_name,
                side = side.as_str(),
                "territory captured"
            );
        }

        // Win check after every effective push, not only on fresh
        // captures, so a battle whose resolver died mid-flight still
        // resolves on the next action. At most one side can hold a
        // majority.
        let mut battle_resolved = false;
        let mut winner_side = None;
        if outcome != RollOutcome::Miss {
            for candidate in [side, side.opposite()] {
                let held = db::territories::count_captured(&self.pool, battle_id, candidate).await?;
                if held >= self.config.capture_majority(battle.kind) {
                    if self.try_resolve(&battle, candidate, now).await? {
                        battle_resolved = true;
                        winner_side = Some(candidate);
                    }
                    break;
                }
            }
        }

        Ok(RollReport {
            outcome,
            roll,
            push,
            bar_before,
            bar_after,
            captured,
            captured_by,
            injured_player_id,
            battle_resolved,
            winner_side,
        })
    }
}

fn pick<R: Rng + ?Sized>(rng: &mut R, ids: &[i64]) -> Option<i64> {
    if ids.is_empty() {
        None
    } else {
        Some(ids[rng.random_range(0..ids.len())])
    }
}
