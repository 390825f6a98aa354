use chrono::{DateTime, Utc};
use serde::Serialize;

use super::BattleEngine;
use crate::db;
use crate::db::battles::NewBattle;
use crate::db::kingdoms::{Kingdom, KingdomEvent};
use crate::db::players::PlayerStats;
use crate::db::rolls::RollRecord;
use crate::error::{BattleError, EligibilityReason};
use crate::model::timefmt::format_utc;
use crate::model::{Battle, BattleKind, BattlePhase, Side, cooldown};

impl BattleEngine {
    /// Start a coup against a kingdom's sitting ruler. The initiator is
    /// pledged as the first attacker, the pledge clock starts now, and the
    /// initiator's per-kind cooldown is stamped. Returns the battle id.
    pub async fn initiate_coup(
        &self,
        initiator_id: i64,
        kingdom_id: i64,
    ) -> Result<i64, BattleError> {
        let now = Utc::now();
        let initiator = self.require_player(initiator_id).await?;
        let target = self.require_kingdom(kingdom_id).await?;
        self.check_initiate(BattleKind::Coup, &initiator, &target, None, now)
            .await?;
        self.create_battle(BattleKind::Coup, &initiator, &target, None, now)
            .await
    }

    /// Declare an invasion of `target_kingdom_id` from the kingdom the
    /// initiator rules. Same lifecycle as a coup, longer pledge window.
    pub async fn declare_invasion(
        &self,
        initiator_id: i64,
        attacking_from_kingdom_id: i64,
        target_kingdom_id: i64,
    ) -> Result<i64, BattleError> {
        let now = Utc::now();
        let initiator = self.require_player(initiator_id).await?;
        let attacking = self.require_kingdom(attacking_from_kingdom_id).await?;
        let target = self.require_kingdom(target_kingdom_id).await?;
        self.check_initiate(BattleKind::Invasion, &initiator, &target, Some(&attacking), now)
            .await?;
        self.create_battle(BattleKind::Invasion, &initiator, &target, Some(&attacking), now)
            .await
    }

    async fn create_battle(
        &self,
        kind: BattleKind,
        initiator: &PlayerStats,
        target: &Kingdom,
        attacking_from: Option<&Kingdom>,
        now: DateTime<Utc>,
    ) -> Result<i64, BattleError> {
        let new = NewBattle {
            kind,
            kingdom_id: target.id,
            attacking_from_kingdom_id: attacking_from.map(|k| k.id),
            initiator_id: initiator.id,
            initiator_name: &initiator.name,
            start_time: now,
            pledge_end_time: now + self.config.pledge_duration(kind),
        };
        let Some(battle_id) = db::battles::insert_guarded(&self.pool, &new).await? else {
            // A conflicting battle won the race after our gatekeeper read.
            return Err(BattleError::Ineligible(EligibilityReason::KingdomBusy {
                kingdom_id: target.id,
            }));
        };

        db::territories::materialize(
            &self.pool,
            battle_id,
            self.config.territories_for(kind),
            self.config.starting_bar,
        )
        .await?;
        db::locks::record(
            &self.pool,
            initiator.id,
            &cooldown::initiate_key(kind),
            chrono::Duration::days(self.config.initiate_cooldown_days),
            now,
        )
        .await?;

        let message = match attacking_from {
            None => format!(
                "{} has risen against the crown of {}",
                initiator.name, target.name
            ),
            Some(attacking) => format!(
                "{} of {} has declared an invasion of {}",
                initiator.name, attacking.name, target.name
            ),
        };
        db::kingdoms::append_event(&self.pool, target.id, now, &message).await?;

        tracing::info!(
            battle_id,
            kind = kind.as_str(),
            kingdom_id = target.id,
            initiator_id = initiator.id,
            "battle initiated"
        );
        Ok(battle_id)
    }

    /// Pledge a player onto one side of a battle still in its pledge
    /// window. The roster write re-checks phase and membership, so two
    /// racing joins cannot double-add or straddle sides.
    pub async fn join_battle(
        &self,
        battle_id: i64,
        player_id: i64,
        side: Side,
    ) -> Result<(), BattleError> {
        let now = Utc::now();
        let battle = self.require_battle(battle_id).await?;
        let phase = battle.phase_at(now);
        if phase != BattlePhase::Pledge {
            return Err(BattleError::WrongPhase {
                expected: BattlePhase::Pledge,
                actual: phase,
            });
        }
        self.require_player(player_id).await?;
        self.check_join(&battle, player_id).await?;

        if db::battles::append_member(&self.pool, battle_id, side, player_id, now).await? {
            tracing::debug!(battle_id, player_id, side = side.as_str(), "player pledged");
            return Ok(());
        }

        // The guarded write lost a race; refetch to report the precise
        // refusal.
        let battle = self.require_battle(battle_id).await?;
        if battle.side_of(player_id).is_some() {
            Err(BattleError::AlreadyPledged {
                battle_id,
                player_id,
            })
        } else {
            Err(BattleError::WrongPhase {
                expected: BattlePhase::Pledge,
                actual: battle.phase_at(Utc::now()),
            })
        }
    }

    /// Create the battle's territory rows if anything skipped creation at
    /// initiation. Idempotent; called on every battle-phase touch.
    pub async fn materialize_territories(&self, battle_id: i64) -> Result<(), BattleError> {
        let battle = self.require_battle(battle_id).await?;
        self.materialize_for(&battle).await
    }

    pub(crate) async fn materialize_for(&self, battle: &Battle) -> Result<(), BattleError> {
        db::territories::materialize(
            &self.pool,
            battle.id,
            self.config.territories_for(battle.kind),
            self.config.starting_bar,
        )
        .await?;
        Ok(())
    }

    /// Everything a player's client needs to render one battle, with the
    /// viewer's own cooldown and injury state folded in. Timestamps are
    /// preformatted; phase is computed at call time.
    pub async fn battle_view(
        &self,
        battle_id: i64,
        viewer_id: i64,
    ) -> Result<BattleView, BattleError> {
        let now = Utc::now();
        let battle = self.require_battle(battle_id).await?;
        let phase = battle.phase_at(now);
        if phase >= BattlePhase::Battle {
            self.materialize_for(&battle).await?;
        }

        let kingdom = self.require_kingdom(battle.kingdom_id).await?;
        let attacking_from_kingdom_name = match battle.attacking_from_kingdom_id {
            Some(id) => Some(self.require_kingdom(id).await?.name),
            None => None,
        };
        let territories = db::territories::fetch_all(&self.pool, battle_id).await?;

        let swing_ready_in_secs = db::locks::remaining_secs(
            &self.pool,
            viewer_id,
            &cooldown::battle_action_key(battle_id),
            now,
        )
        .await?
        .unwrap_or(0);
        let injured_for_secs = db::injuries::remaining_secs(&self.pool, battle_id, viewer_id, now)
            .await?
            .unwrap_or(0);

        Ok(BattleView {
            battle_id,
            kind: battle.kind.as_str().to_string(),
            phase: phase.as_str().to_string(),
            kingdom_id: battle.kingdom_id,
            kingdom_name: kingdom.name,
            attacking_from_kingdom_id: battle.attacking_from_kingdom_id,
            attacking_from_kingdom_name,
            initiator_name: battle.initiator_name.clone(),
            started_at: format_utc(battle.start_time),
            pledge_ends_at: format_utc(battle.pledge_end_time),
            resolved_at: battle.resolved_at.map(format_utc),
            winner_side: battle.winner_side.map(|s| s.as_str().to_string()),
            attackers: battle.attacker_ids.clone(),
            defenders: battle.defender_ids.clone(),
            territories: territories
                .into_iter()
                .map(|t| TerritoryView {
                    name: t.name,
                    control_bar: t.control_bar,
                    captured_by: t.captured_by.map(|s| s.as_str().to_string()),
                    captured_at: t.captured_at.map(format_utc),
                })
                .collect(),
            viewer: ViewerStatus {
                side: battle.side_of(viewer_id).map(|s| s.as_str().to_string()),
                swing_ready_in_secs,
                injured_for_secs,
            },
        })
    }

    /// Latest audit-log entries for a battle, newest first.
    pub async fn recent_rolls(
        &self,
        battle_id: i64,
        limit: i64,
    ) -> Result<Vec<RollRecord>, BattleError> {
        self.require_battle(battle_id).await?;
        Ok(db::rolls::recent(&self.pool, battle_id, limit).await?)
    }

    /// Latest feed entries for a kingdom, newest first.
    pub async fn kingdom_feed(
        &self,
        kingdom_id: i64,
        limit: i64,
    ) -> Result<Vec<KingdomEvent>, BattleError> {
        self.require_kingdom(kingdom_id).await?;
        Ok(db::kingdoms::recent_events(&self.pool, kingdom_id, limit).await?)
    }
}

/// Player-facing snapshot of one battle.
#[derive(Debug, Clone, Serialize)]
pub struct BattleView {
    pub battle_id: i64,
    pub kind: String,
    pub phase: String,
    pub kingdom_id: i64,
    pub kingdom_name: String,
    pub attacking_from_kingdom_id: Option<i64>,
    pub attacking_from_kingdom_name: Option<String>,
    pub initiator_name: String,
    pub started_at: String,
    pub pledge_ends_at: String,
    pub resolved_at: Option<String>,
    pub winner_side: Option<String>,
    pub attackers: Vec<i64>,
    pub defenders: Vec<i64>,
    pub territories: Vec<TerritoryView>,
    pub viewer: ViewerStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct TerritoryView {
    pub name: String,
    pub control_bar: f64,
    pub captured_by: Option<String>,
    pub captured_at: Option<String>,
}

/// The viewer's own standing in the battle: which side they pledged to and
/// the seconds left on their action cooldown and injury (0 = free to act).
#[derive(Debug, Clone, Serialize)]
pub struct ViewerStatus {
    pub side: Option<String>,
    pub swing_ready_in_secs: i64,
    pub injured_for_secs: i64,
}
