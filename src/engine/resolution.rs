use chrono::{DateTime, Utc};

use super::BattleEngine;
use crate::db;
use crate::error::BattleError;
use crate::model::{Battle, BattleKind, Side};

impl BattleEngine {
    /// Claim the resolution and settle. Exactly one concurrent caller wins
    /// the claim and runs settlement; every other caller gets `Ok(false)`
    /// and should treat the battle as resolved by someone else.
    ///
    /// The claim commits on its own. If settlement then fails, the battle
    /// stays resolved, nothing retries it, and the fault is surfaced for
    /// manual reconciliation.
    pub(crate) async fn try_resolve(
        &self,
        battle: &Battle,
        winner: Side,
        now: DateTime<Utc>,
    ) -> Result<bool, BattleError> {
        if !db::battles::claim_resolution(&self.pool, battle.id, winner, now).await? {
            return Ok(false);
        }
        tracing::info!(
            battle_id = battle.id,
            kind = battle.kind.as_str(),
            winner = winner.as_str(),
            "battle resolved"
        );

        if let Err(e) = self.settle(battle, winner, now).await {
            tracing::error!(
                battle_id = battle.id,
                error = %e,
                "settlement failed after the resolution claim; manual reconciliation required"
            );
            return Err(BattleError::ConsistencyFault {
                battle_id: battle.id,
                detail: e.to_string(),
            });
        }
        Ok(true)
    }

    /// Apply every consequence of the outcome in one transaction: gold
    /// redistribution, reputation shifts, invasion stat losses and
    /// treasury transfer, succession, and the feed entry.
    async fn settle(
        &self,
        battle: &Battle,
        winner: Side,
        now: DateTime<Utc>,
    ) -> Result<(), BattleError> {
        let winners = battle.members(winner);
        let losers = battle.members(winner.opposite());
        let target = self.require_kingdom(battle.kingdom_id).await?;
        let attacking = match battle.attacking_from_kingdom_id {
            Some(id) => Some(self.require_kingdom(id).await?),
            None => None,
        };

        let mut tx = self.pool.begin().await?;

        // Gold: each loser forfeits a fraction, winners split the pool
        // evenly, and the integer-division dust goes to the losing side's
        // own kingdom so no coin is created or destroyed.
        let divisor = match (battle.kind, winner) {
            (BattleKind::Invasion, Side::Defenders) => self.config.invader_gold_divisor,
            _ => self.config.loser_gold_divisor,
        };
        let pool_gold = db::players::forfeit_gold(&mut tx, losers, divisor).await?;
        let share = if winners.is_empty() {
            0
        } else {
            pool_gold / winners.len() as i64
        };
        if share > 0 {
            db::players::grant_gold(&mut tx, winners, share).await?;
        }
        let dust = pool_gold - share * winners.len() as i64;
        let losing_kingdom_id = match (battle.kind, winner) {
            (BattleKind::Invasion, Side::Defenders) => battle
                .attacking_from_kingdom_id
                .unwrap_or(battle.kingdom_id),
            _ => battle.kingdom_id,
        };
        if dust > 0 {
            db::kingdoms::credit_treasury(&mut tx, losing_kingdom_id, dust).await?;
        }

        // Standing with the contested kingdom moves both ways.
        if !winners.is_empty() {
            db::players::add_reputation(
                &mut tx,
                winners,
                battle.kingdom_id,
                self.config.reputation_reward,
            )
            .await?;
        }
        if !losers.is_empty() {
            db::players::add_reputation(
                &mut tx,
                losers,
                battle.kingdom_id,
                -self.config.reputation_penalty,
            )
            .await?;
        }

        // Invasions are bloodier: the losing side also bleeds stats. A
        // conquest folds the kingdom into the victor's empire; a repelled
        // invasion costs the attacking kingdom a share of its own treasury,
        // paid to the kingdom it marched on.
        if battle.kind == BattleKind::Invasion {
            db::players::deduct_stats(&mut tx, losers, self.config.stat_penalty).await?;
            if let Some(attacking) = &attacking {
                match winner {
                    Side::Attackers => {
                        db::kingdoms::adopt_empire(&mut tx, battle.kingdom_id, attacking.id)
                            .await?;
                    }
                    Side::Defenders => {
                        let moved = db::kingdoms::forfeit_treasury(
                            &mut tx,
                            attacking.id,
                            self.config.treasury_divisor,
                        )
                        .await?;
                        if moved > 0 {
                            db::kingdoms::credit_treasury(&mut tx, battle.kingdom_id, moved)
                                .await?;
                        }
                    }
                }
            }
        }

        // Succession: a winning attack seats the initiator on the throne.
        if winner == Side::Attackers {
            db::kingdoms::close_reign(&mut tx, battle.kingdom_id, now).await?;
            db::kingdoms::crown_ruler(&mut tx, battle.kingdom_id, battle.initiator_id, now)
                .await?;
            db::kingdoms::open_reign(&mut tx, battle.kingdom_id, battle.initiator_id, now)
                .await?;
        }

        let message = settlement_message(battle, winner, &target.name, attacking.as_ref());
        db::kingdoms::append_event(&mut *tx, battle.kingdom_id, now, &message).await?;

        tx.commit().await?;
        tracing::debug!(
            battle_id = battle.id,
            pool_gold,
            dust,
            winner = winner.as_str(),
            "settlement applied"
        );
        Ok(())
    }
}

fn settlement_message(
    battle: &Battle,
    winner: Side,
    target_name: &str,
    attacking: Option<&db::kingdoms::Kingdom>,
) -> String {
    let attacking_name = attacking.map(|k| k.name.as_str()).unwrap_or("an unknown land");
    match (battle.kind, winner) {
        (BattleKind::Coup, Side::Attackers) => format!(
            "{} seized the crown of {} in a coup",
            battle.initiator_name, target_name
        ),
        (BattleKind::Coup, Side::Defenders) => format!(
            "The coup led by {} against {} has been crushed",
            battle.initiator_name, target_name
        ),
        (BattleKind::Invasion, Side::Attackers) => format!(
            "{} of {} has conquered {}",
            battle.initiator_name, attacking_name, target_name
        ),
        (BattleKind::Invasion, Side::Defenders) => format!(
            "{} repelled the invasion from {}",
            target_name, attacking_name
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn make_battle(kind: BattleKind) -> Battle {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        Battle {
            id: 5,
            kind,
            kingdom_id: 10,
            attacking_from_kingdom_id: (kind == BattleKind::Invasion).then_some(20),
            initiator_id: 100,
            initiator_name: "Aldric".to_string(),
            start_time: start,
            pledge_end_time: start + chrono::Duration::hours(24),
            attacker_ids: vec![100],
            defender_ids: vec![200],
            resolved_at: None,
            attacker_victory: None,
            winner_side: None,
        }
    }

    #[test]
    fn messages_name_the_right_parties() {
        let coup = make_battle(BattleKind::Coup);
        assert_eq!(
            settlement_message(&coup, Side::Attackers, "Varnholm", None),
            "Aldric seized the crown of Varnholm in a coup"
        );
        assert_eq!(
            settlement_message(&coup, Side::Defenders, "Varnholm", None),
            "The coup led by Aldric against Varnholm has been crushed"
        );

        let invasion = make_battle(BattleKind::Invasion);
        let attacking = db::kingdoms::Kingdom {
            id: 20,
            name: "Eastmarch".to_string(),
            ruler_id: Some(100),
            ruler_since: None,
            treasury: 0,
            wall_level: 0,
            empire_id: None,
        };
        assert_eq!(
            settlement_message(&invasion, Side::Attackers, "Varnholm", Some(&attacking)),
            "Aldric of Eastmarch has conquered Varnholm"
        );
        assert_eq!(
            settlement_message(&invasion, Side::Defenders, "Varnholm", Some(&attacking)),
            "Varnholm repelled the invasion from Eastmarch"
        );
    }
}
