use thiserror::Error;

use crate::model::BattlePhase;

/// Why an initiate/join request was refused. Every reason is recoverable by
/// waiting or by meeting the stated requirement; none of them indicate a bug.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EligibilityReason {
    #[error("kingdom {kingdom_id} already has an unresolved battle")]
    KingdomBusy { kingdom_id: i64 },
    #[error("kingdom {kingdom_id} fought a battle of this kind too recently")]
    RecentBattle { kingdom_id: i64 },
    #[error("initiator may start another battle of this kind in {remaining_secs}s")]
    InitiatorCooldown { remaining_secs: i64 },
    #[error("leadership {actual} is below the required {required}")]
    LeadershipTooLow { required: f64, actual: f64 },
    #[error("reputation {actual} in the target kingdom is below the required {required}")]
    ReputationTooLow { required: f64, actual: f64 },
    #[error("the current ruler cannot lead a coup against their own crown")]
    AlreadyRuler,
    #[error("only the ruler of kingdom {kingdom_id} may declare an invasion from it")]
    NotRuler { kingdom_id: i64 },
    #[error("the target ruler has reigned too briefly; protected for {remaining_secs}s")]
    RulerTenureProtected { remaining_secs: i64 },
    #[error("a kingdom cannot invade itself")]
    SelfInvasion,
    #[error("player is already committed to battle {battle_id}")]
    AlreadyInBattle { battle_id: i64 },
    #[error("player is not a participant in this battle")]
    NotParticipant,
}

/// Unified error type for every battle operation.
///
/// Business-rule violations carry their specific reason; concurrency races
/// are resolved internally and never surface here (a losing resolution racer
/// observes the final state as success). `ConsistencyFault` is the one fatal
/// variant: the battle is already marked resolved and the failed settlement
/// must not be retried automatically.
#[derive(Debug, Error)]
pub enum BattleError {
    #[error("ineligible: {0}")]
    Ineligible(EligibilityReason),

    #[error("battle {0} does not exist")]
    UnknownBattle(i64),

    #[error("kingdom {0} does not exist")]
    UnknownKingdom(i64),

    #[error("player {0} does not exist")]
    UnknownPlayer(i64),

    #[error("battle {battle_id} has no territory named {name:?}")]
    UnknownTerritory { battle_id: i64, name: String },

    #[error("action requires the {expected} phase but the battle is in {actual}")]
    WrongPhase {
        expected: BattlePhase,
        actual: BattlePhase,
    },

    #[error("player {player_id} has already pledged to battle {battle_id}")]
    AlreadyPledged { battle_id: i64, player_id: i64 },

    #[error("action available again in {remaining_secs}s")]
    Cooldown { remaining_secs: i64 },

    #[error("injured; able to act again in {remaining_secs}s")]
    Injured { remaining_secs: i64 },

    #[error("settlement failed after battle {battle_id} was already resolved: {detail}")]
    ConsistencyFault { battle_id: i64, detail: String },

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl BattleError {
    /// True for the fatal variant that requires manual reconciliation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BattleError::ConsistencyFault { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligibility_reason_messages_name_the_limit() {
        let reason = EligibilityReason::LeadershipTooLow {
            required: 10.0,
            actual: 3.5,
        };
        assert_eq!(reason.to_string(), "leadership 3.5 is below the required 10");
    }

    #[test]
    fn wrong_phase_message_names_both_phases() {
        let err = BattleError::WrongPhase {
            expected: BattlePhase::Battle,
            actual: BattlePhase::Pledge,
        };
        assert_eq!(
            err.to_string(),
            "action requires the battle phase but the battle is in pledge"
        );
    }

    #[test]
    fn only_consistency_fault_is_fatal() {
        assert!(
            BattleError::ConsistencyFault {
                battle_id: 1,
                detail: "x".to_string()
            }
            .is_fatal()
        );
        assert!(!BattleError::Cooldown { remaining_secs: 5 }.is_fatal());
        assert!(!BattleError::Ineligible(EligibilityReason::AlreadyRuler).is_fatal());
    }
}
