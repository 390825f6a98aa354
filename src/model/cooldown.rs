use chrono::{DateTime, Utc};

use super::battle::BattleKind;

/// One expiring action lock. Keyed by subject and a namespaced action key,
/// so the same table serves per-battle swing cooldowns and per-kind
/// initiation cooldowns without colliding.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CooldownEntry {
    pub subject_id: i64,
    pub action_key: String,
    pub last_performed: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CooldownEntry {
    pub fn is_held(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Key for a player's action cooldown within one battle.
pub fn battle_action_key(battle_id: i64) -> String {
    format!("battle_{battle_id}")
}

/// Key for a player's cooldown on initiating battles of one kind.
pub fn initiate_key(kind: BattleKind) -> String {
    format!("initiate_{}", kind.as_str())
}
