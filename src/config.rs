use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::BattleKind;

/// Gameplay tuning for the battle engine.
///
/// All durations are wall-clock; phase transitions are derived from these
/// values and stored timestamps, never from a scheduler. Deserialization
/// fills any field missing from the file with its default, so a config file
/// only needs to name the knobs it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Length of the pledge window for coups, in hours.
    pub coup_pledge_hours: i64,
    /// Length of the pledge window for invasions, in hours.
    pub invasion_pledge_hours: i64,
    /// Days a kingdom is shielded from another battle of the same kind
    /// after one resolves.
    pub rematch_buffer_days: i64,
    /// Days before the same player may initiate another battle of the
    /// same kind.
    pub initiate_cooldown_days: i64,
    /// Seconds between battle actions by the same player.
    pub swing_cooldown_secs: i64,
    /// Seconds an injured player is locked out of battle actions.
    pub injury_secs: i64,
    /// Territories contested in a coup, in display order.
    pub coup_territories: Vec<String>,
    /// Territories contested in an invasion, in display order.
    pub invasion_territories: Vec<String>,
    /// Control bar value each territory starts at (0 = attackers hold it,
    /// 100 = defenders hold it).
    pub starting_bar: f64,
    /// Base control-bar movement per successful hit.
    pub push_base: f64,
    /// Extra push per point of the acting side's average leadership.
    pub push_per_leadership: f64,
    /// Upper bound on a single push before the injure bonus.
    pub push_max: f64,
    /// Multiplier applied to the push when the roll also injures.
    pub injure_push_bonus: f64,
    /// Defense added per wall level when defending an invasion.
    pub wall_defense_per_level: f64,
    /// Minimum leadership to initiate a coup.
    pub coup_min_leadership: f64,
    /// Minimum reputation in the target kingdom to initiate a coup.
    pub coup_min_reputation: f64,
    /// Minimum reputation in the target kingdom to pledge into a battle.
    pub join_min_reputation: f64,
    /// Days a newly crowned ruler is protected from invasion.
    pub ruler_tenure_protection_days: i64,
    /// Each loser forfeits `gold / loser_gold_divisor` when a coup or a
    /// defended invasion settles.
    pub loser_gold_divisor: i64,
    /// Each attacker forfeits `gold / invader_gold_divisor` when an
    /// invasion fails.
    pub invader_gold_divisor: i64,
    /// A failed invasion moves `treasury / treasury_divisor` from the
    /// attacking kingdom to the defending kingdom.
    pub treasury_divisor: i64,
    /// Reputation gained in the target kingdom by the winning side.
    pub reputation_reward: f64,
    /// Reputation lost in the target kingdom by the losing side.
    pub reputation_penalty: f64,
    /// Flat attack/defense/leadership loss for the losing side of an
    /// invasion.
    pub stat_penalty: f64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            coup_pledge_hours: 24,
            invasion_pledge_hours: 48,
            rematch_buffer_days: 7,
            initiate_cooldown_days: 30,
            swing_cooldown_secs: 300,
            injury_secs: 1800,
            coup_territories: vec![
                "throne_hall".to_string(),
                "barracks".to_string(),
                "treasury_vault".to_string(),
            ],
            invasion_territories: vec![
                "outer_wall".to_string(),
                "gatehouse".to_string(),
                "market_square".to_string(),
                "barracks".to_string(),
                "keep".to_string(),
            ],
            starting_bar: 50.0,
            push_base: 4.0,
            push_per_leadership: 0.8,
            push_max: 15.0,
            injure_push_bonus: 1.5,
            wall_defense_per_level: 0.5,
            coup_min_leadership: 10.0,
            coup_min_reputation: 50.0,
            join_min_reputation: 10.0,
            ruler_tenure_protection_days: 14,
            loser_gold_divisor: 2,
            invader_gold_divisor: 10,
            treasury_divisor: 2,
            reputation_reward: 25.0,
            reputation_penalty: 25.0,
            stat_penalty: 2.0,
        }
    }
}

impl BattleConfig {
    /// Load a config from a JSON file, falling back to defaults for any
    /// field the file omits.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn pledge_duration(&self, kind: BattleKind) -> chrono::Duration {
        match kind {
            BattleKind::Coup => chrono::Duration::hours(self.coup_pledge_hours),
            BattleKind::Invasion => chrono::Duration::hours(self.invasion_pledge_hours),
        }
    }

    pub fn territories_for(&self, kind: BattleKind) -> &[String] {
        match kind {
            BattleKind::Coup => &self.coup_territories,
            BattleKind::Invasion => &self.invasion_territories,
        }
    }

    /// Number of territories a side must capture to win.
    pub fn capture_majority(&self, kind: BattleKind) -> i64 {
        self.territories_for(kind).len() as i64 / 2 + 1
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn majority_is_two_of_three_for_coups() {
        let config = BattleConfig::default();
        assert_eq!(config.capture_majority(BattleKind::Coup), 2);
        assert_eq!(config.capture_majority(BattleKind::Invasion), 3);
    }

    #[test]
    fn pledge_duration_follows_kind() {
        let config = BattleConfig::default();
        assert_eq!(
            config.pledge_duration(BattleKind::Coup),
            chrono::Duration::hours(24)
        );
        assert_eq!(
            config.pledge_duration(BattleKind::Invasion),
            chrono::Duration::hours(48)
        );
    }

    #[test]
    fn partial_json_file_keeps_defaults_for_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"swing_cooldown_secs": 10, "starting_bar": 75.0}}"#).unwrap();

        let config = BattleConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.swing_cooldown_secs, 10);
        assert_eq!(config.starting_bar, 75.0);
        assert_eq!(config.coup_pledge_hours, 24, "untouched field should default");
        assert_eq!(config.coup_territories.len(), 3);
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        match BattleConfig::from_json_file(file.path()) {
            Err(ConfigError::Parse(_)) => {}
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
