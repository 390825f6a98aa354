use chrono::{DateTime, Utc};

/// The two flavors of battle. They share one lifecycle and one combat loop;
/// kind only selects the territory roster, eligibility rules, and settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BattleKind {
    Coup,
    Invasion,
}

impl BattleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BattleKind::Coup => "coup",
            BattleKind::Invasion => "invasion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "coup" => Some(BattleKind::Coup),
            "invasion" => Some(BattleKind::Invasion),
            _ => None,
        }
    }
}

impl std::fmt::Display for BattleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which roster a participant fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Attackers,
    Defenders,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Attackers => "attackers",
            Side::Defenders => "defenders",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "attackers" => Some(Side::Attackers),
            "defenders" => Some(Side::Defenders),
            _ => None,
        }
    }

    pub fn opposite(&self) -> Side {
        match self {
            Side::Attackers => Side::Defenders,
            Side::Defenders => Side::Attackers,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase, always derived from timestamps rather than stored.
/// Ordered so that a later phase compares greater than an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BattlePhase {
    Pledge,
    Battle,
    Resolved,
}

impl BattlePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BattlePhase::Pledge => "pledge",
            BattlePhase::Battle => "battle",
            BattlePhase::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for BattlePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One coup or invasion, mirrored from its storage row.
///
/// `attacker_ids` and `defender_ids` are disjoint sets; membership writes go
/// through a guarded update so the invariant holds under concurrent joins.
#[derive(Debug, Clone)]
pub struct Battle {
    pub id: i64,
    pub kind: BattleKind,
    /// Kingdom whose crown or land is at stake.
    pub kingdom_id: i64,
    /// Invading kingdom; `None` for coups.
    pub attacking_from_kingdom_id: Option<i64>,
    pub initiator_id: i64,
    pub initiator_name: String,
    pub start_time: DateTime<Utc>,
    pub pledge_end_time: DateTime<Utc>,
    pub attacker_ids: Vec<i64>,
    pub defender_ids: Vec<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub attacker_victory: Option<bool>,
    pub winner_side: Option<Side>,
}

impl Battle {
    /// Phase at `now`. Resolution wins over the clock: once `resolved_at`
    /// is set the battle is resolved no matter what the timestamps say.
    pub fn phase_at(&self, now: DateTime<Utc>) -> BattlePhase {
        if self.resolved_at.is_some() {
            BattlePhase::Resolved
        } else if now < self.pledge_end_time {
            BattlePhase::Pledge
        } else {
            BattlePhase::Battle
        }
    }

    pub fn side_of(&self, player_id: i64) -> Option<Side> {
        if self.attacker_ids.contains(&player_id) {
            Some(Side::Attackers)
        } else if self.defender_ids.contains(&player_id) {
            Some(Side::Defenders)
        } else {
            None
        }
    }

    pub fn members(&self, side: Side) -> &[i64] {
        match side {
            Side::Attackers => &self.attacker_ids,
            Side::Defenders => &self.defender_ids,
        }
    }
}
