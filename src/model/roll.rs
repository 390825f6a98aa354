use rand::Rng;

use crate::config::BattleConfig;

// Outcome band shaping. The hit and injure bands grow linearly with the
// actor's share of total power and are clamped so every outcome stays
// possible at any stat spread.
const HIT_BASE: f64 = 0.40;
const HIT_SPREAD: f64 = 0.80;
const HIT_MIN: f64 = 0.10;
const HIT_MAX: f64 = 0.70;
const INJURE_BASE: f64 = 0.10;
const INJURE_SPREAD: f64 = 0.30;
const INJURE_MIN: f64 = 0.02;
const INJURE_MAX: f64 = 0.24;

/// What a single battle action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RollOutcome {
    /// No effect on the bar.
    Miss,
    /// Pushes the bar toward the actor's capture boundary.
    Hit,
    /// A hit that also takes an opposing participant out of the fight,
    /// with a bonus on the push.
    Injure,
}

impl RollOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollOutcome::Miss => "miss",
            RollOutcome::Hit => "hit",
            RollOutcome::Injure => "injure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "miss" => Some(RollOutcome::Miss),
            "hit" => Some(RollOutcome::Hit),
            "injure" => Some(RollOutcome::Injure),
            _ => None,
        }
    }
}

impl std::fmt::Display for RollOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability bands for one roll. A draw in `[0, 1)` is classified in
/// cumulative order: miss first, then hit, then injure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeBands {
    pub miss: f64,
    pub hit: f64,
    pub injure: f64,
}

impl OutcomeBands {
    pub fn classify(&self, draw: f64) -> RollOutcome {
        if draw < self.miss {
            RollOutcome::Miss
        } else if draw < self.miss + self.hit {
            RollOutcome::Hit
        } else {
            RollOutcome::Injure
        }
    }
}

/// Compute outcome bands from the actor's attack stat and the opposing
/// side's effective average defense. Both-zero degenerates to an even
/// power ratio.
pub fn outcome_bands(attack: f64, avg_defense: f64) -> OutcomeBands {
    let total = attack + avg_defense;
    let ratio = if total > 0.0 { attack / total } else { 0.5 };
    let hit = (HIT_BASE + HIT_SPREAD * (ratio - 0.5)).clamp(HIT_MIN, HIT_MAX);
    let injure = (INJURE_BASE + INJURE_SPREAD * (ratio - 0.5)).clamp(INJURE_MIN, INJURE_MAX);
    OutcomeBands {
        miss: 1.0 - hit - injure,
        hit,
        injure,
    }
}

/// Draw a roll value and classify it against the bands. The raw draw is
/// returned alongside the outcome so callers can record it.
pub fn draw_roll<R: Rng + ?Sized>(rng: &mut R, bands: &OutcomeBands) -> (f64, RollOutcome) {
    let draw = rng.random_range(0.0..1.0);
    (draw, bands.classify(draw))
}

/// Bar movement produced by a successful hit, before the injure bonus.
/// Scales with the acting side's average leadership, not the individual's.
pub fn push_amount(avg_leadership: f64, config: &BattleConfig) -> f64 {
    (config.push_base + avg_leadership * config.push_per_leadership).min(config.push_max)
}
