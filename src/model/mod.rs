//! Pure domain types and combat math. Nothing in this module touches the
//! database; phase and outcome logic here is deterministic so it can be
//! unit tested without a running Postgres.

pub mod battle;
pub mod cooldown;
pub mod injury;
pub mod roll;
pub mod territory;
pub mod timefmt;

pub use battle::{Battle, BattleKind, BattlePhase, Side};
pub use cooldown::CooldownEntry;
pub use injury::Injury;
pub use roll::{OutcomeBands, RollOutcome};
pub use territory::Territory;
