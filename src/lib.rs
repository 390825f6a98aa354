pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod model;
pub mod testutil;

pub use config::BattleConfig;
pub use engine::{BattleEngine, BattleView, RollReport};
pub use error::{BattleError, EligibilityReason};
pub use model::{
    Battle, BattleKind, BattlePhase, CooldownEntry, Injury, OutcomeBands, RollOutcome, Side,
    Territory,
};
