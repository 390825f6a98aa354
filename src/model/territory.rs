use chrono::{DateTime, Utc};

use super::battle::Side;

/// Control bar held by the attackers once it reaches this bound.
pub const BAR_MIN: f64 = 0.0;
/// Control bar held by the defenders once it reaches this bound.
pub const BAR_MAX: f64 = 100.0;

/// One contested location inside a battle. The control bar is a tug-of-war
/// value: attackers push it toward [`BAR_MIN`], defenders toward [`BAR_MAX`].
/// Capture is sticky; `captured_by` is written once and never reverts.
#[derive(Debug, Clone)]
pub struct Territory {
    pub battle_id: i64,
    pub name: String,
    pub control_bar: f64,
    pub captured_by: Option<Side>,
    pub captured_at: Option<DateTime<Utc>>,
}

impl Territory {
    pub fn is_captured(&self) -> bool {
        self.captured_by.is_some()
    }
}

/// Clamp a control-bar value into `[BAR_MIN, BAR_MAX]`.
pub fn clamp_bar(value: f64) -> f64 {
    value.clamp(BAR_MIN, BAR_MAX)
}

/// Signed bar movement for a push of `amount` by `side`.
pub fn signed_push(side: Side, amount: f64) -> f64 {
    match side {
        Side::Attackers => -amount,
        Side::Defenders => amount,
    }
}

/// True when a clamped bar value sits on `side`'s capture boundary.
/// Exact comparison is sound here: clamping returns the bound itself.
pub fn at_capture_bar(side: Side, bar: f64) -> bool {
    match side {
        Side::Attackers => bar <= BAR_MIN,
        Side::Defenders => bar >= BAR_MAX,
    }
}
