use chrono::{DateTime, Utc};

/// A battle injury: the hurt player is locked out of battle actions until
/// the expiry passes. Rows are cleared lazily when next checked rather than
/// by a background job, so an expired row may linger with `cleared_at` unset.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Injury {
    pub battle_id: i64,
    pub player_id: i64,
    pub inflicted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub cleared_at: Option<DateTime<Utc>>,
}

impl Injury {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.cleared_at.is_none() && now < self.expires_at
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn make_injury() -> Injury {
        let inflicted = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        Injury {
            battle_id: 1,
            player_id: 7,
            inflicted_at: inflicted,
            expires_at: inflicted + chrono::Duration::minutes(30),
            cleared_at: None,
        }
    }

    #[test]
    fn active_until_expiry_then_inactive() {
        let injury = make_injury();
        assert!(injury.is_active(injury.inflicted_at));
        assert!(!injury.is_active(injury.expires_at));
        assert!(!injury.is_active(injury.expires_at + chrono::Duration::seconds(1)));
    }

    #[test]
    fn cleared_rows_are_never_active() {
        let mut injury = make_injury();
        injury.cleared_at = Some(injury.inflicted_at + chrono::Duration::minutes(1));
        assert!(!injury.is_active(injury.inflicted_at + chrono::Duration::minutes(2)));
    }

    #[test]
    fn remaining_never_goes_negative() {
        let injury = make_injury();
        assert_eq!(injury.remaining_secs(injury.inflicted_at), 30 * 60);
        assert_eq!(
            injury.remaining_secs(injury.expires_at + chrono::Duration::hours(1)),
            0
        );
    }
}
