//! # Periodic Reward Claims
//!
//! Activities hand out a fixed list of rewards when claimed. Which claims
//! are allowed depends on the kind:
//!
//! | Kind            | Rule                                              |
//! |-----------------|---------------------------------------------------|
//! | `daily_reward`  | once per local calendar day                       |
//! | `check_in`      | once per local calendar day, tracks a streak      |
//! | `task_complete` | quota and active window only                      |
//! | `holiday`       | quota and active window only                      |
//! | `custom`        | quota and active window only                      |
//!
//! Rewards are returned as data. Turning them into client commands is the
//! caller's concern.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RewardError, RewardResult};
use crate::period::{ActiveWindow, PeriodCalculator};
use crate::quota::QuotaConfig;

/// What kind of activity this is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// Once-per-day gift.
    DailyReward,
    /// Once-per-day check-in with a streak.
    CheckIn,
    /// Reward for a finished task.
    TaskComplete,
    /// Seasonal event.
    Holiday,
    /// Anything else; only quota and window apply.
    Custom,
}

impl ActivityKind {
    /// Parses the configuration spelling.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for an unknown kind.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        match text {
            "daily_reward" => Ok(Self::DailyReward),
            "check_in" => Ok(Self::CheckIn),
            "task_complete" => Ok(Self::TaskComplete),
            "holiday" => Ok(Self::Holiday),
            "custom" => Ok(Self::Custom),
            other => Err(ConfigError::Invalid(format!("unknown activity kind: {other}"))),
        }
    }

    /// True for kinds limited to one claim per local day.
    #[must_use]
    pub const fn once_per_day(self) -> bool {
        matches!(self, Self::DailyReward | Self::CheckIn)
    }
}

/// What a reward grants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    /// Currency.
    Balance,
    /// Experience points.
    Experience,
    /// An inventory item.
    Item,
    /// A server-side command run by the dispatcher.
    Command,
}

/// Typed reward payload, resolved at load time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RewardValue {
    /// A number of units.
    Amount(u64),
    /// Free text, e.g. a command line.
    Text(String),
    /// An item id.
    ItemRef(String),
}

/// One reward line of an activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGrant {
    /// What is granted.
    pub kind: RewardKind,
    /// How much or which.
    pub value: RewardValue,
    /// Repetitions (item stacks); 1 for everything else.
    pub quantity: u32,
}

impl RewardGrant {
    /// Builds a grant, checking that kind and value belong together.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a mismatched pair or zero quantity.
    pub fn new(kind: RewardKind, value: RewardValue, quantity: u32) -> Result<Self, ConfigError> {
        let fits = matches!(
            (kind, &value),
            (RewardKind::Balance | RewardKind::Experience, RewardValue::Amount(_))
                | (RewardKind::Item, RewardValue::ItemRef(_))
                | (RewardKind::Command, RewardValue::Text(_))
        );
        if !fits {
            return Err(ConfigError::Invalid(format!(
                "reward {kind:?} cannot carry {value:?}"
            )));
        }
        if quantity == 0 {
            return Err(ConfigError::Invalid("reward quantity must be positive".to_string()));
        }
        Ok(Self {
            kind,
            value,
            quantity,
        })
    }
}

/// A configured activity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivityConfig {
    /// Activity id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Claim rules.
    pub kind: ActivityKind,
    /// Disabled activities refuse every claim.
    pub enabled: bool,
    /// Rewards per claim.
    pub rewards: Vec<RewardGrant>,
    /// Optional claim quota.
    pub quota: Option<QuotaConfig>,
    /// Opening and closing instants.
    pub active: ActiveWindow,
}

/// Per-subject state of one activity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityProgress {
    /// Successful claims ever.
    pub total_claims: u64,
    /// Time of the latest successful claim.
    pub last_claim: Option<DateTime<Utc>>,
    /// Consecutive local days with a check-in.
    #[serde(default)]
    pub streak: u32,
}

impl ActivityProgress {
    /// Progress after a claim at `now`.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::AlreadyClaimed` when a once-per-day activity was
    /// already claimed on the local date of `now`.
    pub fn advance(
        &self,
        activity: &ActivityConfig,
        periods: &PeriodCalculator,
        now: DateTime<Utc>,
    ) -> RewardResult<Self> {
        let today = periods.local_date(now);
        let last_day = self.last_claim.map(|at| periods.local_date(at));

        if activity.kind.once_per_day() && last_day == Some(today) {
            return Err(RewardError::AlreadyClaimed {
                activity: activity.id.clone(),
            });
        }

        let streak = if activity.kind == ActivityKind::CheckIn {
            let yesterday = today.checked_sub_signed(Duration::days(1));
            if last_day.is_some() && last_day == yesterday {
                self.streak.saturating_add(1)
            } else {
                1
            }
        } else {
            self.streak
        };

        Ok(Self {
            total_claims: self.total_claims.saturating_add(1),
            last_claim: Some(now),
            streak,
        })
    }
}

/// What a successful claim returns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResult {
    /// Activity id.
    pub activity: String,
    /// Activity kind.
    pub kind: ActivityKind,
    /// Rewards to hand out.
    pub rewards: Vec<RewardGrant>,
    /// Current check-in streak, for `check_in` activities.
    pub streak: Option<u32>,
    /// Successful claims including this one.
    pub total_claims: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn activity(kind: ActivityKind) -> ActivityConfig {
        ActivityConfig {
            id: "daily".to_string(),
            name: "Daily".to_string(),
            kind,
            enabled: true,
            rewards: vec![RewardGrant::new(RewardKind::Balance, RewardValue::Amount(100), 1).unwrap()],
            quota: None,
            active: ActiveWindow::ALWAYS,
        }
    }

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_once_per_local_day() {
        let periods = PeriodCalculator::utc();
        let config = activity(ActivityKind::DailyReward);
        let first = ActivityProgress::default().advance(&config, &periods, at(1, 8)).unwrap();

        assert!(matches!(
            first.advance(&config, &periods, at(1, 23)),
            Err(RewardError::AlreadyClaimed { .. })
        ));
        let next = first.advance(&config, &periods, at(2, 0)).unwrap();
        assert_eq!(next.total_claims, 2);
    }

    #[test]
    fn test_local_day_follows_offset() {
        // 17:00 UTC is already the next day at UTC+8
        let periods = PeriodCalculator::with_offset_minutes(8 * 60).unwrap();
        let config = activity(ActivityKind::DailyReward);
        let first = ActivityProgress::default().advance(&config, &periods, at(1, 10)).unwrap();
        assert!(first.advance(&config, &periods, at(1, 17)).is_ok());
    }

    #[test]
    fn test_check_in_streak() {
        let periods = PeriodCalculator::utc();
        let config = activity(ActivityKind::CheckIn);
        let day1 = ActivityProgress::default().advance(&config, &periods, at(1, 9)).unwrap();
        let day2 = day1.advance(&config, &periods, at(2, 21)).unwrap();
        let day3 = day2.advance(&config, &periods, at(3, 1)).unwrap();
        assert_eq!((day1.streak, day2.streak, day3.streak), (1, 2, 3));

        let after_gap = day3.advance(&config, &periods, at(5, 9)).unwrap();
        assert_eq!(after_gap.streak, 1);
    }

    #[test]
    fn test_repeatable_kinds() {
        let periods = PeriodCalculator::utc();
        let config = activity(ActivityKind::TaskComplete);
        let once = ActivityProgress::default().advance(&config, &periods, at(1, 9)).unwrap();
        let twice = once.advance(&config, &periods, at(1, 9)).unwrap();
        assert_eq!(twice.total_claims, 2);
        assert_eq!(twice.streak, 0);
    }

    #[test]
    fn test_reward_pairing() {
        assert!(RewardGrant::new(RewardKind::Item, RewardValue::ItemRef("gem".into()), 3).is_ok());
        assert!(RewardGrant::new(RewardKind::Command, RewardValue::Text("say hi".into()), 1).is_ok());
        assert!(RewardGrant::new(RewardKind::Item, RewardValue::Amount(3), 1).is_err());
        assert!(RewardGrant::new(RewardKind::Balance, RewardValue::Text("x".into()), 1).is_err());
        assert!(RewardGrant::new(RewardKind::Experience, RewardValue::Amount(5), 0).is_err());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(ActivityKind::parse("check_in").unwrap(), ActivityKind::CheckIn);
        assert!(ActivityKind::parse("lottery").is_err());
    }
}
