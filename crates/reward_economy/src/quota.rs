//! # Quota Ledger
//!
//! Tracks how much of a periodic quota a subject has used in the current
//! window and re-arms it when the window moves on.
//!
//! ## Algorithm
//!
//! ```text
//! load record (or zero record)
//!   -> compute current window
//!   -> stale? reset used_count, store the new window, persist
//!   -> used_count + requested > limit? QuotaExceeded (rollover stays persisted)
//!   -> used_count += requested, persist
//! ```
//!
//! The ledger itself does no locking; callers that need check and commit to
//! be atomic (the reward engine) serialize per subject before calling in.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RewardError, RewardResult};
use crate::period::{is_stale, Cadence, CadenceSpec, PeriodCalculator, Window};
use crate::store::RewardStore;

/// A usage cap re-armed once per cadence window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaConfig {
    /// Units allowed per window.
    pub limit: u32,
    /// When the window rolls over.
    pub cadence: CadenceSpec,
}

/// Persisted usage of one quota scope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRecord {
    /// Start of the window `used_count` belongs to.
    pub period_start: Option<DateTime<Utc>>,
    /// End of the window `used_count` belongs to.
    pub period_end: Option<DateTime<Utc>>,
    /// Units committed in the window.
    pub used_count: u32,
    /// When the window was last rolled over.
    pub last_refresh: Option<DateTime<Utc>>,
}

impl QuotaRecord {
    /// The window this record describes, if one was ever opened.
    #[must_use]
    pub fn window(&self) -> Option<Window> {
        match (self.period_start, self.period_end) {
            (Some(start), Some(end)) => Some(Window { start, end }),
            _ => None,
        }
    }

    /// Returns the record with `requested` more units used.
    #[must_use]
    pub fn charged(&self, requested: u32) -> Self {
        Self {
            used_count: self.used_count.saturating_add(requested),
            ..self.clone()
        }
    }
}

/// Identifies one quota: who, which subsystem, which pool or activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QuotaScope<'a> {
    /// Subject (player) id.
    pub subject: &'a str,
    /// Subsystem namespace, e.g. `draw` or `activity`.
    pub module: &'a str,
    /// Pool or activity id inside the module.
    pub scope: &'a str,
}

impl<'a> QuotaScope<'a> {
    /// Creates a scope.
    #[must_use]
    pub const fn new(subject: &'a str, module: &'a str, scope: &'a str) -> Self {
        Self {
            subject,
            module,
            scope,
        }
    }
}

/// Units left in the current window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Remaining {
    /// No quota is configured.
    Unlimited,
    /// Units left before the limit.
    Limited(u32),
}

/// Per-subject quota bookkeeping on top of a [`RewardStore`].
pub struct QuotaLedger<S: ?Sized> {
    store: Arc<S>,
    periods: PeriodCalculator,
}

impl<S: RewardStore + ?Sized> QuotaLedger<S> {
    /// Creates a ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<S>, periods: PeriodCalculator) -> Self {
        Self { store, periods }
    }

    /// The calculator used for windows.
    #[must_use]
    pub const fn periods(&self) -> &PeriodCalculator {
        &self.periods
    }

    /// The window a record should describe at `now`.
    ///
    /// Grid cadences come straight from the calculator. Rolling cadences keep
    /// the record's own window while it is open and start a new one at `now`
    /// once it has closed.
    ///
    /// # Errors
    ///
    /// Propagates window arithmetic failures.
    pub fn window_for(
        &self,
        config: &QuotaConfig,
        record: &QuotaRecord,
        now: DateTime<Utc>,
    ) -> RewardResult<Window> {
        match config.cadence.cadence {
            Cadence::Custom(span) => match record.window() {
                Some(open) if open.contains(now) => Ok(open),
                _ => self.periods.rolling_window(span, now),
            },
            _ => self.periods.compute_window(&config.cadence, now),
        }
    }

    /// Loads the record and rolls it over if its window is stale.
    ///
    /// # Errors
    ///
    /// Returns storage errors from the collaborator.
    pub fn current(
        &self,
        scope: QuotaScope<'_>,
        config: &QuotaConfig,
        now: DateTime<Utc>,
    ) -> RewardResult<QuotaRecord> {
        let mut record = self
            .store
            .get_record(scope.subject, scope.module, scope.scope)?
            .unwrap_or_default();

        let window = self.window_for(config, &record, now)?;
        if is_stale(&record, &window) {
            tracing::debug!(
                subject = scope.subject,
                module = scope.module,
                scope = scope.scope,
                start = %window.start,
                end = %window.end,
                "quota window rolled over"
            );
            record = QuotaRecord {
                period_start: Some(window.start),
                period_end: Some(window.end),
                used_count: 0,
                last_refresh: Some(now),
            };
            self.store
                .put_record(scope.subject, scope.module, scope.scope, &record)?;
        }

        Ok(record)
    }

    /// Checks that `requested` more units fit into the current window without
    /// committing them. Returns the current record.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::QuotaExceeded` when they do not fit.
    pub fn check(
        &self,
        scope: QuotaScope<'_>,
        config: &QuotaConfig,
        requested: u32,
        now: DateTime<Utc>,
    ) -> RewardResult<QuotaRecord> {
        let record = self.current(scope, config, now)?;
        if u64::from(record.used_count) + u64::from(requested) > u64::from(config.limit) {
            return Err(RewardError::QuotaExceeded {
                limit: config.limit,
                used: record.used_count,
                requested,
            });
        }
        Ok(record)
    }

    /// Checks and commits `requested` units in one step.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::QuotaExceeded` when they do not fit; the
    /// rollover is persisted either way.
    pub fn check_and_consume(
        &self,
        scope: QuotaScope<'_>,
        config: &QuotaConfig,
        requested: u32,
        now: DateTime<Utc>,
    ) -> RewardResult<QuotaRecord> {
        let record = self.check(scope, config, requested, now)?.charged(requested);
        self.store
            .put_record(scope.subject, scope.module, scope.scope, &record)?;
        Ok(record)
    }

    /// Units left in the current window; [`Remaining::Unlimited`] without a
    /// quota.
    ///
    /// # Errors
    ///
    /// Returns storage errors from the collaborator.
    pub fn remaining(
        &self,
        scope: QuotaScope<'_>,
        config: Option<&QuotaConfig>,
        now: DateTime<Utc>,
    ) -> RewardResult<Remaining> {
        let Some(config) = config else {
            return Ok(Remaining::Unlimited);
        };
        let record = self.current(scope, config, now)?;
        Ok(Remaining::Limited(config.limit.saturating_sub(record.used_count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::TimeOfDay;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn ledger() -> (Arc<MemoryStore>, QuotaLedger<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let ledger = QuotaLedger::new(Arc::clone(&store), PeriodCalculator::utc());
        (store, ledger)
    }

    fn daily(limit: u32) -> QuotaConfig {
        QuotaConfig {
            limit,
            cadence: CadenceSpec::new(Cadence::Daily(1)),
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_quota_rollover() {
        let (store, ledger) = ledger();
        let scope = QuotaScope::new("alice", "draw", "standard");
        let config = daily(3);
        let now = noon();

        for _ in 0..3 {
            ledger.check_and_consume(scope, &config, 1, now).unwrap();
        }
        let fourth = ledger.check_and_consume(scope, &config, 1, now);
        assert_eq!(
            fourth,
            Err(RewardError::QuotaExceeded {
                limit: 3,
                used: 3,
                requested: 1
            })
        );

        let record = store.get_record("alice", "draw", "standard").unwrap().unwrap();
        let tomorrow = record.period_end.unwrap() + Duration::minutes(1);
        ledger.check_and_consume(scope, &config, 1, tomorrow).unwrap();

        let record = store.get_record("alice", "draw", "standard").unwrap().unwrap();
        assert_eq!(record.used_count, 1);
        assert_eq!(record.last_refresh, Some(tomorrow));
    }

    #[test]
    fn test_rejected_request_still_persists_rollover() {
        let (store, ledger) = ledger();
        let scope = QuotaScope::new("bob", "draw", "standard");
        let config = daily(2);

        let stale = QuotaRecord {
            period_start: Some(noon() - Duration::days(3)),
            period_end: Some(noon() - Duration::days(2)),
            used_count: 2,
            last_refresh: None,
        };
        store.put_record("bob", "draw", "standard", &stale).unwrap();

        let result = ledger.check_and_consume(scope, &config, 5, noon());
        assert!(matches!(result, Err(RewardError::QuotaExceeded { used: 0, .. })));

        let record = store.get_record("bob", "draw", "standard").unwrap().unwrap();
        assert_eq!(record.used_count, 0);
        assert_eq!(
            record.period_start,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_check_does_not_commit() {
        let (_store, ledger) = ledger();
        let scope = QuotaScope::new("carol", "activity", "checkin");
        let config = daily(1);

        ledger.check(scope, &config, 1, noon()).unwrap();
        ledger.check(scope, &config, 1, noon()).unwrap();
        assert_eq!(
            ledger.remaining(scope, Some(&config), noon()).unwrap(),
            Remaining::Limited(1)
        );
    }

    #[test]
    fn test_remaining_and_unlimited() {
        let (_store, ledger) = ledger();
        let scope = QuotaScope::new("dave", "draw", "standard");
        let config = QuotaConfig {
            limit: 10,
            cadence: CadenceSpec::new(Cadence::Weekly { weeks: 1, weekday: 1 })
                .anchored_at(TimeOfDay::new(4, 0).unwrap()),
        };

        ledger.check_and_consume(scope, &config, 4, noon()).unwrap();
        assert_eq!(
            ledger.remaining(scope, Some(&config), noon()).unwrap(),
            Remaining::Limited(6)
        );
        assert_eq!(
            ledger.remaining(scope, None, noon()).unwrap(),
            Remaining::Unlimited
        );
    }

    #[test]
    fn test_rolling_window_opens_at_first_use() {
        let (store, ledger) = ledger();
        let scope = QuotaScope::new("erin", "activity", "bonus");
        let config = QuotaConfig {
            limit: 1,
            cadence: CadenceSpec::new(Cadence::Custom(Duration::hours(2))),
        };
        let first = noon() + Duration::minutes(17);

        ledger.check_and_consume(scope, &config, 1, first).unwrap();
        let record = store.get_record("erin", "activity", "bonus").unwrap().unwrap();
        assert_eq!(record.period_start, Some(first));
        assert_eq!(record.period_end, Some(first + Duration::hours(2)));

        let inside = first + Duration::minutes(119);
        assert!(ledger.check_and_consume(scope, &config, 1, inside).is_err());

        let after = first + Duration::hours(2);
        ledger.check_and_consume(scope, &config, 1, after).unwrap();
    }

    #[test]
    fn test_scopes_are_independent() {
        let (_store, ledger) = ledger();
        let config = daily(1);
        ledger
            .check_and_consume(QuotaScope::new("frank", "draw", "a"), &config, 1, noon())
            .unwrap();
        ledger
            .check_and_consume(QuotaScope::new("frank", "draw", "b"), &config, 1, noon())
            .unwrap();
        ledger
            .check_and_consume(QuotaScope::new("frank", "activity", "a"), &config, 1, noon())
            .unwrap();
    }
}
