//! # Reward Engine
//!
//! The composition root. Every draw and claim goes through here.
//!
//! ## The Draw Path
//!
//! ```text
//! validate ──► active window ──► lock subject ──► quota check
//!                                                      │
//!        ┌─────────────────────────────────────────────┘
//!        ▼
//!   price (cost table) ──► vouchers ──► wallet ──► draw items (pity)
//!                                                      │
//!        ┌─────────────────────────────────────────────┘
//!        ▼
//!   unit of work: quota record + voucher balances + pity/stats
//!        │
//!        ▼
//!   history (best effort) ──► DrawResult
//! ```
//!
//! Nothing is written before every check has passed; the only early write is
//! a quota window rollover, which never changes usage. Writes for one
//! request commit together through a [`UnitOfWork`].
//!
//! ## Thread Safety
//!
//! `RewardEngine` is `Send + Sync`. Requests for the same subject are
//! serialized by a per-subject lock; different subjects run in parallel.

use std::collections::BTreeMap;
use std::hash::Hasher;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::activity::{ActivityKind, ActivityProgress, ClaimResult};
use crate::clock::{Clock, SystemClock};
use crate::config::{EconomyConfig, PoolConfig};
use crate::cost::{compute_cost, CostQuote};
use crate::draw::{DrawEngine, DrawStats, PityState};
use crate::error::{RewardError, RewardResult, ValidationError};
use crate::history::{DrawHistory, DrawRecord};
use crate::journal::{Mutation, UnitOfWork};
use crate::quota::{QuotaLedger, QuotaRecord, QuotaScope, Remaining};
use crate::seed::RngFactory;
use crate::store::{ModuleDocument, RewardStore};
use crate::voucher::{compute_redemption, Redemption};

/// Module id of quota records and pity/stats state for draws.
pub const DRAW_MODULE: &str = "draw";

/// Module id of the draw history document.
pub const HISTORY_MODULE: &str = "draw_history";

/// Module id of activity quota records and progress.
pub const ACTIVITY_MODULE: &str = "activity";

/// Number of lock stripes subjects are hashed onto.
const LOCK_STRIPES: usize = 64;

/// A request to draw from a pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawRequest {
    /// Who draws.
    pub subject: String,
    /// Pool id.
    pub pool: String,
    /// Number of draws.
    pub count: u32,
    /// Caller's currency balance; checked against the final cost when set.
    pub wallet: Option<u64>,
}

impl DrawRequest {
    /// A request without a wallet check.
    #[must_use]
    pub fn new(subject: impl Into<String>, pool: impl Into<String>, count: u32) -> Self {
        Self {
            subject: subject.into(),
            pool: pool.into(),
            count,
            wallet: None,
        }
    }

    /// Adds a wallet check.
    #[must_use]
    pub const fn with_wallet(mut self, wallet: u64) -> Self {
        self.wallet = Some(wallet);
        self
    }
}

/// Outcome of a successful draw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawResult {
    /// Items in draw order.
    pub items: Vec<String>,
    /// Price to charge after vouchers.
    pub cost: u64,
    /// Vouchers consumed, by id.
    pub tickets_consumed: BTreeMap<String, u64>,
    /// Price before vouchers.
    pub base_cost: u64,
    /// Pity counter after the draw.
    pub pity_count: u32,
}

/// Preview of what a draw would cost.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawQuote {
    /// Price before vouchers and how it was computed.
    pub base: CostQuote,
    /// Price after vouchers.
    pub final_cost: u64,
    /// Vouchers that would be consumed.
    pub tickets: BTreeMap<String, u64>,
}

/// Per-subject draw state, one document for all pools.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawState {
    /// Pity counters by counter key.
    #[serde(default)]
    pub pity: BTreeMap<String, PityState>,
    /// Running totals by pool id.
    #[serde(default)]
    pub stats: BTreeMap<String, DrawStats>,
}

/// Per-subject activity state, one document for all activities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityState {
    /// Progress by activity id.
    #[serde(default)]
    pub progress: BTreeMap<String, ActivityProgress>,
}

/// The reward engine.
pub struct RewardEngine<S: RewardStore + ?Sized, C: Clock = SystemClock> {
    config: Arc<EconomyConfig>,
    store: Arc<S>,
    clock: C,
    quotas: QuotaLedger<S>,
    rng: RngFactory,
    subject_locks: Box<[Mutex<()>]>,
}

impl<S: RewardStore + ?Sized> RewardEngine<S, SystemClock> {
    /// Creates an engine on wall-clock time.
    #[must_use]
    pub fn with_system_clock(config: EconomyConfig, store: Arc<S>) -> Self {
        Self::new(config, store, SystemClock)
    }
}

impl<S: RewardStore + ?Sized, C: Clock> RewardEngine<S, C> {
    /// Creates an engine.
    #[must_use]
    pub fn new(config: EconomyConfig, store: Arc<S>, clock: C) -> Self {
        let quotas = QuotaLedger::new(Arc::clone(&store), config.periods);
        let rng = RngFactory::new(config.seed.clone());
        Self {
            config: Arc::new(config),
            store,
            clock,
            quotas,
            rng,
            subject_locks: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// The storage collaborator.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The clock.
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    // ========================================================================
    // Draws
    // ========================================================================

    /// Draws from a pool and commits quota, vouchers, pity and stats.
    ///
    /// # Errors
    ///
    /// - `ValidationError` for an empty subject, a zero count, a count above
    ///   the pool's `max_count` or an unpriced count.
    /// - `ConfigError::UnknownPool` for an unconfigured pool.
    /// - `NotYetActive` / `Expired` outside the pool's active window.
    /// - `QuotaExceeded`, `InsufficientBalance`.
    /// - `Storage` when the store fails; nothing is left half-written.
    pub fn draw(&self, request: &DrawRequest) -> RewardResult<DrawResult> {
        validate_subject(&request.subject)?;
        let pool = self.config.pool(&request.pool)?;
        validate_count(pool, request.count)?;
        let now = self.clock.now();
        pool.active.check(now)?;

        let _guard = self.lock_subject(&request.subject);

        let subject = request.subject.as_str();
        let scope = QuotaScope::new(subject, DRAW_MODULE, &pool.id);
        let charged = match &pool.quota {
            Some(quota) => Some(
                self.quotas
                    .check(scope, quota, request.count, now)?
                    .charged(request.count),
            ),
            None => None,
        };

        let base = compute_cost(&pool.cost, pool.auto_cost, request.count)?;
        let redemption = self.redeem(subject, pool, base.price, request.count)?;
        if let Some(wallet) = request.wallet {
            if redemption.final_cost > wallet {
                return Err(RewardError::InsufficientBalance {
                    required: redemption.final_cost,
                    available: wallet,
                });
            }
        }

        let (version, mut state) = self.load_document::<DrawState>(subject, DRAW_MODULE)?;
        let mut pity = state
            .pity
            .get(&pool.pity_counter)
            .copied()
            .unwrap_or_default();
        let mut rng = self.rng.rng_for(subject, &pool.id);
        let outcome = DrawEngine::draw(
            &pool.items,
            pool.pity.as_ref(),
            &mut pity,
            request.count,
            &mut rng,
        )?;
        tracing::debug!(
            subject,
            pool = %pool.id,
            items = ?outcome.items,
            guarantees = outcome.guarantees,
            "items drawn"
        );

        if pool.pity.is_some() {
            state.pity.insert(pool.pity_counter.clone(), pity);
        }
        state.stats.entry(pool.id.clone()).or_default().record(&outcome);

        let mut work = UnitOfWork::begin(&*self.store);
        if let Some(record) = charged {
            work.stage(put_record(subject, DRAW_MODULE, &pool.id, record));
        }
        for (voucher, used) in &redemption.consumed {
            let used = i64::try_from(*used).map_err(|_| RewardError::ArithmeticOverflow)?;
            work.stage(Mutation::AddBalance {
                subject: subject.to_string(),
                voucher: voucher.clone(),
                delta: -used,
            });
        }
        work.stage(Mutation::PutDocument {
            subject: subject.to_string(),
            module: DRAW_MODULE.to_string(),
            expected_version: version,
            body: ModuleDocument::encode(version, &state)?.body,
        });
        work.commit()?;

        tracing::info!(
            subject,
            pool = %pool.id,
            count = request.count,
            base_cost = base.price,
            cost = redemption.final_cost,
            tickets = ?redemption.consumed,
            "draw committed"
        );

        let record = DrawRecord {
            pool: pool.id.clone(),
            count: request.count,
            items: outcome.items.clone(),
            cost: redemption.final_cost,
            tickets_used: redemption.consumed.clone(),
            timestamp: now,
        };
        if let Err(err) = self.append_history(subject, record, now) {
            tracing::warn!(subject, pool = %pool.id, error = %err, "draw history not written");
        }

        Ok(DrawResult {
            items: outcome.items,
            cost: redemption.final_cost,
            tickets_consumed: redemption.consumed,
            base_cost: base.price,
            pity_count: pity.count,
        })
    }

    /// Prices a draw and its voucher use without changing anything.
    ///
    /// Quota and active window are not checked.
    ///
    /// # Errors
    ///
    /// Validation, unknown pool and storage errors as for [`Self::draw`].
    pub fn quote(&self, subject: &str, pool: &str, count: u32) -> RewardResult<DrawQuote> {
        validate_subject(subject)?;
        let pool = self.config.pool(pool)?;
        validate_count(pool, count)?;
        let base = compute_cost(&pool.cost, pool.auto_cost, count)?;
        let redemption = self.redeem(subject, pool, base.price, count)?;
        Ok(DrawQuote {
            base,
            final_cost: redemption.final_cost,
            tickets: redemption.consumed,
        })
    }

    fn redeem(
        &self,
        subject: &str,
        pool: &PoolConfig,
        base_cost: u64,
        count: u32,
    ) -> RewardResult<Redemption> {
        if base_cost == 0 {
            return Ok(Redemption::default());
        }
        let usable = self.config.vouchers.usable(&*self.store, subject, &pool.id)?;
        compute_redemption(usable, base_cost, count)
    }

    fn append_history(
        &self,
        subject: &str,
        record: DrawRecord,
        now: DateTime<Utc>,
    ) -> RewardResult<()> {
        let (version, mut history) = self.load_document::<DrawHistory>(subject, HISTORY_MODULE)?;
        history.push(record, &self.config.history, now);
        let body = ModuleDocument::encode(version, &history)?.body;
        self.store
            .put_module_document(subject, HISTORY_MODULE, version, body)?;
        Ok(())
    }

    // ========================================================================
    // Activities
    // ========================================================================

    /// Claims an activity's rewards.
    ///
    /// # Errors
    ///
    /// - `ConfigError::UnknownActivity`, `ActivityDisabled`.
    /// - `NotYetActive` / `Expired` outside the activity's active window.
    /// - `AlreadyClaimed` for a second daily claim on the same local day.
    /// - `QuotaExceeded`, `Storage`.
    pub fn claim(&self, subject: &str, activity: &str) -> RewardResult<ClaimResult> {
        validate_subject(subject)?;
        let activity = self.config.activity(activity)?;
        if !activity.enabled {
            return Err(RewardError::ActivityDisabled(activity.id.clone()));
        }
        let now = self.clock.now();
        activity.active.check(now)?;

        let _guard = self.lock_subject(subject);

        let (version, mut state) = self.load_document::<ActivityState>(subject, ACTIVITY_MODULE)?;
        let progress = state
            .progress
            .get(&activity.id)
            .cloned()
            .unwrap_or_default()
            .advance(activity, &self.config.periods, now)?;

        let scope = QuotaScope::new(subject, ACTIVITY_MODULE, &activity.id);
        let charged = match &activity.quota {
            Some(quota) => Some(self.quotas.check(scope, quota, 1, now)?.charged(1)),
            None => None,
        };

        state.progress.insert(activity.id.clone(), progress.clone());

        let mut work = UnitOfWork::begin(&*self.store);
        if let Some(record) = charged {
            work.stage(put_record(subject, ACTIVITY_MODULE, &activity.id, record));
        }
        work.stage(Mutation::PutDocument {
            subject: subject.to_string(),
            module: ACTIVITY_MODULE.to_string(),
            expected_version: version,
            body: ModuleDocument::encode(version, &state)?.body,
        });
        work.commit()?;

        let streak = (activity.kind == ActivityKind::CheckIn).then_some(progress.streak);
        tracing::info!(
            subject,
            activity = %activity.id,
            kind = ?activity.kind,
            total_claims = progress.total_claims,
            ?streak,
            "activity claimed"
        );

        Ok(ClaimResult {
            activity: activity.id.clone(),
            kind: activity.kind,
            rewards: activity.rewards.clone(),
            streak,
            total_claims: progress.total_claims,
        })
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Draws left in the pool's current quota window.
    ///
    /// Rolls a stale window over as a side effect.
    ///
    /// # Errors
    ///
    /// Empty subject, unknown pool and storage errors.
    pub fn remaining(&self, subject: &str, pool: &str) -> RewardResult<Remaining> {
        validate_subject(subject)?;
        let pool = self.config.pool(pool)?;
        let _guard = self.lock_subject(subject);
        self.quotas.remaining(
            QuotaScope::new(subject, DRAW_MODULE, &pool.id),
            pool.quota.as_ref(),
            self.clock.now(),
        )
    }

    /// Claims left in the activity's current quota window.
    ///
    /// # Errors
    ///
    /// Empty subject, unknown activity and storage errors.
    pub fn activity_remaining(&self, subject: &str, activity: &str) -> RewardResult<Remaining> {
        validate_subject(subject)?;
        let activity = self.config.activity(activity)?;
        let _guard = self.lock_subject(subject);
        self.quotas.remaining(
            QuotaScope::new(subject, ACTIVITY_MODULE, &activity.id),
            activity.quota.as_ref(),
            self.clock.now(),
        )
    }

    /// Current pity counter of the pool (shared counters included).
    ///
    /// # Errors
    ///
    /// Empty subject, unknown pool and storage errors.
    pub fn pity_count(&self, subject: &str, pool: &str) -> RewardResult<u32> {
        validate_subject(subject)?;
        let pool = self.config.pool(pool)?;
        let (_, state) = self.load_document::<DrawState>(subject, DRAW_MODULE)?;
        Ok(state
            .pity
            .get(&pool.pity_counter)
            .map_or(0, |pity| pity.count))
    }

    /// Running draw totals for the pool.
    ///
    /// # Errors
    ///
    /// Empty subject, unknown pool and storage errors.
    pub fn stats(&self, subject: &str, pool: &str) -> RewardResult<DrawStats> {
        validate_subject(subject)?;
        let pool = self.config.pool(pool)?;
        let (_, mut state) = self.load_document::<DrawState>(subject, DRAW_MODULE)?;
        Ok(state.stats.remove(&pool.id).unwrap_or_default())
    }

    /// Positive voucher balances spendable on the pool.
    ///
    /// # Errors
    ///
    /// Empty subject, unknown pool and storage errors.
    pub fn usable_vouchers(&self, subject: &str, pool: &str) -> RewardResult<BTreeMap<String, u64>> {
        validate_subject(subject)?;
        let pool = self.config.pool(pool)?;
        Ok(self
            .config
            .vouchers
            .usable(&*self.store, subject, &pool.id)?
            .into_iter()
            .map(|(voucher, balance)| (voucher.id.clone(), balance))
            .collect())
    }

    /// Up to `limit` draw records, newest first, optionally for one pool.
    ///
    /// # Errors
    ///
    /// Empty subject and storage errors.
    pub fn history(
        &self,
        subject: &str,
        pool: Option<&str>,
        limit: usize,
    ) -> RewardResult<Vec<DrawRecord>> {
        validate_subject(subject)?;
        let (_, history) = self.load_document::<DrawHistory>(subject, HISTORY_MODULE)?;
        Ok(history.recent(pool, limit))
    }

    /// The subject's progress in an activity.
    ///
    /// # Errors
    ///
    /// Empty subject, unknown activity and storage errors.
    pub fn activity_progress(&self, subject: &str, activity: &str) -> RewardResult<ActivityProgress> {
        validate_subject(subject)?;
        let activity = self.config.activity(activity)?;
        let (_, mut state) = self.load_document::<ActivityState>(subject, ACTIVITY_MODULE)?;
        Ok(state.progress.remove(&activity.id).unwrap_or_default())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn lock_subject(&self, subject: &str) -> MutexGuard<'_, ()> {
        self.subject_locks[lock_stripe(subject)].lock()
    }

    fn load_document<T: DeserializeOwned + Default>(
        &self,
        subject: &str,
        module: &str,
    ) -> RewardResult<(u64, T)> {
        match self.store.get_module_document(subject, module)? {
            Some(document) => Ok((document.version, document.decode()?)),
            None => Ok((0, T::default())),
        }
    }
}

fn validate_subject(subject: &str) -> RewardResult<()> {
    if subject.trim().is_empty() {
        return Err(ValidationError::EmptySubject.into());
    }
    Ok(())
}

/// Stripe guarding `subject`. Subjects sharing a stripe are serialized
/// together; the number of locks never grows.
fn lock_stripe(subject: &str) -> usize {
    let mut hasher = SipHasher13::new();
    hasher.write(subject.as_bytes());
    let stripe = hasher.finish() % LOCK_STRIPES as u64;
    usize::try_from(stripe).unwrap_or_default()
}

fn validate_count(pool: &PoolConfig, count: u32) -> RewardResult<()> {
    if count == 0 {
        return Err(ValidationError::NonPositiveCount.into());
    }
    if count > pool.max_count {
        return Err(ValidationError::CountTooLarge {
            count,
            max: pool.max_count,
        }
        .into());
    }
    Ok(())
}

fn put_record(subject: &str, module: &str, scope: &str, record: QuotaRecord) -> Mutation {
    Mutation::PutRecord {
        subject: subject.to_string(),
        module: module.to_string(),
        scope: scope.to_string(),
        record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    const CONFIG: &str = r#"
[[vouchers]]
id = "single"
deduct_count = 1

[pools.standard]
pity_threshold = 10
cost = { "1" = 100, "10" = 900 }
max_count = 10
quota = { limit = 3, cadence = "1d" }

[[pools.standard.items]]
name = "common"
weight = 1

[[pools.standard.guarantee_items]]
name = "legendary"
weight = 1

[activities.daily]
kind = "daily_reward"
rewards = [{ type = "balance", value = 50 }]
"#;

    fn engine() -> (Arc<MemoryStore>, Arc<ManualClock>, RewardEngine<MemoryStore, Arc<ManualClock>>) {
        let config = EconomyConfig::from_toml_str(CONFIG).unwrap();
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        ));
        let engine = RewardEngine::new(config, Arc::clone(&store), Arc::clone(&clock));
        (store, clock, engine)
    }

    #[test]
    fn test_draw_commits_everything() {
        let (store, _clock, engine) = engine();
        store.grant("alice", "single", 1).unwrap();

        let result = engine.draw(&DrawRequest::new("alice", "standard", 1)).unwrap();
        assert_eq!(result.items, vec!["common"]);
        assert_eq!(result.base_cost, 100);
        assert_eq!(result.cost, 0);
        assert_eq!(result.tickets_consumed["single"], 1);
        assert_eq!(result.pity_count, 1);

        assert_eq!(store.get_balance("alice", "single").unwrap(), 0);
        assert_eq!(engine.remaining("alice", "standard").unwrap(), Remaining::Limited(2));
        assert_eq!(engine.pity_count("alice", "standard").unwrap(), 1);
        assert_eq!(engine.stats("alice", "standard").unwrap().total_draws, 1);
        assert_eq!(engine.history("alice", None, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_rejections_leave_no_trace() {
        let (store, _clock, engine) = engine();

        let broke = engine.draw(&DrawRequest::new("bob", "standard", 1).with_wallet(50));
        assert_eq!(
            broke,
            Err(RewardError::InsufficientBalance {
                required: 100,
                available: 50
            })
        );
        assert!(matches!(
            engine.draw(&DrawRequest::new("bob", "standard", 2)),
            Err(RewardError::Validation(ValidationError::CountNotPriced { count: 2 }))
        ));

        assert_eq!(engine.remaining("bob", "standard").unwrap(), Remaining::Limited(3));
        assert_eq!(engine.pity_count("bob", "standard").unwrap(), 0);
        assert!(store.get_module_document("bob", DRAW_MODULE).unwrap().is_none());
        assert!(engine.history("bob", None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_boundary_rejections() {
        let (_store, _clock, engine) = engine();
        assert_eq!(
            engine.draw(&DrawRequest::new("carol", "standard", 0)),
            Err(ValidationError::NonPositiveCount.into())
        );
        assert!(matches!(
            engine.draw(&DrawRequest::new("carol", "missing", 1)),
            Err(RewardError::Config(crate::error::ConfigError::UnknownPool(_)))
        ));
        assert_eq!(
            engine.draw(&DrawRequest::new("  ", "standard", 1)),
            Err(ValidationError::EmptySubject.into())
        );
    }

    #[test]
    fn test_claim_once_per_day() {
        let (_store, clock, engine) = engine();
        let first = engine.claim("dave", "daily").unwrap();
        assert_eq!(first.total_claims, 1);
        assert_eq!(first.streak, None);
        assert!(matches!(
            engine.claim("dave", "daily"),
            Err(RewardError::AlreadyClaimed { .. })
        ));

        clock.advance(Duration::days(1));
        assert_eq!(engine.claim("dave", "daily").unwrap().total_claims, 2);
        assert_eq!(engine.activity_progress("dave", "daily").unwrap().total_claims, 2);
        assert_eq!(
            engine.activity_remaining("dave", "daily").unwrap(),
            Remaining::Unlimited
        );
    }

    #[test]
    fn test_quote_does_not_mutate() {
        let (store, _clock, engine) = engine();
        store.grant("erin", "single", 2).unwrap();

        let quote = engine.quote("erin", "standard", 10).unwrap();
        assert_eq!(quote.base.price, 900);
        assert_eq!(quote.final_cost, 900 - 900 * 2 / 10);
        assert_eq!(quote.tickets["single"], 2);
        assert_eq!(store.get_balance("erin", "single").unwrap(), 2);
        assert_eq!(engine.usable_vouchers("erin", "standard").unwrap()["single"], 2);
    }

    #[test]
    fn test_count_above_pool_limit_is_refused() {
        let (store, _clock, engine) = engine();

        assert_eq!(
            engine.draw(&DrawRequest::new("frank", "standard", 11)),
            Err(ValidationError::CountTooLarge { count: 11, max: 10 }.into())
        );
        assert_eq!(
            engine.quote("frank", "standard", u32::MAX),
            Err(ValidationError::CountTooLarge {
                count: u32::MAX,
                max: 10
            }
            .into())
        );
        assert!(engine.quote("frank", "standard", 10).is_ok());
        assert!(store.scopes("frank", DRAW_MODULE).is_empty());
    }

    #[test]
    fn test_queries_reject_empty_subject() {
        let (_store, _clock, engine) = engine();
        let empty = Err(RewardError::from(ValidationError::EmptySubject));

        assert_eq!(engine.pity_count("", "standard").map(|_| ()), empty);
        assert_eq!(engine.stats(" ", "standard").map(|_| ()), empty);
        assert_eq!(engine.usable_vouchers("", "standard").map(|_| ()), empty);
        assert_eq!(engine.history("", None, 10).map(|_| ()), empty);
        assert_eq!(engine.activity_progress("", "daily").map(|_| ()), empty);
    }

    #[test]
    fn test_locks_stay_bounded() {
        let (_store, _clock, engine) = engine();
        for i in 0..1_000 {
            engine.remaining(&format!("visitor-{i}"), "standard").unwrap();
        }
        assert_eq!(engine.subject_locks.len(), LOCK_STRIPES);

        assert_eq!(lock_stripe("alice"), lock_stripe("alice"));
        let used: std::collections::BTreeSet<_> =
            (0..256).map(|i| lock_stripe(&format!("player-{i}"))).collect();
        assert!(used.len() > LOCK_STRIPES / 2);
    }
}
