//! # Economy Configuration
//!
//! Pools, vouchers and activities are loaded once from TOML and validated
//! into immutable domain types. After `EconomyConfig` exists, the engine
//! never re-checks structure; a malformed file is only ever reported here.
//!
//! ## Example
//!
//! ```toml
//! utc_offset_minutes = 480
//!
//! [history]
//! max_entries = 50
//! retention = "30d"
//!
//! [[vouchers]]
//! id = "single_ticket"
//! deduct_count = 1
//! mode = "flexible"
//!
//! [pools.standard]
//! pity_threshold = 10
//! auto_cost = true
//! max_count = 10
//! cost = { "1" = 100, "10" = 900 }
//! quota = { limit = 100, cadence = "1d", anchor_time = "04:00" }
//!
//! [[pools.standard.items]]
//! name = "common_sword"
//! weight = 90
//!
//! [[pools.standard.guarantee_items]]
//! name = "legendary_sword"
//! weight = 1
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::activity::{ActivityConfig, ActivityKind, RewardGrant, RewardKind, RewardValue};
use crate::cost::{CostTable, MAX_DRAW_COUNT};
use crate::draw::{PityRule, WeightedEntry, WeightedTable};
use crate::error::ConfigError;
use crate::history::HistoryPolicy;
use crate::period::{parse_span, ActiveWindow, CadenceSpec, PeriodCalculator};
use crate::quota::QuotaConfig;
use crate::seed::SecureSeed;
use crate::voucher::{DeductMode, Voucher, VoucherBook};

// ---------------------------------------------------------------------------
// File format
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    utc_offset_minutes: i32,
    rng_secret: Option<String>,
    #[serde(default)]
    history: RawHistory,
    #[serde(default)]
    vouchers: Vec<RawVoucher>,
    #[serde(default)]
    pools: BTreeMap<String, RawPool>,
    #[serde(default)]
    activities: BTreeMap<String, RawActivity>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawHistory {
    max_entries: Option<usize>,
    retention: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVoucher {
    id: String,
    #[serde(default)]
    applicable_pools: Vec<String>,
    #[serde(default = "default_deduct_count")]
    deduct_count: u32,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    value: u64,
}

/// Per-request draw limit of a pool without `max_count`.
pub const DEFAULT_MAX_COUNT: u32 = 100;

const fn default_deduct_count() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPool {
    items: Vec<WeightedEntry>,
    #[serde(default)]
    guarantee_items: Vec<WeightedEntry>,
    pity_threshold: Option<u32>,
    pity_counter: Option<String>,
    #[serde(default)]
    cost: BTreeMap<String, u64>,
    #[serde(default)]
    auto_cost: bool,
    max_count: Option<u32>,
    quota: Option<RawQuota>,
    active: Option<RawActive>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawQuota {
    limit: u32,
    cadence: String,
    anchor_time: Option<String>,
    anchor_weekday: Option<u8>,
    anchor_day: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawActive {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawActivity {
    name: Option<String>,
    kind: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    rewards: Vec<RawReward>,
    quota: Option<RawQuota>,
    active: Option<RawActive>,
}

const fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReward {
    #[serde(rename = "type")]
    kind: String,
    value: toml::Value,
    amount: Option<u32>,
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

/// A draw pool.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolConfig {
    /// Pool id.
    pub id: String,
    /// Regular item table.
    pub items: WeightedTable,
    /// Guarantee rule, when both a threshold and guarantee items are set.
    pub pity: Option<PityRule>,
    /// Key of the pity counter; pools naming the same key share it.
    pub pity_counter: String,
    /// Prices per draw count.
    pub cost: CostTable,
    /// Price counts missing from `cost` by bundle search.
    pub auto_cost: bool,
    /// Most draws one request may ask for.
    pub max_count: u32,
    /// Draw quota.
    pub quota: Option<QuotaConfig>,
    /// Opening and closing instants.
    pub active: ActiveWindow,
}

/// The whole validated configuration.
#[derive(Clone, Debug)]
pub struct EconomyConfig {
    /// Window calculator in the configured offset.
    pub periods: PeriodCalculator,
    /// Draw seeding secret.
    pub seed: SecureSeed,
    /// Draw history limits.
    pub history: HistoryPolicy,
    /// Voucher types in redemption priority order.
    pub vouchers: VoucherBook,
    /// Pools by id.
    pub pools: BTreeMap<String, PoolConfig>,
    /// Activities by id.
    pub activities: BTreeMap<String, ActivityConfig>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            periods: PeriodCalculator::utc(),
            seed: SecureSeed::test_seed(),
            history: HistoryPolicy::default(),
            vouchers: VoucherBook::default(),
            pools: BTreeMap::new(),
            activities: BTreeMap::new(),
        }
    }
}

impl EconomyConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first problem found.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(text).map_err(|err| ConfigError::Invalid(err.to_string()))?;
        Self::validate(raw)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when the file cannot be read or is
    /// malformed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Invalid(format!("{}: {err}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            pools = config.pools.len(),
            vouchers = config.vouchers.vouchers().len(),
            activities = config.activities.len(),
            "economy configuration loaded"
        );
        Ok(config)
    }

    /// Looks a pool up by id.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownPool` for an unconfigured id.
    pub fn pool(&self, id: &str) -> Result<&PoolConfig, ConfigError> {
        self.pools
            .get(id)
            .ok_or_else(|| ConfigError::UnknownPool(id.to_string()))
    }

    /// Looks an activity up by id.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownActivity` for an unconfigured id.
    pub fn activity(&self, id: &str) -> Result<&ActivityConfig, ConfigError> {
        self.activities
            .get(id)
            .ok_or_else(|| ConfigError::UnknownActivity(id.to_string()))
    }

    fn validate(raw: RawConfig) -> Result<Self, ConfigError> {
        let periods = PeriodCalculator::with_offset_minutes(raw.utc_offset_minutes)?;
        let seed = match raw.rng_secret.as_deref() {
            Some(hex) => SecureSeed::from_hex(hex)?,
            None => {
                tracing::warn!("rng_secret not configured, draws use the built-in test seed");
                SecureSeed::test_seed()
            }
        };

        let history = HistoryPolicy {
            max_entries: raw
                .history
                .max_entries
                .unwrap_or(HistoryPolicy::default().max_entries),
            retention: raw.history.retention.as_deref().map(parse_span).transpose()?,
        };

        let mut pools = BTreeMap::new();
        for (id, pool) in raw.pools {
            let validated = validate_pool(&id, pool)?;
            pools.insert(id, validated);
        }

        let vouchers = validate_vouchers(raw.vouchers, &pools)?;

        let mut activities = BTreeMap::new();
        for (id, activity) in raw.activities {
            let validated = validate_activity(&id, activity)?;
            activities.insert(id, validated);
        }

        Ok(Self {
            periods,
            seed,
            history,
            vouchers,
            pools,
            activities,
        })
    }
}

fn invalid(context: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid(format!("{context}: {reason}"))
}

fn validate_table(context: &str, entries: Vec<WeightedEntry>) -> Result<WeightedTable, ConfigError> {
    if entries.is_empty() {
        return Err(invalid(context, "item table is empty"));
    }
    for entry in &entries {
        let weight = entry.weight();
        if !(weight.is_finite() && weight > 0.0) {
            return Err(invalid(
                context,
                format!("{} has non-positive weight {weight}", entry.name()),
            ));
        }
        if let WeightedEntry::Compound { name, sub_table, .. } = entry {
            if sub_table.is_empty() {
                return Err(invalid(context, format!("{name} has an empty sub-table")));
            }
            if let Some(bad) = sub_table
                .iter()
                .find(|sub| !(sub.weight.is_finite() && sub.weight > 0.0))
            {
                return Err(invalid(
                    context,
                    format!("{name}/{} has non-positive weight {}", bad.name, bad.weight),
                ));
            }
        }
    }
    Ok(WeightedTable::new(entries))
}

fn validate_quota(context: &str, raw: RawQuota) -> Result<QuotaConfig, ConfigError> {
    let cadence = CadenceSpec::from_parts(
        &raw.cadence,
        raw.anchor_time.as_deref(),
        raw.anchor_weekday,
        raw.anchor_day,
    )
    .map_err(|err| invalid(context, err))?;
    Ok(QuotaConfig {
        limit: raw.limit,
        cadence,
    })
}

fn parse_instant(context: &str, text: &str) -> Result<DateTime<Utc>, ConfigError> {
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| invalid(context, format!("bad timestamp {text:?}: {err}")))
}

fn validate_active(context: &str, raw: Option<RawActive>) -> Result<ActiveWindow, ConfigError> {
    let Some(raw) = raw else {
        return Ok(ActiveWindow::ALWAYS);
    };
    let start = raw.start.as_deref().map(|text| parse_instant(context, text)).transpose()?;
    let end = raw.end.as_deref().map(|text| parse_instant(context, text)).transpose()?;
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            return Err(invalid(context, "active window ends before it starts"));
        }
    }
    Ok(ActiveWindow { start, end })
}

fn validate_pool(id: &str, raw: RawPool) -> Result<PoolConfig, ConfigError> {
    let context = format!("pool {id}");
    let items = validate_table(&context, raw.items)?;

    let pity = match (raw.pity_threshold, raw.guarantee_items.is_empty()) {
        (Some(0), _) => return Err(invalid(&context, "pity_threshold must be positive")),
        (Some(_), true) => {
            return Err(invalid(&context, "pity_threshold needs guarantee_items"));
        }
        (Some(threshold), false) => Some(PityRule {
            threshold,
            guarantee: validate_table(&format!("{context} guarantee"), raw.guarantee_items)?,
        }),
        (None, false) => {
            tracing::warn!(pool = id, "guarantee_items without pity_threshold are never used");
            None
        }
        (None, true) => None,
    };

    let mut cost = Vec::with_capacity(raw.cost.len());
    for (count, price) in raw.cost {
        let parsed: u32 = count
            .trim()
            .parse()
            .map_err(|_| invalid(&context, format!("cost key {count:?} is not a draw count")))?;
        if parsed == 0 {
            return Err(invalid(&context, "cost bundle of zero draws"));
        }
        cost.push((parsed, price));
    }

    let max_count = raw.max_count.unwrap_or(DEFAULT_MAX_COUNT);
    if max_count == 0 || max_count > MAX_DRAW_COUNT {
        return Err(invalid(
            &context,
            format!("max_count must be between 1 and {MAX_DRAW_COUNT}"),
        ));
    }

    Ok(PoolConfig {
        id: id.to_string(),
        items,
        pity,
        pity_counter: raw.pity_counter.unwrap_or_else(|| id.to_string()),
        cost: CostTable::from_pairs(cost),
        auto_cost: raw.auto_cost,
        max_count,
        quota: raw
            .quota
            .map(|quota| validate_quota(&context, quota))
            .transpose()?,
        active: validate_active(&context, raw.active)?,
    })
}

fn validate_vouchers(
    raw: Vec<RawVoucher>,
    pools: &BTreeMap<String, PoolConfig>,
) -> Result<VoucherBook, ConfigError> {
    let mut seen = BTreeSet::new();
    let mut vouchers = Vec::with_capacity(raw.len());

    for voucher in raw {
        let context = format!("voucher {}", voucher.id);
        if !seen.insert(voucher.id.clone()) {
            return Err(invalid(&context, "duplicate id"));
        }
        if voucher.deduct_count == 0 {
            return Err(invalid(&context, "deduct_count must be at least 1"));
        }
        let mode = match voucher.mode.as_deref() {
            None | Some("flexible") => DeductMode::Flexible,
            Some("fixed") => DeductMode::Fixed,
            Some(other) => return Err(invalid(&context, format!("unknown mode {other:?}"))),
        };
        if let Some(missing) = voucher
            .applicable_pools
            .iter()
            .find(|pool| !pools.contains_key(pool.as_str()))
        {
            return Err(ConfigError::UnknownPool(missing.clone()));
        }

        vouchers.push(Voucher {
            id: voucher.id,
            applicable_pools: voucher.applicable_pools.into_iter().collect(),
            deduct_count: voucher.deduct_count,
            mode,
            value: voucher.value,
        });
    }

    Ok(VoucherBook::new(vouchers))
}

fn validate_reward(context: &str, raw: RawReward) -> Result<RewardGrant, ConfigError> {
    let kind = match raw.kind.as_str() {
        "balance" => RewardKind::Balance,
        "exp" | "experience" => RewardKind::Experience,
        "item" => RewardKind::Item,
        "command" => RewardKind::Command,
        other => return Err(invalid(context, format!("unknown reward type {other:?}"))),
    };

    let value = match (kind, raw.value) {
        (RewardKind::Balance | RewardKind::Experience, toml::Value::Integer(amount)) => {
            let amount = u64::try_from(amount)
                .map_err(|_| invalid(context, format!("negative reward amount {amount}")))?;
            RewardValue::Amount(amount)
        }
        (RewardKind::Balance | RewardKind::Experience, toml::Value::String(text)) => {
            let amount = text
                .trim()
                .parse()
                .map_err(|_| invalid(context, format!("reward amount {text:?} is not a number")))?;
            RewardValue::Amount(amount)
        }
        (RewardKind::Item, toml::Value::String(item)) => RewardValue::ItemRef(item),
        (RewardKind::Command, toml::Value::String(command)) => RewardValue::Text(command),
        (kind, value) => {
            return Err(invalid(
                context,
                format!("reward {kind:?} cannot take value {value}"),
            ))
        }
    };

    RewardGrant::new(kind, value, raw.amount.unwrap_or(1)).map_err(|err| invalid(context, err))
}

fn validate_activity(id: &str, raw: RawActivity) -> Result<ActivityConfig, ConfigError> {
    let context = format!("activity {id}");
    let kind = ActivityKind::parse(&raw.kind).map_err(|err| invalid(&context, err))?;

    let rewards = raw
        .rewards
        .into_iter()
        .map(|reward| validate_reward(&context, reward))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ActivityConfig {
        id: id.to_string(),
        name: raw.name.unwrap_or_else(|| id.to_string()),
        kind,
        enabled: raw.enabled,
        rewards,
        quota: raw
            .quota
            .map(|quota| validate_quota(&context, quota))
            .transpose()?,
        active: validate_active(&context, raw.active)?,
    })
}
