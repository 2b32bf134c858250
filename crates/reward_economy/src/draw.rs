//! # Draw Engine
//!
//! Weighted selection from ordered item tables with a pity guarantee.
//!
//! ## Selection
//!
//! ```text
//! entries:     [ A:1 ][ B:3          ]
//! normalized:  0.25   1.00  (cumulative)
//! r ~ U[0,1):  0.61 -> first cumulative >= r -> B
//! ```
//!
//! Tables are `Vec`s, never hash maps, so a given RNG stream always yields
//! the same items. A compound entry resolves through its own sub-table once;
//! sub-tables cannot nest further.
//!
//! ## Pity
//!
//! With threshold `T`, the `T`-th draw since the last guarantee is taken
//! from the guarantee table and the counter resets to zero. The counter is
//! carried across requests and across the draws of one multi-draw.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cost::MAX_DRAW_COUNT;
use crate::error::{RewardError, RewardResult, ValidationError};

/// Leaf of a compound entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubEntry {
    /// Item name.
    pub name: String,
    /// Relative weight inside the sub-table.
    pub weight: f64,
}

/// One row of a weighted table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightedEntry {
    /// Resolves through a nested sub-table.
    Compound {
        /// Display name of the group.
        name: String,
        /// Weight of the group inside the parent table.
        weight: f64,
        /// Ordered leaves.
        sub_table: Vec<SubEntry>,
    },
    /// Plain item.
    Item {
        /// Item name.
        name: String,
        /// Relative weight.
        weight: f64,
    },
}

impl WeightedEntry {
    /// Plain item entry.
    #[must_use]
    pub fn item(name: impl Into<String>, weight: f64) -> Self {
        Self::Item {
            name: name.into(),
            weight,
        }
    }

    /// Compound entry.
    #[must_use]
    pub fn compound(name: impl Into<String>, weight: f64, sub_table: Vec<SubEntry>) -> Self {
        Self::Compound {
            name: name.into(),
            weight,
            sub_table,
        }
    }

    /// Entry name (the group name for compound entries).
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Item { name, .. } | Self::Compound { name, .. } => name,
        }
    }

    /// Weight inside the parent table.
    #[inline]
    #[must_use]
    pub fn weight(&self) -> f64 {
        match self {
            Self::Item { weight, .. } | Self::Compound { weight, .. } => *weight,
        }
    }
}

/// An ordered weighted table with its total weight pre-computed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightedTable {
    entries: Vec<WeightedEntry>,
    total_weight: f64,
}

impl WeightedTable {
    /// Builds a table; order is kept as given.
    #[must_use]
    pub fn new(entries: Vec<WeightedEntry>) -> Self {
        let total_weight = entries.iter().map(WeightedEntry::weight).sum();
        Self {
            entries,
            total_weight,
        }
    }

    /// Entries in selection order.
    #[must_use]
    pub fn entries(&self) -> &[WeightedEntry] {
        &self.entries
    }

    /// True when there is nothing to select.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every leaf name this table can produce, in table order.
    #[must_use]
    pub fn leaf_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            match entry {
                WeightedEntry::Item { name, .. } => names.push(name.as_str()),
                WeightedEntry::Compound { sub_table, .. } => {
                    names.extend(sub_table.iter().map(|sub| sub.name.as_str()));
                }
            }
        }
        names
    }

    /// Selects one leaf name.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::EmptyTable` when the table, or the chosen
    /// compound entry's sub-table, has nothing to select.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> RewardResult<&str> {
        let entry = pick(&self.entries, self.total_weight, WeightedEntry::weight, rng)
            .ok_or(RewardError::EmptyTable)?;

        match entry {
            WeightedEntry::Item { name, .. } => Ok(name),
            WeightedEntry::Compound { sub_table, .. } => {
                let total = sub_table.iter().map(|sub| sub.weight).sum();
                pick(sub_table, total, |sub: &SubEntry| sub.weight, rng)
                    .map(|sub| sub.name.as_str())
                    .ok_or(RewardError::EmptyTable)
            }
        }
    }
}

/// Cumulative walk over normalized weights. Falls back to the last entry
/// when rounding leaves the final cumulative sum just below `r`.
fn pick<'a, T, R: Rng + ?Sized>(
    entries: &'a [T],
    total: f64,
    weight: impl Fn(&T) -> f64,
    rng: &mut R,
) -> Option<&'a T> {
    if entries.is_empty() || total <= 0.0 || !total.is_finite() {
        return None;
    }

    let r: f64 = rng.gen();
    let mut cumulative = 0.0;
    for entry in entries {
        cumulative += weight(entry) / total;
        if cumulative >= r {
            return Some(entry);
        }
    }
    entries.last()
}

/// Consecutive non-guaranteed draws since the last guarantee.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PityState {
    /// Draws since the last guarantee fired.
    pub count: u32,
}

/// Guarantee rule of a pool.
#[derive(Clone, Debug, PartialEq)]
pub struct PityRule {
    /// The `threshold`-th draw since the last guarantee is guaranteed.
    pub threshold: u32,
    /// Table the guaranteed draw comes from.
    pub guarantee: WeightedTable,
}

impl PityRule {
    /// True when the next draw must come from the guarantee table.
    #[inline]
    #[must_use]
    pub const fn triggers(&self, state: PityState) -> bool {
        state.count >= self.threshold.saturating_sub(1)
    }
}

/// Items produced by one multi-draw.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrawOutcome {
    /// Items in draw order.
    pub items: Vec<String>,
    /// How many of them came from the guarantee table.
    pub guarantees: u32,
}

/// Runs multi-draws against a pool's tables.
#[derive(Clone, Copy, Debug, Default)]
pub struct DrawEngine;

impl DrawEngine {
    /// Draws `count` items, updating `state` in place.
    ///
    /// On error `state` may have advanced; callers work on a copy and only
    /// persist it once the whole request succeeded.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::EmptyTable` when a table has nothing to select,
    /// and `ValidationError::CountTooLarge` above [`MAX_DRAW_COUNT`].
    pub fn draw<R: Rng + ?Sized>(
        items: &WeightedTable,
        pity: Option<&PityRule>,
        state: &mut PityState,
        count: u32,
        rng: &mut R,
    ) -> RewardResult<DrawOutcome> {
        if count > MAX_DRAW_COUNT {
            return Err(ValidationError::CountTooLarge {
                count,
                max: MAX_DRAW_COUNT,
            }
            .into());
        }
        let mut outcome = DrawOutcome {
            items: Vec::with_capacity(count as usize),
            guarantees: 0,
        };

        for _ in 0..count {
            let name = match pity {
                Some(rule) if rule.triggers(*state) => {
                    state.count = 0;
                    outcome.guarantees += 1;
                    rule.guarantee.select(rng)?
                }
                Some(_) => {
                    state.count = state.count.saturating_add(1);
                    items.select(rng)?
                }
                None => items.select(rng)?,
            };
            outcome.items.push(name.to_string());
        }

        Ok(outcome)
    }

    /// Runs `iterations` plain selections and tallies them.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::EmptyTable` for an empty table.
    pub fn run_statistics<R: Rng + ?Sized>(
        table: &WeightedTable,
        iterations: u32,
        rng: &mut R,
    ) -> RewardResult<DrawStats> {
        let mut stats = DrawStats::default();
        for _ in 0..iterations {
            let name = table.select(rng)?;
            stats.total_draws += 1;
            *stats.item_counts.entry(name.to_string()).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

/// Running totals for one pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawStats {
    /// Items drawn.
    pub total_draws: u64,
    /// Items that came from the guarantee table.
    pub guarantee_count: u64,
    /// Per-item tallies.
    #[serde(default)]
    pub item_counts: BTreeMap<String, u64>,
}

impl DrawStats {
    /// Folds one outcome into the totals.
    pub fn record(&mut self, outcome: &DrawOutcome) {
        self.total_draws += outcome.items.len() as u64;
        self.guarantee_count += u64::from(outcome.guarantees);
        for item in &outcome.items {
            *self.item_counts.entry(item.clone()).or_insert(0) += 1;
        }
    }

    /// Share of `item` among all draws, in percent.
    #[must_use]
    pub fn rate_percent(&self, item: &str) -> f64 {
        if self.total_draws == 0 {
            return 0.0;
        }
        let hits = self.item_counts.get(item).copied().unwrap_or(0);
        (hits as f64 / self.total_draws as f64) * 100.0
    }
}
