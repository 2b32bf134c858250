//! # Cost Calculator
//!
//! Maps a draw count to a price.
//!
//! ```text
//! exact entry?            -> that price            (Exact)
//! auto cost off?          -> CountNotPriced
//! bundles sum to n?       -> cheapest combination  (Bundled)
//! otherwise               -> round(best rate * n)  (Approximate)
//! ```
//!
//! The bundle search is an unbounded-knapsack DP over `0..=n`, so its cost is
//! `O(n * bundles)`. Counts above [`MAX_DRAW_COUNT`] are refused before any
//! table is allocated. All sums use checked arithmetic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RewardError, RewardResult, ValidationError};

/// Hard ceiling on the draws of one request. Pools may set a lower limit.
pub const MAX_DRAW_COUNT: u32 = 10_000;

/// Prices per draw count, keyed in ascending count order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostTable {
    bundles: BTreeMap<u32, u64>,
}

impl CostTable {
    /// Creates a table from `(count, price)` pairs.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, u64)>) -> Self {
        Self {
            bundles: pairs.into_iter().collect(),
        }
    }

    /// Exact price for `count`, if configured.
    #[must_use]
    pub fn get(&self, count: u32) -> Option<u64> {
        self.bundles.get(&count).copied()
    }

    /// True when no price is configured; such pools are free.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// `(count, price)` pairs in ascending count order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.bundles.iter().map(|(count, price)| (*count, *price))
    }

    /// Lowest price per unit across all bundles.
    #[must_use]
    pub fn cheapest_rate(&self) -> Option<f64> {
        self.iter()
            .filter(|(count, _)| *count > 0)
            .map(|(count, price)| price as f64 / f64::from(count))
            .min_by(f64::total_cmp)
    }
}

/// How a price was arrived at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceBasis {
    /// The table has an entry for this count.
    Exact,
    /// Cheapest exact combination of bundles.
    Bundled,
    /// No combination sums to the count; best per-unit rate times count.
    /// Best effort, not guaranteed minimal.
    Approximate,
    /// The pool has no cost table.
    Free,
}

/// A price and where it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostQuote {
    /// Price before vouchers.
    pub price: u64,
    /// How the price was computed.
    pub basis: PriceBasis,
}

/// Prices `count` draws.
///
/// # Errors
///
/// - `ValidationError::NonPositiveCount` for a zero count.
/// - `ValidationError::CountTooLarge` above [`MAX_DRAW_COUNT`].
/// - `ValidationError::CountNotPriced` when there is no exact entry and
///   `auto_cost` is off.
/// - `RewardError::ArithmeticOverflow` when a sum does not fit in `u64`.
pub fn compute_cost(table: &CostTable, auto_cost: bool, count: u32) -> RewardResult<CostQuote> {
    if count == 0 {
        return Err(ValidationError::NonPositiveCount.into());
    }
    if count > MAX_DRAW_COUNT {
        return Err(ValidationError::CountTooLarge {
            count,
            max: MAX_DRAW_COUNT,
        }
        .into());
    }
    if table.is_empty() {
        return Ok(CostQuote {
            price: 0,
            basis: PriceBasis::Free,
        });
    }
    if let Some(price) = table.get(count) {
        return Ok(CostQuote {
            price,
            basis: PriceBasis::Exact,
        });
    }
    if !auto_cost {
        return Err(ValidationError::CountNotPriced { count }.into());
    }

    if let Some(price) = cheapest_combination(table, count)? {
        return Ok(CostQuote {
            price,
            basis: PriceBasis::Bundled,
        });
    }

    let rate = table
        .cheapest_rate()
        .ok_or(ValidationError::CountNotPriced { count })?;
    let estimate = (rate * f64::from(count)).round();
    if !estimate.is_finite() || estimate >= u64::MAX as f64 {
        return Err(RewardError::ArithmeticOverflow);
    }
    tracing::debug!(count, estimate, "no exact bundle combination, using best rate");

    Ok(CostQuote {
        price: estimate as u64,
        basis: PriceBasis::Approximate,
    })
}

/// Minimum-cost exact cover of `count` units with unbounded bundle reuse.
fn cheapest_combination(table: &CostTable, count: u32) -> RewardResult<Option<u64>> {
    let n = count as usize;
    let bundles: Vec<(usize, u64)> = table
        .iter()
        .filter(|(size, _)| *size > 0 && *size <= count)
        .map(|(size, price)| (size as usize, price))
        .collect();

    let mut best: Vec<Option<u64>> = vec![None; n + 1];
    best[0] = Some(0);

    for units in 1..=n {
        let mut cheapest: Option<u64> = None;
        for &(size, price) in &bundles {
            if size > units {
                break;
            }
            let Some(rest) = best[units - size] else {
                continue;
            };
            let total = rest.checked_add(price).ok_or(RewardError::ArithmeticOverflow)?;
            if cheapest.map_or(true, |current| total < current) {
                cheapest = Some(total);
            }
        }
        best[units] = cheapest;
    }

    Ok(best[n])
}
