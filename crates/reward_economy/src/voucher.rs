//! # Voucher Redemption
//!
//! Vouchers offset the price of a draw. They are tried in a fixed priority
//! order (higher `value` first, then id) until the remaining price is zero.
//!
//! ## Modes
//!
//! - **Fixed**: one voucher pays for exactly `deduct_count` draws. It only
//!   applies when the request is for exactly that many; then it clears the
//!   whole price.
//! - **Flexible**: each voucher covers `deduct_count` draws. If the balance
//!   covers the request, just enough vouchers are taken and the price drops
//!   to zero. Otherwise the whole balance is taken and the price shrinks by
//!   `base_cost * covered_draws / draw_count`.
//!
//! The proportional reduction always uses the original `base_cost` and
//! `draw_count`, even after an earlier voucher already covered some draws.
//! A second flexible voucher can therefore be consumed for draws the first
//! one already paid for.
//!
//! Nothing here writes balances; the engine commits `consumed` together with
//! the rest of the request.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{RewardError, RewardResult};
use crate::store::RewardStore;

/// How a voucher offsets a draw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeductMode {
    /// Proportional, may combine with other vouchers.
    #[default]
    Flexible,
    /// All or nothing for an exact draw count.
    Fixed,
}

/// A voucher type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Voucher {
    /// Voucher id, also the balance key.
    pub id: String,
    /// Pools it can be spent on; empty means every pool.
    pub applicable_pools: BTreeSet<String>,
    /// Draws one voucher covers (at least 1).
    pub deduct_count: u32,
    /// Deduction mode.
    pub mode: DeductMode,
    /// Priority; higher is spent first.
    pub value: u64,
}

impl Voucher {
    /// True when this voucher may be spent on `pool`.
    #[must_use]
    pub fn applies_to(&self, pool: &str) -> bool {
        self.applicable_pools.is_empty() || self.applicable_pools.contains(pool)
    }
}

/// All configured vouchers in redemption priority order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoucherBook {
    vouchers: Vec<Voucher>,
}

impl VoucherBook {
    /// Creates a book; vouchers are sorted by value descending, then id.
    #[must_use]
    pub fn new(mut vouchers: Vec<Voucher>) -> Self {
        vouchers.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.id.cmp(&b.id)));
        Self { vouchers }
    }

    /// Looks a voucher up by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Voucher> {
        self.vouchers.iter().find(|voucher| voucher.id == id)
    }

    /// Vouchers in priority order.
    #[must_use]
    pub fn vouchers(&self) -> &[Voucher] {
        &self.vouchers
    }

    /// Vouchers spendable on `pool`, in priority order.
    pub fn applicable<'a>(&'a self, pool: &'a str) -> impl Iterator<Item = &'a Voucher> + 'a {
        self.vouchers.iter().filter(move |voucher| voucher.applies_to(pool))
    }

    /// Applicable vouchers the subject holds at least one of, with balances.
    ///
    /// # Errors
    ///
    /// Returns storage errors from the collaborator.
    pub fn usable<'a, S: RewardStore + ?Sized>(
        &'a self,
        store: &S,
        subject: &str,
        pool: &str,
    ) -> RewardResult<Vec<(&'a Voucher, u64)>> {
        let mut usable = Vec::new();
        for voucher in self.vouchers.iter().filter(|voucher| voucher.applies_to(pool)) {
            let balance = store.get_balance(subject, &voucher.id)?;
            if balance > 0 {
                usable.push((voucher, balance));
            }
        }
        Ok(usable)
    }
}

/// Outcome of a redemption computation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    /// Price left to pay.
    pub final_cost: u64,
    /// Vouchers to take, by id.
    pub consumed: BTreeMap<String, u64>,
}

/// Works out which vouchers to take for a draw.
///
/// `candidates` must already be in priority order; zero balances are skipped.
///
/// # Errors
///
/// Returns `RewardError::ArithmeticOverflow` if the proportional reduction
/// does not fit in `u64`.
pub fn compute_redemption<'a>(
    candidates: impl IntoIterator<Item = (&'a Voucher, u64)>,
    base_cost: u64,
    draw_count: u32,
) -> RewardResult<Redemption> {
    let mut remaining = base_cost;
    let mut consumed = BTreeMap::new();

    for (voucher, balance) in candidates {
        if remaining == 0 || draw_count == 0 {
            break;
        }
        if balance == 0 {
            continue;
        }

        match voucher.mode {
            DeductMode::Fixed => {
                if draw_count == voucher.deduct_count {
                    consumed.insert(voucher.id.clone(), 1);
                    remaining = 0;
                }
            }
            DeductMode::Flexible => {
                let per_voucher = u64::from(voucher.deduct_count.max(1));
                let needed = u64::from(draw_count).div_ceil(per_voucher);
                if balance >= needed {
                    consumed.insert(voucher.id.clone(), needed);
                    remaining = 0;
                } else {
                    consumed.insert(voucher.id.clone(), balance);
                    let covered = u128::from(balance) * u128::from(per_voucher);
                    let reduction = u128::from(base_cost) * covered / u128::from(draw_count);
                    let reduction =
                        u64::try_from(reduction).map_err(|_| RewardError::ArithmeticOverflow)?;
                    remaining = remaining.saturating_sub(reduction);
                }
            }
        }
    }

    Ok(Redemption {
        final_cost: remaining,
        consumed,
    })
}
