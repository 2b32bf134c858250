//! # Reward Economy
//!
//! Pure Rust reward logic for a game server: randomized draws from weighted
//! pools and periodic reward claims, gated by time-windowed quotas and paid
//! for with currency or vouchers.
//!
//! ## Design Principles
//!
//! 1. **Ordered tables** - Weighted tables are sequences, never hash order
//! 2. **All or nothing** - A rejected request leaves no trace in storage
//! 3. **Pure calculators** - Windows, prices and redemptions are functions of their inputs
//! 4. **External configuration** - Pools, vouchers and activities live in TOML files
//!
//! ## Layers
//!
//! ```text
//! period ──► quota ──► { draw, cost } ──► voucher ──► engine
//! ```
//!
//! ## Thread Safety
//!
//! [`RewardEngine`] is `Send + Sync` and serializes requests per subject.
//! Storage is an injected [`RewardStore`]; the crate ships [`MemoryStore`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use reward_economy::{DrawRequest, EconomyConfig, MemoryStore, RewardEngine};
//!
//! let config = EconomyConfig::from_toml_file("config/rewards.toml")?;
//! let engine = RewardEngine::with_system_clock(config, Arc::new(MemoryStore::new()));
//!
//! let result = engine.draw(&DrawRequest::new("player-1", "standard", 10).with_wallet(1_000))?;
//! println!("{:?} for {}", result.items, result.cost);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod activity;
pub mod clock;
pub mod config;
pub mod cost;
pub mod draw;
pub mod engine;
pub mod error;
pub mod history;
pub mod journal;
pub mod period;
pub mod quota;
pub mod seed;
pub mod store;
pub mod voucher;

pub use activity::{
    ActivityConfig, ActivityKind, ActivityProgress, ClaimResult, RewardGrant, RewardKind,
    RewardValue,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EconomyConfig, PoolConfig};
pub use cost::{compute_cost, CostQuote, CostTable, PriceBasis};
pub use draw::{DrawEngine, DrawStats, PityRule, PityState, SubEntry, WeightedEntry, WeightedTable};
pub use engine::{DrawQuote, DrawRequest, DrawResult, RewardEngine};
pub use error::{ConfigError, RewardError, RewardResult, ValidationError};
pub use history::{DrawRecord, HistoryPolicy};
pub use journal::{Mutation, UnitOfWork};
pub use period::{ActiveWindow, Cadence, CadenceSpec, PeriodCalculator, TimeOfDay, Window};
pub use quota::{QuotaConfig, QuotaLedger, QuotaRecord, QuotaScope, Remaining};
pub use seed::{RngFactory, SecureSeed};
pub use store::{MemoryStore, ModuleDocument, RewardStore};
pub use voucher::{compute_redemption, DeductMode, Redemption, Voucher, VoucherBook};
