//! Per-subject draw audit trail, bounded by count and age.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One successful draw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    /// Pool drawn from.
    pub pool: String,
    /// Draws in the request.
    pub count: u32,
    /// Items granted, in draw order.
    pub items: Vec<String>,
    /// Price paid after vouchers.
    pub cost: u64,
    /// Vouchers consumed, by id.
    #[serde(default)]
    pub tickets_used: BTreeMap<String, u64>,
    /// When the draw was committed.
    pub timestamp: DateTime<Utc>,
}

/// Limits applied whenever a record is appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryPolicy {
    /// Newest entries kept; 0 keeps everything.
    pub max_entries: usize,
    /// Entries older than this are dropped.
    pub retention: Option<Duration>,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            max_entries: 100,
            retention: None,
        }
    }
}

/// Stored history, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawHistory {
    /// Entries, oldest first.
    #[serde(default)]
    pub entries: Vec<DrawRecord>,
}

impl DrawHistory {
    /// Appends `record` and prunes by `policy`.
    pub fn push(&mut self, record: DrawRecord, policy: &HistoryPolicy, now: DateTime<Utc>) {
        self.entries.push(record);
        self.prune(policy, now);
    }

    /// Drops expired entries, then the oldest beyond `max_entries`.
    pub fn prune(&mut self, policy: &HistoryPolicy, now: DateTime<Utc>) {
        if let Some(retention) = policy.retention {
            let cutoff = now - retention;
            self.entries.retain(|entry| entry.timestamp >= cutoff);
        }
        if policy.max_entries > 0 && self.entries.len() > policy.max_entries {
            let excess = self.entries.len() - policy.max_entries;
            self.entries.drain(..excess);
        }
    }

    /// Up to `limit` entries, newest first, optionally for one pool.
    #[must_use]
    pub fn recent(&self, pool: Option<&str>, limit: usize) -> Vec<DrawRecord> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| pool.map_or(true, |pool| entry.pool == pool))
            .take(limit)
            .cloned()
            .collect()
    }
}
