//! # Storage Collaborator
//!
//! The engine never owns persistence. It talks to a [`RewardStore`], which
//! holds three kinds of state per subject:
//!
//! - quota records, keyed by `(subject, module, scope)`
//! - voucher balances, keyed by `(subject, voucher)`
//! - module documents, keyed by `(subject, module)`: versioned JSON blobs
//!   the engine uses for pity counters, stats, history and activity progress
//!
//! Quota records are namespaced by module before they reach the map (see
//! [`module_key`]) so a `draw` pool and an `activity` with the same id never
//! collide.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and
//! embedders that keep state in memory.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RewardError, RewardResult};
use crate::quota::QuotaRecord;

/// Separator between module and scope in a namespaced key.
pub const KEY_SEPARATOR: char = ':';

/// Namespaces `scope` under `module`.
#[must_use]
pub fn module_key(module: &str, scope: &str) -> String {
    format!("{module}{KEY_SEPARATOR}{scope}")
}

/// Splits a namespaced key back into `(module, scope)`.
#[must_use]
pub fn parse_module_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(KEY_SEPARATOR)
}

/// A versioned per-subject, per-module blob.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleDocument {
    /// Bumped on every successful write; 0 means never written.
    pub version: u64,
    /// JSON body.
    pub body: Vec<u8>,
}

impl ModuleDocument {
    /// Serializes `value` as the body of a document at `version`.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::Storage` if serialization fails.
    pub fn encode<T: Serialize>(version: u64, value: &T) -> RewardResult<Self> {
        let body = serde_json::to_vec(value).map_err(RewardError::storage)?;
        Ok(Self { version, body })
    }

    /// Deserializes the body; an empty body yields `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::Storage` for a malformed body.
    pub fn decode<T: DeserializeOwned + Default>(&self) -> RewardResult<T> {
        if self.body.is_empty() {
            return Ok(T::default());
        }
        serde_json::from_slice(&self.body).map_err(RewardError::storage)
    }
}

/// Persistence consumed by the engine.
///
/// Implementations must be safe to share between threads. Per-subject
/// serialization is the engine's job, not the store's.
pub trait RewardStore: Send + Sync {
    /// Loads a quota record.
    ///
    /// # Errors
    ///
    /// Backend failures as `RewardError::Storage`.
    fn get_record(&self, subject: &str, module: &str, scope: &str)
        -> RewardResult<Option<QuotaRecord>>;

    /// Stores a quota record.
    ///
    /// # Errors
    ///
    /// Backend failures as `RewardError::Storage`.
    fn put_record(
        &self,
        subject: &str,
        module: &str,
        scope: &str,
        record: &QuotaRecord,
    ) -> RewardResult<()>;

    /// Current voucher balance; 0 when never granted.
    ///
    /// # Errors
    ///
    /// Backend failures as `RewardError::Storage`.
    fn get_balance(&self, subject: &str, voucher: &str) -> RewardResult<u64>;

    /// Applies `delta` and returns the new balance.
    ///
    /// # Errors
    ///
    /// Must reject a delta that would take the balance below zero.
    fn add_balance(&self, subject: &str, voucher: &str, delta: i64) -> RewardResult<u64>;

    /// Loads a module document.
    ///
    /// # Errors
    ///
    /// Backend failures as `RewardError::Storage`.
    fn get_module_document(
        &self,
        subject: &str,
        module: &str,
    ) -> RewardResult<Option<ModuleDocument>>;

    /// Writes `body` if the stored version still equals `expected_version`
    /// (0 for a document that does not exist yet). Returns the new version.
    ///
    /// # Errors
    ///
    /// Rejects a stale `expected_version` with `RewardError::Storage`.
    fn put_module_document(
        &self,
        subject: &str,
        module: &str,
        expected_version: u64,
        body: Vec<u8>,
    ) -> RewardResult<u64>;
}

type SubjectKey = (String, String);

#[derive(Default)]
struct Tables {
    records: HashMap<SubjectKey, QuotaRecord>,
    balances: HashMap<SubjectKey, u64>,
    documents: HashMap<SubjectKey, ModuleDocument>,
}

/// In-memory [`RewardStore`].
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants vouchers; shorthand for a positive `add_balance`.
    ///
    /// # Errors
    ///
    /// Returns `RewardError::ArithmeticOverflow` if the balance would overflow.
    pub fn grant(&self, subject: &str, voucher: &str, amount: u64) -> RewardResult<u64> {
        let mut tables = self.tables.write();
        let balance = tables
            .balances
            .entry((subject.to_string(), voucher.to_string()))
            .or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(RewardError::ArithmeticOverflow)?;
        Ok(*balance)
    }

    /// Quota scopes stored for `subject` under `module`.
    #[must_use]
    pub fn scopes(&self, subject: &str, module: &str) -> Vec<String> {
        let tables = self.tables.read();
        let mut scopes: Vec<String> = tables
            .records
            .keys()
            .filter(|(owner, _)| owner == subject)
            .filter_map(|(_, key)| match parse_module_key(key) {
                Some((m, scope)) if m == module => Some(scope.to_string()),
                _ => None,
            })
            .collect();
        scopes.sort();
        scopes
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("MemoryStore")
            .field("records", &tables.records.len())
            .field("balances", &tables.balances.len())
            .field("documents", &tables.documents.len())
            .finish()
    }
}

impl RewardStore for MemoryStore {
    fn get_record(
        &self,
        subject: &str,
        module: &str,
        scope: &str,
    ) -> RewardResult<Option<QuotaRecord>> {
        let key = (subject.to_string(), module_key(module, scope));
        Ok(self.tables.read().records.get(&key).cloned())
    }

    fn put_record(
        &self,
        subject: &str,
        module: &str,
        scope: &str,
        record: &QuotaRecord,
    ) -> RewardResult<()> {
        let key = (subject.to_string(), module_key(module, scope));
        self.tables.write().records.insert(key, record.clone());
        Ok(())
    }

    fn get_balance(&self, subject: &str, voucher: &str) -> RewardResult<u64> {
        let key = (subject.to_string(), voucher.to_string());
        Ok(self.tables.read().balances.get(&key).copied().unwrap_or(0))
    }

    fn add_balance(&self, subject: &str, voucher: &str, delta: i64) -> RewardResult<u64> {
        let mut tables = self.tables.write();
        let balance = tables
            .balances
            .entry((subject.to_string(), voucher.to_string()))
            .or_insert(0);

        let updated = if delta >= 0 {
            balance
                .checked_add(delta.unsigned_abs())
                .ok_or(RewardError::ArithmeticOverflow)?
        } else {
            balance.checked_sub(delta.unsigned_abs()).ok_or_else(|| {
                RewardError::storage(format!(
                    "voucher {voucher} balance {balance} cannot absorb {delta}"
                ))
            })?
        };
        *balance = updated;
        Ok(updated)
    }

    fn get_module_document(
        &self,
        subject: &str,
        module: &str,
    ) -> RewardResult<Option<ModuleDocument>> {
        let key = (subject.to_string(), module.to_string());
        Ok(self.tables.read().documents.get(&key).cloned())
    }

    fn put_module_document(
        &self,
        subject: &str,
        module: &str,
        expected_version: u64,
        body: Vec<u8>,
    ) -> RewardResult<u64> {
        let mut tables = self.tables.write();
        let document = tables
            .documents
            .entry((subject.to_string(), module.to_string()))
            .or_default();

        if document.version != expected_version {
            return Err(RewardError::storage(format!(
                "module {module} for {subject} is at version {}, expected {expected_version}",
                document.version
            )));
        }
        document.version += 1;
        document.body = body;
        Ok(document.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_record_round_trip() {
        let store = MemoryStore::new();
        let record = QuotaRecord {
            period_start: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            period_end: Some(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()),
            used_count: 2,
            last_refresh: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()),
        };
        store.put_record("alice", "draw", "standard", &record).unwrap();

        let loaded = store.get_record("alice", "draw", "standard").unwrap();
        assert_eq!(loaded, Some(record));
        assert_eq!(store.get_record("alice", "activity", "standard").unwrap(), None);
    }

    #[test]
    fn test_record_survives_json() {
        let record = QuotaRecord {
            period_start: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            period_end: Some(Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap()),
            used_count: 7,
            last_refresh: None,
        };
        let document = ModuleDocument::encode(1, &record).unwrap();
        let decoded: QuotaRecord = document.decode().unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_balance_never_goes_negative() {
        let store = MemoryStore::new();
        store.grant("alice", "single", 2).unwrap();
        assert_eq!(store.add_balance("alice", "single", -1).unwrap(), 1);
        assert!(matches!(
            store.add_balance("alice", "single", -5),
            Err(RewardError::Storage(_))
        ));
        assert_eq!(store.get_balance("alice", "single").unwrap(), 1);
        assert_eq!(store.get_balance("bob", "single").unwrap(), 0);
    }

    #[test]
    fn test_document_versions() {
        let store = MemoryStore::new();
        assert_eq!(store.put_module_document("alice", "draw", 0, b"{}".to_vec()).unwrap(), 1);
        assert!(store.put_module_document("alice", "draw", 0, b"{}".to_vec()).is_err());
        assert_eq!(store.put_module_document("alice", "draw", 1, b"[]".to_vec()).unwrap(), 2);

        let document = store.get_module_document("alice", "draw").unwrap().unwrap();
        assert_eq!(document.version, 2);
        assert_eq!(document.body, b"[]".to_vec());
    }

    #[test]
    fn test_module_keys() {
        assert_eq!(module_key("draw", "standard"), "draw:standard");
        assert_eq!(parse_module_key("draw:standard"), Some(("draw", "standard")));

        let store = MemoryStore::new();
        let record = QuotaRecord::default();
        store.put_record("alice", "draw", "b", &record).unwrap();
        store.put_record("alice", "draw", "a", &record).unwrap();
        store.put_record("alice", "activity", "c", &record).unwrap();
        assert_eq!(store.scopes("alice", "draw"), vec!["a", "b"]);
    }
}
