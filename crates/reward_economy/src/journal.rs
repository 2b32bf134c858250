//! # Unit of Work
//!
//! Groups the writes of one request so they land together or not at all.
//!
//! ## Lifecycle
//!
//! ```text
//! begin ──► stage(op)* ──► commit ──► apply op[0..n] in order
//!   │                                   │
//!   │                                   └─ op[k] fails: undo op[k-1..0], return error
//!   └─► rollback / drop: nothing was applied, nothing to undo
//! ```
//!
//! Staging only records intent; the store is not touched until `commit`.
//! Every applied operation captures what it overwrote so it can be
//! compensated in reverse order if a later one fails.

use crate::error::RewardResult;
use crate::quota::QuotaRecord;
use crate::store::RewardStore;

/// A write staged for commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Overwrite a quota record.
    PutRecord {
        /// Subject id.
        subject: String,
        /// Module namespace.
        module: String,
        /// Pool or activity id.
        scope: String,
        /// New record.
        record: QuotaRecord,
    },
    /// Adjust a voucher balance.
    AddBalance {
        /// Subject id.
        subject: String,
        /// Voucher id.
        voucher: String,
        /// Signed change.
        delta: i64,
    },
    /// Overwrite a module document.
    PutDocument {
        /// Subject id.
        subject: String,
        /// Module id.
        module: String,
        /// Version the body was derived from.
        expected_version: u64,
        /// New JSON body.
        body: Vec<u8>,
    },
}

/// What to do to take an applied mutation back.
#[derive(Debug)]
enum Compensation {
    Record {
        subject: String,
        module: String,
        scope: String,
        previous: QuotaRecord,
    },
    Balance {
        subject: String,
        voucher: String,
        delta: i64,
    },
    Document {
        subject: String,
        module: String,
        version: u64,
        previous: Vec<u8>,
    },
}

/// Staged writes against one store.
pub struct UnitOfWork<'a, S: RewardStore + ?Sized> {
    store: &'a S,
    staged: Vec<Mutation>,
    finalized: bool,
}

impl<'a, S: RewardStore + ?Sized> UnitOfWork<'a, S> {
    /// Starts an empty unit of work.
    #[must_use]
    pub fn begin(store: &'a S) -> Self {
        Self {
            store,
            staged: Vec::new(),
            finalized: false,
        }
    }

    /// Stages a write.
    pub fn stage(&mut self, mutation: Mutation) {
        self.staged.push(mutation);
    }

    /// Staged writes in apply order.
    #[must_use]
    pub fn staged(&self) -> &[Mutation] {
        &self.staged
    }

    /// Applies every staged write in order.
    ///
    /// Returns how many writes were applied.
    ///
    /// # Errors
    ///
    /// Returns the first failing write's error after compensating every
    /// write applied before it.
    pub fn commit(mut self) -> RewardResult<usize> {
        self.finalized = true;
        let staged = std::mem::take(&mut self.staged);
        let mut applied: Vec<Compensation> = Vec::with_capacity(staged.len());

        for mutation in staged {
            match self.apply(mutation) {
                Ok(undo) => applied.push(undo),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        applied = applied.len(),
                        "unit of work failed, compensating"
                    );
                    for undo in applied.into_iter().rev() {
                        self.compensate(undo);
                    }
                    return Err(err);
                }
            }
        }

        Ok(applied.len())
    }

    /// Discards every staged write.
    pub fn rollback(mut self) {
        self.finalized = true;
        self.staged.clear();
    }

    fn apply(&self, mutation: Mutation) -> RewardResult<Compensation> {
        match mutation {
            Mutation::PutRecord {
                subject,
                module,
                scope,
                record,
            } => {
                let previous = self
                    .store
                    .get_record(&subject, &module, &scope)?
                    .unwrap_or_default();
                self.store.put_record(&subject, &module, &scope, &record)?;
                Ok(Compensation::Record {
                    subject,
                    module,
                    scope,
                    previous,
                })
            }
            Mutation::AddBalance {
                subject,
                voucher,
                delta,
            } => {
                self.store.add_balance(&subject, &voucher, delta)?;
                Ok(Compensation::Balance {
                    subject,
                    voucher,
                    delta,
                })
            }
            Mutation::PutDocument {
                subject,
                module,
                expected_version,
                body,
            } => {
                let previous = self
                    .store
                    .get_module_document(&subject, &module)?
                    .map(|document| document.body)
                    .unwrap_or_default();
                let version =
                    self.store
                        .put_module_document(&subject, &module, expected_version, body)?;
                Ok(Compensation::Document {
                    subject,
                    module,
                    version,
                    previous,
                })
            }
        }
    }

    fn compensate(&self, undo: Compensation) {
        let result = match &undo {
            Compensation::Record {
                subject,
                module,
                scope,
                previous,
            } => self.store.put_record(subject, module, scope, previous),
            Compensation::Balance {
                subject,
                voucher,
                delta,
            } => self
                .store
                .add_balance(subject, voucher, delta.saturating_neg())
                .map(|_| ()),
            Compensation::Document {
                subject,
                module,
                version,
                previous,
            } => self
                .store
                .put_module_document(subject, module, *version, previous.clone())
                .map(|_| ()),
        };

        if let Err(err) = result {
            tracing::error!(error = %err, ?undo, "compensation failed, state may be partial");
        }
    }
}

impl<S: RewardStore + ?Sized> Drop for UnitOfWork<'_, S> {
    fn drop(&mut self) {
        if !self.finalized && !self.staged.is_empty() {
            tracing::debug!(staged = self.staged.len(), "unit of work dropped without commit");
        }
    }
}
