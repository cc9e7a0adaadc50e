//! Stage transactions: a single stage's private staging buffer over a
//! shared fact store.
//!
//! A transaction is constructed, used, and disposed entirely within one
//! orchestrator call on one thread — it borrows the fact store, so it
//! cannot outlive it, and it is not `Send`/`Sync`, so it cannot cross a
//! thread boundary.

use std::cell::Cell;
use std::collections::BTreeMap;

use forge_kernel::facts::{FactPayload, FactStore};

/// A proposal conflicts with one already staged in this transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposeError {
    pub key: String,
}

/// A key has no committed fact and was not proposed in this transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFact {
    pub key: String,
}

/// A stage's private, ordered staging buffer over a borrowed fact store.
///
/// Proposals are local until the orchestrator calls
/// [`StageTransaction::snapshot`] and commits it; [`StageTransaction::get_committed`]
/// only ever sees what is already committed to the store, never this
/// transaction's own uncommitted proposals.
pub struct StageTransaction<'a> {
    store: &'a FactStore,
    staged: BTreeMap<String, FactPayload>,
    disposed: Cell<bool>,
}

impl<'a> StageTransaction<'a> {
    #[must_use]
    pub fn new(store: &'a FactStore) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
            disposed: Cell::new(false),
        }
    }

    /// Propose a value for a key in this transaction's local stage.
    ///
    /// A re-proposal of a structurally equal value is a no-op success. A
    /// re-proposal of a different value is a conflict — this call never
    /// touches the fact store.
    ///
    /// # Errors
    ///
    /// Returns [`ProposeError`] if `key` was already proposed in this
    /// transaction with a different value.
    ///
    /// # Panics
    ///
    /// Panics if called after this transaction has been disposed.
    pub fn propose(&mut self, key: impl Into<String>, value: FactPayload) -> Result<(), ProposeError> {
        assert!(!self.disposed.get(), "use of a disposed stage transaction");
        let key = key.into();
        match self.staged.get(&key) {
            Some(existing) if existing.structurally_eq(&value) => Ok(()),
            Some(_) => Err(ProposeError { key }),
            None => {
                self.staged.insert(key, value);
                Ok(())
            }
        }
    }

    /// Read a fact already committed to the store. Proposals staged in
    /// this transaction are not visible here.
    ///
    /// # Errors
    ///
    /// Returns [`MissingFact`] if no fact with this key has been committed.
    ///
    /// # Panics
    ///
    /// Panics if called after this transaction has been disposed.
    pub fn get_committed(&self, key: &str) -> Result<FactPayload, MissingFact> {
        assert!(!self.disposed.get(), "use of a disposed stage transaction");
        self.store
            .try_get(key)
            .map(|fact| fact.payload.clone())
            .ok_or_else(|| MissingFact { key: key.to_string() })
    }

    /// An immutable, ordered copy of everything proposed so far.
    ///
    /// # Panics
    ///
    /// Panics if called after this transaction has been disposed.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, FactPayload> {
        assert!(!self.disposed.get(), "use of a disposed stage transaction");
        self.staged.clone()
    }
}

impl Drop for StageTransaction<'_> {
    fn drop(&mut self) {
        self.staged.clear();
        self.disposed.set(true);
    }
}
