//! The fact store: a monotonic, key-addressed record of everything stages
//! have learned, with atomic multi-key commits and conflict detection on
//! structural (not reference) equality.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// An immutable, dynamically-typed fact value.
///
/// Cross-type comparisons are deliberately relaxed in two places: an
/// `Int` and a `Json` integer number compare equal when numerically
/// equal, and two strings compare equal ignoring ASCII case. Everything
/// else requires matching variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactPayload {
    Null,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<FactPayload>),
    Json(serde_json::Value),
}

impl FactPayload {
    /// Structural equality under the fact model's relaxed comparison
    /// rules (see module docs). This is what the fact store uses to
    /// decide whether a re-proposed or re-committed value conflicts with
    /// an existing one — never [`PartialEq`], which is stricter.
    #[must_use]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        json_eq(&self.as_value(), &other.as_value())
    }

    fn as_value(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::Number((*i).into()),
            Self::Str(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => {
                serde_json::Value::Array(items.iter().map(FactPayload::as_value).collect())
            }
            Self::Json(v) => v.clone(),
        }
    }
}

fn json_eq(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    use serde_json::Value;
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(xi), Some(yi)) => xi == yi,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::String(x), Value::String(y)) => x.eq_ignore_ascii_case(y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(xi, yi)| json_eq(xi, yi))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other_v| json_eq(v, other_v)))
        }
        _ => false,
    }
}

/// Who or what produced a fact, threaded through for audit/tracing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Causation {
    pub correlation_id: String,
    pub trace_id: String,
    pub actor_id: String,
}

/// An immutable fact: a key, a payload, and the causation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub key: String,
    pub payload: FactPayload,
    pub causation: Causation,
}

/// A handle to a committed fact. Cheap to clone; shares storage with the
/// fact store via `Arc`.
pub type FactHandle = Arc<Fact>;

/// The result of a failed [`FactStore::atomic_commit`]: every key whose
/// proposed value conflicted with what was already committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    pub conflicts: Vec<String>,
}

/// A key-addressed store of facts with atomic, conflict-checked commits.
///
/// Reads ([`FactStore::try_get`]) never block on a commit in progress.
/// Commits are serialized by an internal mutex; two orchestrators sharing
/// one store observe linearizable commits.
#[derive(Debug, Default)]
pub struct FactStore {
    facts: RwLock<BTreeMap<String, FactHandle>>,
    commit_lock: Mutex<()>,
    attempts: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
}

impl FactStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock-free read of a single fact.
    #[must_use]
    pub fn try_get(&self, key: &str) -> Option<FactHandle> {
        self.facts.read().unwrap().get(key).cloned()
    }

    /// Atomically commit a multi-key snapshot.
    ///
    /// Protocol: a lock-free pre-check over every key in sorted order,
    /// failing without any mutation if any proposed value conflicts with
    /// an already-committed value; then, holding the exclusive commit
    /// lock, a re-check (another commit may have landed between the
    /// pre-check and acquiring the lock) followed by installing every key.
    /// The commit lock is released on every exit path via RAII.
    ///
    /// # Errors
    ///
    /// Returns [`CommitFailure`] naming every key whose proposed value is
    /// not structurally equal to what is already committed. No keys are
    /// installed if any key conflicts.
    pub fn atomic_commit(
        &self,
        snapshot: &BTreeMap<String, FactPayload>,
        causation: &Causation,
    ) -> Result<(), CommitFailure> {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        if let Some(failure) = self.detect_conflicts(snapshot) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(failure);
        }

        let _guard = self.commit_lock.lock().unwrap();

        if let Some(failure) = self.detect_conflicts(snapshot) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(failure);
        }

        let mut facts = self.facts.write().unwrap();
        for (key, payload) in snapshot {
            // A pre-existing key with a structurally equal payload is left
            // untouched: under the relaxed equality rules two "equal" values
            // can differ byte-for-byte (case, numeric type), and a committed
            // payload must never change once installed.
            if facts.contains_key(key) {
                continue;
            }
            facts.insert(
                key.clone(),
                Arc::new(Fact {
                    key: key.clone(),
                    payload: payload.clone(),
                    causation: causation.clone(),
                }),
            );
        }
        drop(facts);

        self.successes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn detect_conflicts(&self, snapshot: &BTreeMap<String, FactPayload>) -> Option<CommitFailure> {
        let facts = self.facts.read().unwrap();
        let conflicts: Vec<String> = snapshot
            .iter()
            .filter(|(key, payload)| {
                facts
                    .get(*key)
                    .is_some_and(|existing| !existing.payload.structurally_eq(payload))
            })
            .map(|(key, _)| key.clone())
            .collect();
        if conflicts.is_empty() {
            None
        } else {
            Some(CommitFailure { conflicts })
        }
    }

    /// Telemetry: total commit attempts, successes, and failures. Never on
    /// a fallible path.
    #[must_use]
    pub fn telemetry(&self) -> (u64, u64, u64) {
        (
            self.attempts.load(Ordering::Relaxed),
            self.successes.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
        )
    }
}
