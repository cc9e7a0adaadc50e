//! The stage contract: the trait every pipeline stage implements, and the
//! context it runs against.
//!
//! A stage declares its name, version, capabilities, and assertion set as
//! immutable metadata, then executes against a borrowed [`StageContext`]
//! and an owned [`StageTransaction`]. A stage must never panic to signal a
//! domain or policy failure — those are `Err(StageFailure)` values; a
//! panic is a stage bug, and the orchestrator treats it as a `System`
//! diagnostic rather than propagating it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use forge_kernel::diagnostics::{Diagnostic, ResolutionRequest};
use forge_kernel::facts::FactStore;
use forge_kernel::fingerprint::Fingerprint;

use crate::capability::{AssertionSet, Capabilities};
use crate::transaction::StageTransaction;

/// A cooperative cancellation signal. The orchestrator does not preempt a
/// running stage; a stage checks `is_cancelled()` at its own yield points.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A generated artifact body before the signed emitter's provenance pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedArtifact {
    pub relative_path: String,
    pub body: String,
}

/// Everything a stage's `execute` needs besides its own transaction: the
/// run's fingerprint, a read-only fact projection, and policy versions.
pub struct StageContext<'a> {
    pub fingerprint: Fingerprint,
    pub policy_versions: std::collections::BTreeMap<String, String>,
    facts: &'a FactStore,
}

impl<'a> StageContext<'a> {
    #[must_use]
    pub fn new(
        fingerprint: Fingerprint,
        policy_versions: std::collections::BTreeMap<String, String>,
        facts: &'a FactStore,
    ) -> Self {
        Self {
            fingerprint,
            policy_versions,
            facts,
        }
    }

    /// A single-key lookup into the committed fact store.
    ///
    /// There is deliberately no key-enumeration method here: a stage's
    /// [`AssertionSet`] already names every key it depends on, so blind
    /// enumeration would let a stage silently depend on keys outside its
    /// declared contract.
    #[must_use]
    pub fn try_get_fact(&self, key: &str) -> Option<forge_kernel::facts::FactPayload> {
        self.facts.try_get(key).map(|f| f.payload.clone())
    }
}

/// What a stage returns on success: the artifacts it produced. The
/// transaction's own proposals are read back by the orchestrator via
/// `StageTransaction::snapshot`, not embedded here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSuccess {
    pub artifacts: Vec<UnsignedArtifact>,
}

/// What a stage returns on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub diagnostic: Diagnostic,
    pub resolution: Option<ResolutionRequest>,
}

pub type StageOutcome = Result<StageSuccess, StageFailure>;

/// The contract every pipeline stage implements.
pub trait Stage {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn capabilities(&self) -> &Capabilities;
    fn assertions(&self) -> &AssertionSet;
    /// Whether this stage's output may be memoized by the orchestrator's
    /// cache. A cacheable stage must declare an empty capability set —
    /// the orchestrator enforces this before ever invoking the stage.
    fn cacheable(&self) -> bool;
    fn execute(
        &self,
        ctx: &StageContext,
        txn: &mut StageTransaction,
        cancel: &CancellationToken,
    ) -> StageOutcome;
}
