//! Sandbox / capability lock tests (spec §8 "Sandbox").
//!
//! Capability *declaration* is checked by the orchestrator before a stage
//! ever runs: a cacheable stage must declare no capabilities, since a
//! cacheable result must be reproducible from its declared inputs alone.
//! Enforcing that a stage's *runtime behavior* stays within its declared
//! capabilities is left to the stage's own execution environment, per
//! `SPEC_FULL.md` §8's sandboxing note — this suite exercises the
//! declaration-time half of the contract.

use std::collections::BTreeMap;
use std::sync::Arc;

use forge_harness::capability::{AssertionSet, Capabilities, Capability};
use forge_harness::orchestrator::{Orchestrator, StageRunState};
use forge_harness::stage::{CancellationToken, Stage, StageContext, StageOutcome, StageSuccess};
use forge_harness::transaction::StageTransaction;
use forge_kernel::diagnostics::FailureClass;
use forge_kernel::facts::FactStore;
use forge_kernel::fingerprint::Fingerprint;

fn fp() -> Fingerprint {
    forge_kernel::fingerprint::compute(b"{}", b"{}", b"{}", "gen-1.0.0")
}

struct DeclaringStage {
    cacheable: bool,
    capabilities: Capabilities,
}

impl Stage for DeclaringStage {
    fn name(&self) -> &str {
        "declaring-stage"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
    fn assertions(&self) -> &AssertionSet {
        static EMPTY: std::sync::OnceLock<AssertionSet> = std::sync::OnceLock::new();
        EMPTY.get_or_init(AssertionSet::empty)
    }
    fn cacheable(&self) -> bool {
        self.cacheable
    }
    fn execute(&self, _ctx: &StageContext, _txn: &mut StageTransaction, _cancel: &CancellationToken) -> StageOutcome {
        Ok(StageSuccess { artifacts: vec![] })
    }
}

#[test]
fn cacheable_stage_declaring_network_capability_is_rejected_before_execution() {
    let orchestrator = Orchestrator::new(Arc::new(FactStore::new())).with_stage(Box::new(DeclaringStage {
        cacheable: true,
        capabilities: [Capability::Network].into_iter().collect(),
    }));
    let report = orchestrator.run(&fp(), &BTreeMap::new(), &CancellationToken::new());

    let first = &report.stage_reports[0];
    assert_eq!(first.state, StageRunState::Failed);
    let diagnostic = first.diagnostic.as_ref().unwrap();
    assert_eq!(diagnostic.class, FailureClass::CacheViolation);
    assert_eq!(diagnostic.id, "DX7001");
}

#[test]
fn cacheable_stage_declaring_no_capabilities_runs_normally() {
    let orchestrator = Orchestrator::new(Arc::new(FactStore::new())).with_stage(Box::new(DeclaringStage {
        cacheable: true,
        capabilities: Capabilities::new(),
    }));
    let report = orchestrator.run(&fp(), &BTreeMap::new(), &CancellationToken::new());
    assert!(report.succeeded());
}

#[test]
fn non_cacheable_stage_may_declare_any_capability_set() {
    let orchestrator = Orchestrator::new(Arc::new(FactStore::new())).with_stage(Box::new(DeclaringStage {
        cacheable: false,
        capabilities: [Capability::FileRead, Capability::Database].into_iter().collect(),
    }));
    let report = orchestrator.run(&fp(), &BTreeMap::new(), &CancellationToken::new());
    assert!(report.succeeded());
}
