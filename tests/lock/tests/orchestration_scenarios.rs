//! End-to-end orchestration scenarios (spec §8 "End-to-end scenarios").

use std::collections::BTreeMap;
use std::sync::Arc;

use forge_harness::capability::{AssertionSet, Capabilities};
use forge_harness::orchestrator::{Orchestrator, StageRunState};
use forge_harness::stage::{CancellationToken, Stage, StageContext, StageOutcome, StageSuccess, UnsignedArtifact};
use forge_harness::transaction::StageTransaction;
use forge_kernel::diagnostics::{Diagnostic, FailureClass, Impact};
use forge_kernel::facts::{FactPayload, FactStore};
use forge_kernel::fingerprint::Fingerprint;

fn fp() -> Fingerprint {
    forge_kernel::fingerprint::compute(b"{}", b"{}", b"{}", "gen-1.0.0")
}

/// A stage that emits one artifact named after an intent entry and commits
/// a single fact recording that it ran.
struct IdentityEmitterStage {
    entry_name: &'static str,
}

impl Stage for IdentityEmitterStage {
    fn name(&self) -> &str {
        "identity-emitter"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn capabilities(&self) -> &Capabilities {
        static EMPTY: std::sync::OnceLock<Capabilities> = std::sync::OnceLock::new();
        EMPTY.get_or_init(Capabilities::new)
    }
    fn assertions(&self) -> &AssertionSet {
        static EMPTY: std::sync::OnceLock<AssertionSet> = std::sync::OnceLock::new();
        EMPTY.get_or_init(AssertionSet::empty)
    }
    fn cacheable(&self) -> bool {
        true
    }
    fn execute(&self, _ctx: &StageContext, txn: &mut StageTransaction, _cancel: &CancellationToken) -> StageOutcome {
        txn.propose("emitted", FactPayload::Str(self.entry_name.into())).unwrap();
        Ok(StageSuccess {
            artifacts: vec![UnsignedArtifact {
                relative_path: format!("Identity/{}.g.cs", self.entry_name),
                body: format!("// identity for {}", self.entry_name),
            }],
        })
    }
}

/// A stage that commits a fact under a fixed key and value, unconditionally.
struct CommitStage {
    key: &'static str,
    value: FactPayload,
}

impl Stage for CommitStage {
    fn name(&self) -> &str {
        "commit-stage"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn capabilities(&self) -> &Capabilities {
        static EMPTY: std::sync::OnceLock<Capabilities> = std::sync::OnceLock::new();
        EMPTY.get_or_init(Capabilities::new)
    }
    fn assertions(&self) -> &AssertionSet {
        static EMPTY: std::sync::OnceLock<AssertionSet> = std::sync::OnceLock::new();
        EMPTY.get_or_init(AssertionSet::empty)
    }
    fn cacheable(&self) -> bool {
        false
    }
    fn execute(&self, _ctx: &StageContext, txn: &mut StageTransaction, _cancel: &CancellationToken) -> StageOutcome {
        txn.propose(self.key, self.value.clone()).unwrap();
        Ok(StageSuccess { artifacts: vec![] })
    }
}

/// A stage whose assertion set requires a fact to be already committed.
struct RequiresSchemaStage;

impl Stage for RequiresSchemaStage {
    fn name(&self) -> &str {
        "requires-schema"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn capabilities(&self) -> &Capabilities {
        static EMPTY: std::sync::OnceLock<Capabilities> = std::sync::OnceLock::new();
        EMPTY.get_or_init(Capabilities::new)
    }
    fn assertions(&self) -> &AssertionSet {
        static REQUIRED: std::sync::OnceLock<AssertionSet> = std::sync::OnceLock::new();
        REQUIRED.get_or_init(|| {
            let mut a = AssertionSet::empty();
            a.required.insert("schema".to_string());
            a
        })
    }
    fn cacheable(&self) -> bool {
        false
    }
    fn execute(&self, _ctx: &StageContext, _txn: &mut StageTransaction, _cancel: &CancellationToken) -> StageOutcome {
        Ok(StageSuccess { artifacts: vec![] })
    }
}

/// Scenario 1 & 2: a single value-object intent entry produces one artifact
/// with a 64-hex content hash, stable across runs and independent of the
/// entry ordering in the source intent document.
#[test]
fn scenario_one_and_two_single_artifact_stable_fingerprint() {
    let (bytes_a, _) = forge_kernel::intent::canonicalize(&serde_json::json!({
        "model_version": "1.0",
        "entries": [{"kind": "value_object", "name": "OrderId", "fields": []}]
    }))
    .unwrap();
    let fingerprint_a = forge_kernel::fingerprint::compute(&bytes_a, b"{}", b"{}", "gen-1.0.0");

    let orchestrator = Orchestrator::new(Arc::new(FactStore::new()))
        .with_stage(Box::new(IdentityEmitterStage { entry_name: "OrderId" }));
    let report = orchestrator.run(&fingerprint_a, &BTreeMap::new(), &CancellationToken::new());

    assert!(report.succeeded());
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].relative_path, "Identity/OrderId.g.cs");
    assert!(!report.artifacts[0].body.is_empty());

    let content_hash = forge_kernel::fingerprint::hash::canonical_hash(
        forge_kernel::fingerprint::hash_domain::HashDomain::BundleArtifact,
        report.artifacts[0].body.as_bytes(),
    );
    assert_eq!(content_hash.hex_digest().len(), 64);

    // Re-running with the same fingerprint reproduces it.
    let fingerprint_b = forge_kernel::fingerprint::compute(&bytes_a, b"{}", b"{}", "gen-1.0.0");
    assert_eq!(fingerprint_a, fingerprint_b);
}

/// Scenario 3: an unsupported `model_version` is a single `intent-violation`
/// failure with no artifacts.
#[test]
fn scenario_three_unsupported_version_is_a_single_intent_violation() {
    let err = forge_kernel::intent::canonicalize(&serde_json::json!({
        "model_version": "2.0",
        "entries": []
    }))
    .unwrap_err();
    assert_eq!(err.class(), FailureClass::IntentViolation);
}

/// Scenario 4: Stage1 commits `schema`, enabling Stage2's pre-flight;
/// reversing the order makes Stage2's pre-flight fail, listing `schema` as
/// missing.
#[test]
fn scenario_four_preflight_depends_on_commit_order() {
    let ordered = Orchestrator::new(Arc::new(FactStore::new()))
        .with_stage(Box::new(CommitStage {
            key: "schema",
            value: FactPayload::Str("v1".into()),
        }))
        .with_stage(Box::new(RequiresSchemaStage));
    let report = ordered.run(&fp(), &BTreeMap::new(), &CancellationToken::new());
    assert!(report.succeeded());

    let reversed = Orchestrator::new(Arc::new(FactStore::new()))
        .with_stage(Box::new(RequiresSchemaStage))
        .with_stage(Box::new(CommitStage {
            key: "schema",
            value: FactPayload::Str("v1".into()),
        }));
    let report = reversed.run(&fp(), &BTreeMap::new(), &CancellationToken::new());
    assert_eq!(report.stage_reports[0].state, StageRunState::Failed);
    assert!(report.stage_reports[0]
        .diagnostic
        .as_ref()
        .unwrap()
        .message
        .contains("schema"));
}

/// Scenario 5: a later stage proposing a conflicting value for an
/// already-committed key fails the commit with a `system`-class diagnostic
/// and an attached resolution request.
#[test]
fn scenario_five_commit_conflict_yields_system_diagnostic_and_resolution() {
    let orchestrator = Orchestrator::new(Arc::new(FactStore::new()))
        .with_stage(Box::new(CommitStage {
            key: "count",
            value: FactPayload::Int(42),
        }))
        .with_stage(Box::new(CommitStage {
            key: "count",
            value: FactPayload::Int(43),
        }));
    let report = orchestrator.run(&fp(), &BTreeMap::new(), &CancellationToken::new());

    let second = &report.stage_reports[1];
    assert_eq!(second.state, StageRunState::Failed);
    assert_eq!(second.diagnostic.as_ref().unwrap().class, FailureClass::System);
    let resolution = second.resolution.as_ref().expect("resolution request attached");
    assert!(resolution.description.contains("count"));
    assert_eq!(resolution.candidates.len(), 1);
    assert_eq!(resolution.candidates[0].name, "Resolve:count");
    assert!(resolution.candidates[0].description.contains("42"));
    assert!(resolution.candidates[0].description.contains("43"));
}

/// Scenario 6: cancellation between Stage1's commit and Stage2's execute
/// leaves Stage1's facts intact, does not execute Stage2, and raises no
/// diagnostic — only a `Skipped` report.
#[test]
fn scenario_six_cancellation_preserves_prior_commits_and_skips_remaining() {
    let facts = Arc::new(FactStore::new());
    let token = CancellationToken::new();

    // Run Stage1 alone first, to simulate "cancellation observed after
    // Stage1 committed, before Stage2 executed".
    let stage1 = Orchestrator::new(facts.clone()).with_stage(Box::new(CommitStage {
        key: "schema",
        value: FactPayload::Str("v1".into()),
    }));
    stage1.run(&fp(), &BTreeMap::new(), &token);
    token.cancel();

    let stage2 = Orchestrator::new(facts.clone()).with_stage(Box::new(RequiresSchemaStage));
    let report = stage2.run(&fp(), &BTreeMap::new(), &token);

    assert_eq!(report.stage_reports[0].state, StageRunState::Skipped);
    assert!(report.stage_reports[0].diagnostic.is_none());
    assert_eq!(
        facts.try_get("schema").unwrap().payload,
        FactPayload::Str("v1".into())
    );
}

#[test]
fn cacheable_stage_with_declared_capability_is_a_design_error_not_an_execution() {
    let diag = Diagnostic::new(
        "DX7001",
        FailureClass::CacheViolation,
        "t",
        "m",
        fp(),
        "s",
        Impact::Breaking,
    );
    assert_eq!(diag.class, FailureClass::CacheViolation);
}
