//! The orchestrator: drives an ordered list of stages through a five-step
//! state machine — pre-flight, cache lookup, execute, commit-or-fail,
//! cache store — against a shared fact store.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use forge_kernel::diagnostics::{Candidate, Diagnostic, FailureClass, Impact, ResolutionRequest};
use forge_kernel::facts::{Causation, FactStore};
use forge_kernel::fingerprint::Fingerprint;

use tracing::{debug, warn};

use crate::cache::{cache_key, Cache, StageCacheEntry};
use crate::stage::{CancellationToken, Stage, StageContext, StageSuccess, UnsignedArtifact};

/// Where one stage's run stands in the state machine
/// `Ready -> PreflightOk -> Executing -> {Committed | Failed | Skipped}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRunState {
    PreflightOk,
    Committed,
    Failed,
    Skipped,
}

/// The recorded outcome of driving one stage through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRunReport {
    pub stage_name: String,
    pub stage_version: String,
    pub state: StageRunState,
    pub diagnostic: Option<Diagnostic>,
    pub resolution: Option<ResolutionRequest>,
    pub cached: bool,
}

/// The full record of one orchestrator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub fingerprint: Fingerprint,
    pub stage_reports: Vec<StageRunReport>,
    pub artifacts: Vec<UnsignedArtifact>,
}

impl PipelineReport {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.stage_reports
            .iter()
            .all(|r| r.state == StageRunState::Committed)
    }
}

/// Drives an ordered list of stages against a shared fact store and cache.
pub struct Orchestrator {
    stages: Vec<Box<dyn Stage>>,
    facts: Arc<FactStore>,
    cache: Cache,
}

impl Orchestrator {
    #[must_use]
    pub fn new(facts: Arc<FactStore>) -> Self {
        Self {
            stages: Vec::new(),
            facts,
            cache: Cache::new(),
        }
    }

    #[must_use]
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn facts(&self) -> &Arc<FactStore> {
        &self.facts
    }

    /// Run every stage in declaration order, halting at the first failure
    /// (remaining stages are reported `Skipped`, never invoked).
    pub fn run(
        &self,
        fingerprint: &Fingerprint,
        policy_versions: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> PipelineReport {
        let mut stage_reports = Vec::with_capacity(self.stages.len());
        let mut artifacts = Vec::new();
        let mut halted = false;

        for stage in &self.stages {
            if halted {
                stage_reports.push(skipped(stage.as_ref()));
                continue;
            }

            if cancel.is_cancelled() {
                stage_reports.push(skipped(stage.as_ref()));
                halted = true;
                continue;
            }

            if stage.cacheable() && !stage.capabilities().is_empty() {
                let diagnostic = Diagnostic::new(
                    "DX7001",
                    FailureClass::CacheViolation,
                    "cacheable stage declares external-input capabilities",
                    format!(
                        "stage {:?} is marked cacheable but declares {} capabilit(y/ies); \
                         a cacheable stage must declare none",
                        stage.name(),
                        stage.capabilities().len()
                    ),
                    fingerprint.clone(),
                    stage.name().to_string(),
                    Impact::Breaking,
                );
                stage_reports.push(failed(stage.as_ref(), diagnostic, None));
                halted = true;
                continue;
            }

            if let Some(diagnostic) = self.check_preflight(stage.as_ref(), fingerprint) {
                stage_reports.push(failed(stage.as_ref(), diagnostic, None));
                halted = true;
                continue;
            }

            let key = cache_key(fingerprint, stage.name(), stage.version(), policy_versions);
            let cache_hit = if stage.cacheable() {
                self.cache.lookup_or_none(&key)
            } else {
                None
            };

            let (success, proposed, was_cached) = if let Some(entry) = cache_hit {
                debug!(stage = stage.name(), %key, "cache hit");
                (Ok(entry.success), entry.facts, true)
            } else {
                debug!(stage = stage.name(), %key, "cache miss, executing");
                let ctx = StageContext::new(
                    fingerprint.clone(),
                    policy_versions.clone(),
                    self.facts.as_ref(),
                );
                let mut txn = crate::transaction::StageTransaction::new(self.facts.as_ref());
                let outcome = catch_unwind(AssertUnwindSafe(|| stage.execute(&ctx, &mut txn, cancel)));
                match outcome {
                    Ok(result) => {
                        let proposed = txn.snapshot();
                        (result, proposed, false)
                    }
                    Err(panic) => {
                        let message = panic_message(&panic);
                        warn!(stage = stage.name(), %message, "stage panicked");
                        let diagnostic = Diagnostic::new(
                            "DX6001",
                            FailureClass::System,
                            "stage panicked during execution",
                            format!("stage {:?} panicked: {message}", stage.name()),
                            fingerprint.clone(),
                            stage.name().to_string(),
                            Impact::Breaking,
                        );
                        stage_reports.push(failed(stage.as_ref(), diagnostic, None));
                        halted = true;
                        continue;
                    }
                }
            };

            match success {
                Ok(stage_success) => {
                    let causation = Causation {
                        correlation_id: fingerprint.as_str().to_string(),
                        trace_id: fingerprint.as_str().to_string(),
                        actor_id: stage.name().to_string(),
                    };
                    match self.facts.atomic_commit(&proposed, &causation) {
                        Ok(()) => {
                            if stage.cacheable() && !was_cached {
                                let entry = StageCacheEntry {
                                    success: stage_success.clone(),
                                    facts: proposed,
                                };
                                if let Err(violation) = self.cache.put(key, entry) {
                                    let diagnostic = Diagnostic::new(
                                        "DX7002",
                                        FailureClass::CacheViolation,
                                        "stage output is non-deterministic",
                                        format!(
                                            "stage {:?} produced a different result for cache key {}",
                                            stage.name(),
                                            violation.key
                                        ),
                                        fingerprint.clone(),
                                        stage.name().to_string(),
                                        Impact::Breaking,
                                    );
                                    stage_reports.push(failed(stage.as_ref(), diagnostic, None));
                                    halted = true;
                                    continue;
                                }
                            }
                            artifacts.extend(stage_success.artifacts.iter().cloned());
                            stage_reports.push(StageRunReport {
                                stage_name: stage.name().to_string(),
                                stage_version: stage.version().to_string(),
                                state: StageRunState::Committed,
                                diagnostic: None,
                                resolution: None,
                                cached: was_cached,
                            });
                        }
                        Err(commit_failure) => {
                            warn!(stage = stage.name(), conflicts = ?commit_failure.conflicts, "commit conflict");
                            let candidates = commit_failure
                                .conflicts
                                .iter()
                                .map(|key| {
                                    let prior = self
                                        .facts
                                        .try_get(key)
                                        .map(|fact| format!("{:?}", fact.payload));
                                    let proposed_value = proposed.get(key).map(|value| format!("{value:?}"));
                                    Candidate {
                                        name: format!("Resolve:{key}"),
                                        description: format!(
                                            "key {key:?}: committed value is {prior:?}, stage proposed {proposed_value:?}"
                                        ),
                                        recommended_action: format!(
                                            "keep the committed value for {key:?} and adjust the conflicting stage"
                                        ),
                                    }
                                })
                                .collect();
                            let resolution = ResolutionRequest {
                                ambiguous_node: commit_failure.conflicts.join(","),
                                candidates,
                                required_policy_hint: None,
                                description: format!(
                                    "stage {:?} conflicted on commit for keys: {}",
                                    stage.name(),
                                    commit_failure.conflicts.join(", ")
                                ),
                            };
                            let diagnostic = Diagnostic::new(
                                "DX6002",
                                FailureClass::System,
                                "fact store commit conflict",
                                resolution.description.clone(),
                                fingerprint.clone(),
                                stage.name().to_string(),
                                Impact::Breaking,
                            );
                            stage_reports.push(failed(stage.as_ref(), diagnostic, Some(resolution)));
                            halted = true;
                        }
                    }
                }
                Err(stage_failure) => {
                    stage_reports.push(failed(
                        stage.as_ref(),
                        stage_failure.diagnostic,
                        stage_failure.resolution,
                    ));
                    halted = true;
                }
            }
        }

        PipelineReport {
            fingerprint: fingerprint.clone(),
            stage_reports,
            artifacts,
        }
    }

    fn check_preflight(&self, stage: &dyn Stage, fingerprint: &Fingerprint) -> Option<Diagnostic> {
        let assertions = stage.assertions();
        for key in &assertions.required {
            if self.facts.try_get(key).is_none() {
                return Some(Diagnostic::new(
                    "DX2001",
                    FailureClass::IntentViolation,
                    "missing required fact",
                    format!("stage {:?} requires fact {key:?}, which is not committed", stage.name()),
                    fingerprint.clone(),
                    stage.name().to_string(),
                    Impact::Breaking,
                ));
            }
        }
        for key in &assertions.forbidden {
            if self.facts.try_get(key).is_some() {
                return Some(Diagnostic::new(
                    "DX2002",
                    FailureClass::IntentViolation,
                    "forbidden fact present",
                    format!("stage {:?} forbids fact {key:?}, which is already committed", stage.name()),
                    fingerprint.clone(),
                    stage.name().to_string(),
                    Impact::Breaking,
                ));
            }
        }
        None
    }
}

fn skipped(stage: &dyn Stage) -> StageRunReport {
    StageRunReport {
        stage_name: stage.name().to_string(),
        stage_version: stage.version().to_string(),
        state: StageRunState::Skipped,
        diagnostic: None,
        resolution: None,
        cached: false,
    }
}

fn failed(stage: &dyn Stage, diagnostic: Diagnostic, resolution: Option<ResolutionRequest>) -> StageRunReport {
    StageRunReport {
        stage_name: stage.name().to_string(),
        stage_version: stage.version().to_string(),
        state: StageRunState::Failed,
        diagnostic: Some(diagnostic),
        resolution,
        cached: false,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
