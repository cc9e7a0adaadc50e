//! Diagnostics and failure classification.
//!
//! Every failure that can reach a caller of this pipeline is classified
//! into exactly one of seven families, each with its own `DX`-prefixed
//! code range. The classification drives how an orchestrator, a UI, or an
//! automation policy decides whether a failure can be safely auto-resolved.

use crate::fingerprint::Fingerprint;

/// The family a failure belongs to, and the code-range prefix used when
/// allocating a [`Diagnostic::id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureClass {
    /// The input intent itself is malformed or unsupported. `DX2xxx`.
    IntentViolation,
    /// A declared policy (budget, allowlist, capability) was violated. `DX3xxx`.
    PolicyViolation,
    /// A stage could not resolve an ambiguity without operator input. `DX4xxx`.
    InferenceFailure,
    /// Two declared versions or schemas are incompatible. `DX5xxx`.
    Compatibility,
    /// An internal error unrelated to the input (panic, I/O, bug). `DX6xxx`.
    System,
    /// The stage cache observed non-deterministic output for one key. `DX7xxx`.
    CacheViolation,
    /// A signed artifact failed integrity or provenance verification. `DX8xxx`.
    TrustViolation,
}

impl FailureClass {
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        match self {
            Self::IntentViolation => "DX2",
            Self::PolicyViolation => "DX3",
            Self::InferenceFailure => "DX4",
            Self::Compatibility => "DX5",
            Self::System => "DX6",
            Self::CacheViolation => "DX7",
            Self::TrustViolation => "DX8",
        }
    }
}

/// How disruptive applying a remediation or accepting a change would be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Impact {
    /// No observable behavior change.
    Safe,
    /// Changes behavior but preserves the declared contract.
    Behavioral,
    /// Changes or removes part of the declared contract.
    Breaking,
}

/// A suggested fix for a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediation {
    pub name: String,
    pub description: String,
    pub recommended: bool,
}

/// A structured failure record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub id: String,
    pub class: FailureClass,
    pub title: String,
    pub message: String,
    pub fingerprint: Fingerprint,
    pub stage_name: String,
    pub location: Option<String>,
    pub remediations: Vec<Remediation>,
    pub fix_preview: Option<String>,
    pub impact: Impact,
}

/// Whether the ambient run permits applying a recommended remediation
/// automatically rather than surfacing it to an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutomationPolicy {
    pub allow_safe_auto_apply: bool,
}

impl Diagnostic {
    /// Build a diagnostic with no remediations.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        class: FailureClass,
        title: impl Into<String>,
        message: impl Into<String>,
        fingerprint: Fingerprint,
        stage_name: impl Into<String>,
        impact: Impact,
    ) -> Self {
        Self {
            id: id.into(),
            class,
            title: title.into(),
            message: message.into(),
            fingerprint,
            stage_name: stage_name.into(),
            location: None,
            remediations: Vec::new(),
            fix_preview: None,
            impact,
        }
    }

    /// Build a diagnostic with remediations, enforcing that at most one is
    /// marked `recommended`, and only when its impact is [`Impact::Safe`]
    /// and the automation policy allows safe auto-apply.
    ///
    /// # Panics
    ///
    /// Panics if more than one remediation is marked `recommended`, or if a
    /// recommended remediation is proposed while `diagnostic.impact` is not
    /// [`Impact::Safe`] or the automation policy forbids it. This is a
    /// stage-authoring bug, not a runtime condition a caller can recover
    /// from.
    #[must_use]
    pub fn with_remediations(
        mut self,
        remediations: Vec<Remediation>,
        automation: AutomationPolicy,
    ) -> Self {
        let recommended_count = remediations.iter().filter(|r| r.recommended).count();
        assert!(
            recommended_count <= 1,
            "at most one remediation may be recommended"
        );
        if recommended_count == 1 {
            assert!(
                self.impact == Impact::Safe && automation.allow_safe_auto_apply,
                "a recommended remediation requires Impact::Safe and automation opt-in"
            );
        }
        self.remediations = remediations;
        self
    }
}

/// A candidate resolution for an ambiguous point in the intent model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub description: String,
    pub recommended_action: String,
}

/// A request for operator input when a stage cannot proceed without one.
///
/// Only ever attached to an [`FailureClass::InferenceFailure`] diagnostic
/// authored by a stage. The orchestrator's own synthesized resolution
/// requests (for example, on a fact store commit conflict) are constructed
/// directly by the orchestrator and are not subject to this gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub ambiguous_node: String,
    pub candidates: Vec<Candidate>,
    pub required_policy_hint: Option<String>,
    pub description: String,
}

impl ResolutionRequest {
    /// Attach a resolution request to a stage-authored diagnostic.
    ///
    /// # Panics
    ///
    /// Panics if `diagnostic.class` is not [`FailureClass::InferenceFailure`].
    #[must_use]
    pub fn attach_to(self, diagnostic: Diagnostic) -> (Diagnostic, Self) {
        assert!(
            diagnostic.class == FailureClass::InferenceFailure,
            "a resolution request may only attach to an InferenceFailure diagnostic"
        );
        (diagnostic, self)
    }
}
