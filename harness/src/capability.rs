//! Declared capabilities and assertion sets: the static contract a stage
//! carries into the orchestrator, checked before the stage ever runs.

use std::collections::BTreeSet;

/// An external-input capability a stage declares it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Capability {
    FileRead,
    FileWrite,
    Network,
    Database,
    Environment,
}

/// The capabilities a stage declares. A cacheable stage must declare none.
pub type Capabilities = BTreeSet<Capability>;

/// Pre-flight requirements a stage places on the fact store before it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionSet {
    pub required: BTreeSet<String>,
    pub forbidden: BTreeSet<String>,
}

impl AssertionSet {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}
