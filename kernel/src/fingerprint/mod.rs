//! Fingerprinting: a pure, total function from canonical inputs to a
//! content-addressed identity for a generation run.
//!
//! A fingerprint is `H(canon_intent || canon_manifest || canon_policies ||
//! generator_version)`: concatenation with no separators, since every
//! input is already self-delimiting canonical JSON (or, for the generator
//! version, a short ASCII string appended last). Two runs with
//! byte-identical inputs produce byte-identical fingerprints; this
//! function never fails.

pub mod canon;
pub mod hash;
pub mod hash_domain;

use hash::{canonical_hash, ContentHash};
use hash_domain::HashDomain;

/// The content-addressed identity of a generation run.
///
/// Equality is structural over the normalized hex digest; construction
/// from a raw string lower-cases the digest so two fingerprints that
/// differ only in hex case compare equal, matching the relaxed string
/// comparison used throughout the fact model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(ContentHash);

impl Fingerprint {
    /// Parse a fingerprint from its `"sha256:<hex>"` string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        ContentHash::parse(&s.to_ascii_lowercase()).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn content_hash(&self) -> &ContentHash {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Compute the fingerprint of a generation run from its canonical inputs.
///
/// Pure and total: given the same three canonical byte strings and the
/// same generator version, this always returns the same [`Fingerprint`],
/// and never fails.
#[must_use]
pub fn compute(
    canon_intent: &[u8],
    canon_manifest: &[u8],
    canon_policies: &[u8],
    generator_version: &str,
) -> Fingerprint {
    let mut data = Vec::with_capacity(
        canon_intent.len() + canon_manifest.len() + canon_policies.len() + generator_version.len(),
    );
    data.extend_from_slice(canon_intent);
    data.extend_from_slice(canon_manifest);
    data.extend_from_slice(canon_policies);
    data.extend_from_slice(generator_version.as_bytes());
    Fingerprint(canonical_hash(HashDomain::Fingerprint, &data))
}
