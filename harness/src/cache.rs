//! Stage-level memoization keyed by `H(fingerprint || stage-name ||
//! stage-version || policy-versions)`.
//!
//! A second `put` under an existing key with a structurally different
//! value is a determinism violation, not a silent overwrite — it means
//! the same inputs produced two different outputs, which breaks every
//! downstream guarantee the cache exists to provide.

use std::collections::BTreeMap;
use std::sync::Mutex;

use forge_kernel::fingerprint::hash::{canonical_hash, ContentHash};
use forge_kernel::fingerprint::hash_domain::HashDomain;
use forge_kernel::fingerprint::Fingerprint;

use forge_kernel::facts::FactPayload;

use crate::stage::StageSuccess;

/// What the cache stores for one stage invocation: the stage's success
/// payload plus the fact snapshot it proposed, so a cache hit can be
/// replayed through `atomic_commit` exactly as a fresh execution would be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCacheEntry {
    pub success: StageSuccess,
    pub facts: BTreeMap<String, FactPayload>,
}

/// A determinism violation: the same cache key produced two different
/// outputs within one process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheViolation {
    pub key: ContentHash,
}

/// Compute the cache key for a stage invocation.
#[must_use]
pub fn cache_key(
    fingerprint: &Fingerprint,
    stage_name: &str,
    stage_version: &str,
    policy_versions: &BTreeMap<String, String>,
) -> ContentHash {
    let mut data = Vec::new();
    data.extend_from_slice(fingerprint.as_str().as_bytes());
    data.push(0);
    data.extend_from_slice(stage_name.as_bytes());
    data.push(0);
    data.extend_from_slice(stage_version.as_bytes());
    for (k, v) in policy_versions {
        data.push(0);
        data.extend_from_slice(k.as_bytes());
        data.push(b'=');
        data.extend_from_slice(v.as_bytes());
    }
    canonical_hash(HashDomain::CacheKey, &data)
}

/// Process-local stage output memoization.
///
/// This cache is never persisted; it is discarded when the process exits,
/// matching the design note that a cache entry's validity is scoped to
/// one process lifetime.
#[derive(Debug, Default)]
pub struct Cache {
    entries: Mutex<std::collections::HashMap<ContentHash, StageCacheEntry>>,
}

impl Cache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A fail-open lookup: any failure to read or interpret the cache
    /// collapses to "no cached result" rather than propagating an error.
    /// Key computation in this crate never fails, so this is currently a
    /// direct passthrough — it exists so a fallible cache backend could
    /// be substituted later without changing callers.
    #[must_use]
    pub fn lookup_or_none(&self, key: &ContentHash) -> Option<StageCacheEntry> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    /// Insert a stage's success output under its cache key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheViolation`] if `key` is already present with a
    /// structurally different value. The existing entry is left
    /// untouched.
    pub fn put(&self, key: ContentHash, value: StageCacheEntry) -> Result<(), CacheViolation> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&key) {
            Some(existing) if *existing == value => Ok(()),
            Some(_) => Err(CacheViolation { key }),
            None => {
                entries.insert(key, value);
                Ok(())
            }
        }
    }
}
