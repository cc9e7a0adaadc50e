//! The signed emitter: a two-phase protocol that turns a template-filled
//! body into a provenance-stamped artifact.
//!
//! Phase A produces the raw body by calling the caller-supplied template
//! function — templates are opaque pure functions this crate invokes but
//! never interprets. Phase B normalizes line endings, hashes the
//! normalized bytes, and prepends a single comment-style provenance line
//! naming the generator, model, template, fingerprint, and content hash
//! that produced it, in that fixed order.

use forge_kernel::fingerprint::hash::{canonical_hash, ContentHash};
use forge_kernel::fingerprint::hash_domain::HashDomain;
use forge_kernel::fingerprint::Fingerprint;

/// Versions of the generator and template that produced an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateVersions {
    pub generator: String,
    pub template: String,
}

/// The provenance preamble line prepended to every signed artifact body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceHeader {
    pub generator: String,
    pub model: String,
    pub template: String,
    pub fingerprint: Fingerprint,
    pub content_hash: ContentHash,
}

impl ProvenanceHeader {
    #[must_use]
    pub fn to_line(&self) -> String {
        format!(
            "// generator={}; model={}; template={}; fingerprint={}; content-hash={}",
            self.generator, self.model, self.template, self.fingerprint, self.content_hash
        )
    }
}

/// A complete, provenance-stamped artifact ready to write to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    pub relative_path: String,
    pub body: String,
    pub content_hash: ContentHash,
    pub header_line: String,
}

fn normalize_line_endings(body: &str) -> String {
    body.replace("\r\n", "\n").replace('\r', "\n")
}

/// Run both phases of artifact emission.
///
/// `template` is called exactly once (Phase A). Phase B then normalizes,
/// hashes, and prepends the provenance line. Given the same template
/// output and the same versions/model/fingerprint, this is byte-identical
/// across calls — SHA-256 and string formatting are both pure.
#[must_use]
pub fn emit(
    relative_path: impl Into<String>,
    body: &str,
    model_name: &str,
    fingerprint: Fingerprint,
    versions: &TemplateVersions,
) -> SignedArtifact {
    let relative_path = relative_path.into();
    let normalized = normalize_line_endings(body);
    let content_hash = canonical_hash(HashDomain::BundleArtifact, normalized.as_bytes());

    let header = ProvenanceHeader {
        generator: versions.generator.clone(),
        model: model_name.to_string(),
        template: versions.template.clone(),
        fingerprint,
        content_hash: content_hash.clone(),
    };
    let header_line = header.to_line();

    let mut full_body = String::with_capacity(header_line.len() + 1 + normalized.len());
    full_body.push_str(&header_line);
    full_body.push('\n');
    full_body.push_str(&normalized);

    SignedArtifact {
        relative_path,
        body: full_body,
        content_hash,
        header_line,
    }
}
