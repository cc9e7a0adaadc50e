//! The intent model: a deeply immutable description of the domain model to
//! generate code for, and the canonicalizer that turns a raw JSON document
//! into one.
//!
//! Two intent trees that describe the same model, however their input JSON
//! was ordered or formatted, canonicalize to byte-identical output. This
//! is the property every downstream fingerprint and cache key depends on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diagnostics::FailureClass;
use crate::fingerprint::canon::{canonical_json_bytes, CanonError};

/// A single field on an intent entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: FieldType,
}

/// The closed vocabulary of field types this core understands.
///
/// This is intentionally small: the intent model describes shape, not a
/// full type system. Templates are responsible for mapping these tags to
/// whatever the target language calls them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Int,
    Bool,
    Id,
    Ref,
}

/// The kind of domain object an [`IntentEntry`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    ValueObject,
    Entity,
    Aggregate,
    Snapshot,
    Event,
    Repository,
    Collection,
}

/// One named entry in the intent model: a value object, entity, aggregate,
/// snapshot, event, repository, or collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntentEntry {
    pub kind: EntryKind,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// The canonicalized, structurally-validated intent model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentModel {
    pub model_version: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub entries: Vec<IntentEntry>,
}

/// A failure while canonicalizing a raw intent document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentError {
    /// The document's structure or version makes it impossible to interpret
    /// as an intent model at all.
    IntentViolation(IntentViolation),
    /// An unexpected internal failure (never triggered by valid documents).
    System(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentViolation {
    BadVersion { found: String },
    BadSyntax { detail: String },
    DuplicateSortKey { scope: String, name: String },
}

impl IntentError {
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::IntentViolation(_) => FailureClass::IntentViolation,
            Self::System(_) => FailureClass::System,
        }
    }
}

impl std::fmt::Display for IntentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IntentViolation(IntentViolation::BadVersion { found }) => {
                write!(f, "unsupported intent model_version: {found}")
            }
            Self::IntentViolation(IntentViolation::BadSyntax { detail }) => {
                write!(f, "malformed intent document: {detail}")
            }
            Self::IntentViolation(IntentViolation::DuplicateSortKey { scope, name }) => {
                write!(f, "duplicate sort key {name:?} within {scope}")
            }
            Self::System(detail) => write!(f, "internal canonicalization failure: {detail}"),
        }
    }
}

impl std::error::Error for IntentError {}

const SUPPORTED_MAJOR_VERSION: &str = "1";

/// Canonicalize a raw JSON document into canonical bytes and a structured
/// [`IntentModel`].
///
/// Steps: deserialize, verify the major version is `1`, normalize (trim
/// strings, default optional fields, fold `template_options` into entry
/// metadata under an `opt:` prefix), sort every sequence by name, then
/// serialize to canonical bytes.
///
/// # Errors
///
/// Returns [`IntentError::IntentViolation`] for a wrong major version, a
/// document that does not deserialize into the expected shape, or
/// duplicate entry names after sorting. Returns [`IntentError::System`] if
/// canonical serialization itself fails (unreachable for a document that
/// deserialized successfully, since every field that survives
/// deserialization is already integer/string/bool).
pub fn canonicalize(raw: &serde_json::Value) -> Result<(Vec<u8>, IntentModel), IntentError> {
    let mut raw_model: RawIntentModel = serde_json::from_value(raw.clone()).map_err(|e| {
        IntentError::IntentViolation(IntentViolation::BadSyntax {
            detail: e.to_string(),
        })
    })?;

    let major = raw_model
        .model_version
        .split('.')
        .next()
        .unwrap_or(&raw_model.model_version);
    if major != SUPPORTED_MAJOR_VERSION {
        return Err(IntentError::IntentViolation(IntentViolation::BadVersion {
            found: raw_model.model_version.clone(),
        }));
    }

    normalize(&mut raw_model);

    raw_model.entries.sort_by(|a, b| a.name.cmp(&b.name));
    for window in raw_model.entries.windows(2) {
        if window[0].name == window[1].name {
            return Err(IntentError::IntentViolation(
                IntentViolation::DuplicateSortKey {
                    scope: "entries".to_string(),
                    name: window[0].name.clone(),
                },
            ));
        }
    }
    for entry in &mut raw_model.entries {
        entry.fields.sort_by(|a, b| a.name.cmp(&b.name));
        for window in entry.fields.windows(2) {
            if window[0].name == window[1].name {
                return Err(IntentError::IntentViolation(
                    IntentViolation::DuplicateSortKey {
                        scope: format!("entries[{}].fields", entry.name),
                        name: window[0].name.clone(),
                    },
                ));
            }
        }
    }

    let model = IntentModel {
        model_version: raw_model.model_version.clone(),
        metadata: raw_model.metadata.clone(),
        entries: raw_model
            .entries
            .iter()
            .map(|e| IntentEntry {
                kind: e.kind,
                name: e.name.clone(),
                fields: e.fields.clone(),
                metadata: e.metadata.clone(),
            })
            .collect(),
    };

    let value = serde_json::to_value(&model).map_err(|e| IntentError::System(e.to_string()))?;
    let bytes = canonical_json_bytes(&value).map_err(|e: CanonError| {
        IntentError::System(format!("canonical serialization failed: {e}"))
    })?;

    Ok((bytes, model))
}

/// The loosely-typed shape accepted on input, before normalization.
#[derive(Debug, Clone, Deserialize)]
struct RawIntentModel {
    model_version: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    entries: Vec<RawIntentEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawIntentEntry {
    kind: EntryKind,
    name: String,
    #[serde(default)]
    fields: Vec<Field>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    template_options: BTreeMap<String, String>,
}

fn normalize(model: &mut RawIntentModel) {
    model.model_version = model.model_version.trim().to_string();
    for (_, v) in model.metadata.iter_mut() {
        *v = v.trim().to_string();
    }
    for entry in &mut model.entries {
        entry.name = entry.name.trim().to_string();
        for field in &mut entry.fields {
            field.name = field.name.trim().to_string();
        }
        for (k, v) in std::mem::take(&mut entry.template_options) {
            entry.metadata.insert(format!("opt:{k}"), v.trim().to_string());
        }
    }
}
