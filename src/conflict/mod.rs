//! Doc/code conflict detection
//!
//! Compares the two signature collections of one logical unit and reports
//! where they disagree. Detection is deterministic: indexes are ordered maps
//! keyed by normalized entity name, so identical inputs always produce an
//! identical conflict list and identical summary counts. Conflicts are
//! derived data, recomputed every run.

use crate::extract::SignatureRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What kind of disagreement was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    MissingInDocs,
    MissingInCode,
    SignatureMismatch,
    DescriptionMismatch,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictType::MissingInDocs => write!(f, "missing-in-docs"),
            ConflictType::MissingInCode => write!(f, "missing-in-code"),
            ConflictType::SignatureMismatch => write!(f, "signature-mismatch"),
            ConflictType::DescriptionMismatch => write!(f, "description-mismatch"),
        }
    }
}

/// How serious a conflict is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::High => write!(f, "high"),
            Severity::Medium => write!(f, "medium"),
            Severity::Low => write!(f, "low"),
        }
    }
}

/// One detected disagreement between the doc and code view of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub entity: String,
    pub kind: ConflictType,
    pub severity: Severity,
    pub difference: String,
    pub suggestion: String,
    pub docs: Option<SignatureRecord>,
    pub code: Option<SignatureRecord>,
}

/// All conflicts of one detection run plus aggregate counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictReport {
    pub conflicts: Vec<Conflict>,
    pub counts_by_type: BTreeMap<String, u64>,
    pub counts_by_severity: BTreeMap<String, u64>,
}

impl ConflictReport {
    fn from_conflicts(conflicts: Vec<Conflict>) -> Self {
        let mut counts_by_type = BTreeMap::new();
        let mut counts_by_severity = BTreeMap::new();
        for conflict in &conflicts {
            *counts_by_type.entry(conflict.kind.to_string()).or_insert(0) += 1;
            *counts_by_severity
                .entry(conflict.severity.to_string())
                .or_insert(0) += 1;
        }
        Self {
            conflicts,
            counts_by_type,
            counts_by_severity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }
}

/// Detects all conflicts between a doc-extracted and a code-extracted batch
pub fn detect(docs: &[SignatureRecord], code: &[SignatureRecord]) -> ConflictReport {
    let doc_index = build_index(docs);
    let code_index = build_index(code);

    let mut conflicts = Vec::new();

    for (name, doc_record) in &doc_index {
        match code_index.get(name) {
            None => conflicts.push(Conflict {
                entity: name.clone(),
                kind: ConflictType::MissingInCode,
                severity: Severity::High,
                difference: format!("'{}' is documented but absent from the code", doc_record.name),
                suggestion: "remove the documentation entry or restore the implementation"
                    .to_string(),
                docs: Some(doc_record.clone()),
                code: None,
            }),
            Some(code_record) => {
                conflicts.extend(compare_pair(name, doc_record, code_record));
            }
        }
    }

    for (name, code_record) in &code_index {
        if !doc_index.contains_key(name) {
            conflicts.push(Conflict {
                entity: name.clone(),
                kind: ConflictType::MissingInDocs,
                severity: Severity::High,
                difference: format!("'{}' exists in code but is undocumented", code_record.name),
                suggestion: "add a documentation entry for this entity".to_string(),
                docs: None,
                code: Some(code_record.clone()),
            });
        }
    }

    ConflictReport::from_conflicts(conflicts)
}

/// Builds a name-keyed index, keeping one record per entity
///
/// When a name occurs more than once within one provenance, the occurrence
/// with more typed parameters wins; the discarded duplicate is logged.
fn build_index(records: &[SignatureRecord]) -> BTreeMap<String, SignatureRecord> {
    let mut index: BTreeMap<String, SignatureRecord> = BTreeMap::new();

    for record in records {
        let key = record.normalized_name();
        match index.get(&key) {
            Some(existing) if existing.hinted_param_count() >= record.hinted_param_count() => {
                tracing::debug!(
                    entity = %key,
                    kept = %existing.locator,
                    discarded = %record.locator,
                    "discarding duplicate signature with fewer type hints"
                );
            }
            Some(existing) => {
                tracing::debug!(
                    entity = %key,
                    kept = %record.locator,
                    discarded = %existing.locator,
                    "replacing duplicate signature with better-typed occurrence"
                );
                index.insert(key, record.clone());
            }
            None => {
                index.insert(key, record.clone());
            }
        }
    }

    index
}

/// Compares one entity present on both sides
fn compare_pair(
    name: &str,
    doc_record: &SignatureRecord,
    code_record: &SignatureRecord,
) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    if doc_record.params.len() != code_record.params.len() {
        conflicts.push(Conflict {
            entity: name.to_string(),
            kind: ConflictType::SignatureMismatch,
            severity: Severity::High,
            difference: format!(
                "documentation lists {} parameter(s) but the code takes {}",
                doc_record.params.len(),
                code_record.params.len()
            ),
            suggestion: "update the documented parameter list to match the code".to_string(),
            docs: Some(doc_record.clone()),
            code: Some(code_record.clone()),
        });
    } else if let Some(difference) = first_type_difference(doc_record, code_record) {
        conflicts.push(Conflict {
            entity: name.to_string(),
            kind: ConflictType::SignatureMismatch,
            severity: Severity::Medium,
            difference,
            suggestion: "align the documented types with the code".to_string(),
            docs: Some(doc_record.clone()),
            code: Some(code_record.clone()),
        });
    }

    if descriptions_differ(&doc_record.description, &code_record.description) {
        conflicts.push(Conflict {
            entity: name.to_string(),
            kind: ConflictType::DescriptionMismatch,
            severity: Severity::Low,
            difference: "the documented description differs from the code comment".to_string(),
            suggestion: "reconcile the two descriptions".to_string(),
            docs: Some(doc_record.clone()),
            code: Some(code_record.clone()),
        });
    }

    conflicts
}

/// First positional or return type that disagrees; only compared where both
/// sides carry a hint
fn first_type_difference(
    doc_record: &SignatureRecord,
    code_record: &SignatureRecord,
) -> Option<String> {
    for (doc_param, code_param) in doc_record.params.iter().zip(&code_record.params) {
        if let (Some(doc_ty), Some(code_ty)) = (&doc_param.type_hint, &code_param.type_hint) {
            if !types_equal(doc_ty, code_ty) {
                return Some(format!(
                    "parameter '{}' is documented as '{}' but typed '{}' in code",
                    code_param.name, doc_ty, code_ty
                ));
            }
        }
    }

    if let (Some(doc_ret), Some(code_ret)) = (&doc_record.return_type, &code_record.return_type) {
        if !types_equal(doc_ret, code_ret) {
            return Some(format!(
                "return type is documented as '{}' but the code returns '{}'",
                doc_ret, code_ret
            ));
        }
    }

    None
}

fn types_equal(a: &str, b: &str) -> bool {
    normalize_type(a) == normalize_type(b)
}

fn normalize_type(ty: &str) -> String {
    ty.split_whitespace().collect::<String>().to_lowercase()
}

/// Descriptions conflict only when both sides say something and disagree
/// after whitespace collapse and case folding
fn descriptions_differ(docs: &str, code: &str) -> bool {
    let docs = normalize_description(docs);
    let code = normalize_description(code);
    !docs.is_empty() && !code.is_empty() && docs != code
}

fn normalize_description(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
