//! Rule-based corpus merger
//!
//! Folds every configured source into one [`MergedCorpus`]. The merge is a
//! pure function of its inputs: identical batches and policy always produce
//! an identical corpus, aside from the caller-supplied timestamp. Field
//! policy decides which side wins each field; any disagreement the policy
//! leaves unresolved stays attached to the entry as a conflict.

use crate::config::{FieldPreference, MergeConfig};
use crate::conflict::{self, Conflict, ConflictReport};
use crate::extract::{Provenance, SignatureRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything one source contributed: plain pages and/or signatures
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub source: String,
    pub pages: Vec<MergedPage>,
    pub docs: Vec<SignatureRecord>,
    pub code: Vec<SignatureRecord>,
}

/// A crawled page carried into the corpus as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedPage {
    pub source: String,
    pub url: String,
    #[serde(rename = "fetched-at")]
    pub fetched_at: String,
}

/// One corpus entry: a plain page or a unified signature entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum MergedEntry {
    Page(MergedPage),
    Entity {
        name: String,
        signature: SignatureRecord,
        conflicts: Vec<Conflict>,
    },
}

/// Aggregate counts over the whole corpus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusSummary {
    pub pages: u64,
    pub entities: u64,
    pub conflicts: u64,
    #[serde(rename = "conflicts-by-type")]
    pub conflicts_by_type: BTreeMap<String, u64>,
    #[serde(rename = "conflicts-by-severity")]
    pub conflicts_by_severity: BTreeMap<String, u64>,
}

/// The single artifact the pipeline hands downstream; read-only once built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedCorpus {
    pub name: String,
    pub entries: Vec<MergedEntry>,
    pub summary: CorpusSummary,
    #[serde(rename = "generated-at")]
    pub generated_at: DateTime<Utc>,
}

/// Merges all source batches into one corpus
///
/// Pages keep source-declaration order; entities follow, in name order.
/// Signatures from every source share one entity space, so a doc-extracted
/// record in one source can pair with a code-extracted record in another.
pub fn merge_sources(
    corpus_name: &str,
    policy: &MergeConfig,
    batches: &[SourceBatch],
    generated_at: DateTime<Utc>,
) -> MergedCorpus {
    let mut entries = Vec::new();
    let mut docs = Vec::new();
    let mut code = Vec::new();

    for batch in batches {
        for page in &batch.pages {
            entries.push(MergedEntry::Page(page.clone()));
        }
        docs.extend(batch.docs.iter().cloned());
        code.extend(batch.code.iter().cloned());
    }

    let report = conflict::detect(&docs, &code);
    let page_count = entries.len() as u64;

    for (name, signature, conflicts) in unify_entities(policy, &docs, &code, &report) {
        entries.push(MergedEntry::Entity {
            name,
            signature,
            conflicts,
        });
    }

    let summary = CorpusSummary {
        pages: page_count,
        entities: entries.len() as u64 - page_count,
        conflicts: report.conflicts.len() as u64,
        conflicts_by_type: report.counts_by_type.clone(),
        conflicts_by_severity: report.counts_by_severity.clone(),
    };

    MergedCorpus {
        name: corpus_name.to_string(),
        entries,
        summary,
        generated_at,
    }
}

/// Produces one unified record per entity name, with its conflicts attached
fn unify_entities(
    policy: &MergeConfig,
    docs: &[SignatureRecord],
    code: &[SignatureRecord],
    report: &ConflictReport,
) -> Vec<(String, SignatureRecord, Vec<Conflict>)> {
    let doc_index = index_best(docs);
    let code_index = index_best(code);

    let mut names: Vec<&String> = doc_index.keys().chain(code_index.keys()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .map(|name| {
            let doc_record = doc_index.get(name);
            let code_record = code_index.get(name);
            let signature = apply_policy(policy, doc_record, code_record);
            let conflicts = report
                .conflicts
                .iter()
                .filter(|c| &c.entity == name)
                .cloned()
                .collect();
            (name.clone(), signature, conflicts)
        })
        .collect()
}

/// Same duplicate handling as the conflict detector, so the merged record
/// and the reported conflicts describe the same occurrence
fn index_best(records: &[SignatureRecord]) -> BTreeMap<String, SignatureRecord> {
    let mut index: BTreeMap<String, SignatureRecord> = BTreeMap::new();
    for record in records {
        let key = record.normalized_name();
        match index.get(&key) {
            Some(existing) if existing.hinted_param_count() >= record.hinted_param_count() => {}
            _ => {
                index.insert(key, record.clone());
            }
        }
    }
    index
}

/// Builds the unified signature for one entity under the field policy
///
/// Structural fields (name, parameters, return type, locator) come from the
/// preferred structural side; the description comes from the preferred prose
/// side. A side that is absent or empty falls back to the other.
fn apply_policy(
    policy: &MergeConfig,
    doc_record: Option<&SignatureRecord>,
    code_record: Option<&SignatureRecord>,
) -> SignatureRecord {
    let pick = |preference: FieldPreference| match preference {
        FieldPreference::Code => code_record.or(doc_record),
        FieldPreference::Docs => doc_record.or(code_record),
    };

    // At least one side exists for every entity name considered
    let structural = pick(policy.structural).expect("entity has at least one record");
    let mut merged = structural.clone();

    if let Some(prose) = pick(policy.prose) {
        if !prose.description.trim().is_empty() {
            merged.description = prose.description.clone();
        } else {
            let other = match policy.prose {
                FieldPreference::Code => doc_record,
                FieldPreference::Docs => code_record,
            };
            if let Some(other) = other {
                merged.description = other.description.clone();
            }
        }
    }

    // A structural side without a return type still benefits from the other
    // side's knowledge of it
    if merged.return_type.is_none() {
        if let Some(other) = match merged.provenance {
            Provenance::Code => doc_record,
            Provenance::Docs => code_record,
        } {
            merged.return_type = other.return_type.clone();
        }
    }

    merged
}
