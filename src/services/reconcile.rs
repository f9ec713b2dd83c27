//! Cross Source Reconciler
//!
//! Joins cleaned records to raw records through an optional foreign key.
//! Every record of either side ends up in exactly one merged row; a missing
//! or stale key only leaves the corresponding id empty.

use super::dates::{normalize_date, DateValue};
use crate::db::RecordId;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Record from the authoritative (cleaned) side
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: RecordId,
    pub foreign_key: Option<RecordId>,
    pub company_id: Option<RecordId>,
    pub url: String,
    pub date: DateValue,
}

/// Record from the raw side
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRecord {
    pub id: RecordId,
    pub company_id: Option<RecordId>,
    pub url: String,
    pub date: DateValue,
}

/// One reconciled row; ids are empty strings when a side is absent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRecord {
    pub datasource_id: String,
    pub raw_id: String,
    pub company_id: String,
    pub company_name: String,
    pub url: String,
    pub date: String,
}

/// Resolves company ids to display names
pub trait CompanyLookup {
    fn company_name(&self, id: &RecordId) -> Option<&str>;
}

impl CompanyLookup for HashMap<RecordId, String> {
    fn company_name(&self, id: &RecordId) -> Option<&str> {
        self.get(id).map(String::as_str)
    }
}

/// Finds a source record that points at a target, regardless of its day
pub trait ReverseLookup {
    fn source_for(&self, target: &RecordId) -> Option<&RecordId>;
}

impl ReverseLookup for HashMap<RecordId, RecordId> {
    fn source_for(&self, target: &RecordId) -> Option<&RecordId> {
        self.get(target)
    }
}

fn company_fields(id: Option<&RecordId>, companies: &impl CompanyLookup) -> (String, String) {
    match id {
        Some(id) => {
            let name = companies.company_name(id).unwrap_or_else(|| {
                debug!("Company {} not found, using empty name", id);
                ""
            });
            (id.to_string(), name.to_string())
        }
        None => (String::new(), String::new()),
    }
}

/// Target ids no source claims through its foreign key
pub fn unclaimed_targets(sources: &[SourceRecord], targets: &[TargetRecord]) -> Vec<RecordId> {
    let keys: HashSet<&RecordId> = sources.iter().filter_map(|s| s.foreign_key.as_ref()).collect();
    targets
        .iter()
        .filter(|t| !keys.contains(&t.id))
        .map(|t| t.id.clone())
        .collect()
}

/// Merge both sides.
///
/// Source rows come first in source order, then unclaimed targets in target
/// order. A target is claimed by the first source whose key resolves to it.
pub fn reconcile(
    sources: &[SourceRecord],
    targets: &[TargetRecord],
    companies: &impl CompanyLookup,
    reverse: &impl ReverseLookup,
) -> Vec<MergedRecord> {
    let target_ids: HashSet<&RecordId> = targets.iter().map(|t| &t.id).collect();
    let mut claimed: HashSet<&RecordId> = HashSet::with_capacity(targets.len());
    let mut merged = Vec::with_capacity(sources.len() + targets.len());

    for source in sources {
        let raw_id = match source.foreign_key.as_ref() {
            Some(key) if target_ids.contains(key) && claimed.insert(key) => key.to_string(),
            Some(key) => {
                debug!("Source {} key {} unresolved or already claimed", source.id, key);
                String::new()
            }
            None => String::new(),
        };

        let (company_id, company_name) = company_fields(source.company_id.as_ref(), companies);
        merged.push(MergedRecord {
            datasource_id: source.id.to_string(),
            raw_id,
            company_id,
            company_name,
            url: source.url.clone(),
            date: normalize_date(&source.date),
        });
    }

    for target in targets.iter().filter(|t| !claimed.contains(&t.id)) {
        let datasource_id = reverse
            .source_for(&target.id)
            .map(RecordId::to_string)
            .unwrap_or_default();

        let (company_id, company_name) = company_fields(target.company_id.as_ref(), companies);
        merged.push(MergedRecord {
            datasource_id,
            raw_id: target.id.to_string(),
            company_id,
            company_name,
            url: target.url.clone(),
            date: normalize_date(&target.date),
        });
    }

    merged
}
