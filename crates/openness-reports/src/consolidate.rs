use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use openness_model::{keys, DatasetId, DatasetName, ExclusionSet, OrganizationName, ResourceId};
use openness_store::StatusJoinRow;

/// All per-key facts for one resource merged into a single record.
///
/// Derived per report computation and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsolidatedResourceStatus {
    pub resource_id: ResourceId,
    pub resource_url: String,
    pub resource_position: i64,
    pub dataset_id: DatasetId,
    pub dataset_name: DatasetName,
    pub dataset_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<OrganizationName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_title: Option<String>,
    /// Merged `key -> value` map; a key the worker has not written yet is
    /// absent, not defaulted.
    pub facts: BTreeMap<String, String>,
    /// Maximum `last_updated` over all merged facts.
    pub last_updated: DateTime<Utc>,
}

impl ConsolidatedResourceStatus {
    #[must_use]
    pub fn fact(&self, key: &str) -> Option<&str> {
        self.facts.get(key).map(String::as_str)
    }

    /// The openness score as a number; a missing or non-numeric value means
    /// the resource is unscored.
    #[must_use]
    pub fn openness_score(&self) -> Option<i64> {
        self.fact(keys::OPENNESS_SCORE).and_then(parse_score)
    }

    #[must_use]
    pub fn openness_score_reason(&self) -> Option<&str> {
        self.fact(keys::OPENNESS_SCORE_REASON)
    }

    #[must_use]
    pub fn archiver_status(&self) -> Option<&str> {
        self.fact(keys::STATUS)
    }
}

#[must_use]
pub fn parse_score(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

/// Collates the pre-sorted join-row stream into one consolidated record per
/// distinct resource, preserving arrival order (the stream is sorted by the
/// query boundary; this never re-sorts, only groups).
///
/// With an exclusion set, a consolidated record whose
/// `openness_score_reason` falls in the set is dropped at flush time: it is
/// not actually broken despite its failing score.
#[must_use]
pub fn collate_status_rows(
    rows: Vec<StatusJoinRow>,
    exclusions: Option<&ExclusionSet>,
) -> Vec<ConsolidatedResourceStatus> {
    let mut ordered: Vec<ConsolidatedResourceStatus> = Vec::new();
    let mut index: HashMap<ResourceId, usize> = HashMap::new();

    for row in rows {
        let slot = match index.get(&row.resource_id) {
            Some(&i) => i,
            None => {
                ordered.push(ConsolidatedResourceStatus {
                    resource_id: row.resource_id.clone(),
                    resource_url: row.resource_url.clone(),
                    resource_position: row.resource_position,
                    dataset_id: row.dataset_id.clone(),
                    dataset_name: row.dataset_name.clone(),
                    dataset_title: row.dataset_title.clone(),
                    organization_name: row.organization_name.clone(),
                    organization_title: row.organization_title.clone(),
                    facts: BTreeMap::new(),
                    last_updated: row.last_updated,
                });
                index.insert(row.resource_id.clone(), ordered.len() - 1);
                ordered.len() - 1
            }
        };
        let record = &mut ordered[slot];
        record.facts.insert(row.key, row.value);
        if row.last_updated > record.last_updated {
            record.last_updated = row.last_updated;
        }
    }

    match exclusions {
        None => ordered,
        Some(set) => ordered
            .into_iter()
            .filter(|record| {
                record
                    .openness_score_reason()
                    .map_or(true, |reason| !set.contains(reason))
            })
            .collect(),
    }
}
