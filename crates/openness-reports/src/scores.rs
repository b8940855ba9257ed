// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use openness_model::{keys, latest_by_key, DatasetId, DatasetName, ResourceId, TaskType};
use openness_store::{
    FactGate, OrganizationScope, StatusFactSource, StatusJoinQuery, StoreError, ValuePredicate,
};

use crate::consolidate::{parse_score, ConsolidatedResourceStatus};

/// Exclusion private to the legacy by-dataset report: a closed license is a
/// licensing problem, not a broken link.
const LICENSE_NOT_OPEN: &str = "License not open";

/// Picks the dataset's representative resource: the one with the maximum
/// openness score, ties resolved to the first occurrence in input order.
/// Unscored resources never win.
#[must_use]
pub fn best_scored_resource(
    records: &[ConsolidatedResourceStatus],
) -> Option<&ConsolidatedResourceStatus> {
    let mut best: Option<(&ConsolidatedResourceStatus, i64)> = None;
    for record in records {
        let Some(score) = record.openness_score() else {
            continue;
        };
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((record, score)),
        }
    }
    best.map(|(record, _)| record)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetScoreRow {
    pub dataset_name: DatasetName,
    pub dataset_title: String,
    pub openness_score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "datasets", rename_all = "snake_case")]
pub enum CatalogScoreReport {
    /// The requested dataset id has no matching entity. A sentinel, never an
    /// error crossing to callers.
    NotFound,
    Scores(Vec<DatasetScoreRow>),
}

/// Maximum openness score per active, scored dataset, ordered by dataset
/// title; optionally restricted to one dataset.
pub fn catalog_score_report(
    source: &dyn StatusFactSource,
    dataset: Option<&DatasetId>,
) -> Result<CatalogScoreReport, StoreError> {
    if let Some(id) = dataset {
        if source.dataset_by_id(id)?.is_none() {
            return Ok(CatalogScoreReport::NotFound);
        }
    }
    let rows = source.status_join_rows(&StatusJoinQuery {
        gate: FactGate {
            task_type: TaskType::Qa,
            key: Some(keys::OPENNESS_SCORE.to_string()),
            value: ValuePredicate::Any,
        },
        row_task_type: Some(TaskType::Qa),
        row_key: Some(keys::OPENNESS_SCORE.to_string()),
        dataset: dataset.cloned(),
        organizations: OrganizationScope::Ungrouped,
    })?;

    let mut ordered: Vec<DatasetScoreRow> = Vec::new();
    let mut index: HashMap<DatasetId, usize> = HashMap::new();
    for row in rows {
        let Some(score) = parse_score(&row.value) else {
            continue;
        };
        match index.get(&row.dataset_id) {
            Some(&slot) => {
                if score > ordered[slot].openness_score {
                    ordered[slot].openness_score = score;
                }
            }
            None => {
                index.insert(row.dataset_id.clone(), ordered.len());
                ordered.push(DatasetScoreRow {
                    dataset_name: row.dataset_name,
                    dataset_title: row.dataset_title,
                    openness_score: score,
                });
            }
        }
    }
    Ok(CatalogScoreReport::Scores(ordered))
}

/// One resource's openness facts, passed through directly. Missing keys stay
/// absent; an unknown resource id yields the empty report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceScoreReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openness_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openness_score_reason: Option<String>,
    /// Maximum `last_updated` over the score and reason facts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openness_updated: Option<DateTime<Utc>>,
}

pub fn resource_score_report(
    source: &dyn StatusFactSource,
    resource: &ResourceId,
) -> Result<ResourceScoreReport, StoreError> {
    let ids = [resource.clone()];
    let records = source.records(TaskType::Qa, None, Some(&ids))?;
    let latest = latest_by_key(records);

    let score = latest.get(keys::OPENNESS_SCORE);
    let reason = latest.get(keys::OPENNESS_SCORE_REASON);
    let mut updated: Option<DateTime<Utc>> = None;
    for record in [score, reason].into_iter().flatten() {
        if updated.map_or(true, |u| record.last_updated > u) {
            updated = Some(record.last_updated);
        }
    }
    Ok(ResourceScoreReport {
        openness_score: score.and_then(|r| parse_score(&r.value)),
        openness_score_reason: reason.map(|r| r.value.clone()),
        openness_updated: updated,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenResourceLink {
    pub url: String,
    pub openness_score_reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetBrokenLinks {
    pub dataset_name: DatasetName,
    pub dataset_title: String,
    pub resources: Vec<BrokenResourceLink>,
}

/// Datasets with at least one resource whose openness score is exactly zero,
/// grouped by dataset in title order. Uses the fixed `License not open`
/// exclusion; the configurable exclusion sets do not apply here.
pub fn broken_links_by_dataset_report(
    source: &dyn StatusFactSource,
) -> Result<Vec<DatasetBrokenLinks>, StoreError> {
    let rows = source.status_join_rows(&StatusJoinQuery {
        gate: FactGate {
            task_type: TaskType::Qa,
            key: Some(keys::OPENNESS_SCORE.to_string()),
            value: ValuePredicate::Equals("0".to_string()),
        },
        row_task_type: Some(TaskType::Qa),
        row_key: Some(keys::OPENNESS_SCORE_REASON.to_string()),
        dataset: None,
        organizations: OrganizationScope::Ungrouped,
    })?;

    let mut ordered: Vec<DatasetBrokenLinks> = Vec::new();
    let mut index: HashMap<DatasetId, usize> = HashMap::new();
    for row in rows {
        if row.value == LICENSE_NOT_OPEN {
            continue;
        }
        let link = BrokenResourceLink {
            url: row.resource_url,
            openness_score_reason: row.value,
        };
        match index.get(&row.dataset_id) {
            Some(&slot) => ordered[slot].resources.push(link),
            None => {
                index.insert(row.dataset_id.clone(), ordered.len());
                ordered.push(DatasetBrokenLinks {
                    dataset_name: row.dataset_name,
                    dataset_title: row.dataset_title,
                    resources: vec![link],
                });
            }
        }
    }
    Ok(ordered)
}
