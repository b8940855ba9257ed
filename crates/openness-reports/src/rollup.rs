// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use openness_model::{
    keys, ArchivalDetails, DatasetId, DatasetName, ExclusionSet, Organization, OrganizationName,
    ResourceId, TaskType,
};
use openness_store::{
    FactGate, OrganizationHierarchy, OrganizationScope, StatusFactSource, StatusJoinQuery,
    StatusJoinRow, StoreError, ValuePredicate,
};

use crate::consolidate::{collate_status_rows, ConsolidatedResourceStatus};
use crate::scores::best_scored_resource;

/// What counts as a broken resource for the organization rollups.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BrokenSpec {
    /// The latest archiver `status` differs from every healthy status.
    ArchiverStatus { healthy: ExclusionSet },
    /// The latest openness score is exactly zero and the reason is not in
    /// the exclusion set.
    ZeroScore { excluded_reasons: ExclusionSet },
}

impl BrokenSpec {
    #[must_use]
    pub fn archiver_default() -> Self {
        Self::ArchiverStatus {
            healthy: ExclusionSet::healthy_archiver_statuses(),
        }
    }

    #[must_use]
    pub fn zero_score_default() -> Self {
        Self::ZeroScore {
            excluded_reasons: ExclusionSet::not_broken_but_zero_stars(),
        }
    }

    fn join_query(&self, organizations: OrganizationScope) -> StatusJoinQuery {
        match self {
            Self::ArchiverStatus { healthy } => StatusJoinQuery {
                gate: FactGate {
                    task_type: TaskType::Archiver,
                    key: Some(keys::STATUS.to_string()),
                    value: ValuePredicate::NotIn(healthy.iter().map(String::from).collect()),
                },
                row_task_type: Some(TaskType::Archiver),
                row_key: Some(keys::STATUS.to_string()),
                dataset: None,
                organizations,
            },
            Self::ZeroScore { .. } => StatusJoinQuery {
                gate: FactGate {
                    task_type: TaskType::Qa,
                    key: Some(keys::OPENNESS_SCORE.to_string()),
                    value: ValuePredicate::Equals("0".to_string()),
                },
                row_task_type: Some(TaskType::Qa),
                row_key: None,
                dataset: None,
                organizations,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationBrokenCounts {
    pub organization_name: OrganizationName,
    pub organization_title: String,
    pub broken_package_count: u64,
    pub broken_resource_count: u64,
}

#[derive(Debug, Default)]
struct OwnCounts {
    title: String,
    packages: BTreeSet<DatasetId>,
    resources: u64,
}

/// Per-organization broken counts from the join rows. Every organization
/// with candidate rows gets an entry, so exclusion filtering can legitimately
/// leave zero counts.
fn fold_broken_by_organization(
    rows: Vec<StatusJoinRow>,
    spec: &BrokenSpec,
) -> BTreeMap<OrganizationName, OwnCounts> {
    let mut own: BTreeMap<OrganizationName, OwnCounts> = BTreeMap::new();

    match spec {
        BrokenSpec::ArchiverStatus { .. } => {
            for row in rows {
                let Some(org_name) = row.organization_name else {
                    continue;
                };
                let entry = own.entry(org_name).or_default();
                if entry.title.is_empty() {
                    entry.title = row.organization_title.unwrap_or_default();
                }
                entry.packages.insert(row.dataset_id);
                entry.resources += 1;
            }
        }
        BrokenSpec::ZeroScore { excluded_reasons } => {
            struct Candidate {
                dataset_id: DatasetId,
                reason: Option<String>,
            }
            let mut candidates: BTreeMap<(OrganizationName, ResourceId), Candidate> =
                BTreeMap::new();
            for row in rows {
                let Some(org_name) = row.organization_name else {
                    continue;
                };
                let entry = own.entry(org_name.clone()).or_default();
                if entry.title.is_empty() {
                    entry.title = row.organization_title.clone().unwrap_or_default();
                }
                let candidate = candidates
                    .entry((org_name, row.resource_id))
                    .or_insert(Candidate {
                        dataset_id: row.dataset_id,
                        reason: None,
                    });
                if row.key == keys::OPENNESS_SCORE_REASON {
                    candidate.reason = Some(row.value);
                }
            }
            for ((org_name, _), candidate) in candidates {
                let broken = candidate
                    .reason
                    .as_deref()
                    .map_or(true, |reason| !excluded_reasons.contains(reason));
                if !broken {
                    continue;
                }
                if let Some(entry) = own.get_mut(&org_name) {
                    entry.packages.insert(candidate.dataset_id);
                    entry.resources += 1;
                }
            }
        }
    }
    own
}

fn sorted_counts(
    entries: impl IntoIterator<Item = OrganizationBrokenCounts>,
) -> Vec<OrganizationBrokenCounts> {
    openness_core::canonical::sorted_by_key(entries.into_iter().collect(), |c| {
        (c.organization_title.clone(), c.organization_name.clone())
    })
}

/// Broken-package/broken-resource counts per organization, ordered by title.
///
/// In rollup mode each organization contributes its own counts to itself and
/// to every ancestor reachable along the parent chain, exactly once; an
/// ancestor's counts are then the additive sums of its subtree.
pub fn organization_broken_counts(
    source: &dyn StatusFactSource,
    hierarchy: &dyn OrganizationHierarchy,
    spec: &BrokenSpec,
    include_sub_organizations: bool,
) -> Result<Vec<OrganizationBrokenCounts>, StoreError> {
    let rows = source.status_join_rows(&spec.join_query(OrganizationScope::AllOrganizations))?;
    let own = fold_broken_by_organization(rows, spec);
    debug!(organizations = own.len(), rollup = include_sub_organizations, "broken counts");

    if !include_sub_organizations {
        return Ok(sorted_counts(own.into_iter().map(|(name, acc)| {
            OrganizationBrokenCounts {
                organization_name: name,
                organization_title: acc.title,
                broken_package_count: acc.packages.len() as u64,
                broken_resource_count: acc.resources,
            }
        })));
    }

    struct Rolled {
        title: String,
        packages: u64,
        resources: u64,
    }
    let mut rolled: BTreeMap<OrganizationName, Rolled> = BTreeMap::new();
    for (name, acc) in &own {
        let packages = acc.packages.len() as u64;
        let resources = acc.resources;
        let targets: Vec<(OrganizationName, String)> = match hierarchy.by_name(name) {
            Some(org) => {
                let mut chain = vec![(org.name.clone(), org.title.clone())];
                chain.extend(
                    hierarchy
                        .ancestors(org)
                        .into_iter()
                        .map(|a| (a.name.clone(), a.title.clone())),
                );
                chain
            }
            // The organization dropped out of the hierarchy snapshot between
            // the two reads; count it standalone.
            None => vec![(name.clone(), acc.title.clone())],
        };
        for (target_name, target_title) in targets {
            let entry = rolled.entry(target_name).or_insert(Rolled {
                title: target_title,
                packages: 0,
                resources: 0,
            });
            entry.packages += packages;
            entry.resources += resources;
        }
    }

    Ok(sorted_counts(rolled.into_iter().map(|(name, acc)| {
        OrganizationBrokenCounts {
            organization_name: name,
            organization_title: acc.title,
            broken_package_count: acc.packages,
            broken_resource_count: acc.resources,
        }
    })))
}

fn organization_scope(
    hierarchy: &dyn OrganizationHierarchy,
    org: &Organization,
    include_sub_organizations: bool,
) -> Vec<OrganizationName> {
    if include_sub_organizations {
        hierarchy
            .descendants(org)
            .into_iter()
            .map(|o| o.name.clone())
            .collect()
    } else {
        vec![org.name.clone()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenLinkDetailRow {
    pub dataset_name: DatasetName,
    pub dataset_title: String,
    pub organization_name: OrganizationName,
    pub organization_title: String,
    pub resource_position: i64,
    pub resource_id: ResourceId,
    pub resource_url: String,
    pub status: String,
    #[serde(flatten)]
    pub archival: ArchivalDetails,
    pub last_updated: DateTime<Utc>,
}

/// Detail rows for one organization's broken resources. An unknown
/// organization name yields the empty report, never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationBrokenDetailReport {
    pub organization_name: String,
    pub organization_title: String,
    pub data: Vec<BrokenLinkDetailRow>,
}

impl OrganizationBrokenDetailReport {
    fn not_found() -> Self {
        Self {
            organization_name: String::new(),
            organization_title: String::new(),
            data: Vec::new(),
        }
    }
}

pub fn broken_links_for_organization(
    source: &dyn StatusFactSource,
    hierarchy: &dyn OrganizationHierarchy,
    name: &OrganizationName,
    include_sub_organizations: bool,
    healthy: &ExclusionSet,
) -> Result<OrganizationBrokenDetailReport, StoreError> {
    let Some(org) = hierarchy.by_name(name) else {
        return Ok(OrganizationBrokenDetailReport::not_found());
    };
    let scope = organization_scope(hierarchy, org, include_sub_organizations);
    let spec = BrokenSpec::ArchiverStatus {
        healthy: healthy.clone(),
    };
    let rows = source.status_join_rows(&spec.join_query(OrganizationScope::Named(scope)))?;

    let mut data = Vec::with_capacity(rows.len());
    for row in rows {
        let (Some(org_name), Some(org_title)) = (row.organization_name, row.organization_title)
        else {
            continue;
        };
        data.push(BrokenLinkDetailRow {
            dataset_name: row.dataset_name,
            dataset_title: row.dataset_title,
            organization_name: org_name,
            organization_title: org_title,
            resource_position: row.resource_position,
            resource_id: row.resource_id,
            resource_url: row.resource_url,
            status: row.value,
            archival: row
                .error
                .as_deref()
                .map(ArchivalDetails::parse_lenient)
                .unwrap_or_default(),
            last_updated: row.last_updated,
        });
    }
    Ok(OrganizationBrokenDetailReport {
        organization_name: org.name.as_str().to_string(),
        organization_title: org.title.clone(),
        data,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetScoreDetailRow {
    pub dataset_name: DatasetName,
    pub dataset_title: String,
    pub resource_id: ResourceId,
    pub resource_url: String,
    pub resource_position: i64,
    pub openness_score: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openness_score_reason: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationDatasetScoresReport {
    pub organization_name: String,
    pub organization_title: String,
    pub data: Vec<DatasetScoreDetailRow>,
}

impl OrganizationDatasetScoresReport {
    fn not_found() -> Self {
        Self {
            organization_name: String::new(),
            organization_title: String::new(),
            data: Vec::new(),
        }
    }
}

/// Per dataset of the organization, the highest-scoring resource's openness
/// tuple. Datasets with no scored resource are omitted.
pub fn dataset_scores_for_organization(
    source: &dyn StatusFactSource,
    hierarchy: &dyn OrganizationHierarchy,
    name: &OrganizationName,
    include_sub_organizations: bool,
) -> Result<OrganizationDatasetScoresReport, StoreError> {
    let Some(org) = hierarchy.by_name(name) else {
        return Ok(OrganizationDatasetScoresReport::not_found());
    };
    let scope = organization_scope(hierarchy, org, include_sub_organizations);
    let rows = source.status_join_rows(&StatusJoinQuery {
        gate: FactGate {
            task_type: TaskType::Qa,
            key: None,
            value: ValuePredicate::Any,
        },
        row_task_type: Some(TaskType::Qa),
        row_key: None,
        dataset: None,
        organizations: OrganizationScope::Named(scope),
    })?;
    let consolidated = collate_status_rows(rows, None);

    let mut per_dataset: Vec<(DatasetId, Vec<ConsolidatedResourceStatus>)> = Vec::new();
    let mut index: HashMap<DatasetId, usize> = HashMap::new();
    for record in consolidated {
        match index.get(&record.dataset_id) {
            Some(&slot) => per_dataset[slot].1.push(record),
            None => {
                index.insert(record.dataset_id.clone(), per_dataset.len());
                per_dataset.push((record.dataset_id.clone(), vec![record]));
            }
        }
    }

    let mut data = Vec::new();
    for (_, records) in &per_dataset {
        let Some(best) = best_scored_resource(records) else {
            continue;
        };
        let Some(score) = best.openness_score() else {
            continue;
        };
        data.push(DatasetScoreDetailRow {
            dataset_name: best.dataset_name.clone(),
            dataset_title: best.dataset_title.clone(),
            resource_id: best.resource_id.clone(),
            resource_url: best.resource_url.clone(),
            resource_position: best.resource_position,
            openness_score: score,
            openness_score_reason: best.openness_score_reason().map(String::from),
            last_updated: best.last_updated,
        });
    }
    Ok(OrganizationDatasetScoresReport {
        organization_name: org.name.as_str().to_string(),
        organization_title: org.title.clone(),
        data,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokenScoreRow {
    pub dataset_name: DatasetName,
    pub dataset_title: String,
    pub resource_id: ResourceId,
    pub resource_url: String,
    pub resource_position: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openness_score: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openness_score_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archiver_status: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationBrokenScoresReport {
    pub organization_name: String,
    pub organization_title: String,
    pub broken_resources: Vec<BrokenScoreRow>,
}

impl OrganizationBrokenScoresReport {
    fn not_found() -> Self {
        Self {
            organization_name: String::new(),
            organization_title: String::new(),
            broken_resources: Vec::new(),
        }
    }
}

/// Resources of the organization whose link-health check failed, collated
/// over every task's facts, with the zero-star exclusion applied at flush.
pub fn broken_scores_for_organization(
    source: &dyn StatusFactSource,
    hierarchy: &dyn OrganizationHierarchy,
    name: &OrganizationName,
    excluded_reasons: &ExclusionSet,
    healthy: &ExclusionSet,
) -> Result<OrganizationBrokenScoresReport, StoreError> {
    let Some(org) = hierarchy.by_name(name) else {
        return Ok(OrganizationBrokenScoresReport::not_found());
    };
    let rows = source.status_join_rows(&StatusJoinQuery {
        gate: FactGate {
            task_type: TaskType::Archiver,
            key: Some(keys::STATUS.to_string()),
            value: ValuePredicate::NotIn(healthy.iter().map(String::from).collect()),
        },
        row_task_type: None,
        row_key: None,
        dataset: None,
        organizations: OrganizationScope::Named(vec![org.name.clone()]),
    })?;
    let consolidated = collate_status_rows(rows, Some(excluded_reasons));

    let broken_resources = consolidated
        .into_iter()
        .map(|record| BrokenScoreRow {
            dataset_name: record.dataset_name.clone(),
            dataset_title: record.dataset_title.clone(),
            resource_id: record.resource_id.clone(),
            resource_url: record.resource_url.clone(),
            resource_position: record.resource_position,
            openness_score: record.openness_score(),
            openness_score_reason: record.openness_score_reason().map(String::from),
            archiver_status: record.archiver_status().map(String::from),
            last_updated: record.last_updated,
        })
        .collect();
    Ok(OrganizationBrokenScoresReport {
        organization_name: org.name.as_str().to_string(),
        organization_title: org.title.clone(),
        broken_resources,
    })
}
