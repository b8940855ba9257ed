// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};

use openness_model::{
    Dataset, DatasetId, DatasetName, Organization, OrganizationName, ResourceId, StatusRecord,
    TaskType,
};

use crate::error::StoreError;

/// Which resources qualify for a join query: those whose *latest* fact under
/// `(task_type, key)` satisfies the value predicate. With `key` unset, any
/// fact of the task type qualifies the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactGate {
    pub task_type: TaskType,
    pub key: Option<String>,
    pub value: ValuePredicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValuePredicate {
    Any,
    Equals(String),
    NotIn(Vec<String>),
}

/// Organization dimension of a join query. `Ungrouped` skips the membership
/// join entirely (dataset-level reports); `Named` restricts to the given
/// organization names, always bound as parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OrganizationScope {
    Ungrouped,
    AllOrganizations,
    Named(Vec<OrganizationName>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusJoinQuery {
    pub gate: FactGate,
    /// Restrict the returned fact rows themselves; `None` returns every
    /// latest fact of every task type for the gated resources.
    pub row_task_type: Option<TaskType>,
    pub row_key: Option<String>,
    /// Restrict to one dataset's resources.
    pub dataset: Option<DatasetId>,
    pub organizations: OrganizationScope,
}

/// One latest-fact row joined with its active resource/dataset (and
/// organization, when the scope groups by organization), as delivered by the
/// query boundary sorted by (dataset title, dataset name, resource position).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusJoinRow {
    pub resource_id: ResourceId,
    pub resource_url: String,
    pub resource_position: i64,
    pub dataset_id: DatasetId,
    pub dataset_name: DatasetName,
    pub dataset_title: String,
    pub organization_name: Option<OrganizationName>,
    pub organization_title: Option<String>,
    pub key: String,
    pub value: String,
    pub error: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Query contract over the status record store. The engine only reads;
/// implementations must bind every caller-supplied value as a parameter.
pub trait StatusFactSource {
    /// Latest facts per `(entity, task_type, key)`, optionally restricted to
    /// one key and/or a set of resources. Ordered by entity id, then key.
    fn records(
        &self,
        task_type: TaskType,
        key: Option<&str>,
        entity_ids: Option<&[ResourceId]>,
    ) -> Result<Vec<StatusRecord>, StoreError>;

    /// The detail join of status facts with active resources, datasets, and
    /// organizations, sorted by (dataset title, dataset name, resource
    /// position, resource id, key).
    fn status_join_rows(&self, query: &StatusJoinQuery) -> Result<Vec<StatusJoinRow>, StoreError>;

    /// Entity lookup backing the catalog report's not-found sentinel. Returns
    /// the dataset in any state; state filtering belongs to the join queries.
    fn dataset_by_id(&self, id: &DatasetId) -> Result<Option<Dataset>, StoreError>;
}

/// Parent/child relations between active organizations, loaded once per
/// report computation.
pub trait OrganizationHierarchy {
    fn by_name(&self, name: &OrganizationName) -> Option<&Organization>;

    /// Walks the parent chain from `org` (exclusive) to its root. A parent id
    /// missing from the snapshot terminates the walk there.
    fn ancestors(&self, org: &Organization) -> Vec<&Organization>;

    /// The subtree rooted at `org`, including `org` itself.
    fn descendants(&self, org: &Organization) -> Vec<&Organization>;
}
