use serde::{Deserialize, Serialize};

use crate::ident::{
    DatasetId, DatasetName, EntityState, OrganizationId, OrganizationName, ResourceId,
};

/// An individually addressable data file belonging to a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resource {
    pub id: ResourceId,
    pub dataset_id: DatasetId,
    pub url: String,
    pub position: i64,
    pub state: EntityState,
}

/// A named, titled collection of resources. Belongs to zero-or-more
/// organizations via a membership relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dataset {
    pub id: DatasetId,
    pub name: DatasetName,
    pub title: String,
    pub state: EntityState,
}

/// A node in a rooted forest; each node has at most one parent. Archived
/// organizations and anything reachable only through them are excluded from
/// all reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Organization {
    pub id: OrganizationId,
    pub name: OrganizationName,
    pub title: String,
    pub state: EntityState,
    pub parent: Option<OrganizationId>,
}

impl Organization {
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
