use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use openness_model::{
    EntityState, Organization, OrganizationId, OrganizationName, ValidationError,
};

use crate::error::StoreError;
use crate::ports::OrganizationHierarchy;

/// Adjacency snapshot of the active organization forest, loaded once per
/// report computation and traversed in O(V+E).
pub struct HierarchySnapshot {
    by_id: BTreeMap<OrganizationId, Organization>,
    name_to_id: BTreeMap<OrganizationName, OrganizationId>,
    children: BTreeMap<OrganizationId, Vec<OrganizationId>>,
}

impl HierarchySnapshot {
    pub fn load(conn: &Connection) -> Result<Self, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT id, name, title, state, parent_id
             FROM organization
             WHERE state = 'active'",
        )?;
        let raw: Vec<(String, String, String, String, Option<String>)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })?
            .collect::<Result<_, _>>()?;

        let mut organizations = Vec::with_capacity(raw.len());
        for (id, name, title, state, parent_id) in raw {
            organizations.push(Organization {
                id: OrganizationId::parse(&id)?,
                name: OrganizationName::parse(&name)?,
                title,
                state: EntityState::parse(&state)?,
                parent: parent_id
                    .as_deref()
                    .map(OrganizationId::parse)
                    .transpose()?,
            });
        }
        Self::from_organizations(organizations).map_err(StoreError::from)
    }

    /// Builds a snapshot from an in-memory organization list. Inactive
    /// organizations are dropped, so anything reachable only through them
    /// falls out of every traversal.
    pub fn from_organizations(
        organizations: Vec<Organization>,
    ) -> Result<Self, ValidationError> {
        let mut by_id = BTreeMap::new();
        let mut name_to_id = BTreeMap::new();
        for org in organizations.into_iter().filter(|o| o.state.is_active()) {
            if name_to_id.insert(org.name.clone(), org.id.clone()).is_some() {
                return Err(ValidationError(format!(
                    "duplicate organization name: {}",
                    org.name
                )));
            }
            by_id.insert(org.id.clone(), org);
        }

        let mut children: BTreeMap<OrganizationId, Vec<OrganizationId>> = BTreeMap::new();
        for org in by_id.values() {
            if let Some(parent) = &org.parent {
                if by_id.contains_key(parent) {
                    children
                        .entry(parent.clone())
                        .or_default()
                        .push(org.id.clone());
                }
            }
        }
        for ids in children.values_mut() {
            ids.sort_by(|a, b| {
                let left = &by_id[a];
                let right = &by_id[b];
                (&left.title, &left.name).cmp(&(&right.title, &right.name))
            });
        }

        Ok(Self {
            by_id,
            name_to_id,
            children,
        })
    }

    pub fn organizations(&self) -> impl Iterator<Item = &Organization> {
        self.by_id.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl OrganizationHierarchy for HierarchySnapshot {
    fn by_name(&self, name: &OrganizationName) -> Option<&Organization> {
        self.name_to_id.get(name).and_then(|id| self.by_id.get(id))
    }

    fn ancestors(&self, org: &Organization) -> Vec<&Organization> {
        let mut chain = Vec::new();
        let mut visited: BTreeSet<&OrganizationId> = BTreeSet::new();
        visited.insert(&org.id);
        let mut next = org.parent.as_ref();
        while let Some(parent_id) = next {
            // A dangling or cyclic parent link terminates the walk.
            if !visited.insert(parent_id) {
                break;
            }
            let Some(parent) = self.by_id.get(parent_id) else {
                break;
            };
            chain.push(parent);
            next = parent.parent.as_ref();
        }
        chain
    }

    fn descendants(&self, org: &Organization) -> Vec<&Organization> {
        // An organization outside the snapshot has no reportable subtree.
        let Some(root) = self.by_id.get(&org.id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut visited: BTreeSet<&OrganizationId> = BTreeSet::new();
        let mut queue: VecDeque<&OrganizationId> = VecDeque::new();
        visited.insert(&root.id);
        queue.push_back(&root.id);
        while let Some(id) = queue.pop_front() {
            if let Some(found) = self.by_id.get(id) {
                out.push(found);
            }
            if let Some(children) = self.children.get(id) {
                for child in children {
                    if visited.insert(child) {
                        queue.push_back(child);
                    }
                }
            }
        }
        out
    }
}
