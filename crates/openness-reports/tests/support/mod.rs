// SPDX-License-Identifier: Apache-2.0

// Shared by multiple integration test binaries; not every binary uses every
// helper.
#![allow(dead_code)]

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use openness_model::{
    keys, Dataset, DatasetId, DatasetName, EntityState, Organization, OrganizationId,
    OrganizationName, Resource, ResourceId, StatusRecord, TaskType,
};
use openness_store::{
    add_membership, append_status, init_schema, insert_dataset, insert_organization,
    insert_resource, HierarchySnapshot, SqliteStatusStore,
};

pub fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("timestamp")
}

pub struct Fixture {
    pub conn: Connection,
}

impl Fixture {
    pub fn new() -> Self {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn).expect("schema");
        Self { conn }
    }

    pub fn store(&self) -> SqliteStatusStore<'_> {
        SqliteStatusStore::new(&self.conn)
    }

    pub fn hierarchy(&self) -> HierarchySnapshot {
        HierarchySnapshot::load(&self.conn).expect("hierarchy")
    }

    pub fn organization(&self, id: &str, name: &str, title: &str, parent: Option<&str>) {
        insert_organization(
            &self.conn,
            &Organization {
                id: OrganizationId::parse(id).expect("org id"),
                name: OrganizationName::parse(name).expect("org name"),
                title: title.to_string(),
                state: EntityState::Active,
                parent: parent.map(|p| OrganizationId::parse(p).expect("parent id")),
            },
        )
        .expect("insert organization");
    }

    pub fn dataset(&self, id: &str, name: &str, title: &str, organization: &str) {
        insert_dataset(
            &self.conn,
            &Dataset {
                id: DatasetId::parse(id).expect("dataset id"),
                name: DatasetName::parse(name).expect("dataset name"),
                title: title.to_string(),
                state: EntityState::Active,
            },
        )
        .expect("insert dataset");
        add_membership(
            &self.conn,
            &DatasetId::parse(id).expect("dataset id"),
            &OrganizationId::parse(organization).expect("org id"),
        )
        .expect("insert membership");
    }

    pub fn resource(&self, id: &str, dataset: &str, position: i64) {
        insert_resource(
            &self.conn,
            &Resource {
                id: ResourceId::parse(id).expect("resource id"),
                dataset_id: DatasetId::parse(dataset).expect("dataset id"),
                url: format!("http://data.example.org/{id}"),
                position,
                state: EntityState::Active,
            },
        )
        .expect("insert resource");
    }

    pub fn fact(
        &self,
        resource: &str,
        task: TaskType,
        key: &str,
        value: &str,
        error: Option<&str>,
        when: &str,
    ) {
        append_status(
            &self.conn,
            &StatusRecord {
                entity_id: ResourceId::parse(resource).expect("resource id"),
                task_type: task,
                key: key.to_string(),
                value: value.to_string(),
                error: error.map(String::from),
                last_updated: ts(when),
            },
        )
        .expect("append status");
    }

    pub fn qa_score(&self, resource: &str, score: &str, reason: Option<&str>, when: &str) {
        self.fact(resource, TaskType::Qa, keys::OPENNESS_SCORE, score, None, when);
        if let Some(reason) = reason {
            self.fact(
                resource,
                TaskType::Qa,
                keys::OPENNESS_SCORE_REASON,
                reason,
                None,
                when,
            );
        }
    }

    pub fn archiver_status(&self, resource: &str, status: &str, error: Option<&str>, when: &str) {
        self.fact(resource, TaskType::Archiver, keys::STATUS, status, error, when);
    }
}

pub fn org_name(name: &str) -> OrganizationName {
    OrganizationName::parse(name).expect("org name")
}
