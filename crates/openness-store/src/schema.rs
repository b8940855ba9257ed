// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};

use openness_model::{Dataset, DatasetId, Organization, OrganizationId, Resource, StatusRecord};

use crate::error::{StoreError, StoreErrorCode};

/// Timestamps are stored as fixed-width RFC 3339 TEXT so that lexicographic
/// comparison in SQL matches chronological order.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::new(
                StoreErrorCode::Validation,
                format!("bad last_updated {raw:?}: {e}"),
            )
        })
}

pub fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS organization (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL UNIQUE,
          title TEXT NOT NULL,
          state TEXT NOT NULL,
          parent_id TEXT
        );
        CREATE TABLE IF NOT EXISTS dataset (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL UNIQUE,
          title TEXT NOT NULL,
          state TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS membership (
          dataset_id TEXT NOT NULL REFERENCES dataset(id),
          organization_id TEXT NOT NULL REFERENCES organization(id),
          state TEXT NOT NULL,
          PRIMARY KEY (dataset_id, organization_id)
        );
        CREATE TABLE IF NOT EXISTS resource (
          id TEXT PRIMARY KEY,
          dataset_id TEXT NOT NULL REFERENCES dataset(id),
          url TEXT NOT NULL,
          position INTEGER NOT NULL,
          state TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS task_status (
          entity_id TEXT NOT NULL,
          task_type TEXT NOT NULL,
          key TEXT NOT NULL,
          value TEXT NOT NULL,
          error TEXT,
          last_updated TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_task_status_triple
          ON task_status(entity_id, task_type, key, last_updated);
        CREATE INDEX IF NOT EXISTS idx_resource_dataset ON resource(dataset_id);
        CREATE INDEX IF NOT EXISTS idx_membership_org ON membership(organization_id);
        ",
    )?;
    Ok(())
}

pub fn insert_organization(conn: &Connection, org: &Organization) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO organization (id, name, title, state, parent_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            org.id.as_str(),
            org.name.as_str(),
            org.title,
            org.state.as_str(),
            org.parent.as_ref().map(OrganizationId::as_str),
        ],
    )?;
    Ok(())
}

pub fn insert_dataset(conn: &Connection, dataset: &Dataset) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO dataset (id, name, title, state) VALUES (?1, ?2, ?3, ?4)",
        params![
            dataset.id.as_str(),
            dataset.name.as_str(),
            dataset.title,
            dataset.state.as_str(),
        ],
    )?;
    Ok(())
}

pub fn add_membership(
    conn: &Connection,
    dataset: &DatasetId,
    organization: &OrganizationId,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO membership (dataset_id, organization_id, state)
         VALUES (?1, ?2, 'active')",
        params![dataset.as_str(), organization.as_str()],
    )?;
    Ok(())
}

pub fn insert_resource(conn: &Connection, resource: &Resource) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO resource (id, dataset_id, url, position, state)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            resource.id.as_str(),
            resource.dataset_id.as_str(),
            resource.url,
            resource.position,
            resource.state.as_str(),
        ],
    )?;
    Ok(())
}

/// Appends a status fact. Historical rows are kept; readers resolve
/// last-write-wins per `(entity_id, task_type, key)` explicitly.
pub fn append_status(conn: &Connection, record: &StatusRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO task_status (entity_id, task_type, key, value, error, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.entity_id.as_str(),
            record.task_type.as_str(),
            record.key,
            record.value,
            record.error,
            format_timestamp(&record.last_updated),
        ],
    )?;
    Ok(())
}
