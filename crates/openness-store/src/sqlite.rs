// SPDX-License-Identifier: Apache-2.0

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use openness_model::{
    Dataset, DatasetId, DatasetName, EntityState, OrganizationName, ResourceId, StatusRecord,
    TaskType,
};

use crate::error::StoreError;
use crate::ports::{
    FactGate, OrganizationScope, StatusFactSource, StatusJoinQuery, StatusJoinRow, ValuePredicate,
};
use crate::schema::parse_timestamp;

/// Resolves last-write-wins explicitly: for each `(entity_id, task_type,
/// key)` the row with the greatest `last_updated` wins, insertion order
/// breaking exact ties.
const LATEST_STATUS_CTE: &str = "WITH latest_status AS (
  SELECT t.entity_id, t.task_type, t.key, t.value, t.error, t.last_updated
  FROM task_status t
  WHERE t.rowid = (
    SELECT t2.rowid FROM task_status t2
    WHERE t2.entity_id = t.entity_id AND t2.task_type = t.task_type AND t2.key = t.key
    ORDER BY t2.last_updated DESC, t2.rowid DESC
    LIMIT 1
  )
)
";

pub struct SqliteStatusStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStatusStore<'a> {
    #[must_use]
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn placeholders(count: usize) -> String {
    let mut out = String::with_capacity(count * 3);
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out
}

fn gate_condition(gate: &FactGate, params: &mut Vec<Value>) -> String {
    let mut sql = String::from(
        "s.entity_id IN (SELECT g.entity_id FROM latest_status g WHERE g.task_type = ?",
    );
    params.push(Value::Text(gate.task_type.as_str().to_string()));
    if let Some(key) = &gate.key {
        sql.push_str(" AND g.key = ?");
        params.push(Value::Text(key.clone()));
    }
    match &gate.value {
        ValuePredicate::Any => {}
        ValuePredicate::Equals(value) => {
            sql.push_str(" AND g.value = ?");
            params.push(Value::Text(value.clone()));
        }
        ValuePredicate::NotIn(values) if values.is_empty() => {}
        ValuePredicate::NotIn(values) => {
            sql.push_str(&format!(" AND g.value NOT IN ({})", placeholders(values.len())));
            for value in values {
                params.push(Value::Text(value.clone()));
            }
        }
    }
    sql.push(')');
    sql
}

struct RawJoinRow {
    resource_id: String,
    resource_url: String,
    resource_position: i64,
    dataset_id: String,
    dataset_name: String,
    dataset_title: String,
    organization_name: Option<String>,
    organization_title: Option<String>,
    key: String,
    value: String,
    error: Option<String>,
    last_updated: String,
}

impl StatusFactSource for SqliteStatusStore<'_> {
    fn records(
        &self,
        task_type: TaskType,
        key: Option<&str>,
        entity_ids: Option<&[ResourceId]>,
    ) -> Result<Vec<StatusRecord>, StoreError> {
        let mut sql = String::from(LATEST_STATUS_CTE);
        sql.push_str(
            "SELECT s.entity_id, s.task_type, s.key, s.value, s.error, s.last_updated
             FROM latest_status s
             WHERE s.task_type = ?",
        );
        let mut params: Vec<Value> = vec![Value::Text(task_type.as_str().to_string())];
        if let Some(key) = key {
            sql.push_str(" AND s.key = ?");
            params.push(Value::Text(key.to_string()));
        }
        match entity_ids {
            Some([]) => sql.push_str(" AND 1 = 0"),
            Some(ids) => {
                sql.push_str(&format!(" AND s.entity_id IN ({})", placeholders(ids.len())));
                for id in ids {
                    params.push(Value::Text(id.as_str().to_string()));
                }
            }
            None => {}
        }
        sql.push_str(" ORDER BY s.entity_id, s.key");

        let mut stmt = self.conn.prepare(&sql)?;
        let raw: Vec<(String, String, String, String, Option<String>, String)> = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<Result<_, _>>()?;

        let mut records = Vec::with_capacity(raw.len());
        for (entity_id, task_type, key, value, error, last_updated) in raw {
            records.push(StatusRecord {
                entity_id: ResourceId::parse(&entity_id)?,
                task_type: TaskType::parse(&task_type)?,
                key,
                value,
                error,
                last_updated: parse_timestamp(&last_updated)?,
            });
        }
        Ok(records)
    }

    fn status_join_rows(&self, query: &StatusJoinQuery) -> Result<Vec<StatusJoinRow>, StoreError> {
        let grouped = !matches!(query.organizations, OrganizationScope::Ungrouped);

        let mut sql = String::from(LATEST_STATUS_CTE);
        sql.push_str("SELECT r.id, r.url, r.position, d.id, d.name, d.title, ");
        if grouped {
            sql.push_str("o.name, o.title, ");
        } else {
            sql.push_str("NULL, NULL, ");
        }
        sql.push_str(
            "s.key, s.value, s.error, s.last_updated
             FROM latest_status s
             JOIN resource r ON r.id = s.entity_id
             JOIN dataset d ON d.id = r.dataset_id",
        );
        if grouped {
            sql.push_str(
                "
             JOIN membership m ON m.dataset_id = d.id
             JOIN organization o ON o.id = m.organization_id",
            );
        }

        let mut params: Vec<Value> = Vec::new();
        let mut where_parts: Vec<String> = vec![gate_condition(&query.gate, &mut params)];
        where_parts.push("r.state = 'active'".to_string());
        where_parts.push("d.state = 'active'".to_string());
        if grouped {
            where_parts.push("m.state = 'active'".to_string());
            where_parts.push("o.state = 'active'".to_string());
        }
        if let OrganizationScope::Named(names) = &query.organizations {
            if names.is_empty() {
                where_parts.push("1 = 0".to_string());
            } else {
                where_parts.push(format!("o.name IN ({})", placeholders(names.len())));
                for name in names {
                    params.push(Value::Text(name.as_str().to_string()));
                }
            }
        }
        if let Some(dataset) = &query.dataset {
            where_parts.push("d.id = ?".to_string());
            params.push(Value::Text(dataset.as_str().to_string()));
        }
        if let Some(task_type) = query.row_task_type {
            where_parts.push("s.task_type = ?".to_string());
            params.push(Value::Text(task_type.as_str().to_string()));
        }
        if let Some(key) = &query.row_key {
            where_parts.push("s.key = ?".to_string());
            params.push(Value::Text(key.clone()));
        }

        sql.push_str("\n             WHERE ");
        sql.push_str(&where_parts.join("\n               AND "));
        sql.push_str("\n             ORDER BY d.title, d.name, r.position, r.id, s.key");

        let mut stmt = self.conn.prepare(&sql)?;
        let raw: Vec<RawJoinRow> = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok(RawJoinRow {
                    resource_id: row.get(0)?,
                    resource_url: row.get(1)?,
                    resource_position: row.get(2)?,
                    dataset_id: row.get(3)?,
                    dataset_name: row.get(4)?,
                    dataset_title: row.get(5)?,
                    organization_name: row.get(6)?,
                    organization_title: row.get(7)?,
                    key: row.get(8)?,
                    value: row.get(9)?,
                    error: row.get(10)?,
                    last_updated: row.get(11)?,
                })
            })?
            .collect::<Result<_, _>>()?;
        debug!(rows = raw.len(), "status join query");

        let mut rows = Vec::with_capacity(raw.len());
        for raw_row in raw {
            rows.push(StatusJoinRow {
                resource_id: ResourceId::parse(&raw_row.resource_id)?,
                resource_url: raw_row.resource_url,
                resource_position: raw_row.resource_position,
                dataset_id: DatasetId::parse(&raw_row.dataset_id)?,
                dataset_name: DatasetName::parse(&raw_row.dataset_name)?,
                dataset_title: raw_row.dataset_title,
                organization_name: raw_row
                    .organization_name
                    .as_deref()
                    .map(OrganizationName::parse)
                    .transpose()?,
                organization_title: raw_row.organization_title,
                key: raw_row.key,
                value: raw_row.value,
                error: raw_row.error,
                last_updated: parse_timestamp(&raw_row.last_updated)?,
            });
        }
        Ok(rows)
    }

    fn dataset_by_id(&self, id: &DatasetId) -> Result<Option<Dataset>, StoreError> {
        let found: Option<(String, String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, name, title, state FROM dataset WHERE id = ?1",
                [id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let Some((id, name, title, state)) = found else {
            return Ok(None);
        };
        Ok(Some(Dataset {
            id: DatasetId::parse(&id)?,
            name: DatasetName::parse(&name)?,
            title,
            state: EntityState::parse(&state)?,
        }))
    }
}
