// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use openness_model::{
    keys, Dataset, DatasetId, DatasetName, EntityState, Organization, OrganizationId,
    OrganizationName, Resource, ResourceId, StatusRecord, TaskType,
};
use openness_store::{
    add_membership, append_status, init_schema, insert_dataset, insert_organization,
    insert_resource, FactGate, HierarchySnapshot, OrganizationHierarchy, OrganizationScope,
    SqliteStatusStore, StatusFactSource, StatusJoinQuery, ValuePredicate,
};

fn ts(raw: &str) -> DateTime<Utc> {
    raw.parse().expect("timestamp")
}

fn org(id: &str, name: &str, title: &str, parent: Option<&str>) -> Organization {
    Organization {
        id: OrganizationId::parse(id).expect("org id"),
        name: OrganizationName::parse(name).expect("org name"),
        title: title.to_string(),
        state: EntityState::Active,
        parent: parent.map(|p| OrganizationId::parse(p).expect("parent id")),
    }
}

fn dataset(id: &str, name: &str, title: &str) -> Dataset {
    Dataset {
        id: DatasetId::parse(id).expect("dataset id"),
        name: DatasetName::parse(name).expect("dataset name"),
        title: title.to_string(),
        state: EntityState::Active,
    }
}

fn resource(id: &str, dataset_id: &str, url: &str, position: i64) -> Resource {
    Resource {
        id: ResourceId::parse(id).expect("resource id"),
        dataset_id: DatasetId::parse(dataset_id).expect("dataset id"),
        url: url.to_string(),
        position,
        state: EntityState::Active,
    }
}

fn fact(entity: &str, task: TaskType, key: &str, value: &str, when: &str) -> StatusRecord {
    StatusRecord {
        entity_id: ResourceId::parse(entity).expect("entity id"),
        task_type: task,
        key: key.to_string(),
        value: value.to_string(),
        error: None,
        last_updated: ts(when),
    }
}

fn seeded_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("open memory db");
    init_schema(&conn).expect("schema");

    insert_organization(&conn, &org("o-root", "national-stats", "National Statistics", None))
        .expect("org root");
    insert_organization(
        &conn,
        &org("o-sub", "regional-stats", "Regional Statistics", Some("o-root")),
    )
    .expect("org sub");

    insert_dataset(&conn, &dataset("d-spend", "spend-data", "Spend Data")).expect("d-spend");
    insert_dataset(&conn, &dataset("d-air", "air-quality", "Air Quality")).expect("d-air");
    add_membership(
        &conn,
        &DatasetId::parse("d-spend").expect("id"),
        &OrganizationId::parse("o-root").expect("id"),
    )
    .expect("member spend");
    add_membership(
        &conn,
        &DatasetId::parse("d-air").expect("id"),
        &OrganizationId::parse("o-sub").expect("id"),
    )
    .expect("member air");

    insert_resource(&conn, &resource("r-spend-0", "d-spend", "http://spend/0.csv", 0))
        .expect("r-spend-0");
    insert_resource(&conn, &resource("r-spend-1", "d-spend", "http://spend/1.csv", 1))
        .expect("r-spend-1");
    insert_resource(&conn, &resource("r-air-0", "d-air", "http://air/0.csv", 0))
        .expect("r-air-0");

    for record in [
        fact("r-spend-0", TaskType::Archiver, keys::STATUS, "Download error", "2026-01-02T00:00:00Z"),
        fact("r-spend-1", TaskType::Archiver, keys::STATUS, "Archived successfully", "2026-01-02T00:00:00Z"),
        fact("r-air-0", TaskType::Archiver, keys::STATUS, "URL request failed", "2026-01-02T00:00:00Z"),
        fact("r-spend-0", TaskType::Qa, keys::OPENNESS_SCORE, "0", "2026-01-03T00:00:00Z"),
        fact("r-spend-0", TaskType::Qa, keys::OPENNESS_SCORE_REASON, "Not found", "2026-01-03T00:00:00Z"),
        fact("r-spend-1", TaskType::Qa, keys::OPENNESS_SCORE, "3", "2026-01-03T00:00:00Z"),
    ] {
        append_status(&conn, &record).expect("append");
    }
    conn
}

#[test]
fn records_resolve_last_write_wins_per_key() {
    let conn = seeded_connection();
    // Supersede the score with a later write plus a stale historical row.
    append_status(
        &conn,
        &fact("r-spend-1", TaskType::Qa, keys::OPENNESS_SCORE, "5", "2026-01-05T00:00:00Z"),
    )
    .expect("append late");
    append_status(
        &conn,
        &fact("r-spend-1", TaskType::Qa, keys::OPENNESS_SCORE, "1", "2026-01-01T00:00:00Z"),
    )
    .expect("append stale");

    let store = SqliteStatusStore::new(&conn);
    let ids = [ResourceId::parse("r-spend-1").expect("id")];
    let records = store
        .records(TaskType::Qa, Some(keys::OPENNESS_SCORE), Some(&ids))
        .expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, "5");
    assert_eq!(records[0].last_updated, ts("2026-01-05T00:00:00Z"));
}

#[test]
fn records_for_unknown_resource_are_empty() {
    let conn = seeded_connection();
    let store = SqliteStatusStore::new(&conn);
    let ids = [ResourceId::parse("r-missing").expect("id")];
    let records = store
        .records(TaskType::Qa, None, Some(&ids))
        .expect("records");
    assert!(records.is_empty());
}

#[test]
fn join_rows_are_sorted_by_title_name_position() {
    let conn = seeded_connection();
    let store = SqliteStatusStore::new(&conn);
    let rows = store
        .status_join_rows(&StatusJoinQuery {
            gate: FactGate {
                task_type: TaskType::Archiver,
                key: Some(keys::STATUS.to_string()),
                value: ValuePredicate::Any,
            },
            row_task_type: Some(TaskType::Archiver),
            row_key: Some(keys::STATUS.to_string()),
            dataset: None,
            organizations: OrganizationScope::Ungrouped,
        })
        .expect("rows");
    let order: Vec<(&str, i64)> = rows
        .iter()
        .map(|r| (r.dataset_title.as_str(), r.resource_position))
        .collect();
    assert_eq!(
        order,
        vec![("Air Quality", 0), ("Spend Data", 0), ("Spend Data", 1)]
    );
    assert!(rows.iter().all(|r| r.organization_name.is_none()));
}

#[test]
fn gate_not_in_excludes_healthy_statuses_even_with_quotes() {
    let conn = seeded_connection();
    let store = SqliteStatusStore::new(&conn);
    let rows = store
        .status_join_rows(&StatusJoinQuery {
            gate: FactGate {
                task_type: TaskType::Archiver,
                key: Some(keys::STATUS.to_string()),
                value: ValuePredicate::NotIn(vec![
                    "Archived successfully".to_string(),
                    "Chose not to download".to_string(),
                    // A value with a quote must be bound, not interpolated.
                    "operator's choice".to_string(),
                ]),
            },
            row_task_type: Some(TaskType::Archiver),
            row_key: Some(keys::STATUS.to_string()),
            dataset: None,
            organizations: OrganizationScope::AllOrganizations,
        })
        .expect("rows");
    let broken: Vec<&str> = rows.iter().map(|r| r.resource_id.as_str()).collect();
    assert_eq!(broken, vec!["r-air-0", "r-spend-0"]);
    assert_eq!(
        rows[0].organization_name.as_ref().map(|n| n.as_str()),
        Some("regional-stats")
    );
}

#[test]
fn inactive_entities_are_filtered_from_joins() {
    let conn = seeded_connection();
    conn.execute("UPDATE dataset SET state = 'deleted' WHERE id = 'd-air'", [])
        .expect("archive dataset");
    let store = SqliteStatusStore::new(&conn);
    let rows = store
        .status_join_rows(&StatusJoinQuery {
            gate: FactGate {
                task_type: TaskType::Archiver,
                key: Some(keys::STATUS.to_string()),
                value: ValuePredicate::Any,
            },
            row_task_type: Some(TaskType::Archiver),
            row_key: Some(keys::STATUS.to_string()),
            dataset: None,
            organizations: OrganizationScope::Ungrouped,
        })
        .expect("rows");
    assert!(rows.iter().all(|r| r.dataset_name.as_str() != "air-quality"));
}

#[test]
fn named_scope_restricts_to_the_given_organizations() {
    let conn = seeded_connection();
    let store = SqliteStatusStore::new(&conn);
    let rows = store
        .status_join_rows(&StatusJoinQuery {
            gate: FactGate {
                task_type: TaskType::Archiver,
                key: Some(keys::STATUS.to_string()),
                value: ValuePredicate::Any,
            },
            row_task_type: Some(TaskType::Archiver),
            row_key: Some(keys::STATUS.to_string()),
            dataset: None,
            organizations: OrganizationScope::Named(vec![
                OrganizationName::parse("regional-stats").expect("name")
            ]),
        })
        .expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].resource_id.as_str(), "r-air-0");

    let none = store
        .status_join_rows(&StatusJoinQuery {
            gate: FactGate {
                task_type: TaskType::Archiver,
                key: Some(keys::STATUS.to_string()),
                value: ValuePredicate::Any,
            },
            row_task_type: None,
            row_key: None,
            dataset: None,
            organizations: OrganizationScope::Named(Vec::new()),
        })
        .expect("rows");
    assert!(none.is_empty());
}

#[test]
fn dataset_lookup_returns_any_state() {
    let conn = seeded_connection();
    conn.execute("UPDATE dataset SET state = 'deleted' WHERE id = 'd-air'", [])
        .expect("archive dataset");
    let store = SqliteStatusStore::new(&conn);
    let found = store
        .dataset_by_id(&DatasetId::parse("d-air").expect("id"))
        .expect("lookup")
        .expect("dataset");
    assert_eq!(found.state, EntityState::Deleted);
    assert!(store
        .dataset_by_id(&DatasetId::parse("d-missing").expect("id"))
        .expect("lookup")
        .is_none());
}

#[test]
fn hierarchy_walks_ancestors_and_descendants() {
    let conn = seeded_connection();
    let hierarchy = HierarchySnapshot::load(&conn).expect("hierarchy");

    let sub = hierarchy
        .by_name(&OrganizationName::parse("regional-stats").expect("name"))
        .expect("sub org");
    let up: Vec<&str> = hierarchy
        .ancestors(sub)
        .iter()
        .map(|o| o.name.as_str())
        .collect();
    assert_eq!(up, vec!["national-stats"]);

    let root = hierarchy
        .by_name(&OrganizationName::parse("national-stats").expect("name"))
        .expect("root org");
    let down: Vec<&str> = hierarchy
        .descendants(root)
        .iter()
        .map(|o| o.name.as_str())
        .collect();
    assert_eq!(down, vec!["national-stats", "regional-stats"]);
}

#[test]
fn dangling_parent_terminates_the_ancestor_walk() {
    let conn = seeded_connection();
    insert_organization(
        &conn,
        &org("o-orphan", "orphaned-office", "Orphaned Office", Some("o-gone")),
    )
    .expect("orphan");
    let hierarchy = HierarchySnapshot::load(&conn).expect("hierarchy");
    let orphan = hierarchy
        .by_name(&OrganizationName::parse("orphaned-office").expect("name"))
        .expect("orphan org");
    assert!(hierarchy.ancestors(orphan).is_empty());
}

#[test]
fn archived_organizations_drop_out_of_the_snapshot() {
    let conn = seeded_connection();
    conn.execute(
        "UPDATE organization SET state = 'deleted' WHERE id = 'o-sub'",
        [],
    )
    .expect("archive org");
    let hierarchy = HierarchySnapshot::load(&conn).expect("hierarchy");
    assert!(hierarchy
        .by_name(&OrganizationName::parse("regional-stats").expect("name"))
        .is_none());
    assert_eq!(hierarchy.len(), 1);
}
