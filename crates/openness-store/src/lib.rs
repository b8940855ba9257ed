#![forbid(unsafe_code)]

mod error;
mod hierarchy;
mod ports;
mod schema;
mod sqlite;

pub use error::{StoreError, StoreErrorCode};
pub use hierarchy::HierarchySnapshot;
pub use ports::{
    FactGate, OrganizationHierarchy, OrganizationScope, StatusFactSource, StatusJoinQuery,
    StatusJoinRow, ValuePredicate,
};
pub use schema::{
    add_membership, append_status, format_timestamp, init_schema, insert_dataset,
    insert_organization, insert_resource, parse_timestamp,
};
pub use sqlite::SqliteStatusStore;

pub const CRATE_NAME: &str = "openness-store";
