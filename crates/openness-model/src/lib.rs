#![forbid(unsafe_code)]
//! Openness model SSOT.
//!
//! Entities are read-only inputs for the duration of a report computation;
//! status records are appended by the external scoring worker and only ever
//! read here.

mod archival;
mod entity;
mod ident;
mod policy;
mod status;

pub use archival::ArchivalDetails;
pub use entity::{Dataset, Organization, Resource};
pub use ident::{
    DatasetId, DatasetName, EntityState, OrganizationId, OrganizationName, ResourceId,
    ValidationError, ID_MAX_LEN, NAME_MAX_LEN,
};
pub use policy::ExclusionSet;
pub use status::{keys, latest_by_key, StatusRecord, TaskType};

pub const CRATE_NAME: &str = "openness-model";
