#![forbid(unsafe_code)]
//! Quality-metrics aggregation engine.
//!
//! Reports are computed synchronously and statelessly: one bounded
//! read-then-aggregate pass over the status record store and the
//! organization hierarchy snapshot, returned whole. The engine never writes.
//! It does not establish a transactional snapshot of its own, so a
//! concurrent writer may make a mix of old and new facts visible within one
//! computation; that staleness window is accepted and documented, not a
//! correctness bug.

mod consolidate;
mod rollup;
mod scores;

pub use consolidate::{collate_status_rows, parse_score, ConsolidatedResourceStatus};
pub use rollup::{
    broken_links_for_organization, broken_scores_for_organization, dataset_scores_for_organization,
    organization_broken_counts, BrokenLinkDetailRow, BrokenScoreRow, BrokenSpec,
    DatasetScoreDetailRow, OrganizationBrokenCounts, OrganizationBrokenDetailReport,
    OrganizationBrokenScoresReport, OrganizationDatasetScoresReport,
};
pub use scores::{
    best_scored_resource, broken_links_by_dataset_report, catalog_score_report,
    resource_score_report, BrokenResourceLink, CatalogScoreReport, DatasetBrokenLinks,
    DatasetScoreRow, ResourceScoreReport,
};

pub const CRATE_NAME: &str = "openness-reports";
