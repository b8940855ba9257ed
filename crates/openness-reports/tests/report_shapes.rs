// SPDX-License-Identifier: Apache-2.0

mod support;

use openness_model::{DatasetId, ExclusionSet, ResourceId};
use openness_reports::{
    broken_links_by_dataset_report, broken_links_for_organization,
    broken_scores_for_organization, catalog_score_report, dataset_scores_for_organization,
    resource_score_report, CatalogScoreReport, ResourceScoreReport,
};

use support::{org_name, ts, Fixture};

fn publisher_fixture() -> Fixture {
    let f = Fixture::new();
    f.organization("o-cab", "cabinet-office", "Cabinet Office", None);
    f.organization("o-gds", "digital-service", "Digital Service", Some("o-cab"));

    f.dataset("d-spend", "spend-over-25k", "Spend over 25k", "o-cab");
    f.dataset("d-perf", "performance-data", "Performance Data", "o-gds");

    f.resource("r-spend-0", "d-spend", 0);
    f.resource("r-spend-1", "d-spend", 1);
    f.resource("r-perf-0", "d-perf", 0);

    f.qa_score("r-spend-0", "0", Some("Not found"), "2026-04-01T10:00:00Z");
    f.qa_score("r-spend-1", "4", Some("Open and standardized"), "2026-04-02T10:00:00Z");
    f.qa_score("r-perf-0", "3", Some("Open format"), "2026-04-01T10:00:00Z");

    f.archiver_status(
        "r-spend-0",
        "Download error",
        Some(r#"{"first_failure": "2026-03-28 06:15:00", "last_success": "2026-03-20T06:15:00Z", "failure_count": 9}"#),
        "2026-04-01T10:00:00Z",
    );
    f
}

#[test]
fn catalog_report_returns_not_found_for_unknown_dataset() {
    let f = publisher_fixture();
    let store = f.store();
    let report = catalog_score_report(&store, Some(&DatasetId::parse("d-missing").expect("id")))
        .expect("report");
    assert_eq!(report, CatalogScoreReport::NotFound);
}

#[test]
fn catalog_report_filters_to_one_dataset() {
    let f = publisher_fixture();
    let store = f.store();
    let report = catalog_score_report(&store, Some(&DatasetId::parse("d-spend").expect("id")))
        .expect("report");
    let CatalogScoreReport::Scores(rows) = report else {
        panic!("expected scores");
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].dataset_name.as_str(), "spend-over-25k");
    assert_eq!(rows[0].openness_score, 4);
}

#[test]
fn catalog_report_lists_all_scored_datasets_by_title() {
    let f = publisher_fixture();
    let store = f.store();
    let CatalogScoreReport::Scores(rows) = catalog_score_report(&store, None).expect("report")
    else {
        panic!("expected scores");
    };
    let titles: Vec<&str> = rows.iter().map(|r| r.dataset_title.as_str()).collect();
    assert_eq!(titles, vec!["Performance Data", "Spend over 25k"]);
}

#[test]
fn resource_report_passes_facts_through_with_max_timestamp() {
    let f = publisher_fixture();
    // Supersede the score only; the reason fact keeps its older timestamp.
    f.qa_score("r-spend-1", "5", None, "2026-04-05T10:00:00Z");

    let store = f.store();
    let report = resource_score_report(&store, &ResourceId::parse("r-spend-1").expect("id"))
        .expect("report");
    assert_eq!(report.openness_score, Some(5));
    assert_eq!(
        report.openness_score_reason.as_deref(),
        Some("Open and standardized")
    );
    assert_eq!(report.openness_updated, Some(ts("2026-04-05T10:00:00Z")));
}

#[test]
fn resource_report_is_empty_for_unknown_resource() {
    let f = publisher_fixture();
    let store = f.store();
    let report = resource_score_report(&store, &ResourceId::parse("r-missing").expect("id"))
        .expect("report");
    assert_eq!(report, ResourceScoreReport::default());
}

#[test]
fn broken_links_by_dataset_applies_the_license_exclusion() {
    let f = publisher_fixture();
    // Zero-star because of licensing; the legacy report must not list it.
    f.resource("r-perf-1", "d-perf", 1);
    f.qa_score("r-perf-1", "0", Some("License not open"), "2026-04-01T10:00:00Z");

    let store = f.store();
    let report = broken_links_by_dataset_report(&store).expect("report");
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].dataset_name.as_str(), "spend-over-25k");
    assert_eq!(report[0].resources.len(), 1);
    assert_eq!(
        report[0].resources[0].openness_score_reason,
        "Not found".to_string()
    );
}

#[test]
fn organization_detail_report_parses_the_archival_payload() {
    let f = publisher_fixture();
    let store = f.store();
    let hierarchy = f.hierarchy();
    let report = broken_links_for_organization(
        &store,
        &hierarchy,
        &org_name("cabinet-office"),
        false,
        &ExclusionSet::healthy_archiver_statuses(),
    )
    .expect("report");

    assert_eq!(report.organization_name, "cabinet-office");
    assert_eq!(report.organization_title, "Cabinet Office");
    assert_eq!(report.data.len(), 1);
    let row = &report.data[0];
    assert_eq!(row.status, "Download error");
    assert_eq!(row.archival.failure_count, Some(9));
    assert_eq!(
        row.archival.first_failure.expect("first failure"),
        ts("2026-03-28T06:15:00Z")
    );
    assert_eq!(
        row.archival.last_success.expect("last success"),
        ts("2026-03-20T06:15:00Z")
    );
}

#[test]
fn organization_reports_render_empty_for_unknown_names() {
    let f = publisher_fixture();
    let store = f.store();
    let hierarchy = f.hierarchy();

    let detail = broken_links_for_organization(
        &store,
        &hierarchy,
        &org_name("no-such-office"),
        false,
        &ExclusionSet::healthy_archiver_statuses(),
    )
    .expect("detail");
    assert_eq!(detail.organization_name, "");
    assert_eq!(detail.organization_title, "");
    assert!(detail.data.is_empty());

    let scores =
        dataset_scores_for_organization(&store, &hierarchy, &org_name("no-such-office"), false)
            .expect("scores");
    assert_eq!(scores.organization_name, "");
    assert!(scores.data.is_empty());
}

#[test]
fn dataset_scores_pick_the_best_resource_per_dataset() {
    let f = publisher_fixture();
    let store = f.store();
    let hierarchy = f.hierarchy();

    let flat =
        dataset_scores_for_organization(&store, &hierarchy, &org_name("cabinet-office"), false)
            .expect("flat");
    assert_eq!(flat.data.len(), 1);
    assert_eq!(flat.data[0].resource_id.as_str(), "r-spend-1");
    assert_eq!(flat.data[0].openness_score, 4);

    let inclusive =
        dataset_scores_for_organization(&store, &hierarchy, &org_name("cabinet-office"), true)
            .expect("inclusive");
    let datasets: Vec<&str> = inclusive
        .data
        .iter()
        .map(|r| r.dataset_name.as_str())
        .collect();
    assert_eq!(datasets, vec!["performance-data", "spend-over-25k"]);
}

#[test]
fn dataset_scores_omit_datasets_with_no_scored_resource() {
    let f = publisher_fixture();
    f.dataset("d-unscored", "draft-stats", "Draft Stats", "o-cab");
    f.resource("r-draft-0", "d-unscored", 0);
    // Only a reason fact so far; the score has not been written yet.
    f.fact(
        "r-draft-0",
        openness_model::TaskType::Qa,
        openness_model::keys::OPENNESS_SCORE_REASON,
        "Queued",
        None,
        "2026-04-01T10:00:00Z",
    );

    let store = f.store();
    let hierarchy = f.hierarchy();
    let report =
        dataset_scores_for_organization(&store, &hierarchy, &org_name("cabinet-office"), false)
            .expect("report");
    assert!(report
        .data
        .iter()
        .all(|row| row.dataset_name.as_str() != "draft-stats"));
}

#[test]
fn broken_scores_collate_qa_facts_for_link_failed_resources() {
    let f = publisher_fixture();
    let store = f.store();
    let hierarchy = f.hierarchy();
    let report = broken_scores_for_organization(
        &store,
        &hierarchy,
        &org_name("cabinet-office"),
        &ExclusionSet::not_broken_but_zero_stars(),
        &ExclusionSet::healthy_archiver_statuses(),
    )
    .expect("report");

    assert_eq!(report.organization_title, "Cabinet Office");
    assert_eq!(report.broken_resources.len(), 1);
    let row = &report.broken_resources[0];
    assert_eq!(row.resource_id.as_str(), "r-spend-0");
    assert_eq!(row.openness_score, Some(0));
    assert_eq!(row.openness_score_reason.as_deref(), Some("Not found"));
    assert_eq!(row.archiver_status.as_deref(), Some("Download error"));
}

#[test]
fn broken_scores_drop_resources_with_excluded_reasons() {
    let f = publisher_fixture();
    f.resource("r-spend-2", "d-spend", 2);
    f.archiver_status("r-spend-2", "Download error", None, "2026-04-01T10:00:00Z");
    f.qa_score("r-spend-2", "0", Some("Chose not to download"), "2026-04-01T10:00:00Z");

    let store = f.store();
    let hierarchy = f.hierarchy();
    let report = broken_scores_for_organization(
        &store,
        &hierarchy,
        &org_name("cabinet-office"),
        &ExclusionSet::not_broken_but_zero_stars(),
        &ExclusionSet::healthy_archiver_statuses(),
    )
    .expect("report");
    assert!(report
        .broken_resources
        .iter()
        .all(|row| row.resource_id.as_str() != "r-spend-2"));
}
