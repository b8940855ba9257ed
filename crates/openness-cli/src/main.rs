#![forbid(unsafe_code)]

use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use openness_core::{canonical, ExitCode, ENV_OPENNESS_DB, ENV_OPENNESS_LOG};
use openness_model::{DatasetId, ExclusionSet, OrganizationName, ResourceId, ValidationError};
use openness_reports::{
    broken_links_by_dataset_report, broken_links_for_organization,
    broken_scores_for_organization, catalog_score_report, dataset_scores_for_organization,
    organization_broken_counts, resource_score_report, BrokenSpec,
};
use openness_store::{HierarchySnapshot, SqliteStatusStore, StoreError};

#[derive(Parser)]
#[command(name = "openness")]
#[command(about = "Openness quality reports over a catalog's status facts")]
struct Cli {
    /// SQLite database holding entities and status facts.
    #[arg(long, env = ENV_OPENNESS_DB, global = true)]
    db: Option<PathBuf>,
    /// Print the report's canonical sha256 fingerprint instead of its JSON.
    #[arg(long, global = true, default_value_t = false)]
    fingerprint: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Maximum openness score per dataset, or for one dataset by id.
    CatalogScores {
        #[arg(long)]
        dataset: Option<String>,
    },
    /// One resource's openness score, reason, and last-updated.
    ResourceScore {
        #[arg(long)]
        resource: String,
    },
    /// Datasets with zero-star resources, excluding licensing-only failures.
    BrokenLinks,
    /// Broken-package/broken-resource counts per organization.
    OrgBrokenCounts {
        #[arg(long, default_value_t = false)]
        include_sub_organizations: bool,
        #[arg(long, value_enum, default_value_t = BrokenKindCli::Archiver)]
        kind: BrokenKindCli,
    },
    /// Broken-link detail rows for one organization.
    OrgBrokenLinks {
        #[arg(long)]
        organization: String,
        #[arg(long, default_value_t = false)]
        include_sub_organizations: bool,
    },
    /// Best openness score per dataset of one organization.
    OrgDatasetScores {
        #[arg(long)]
        organization: String,
        #[arg(long, default_value_t = false)]
        include_sub_organizations: bool,
    },
    /// Openness facts for one organization's link-failed resources.
    OrgBrokenScores {
        #[arg(long)]
        organization: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BrokenKindCli {
    /// Latest archiver status is unhealthy.
    Archiver,
    /// Latest openness score is zero with a non-excluded reason.
    ZeroScore,
}

impl BrokenKindCli {
    fn spec(self) -> BrokenSpec {
        match self {
            Self::Archiver => BrokenSpec::archiver_default(),
            Self::ZeroScore => BrokenSpec::zero_score_default(),
        }
    }
}

#[derive(Debug)]
enum CliError {
    Usage(String),
    Store(StoreError),
    Serialize(serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Usage(_) => ExitCode::Validation,
            Self::Store(_) => ExitCode::DependencyFailure,
            Self::Serialize(_) => ExitCode::Internal,
        }
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(message) => write!(f, "{message}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Serialize(err) => write!(f, "serialization failed: {err}"),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err)
    }
}

fn usage(err: &ValidationError) -> CliError {
    CliError::Usage(err.to_string())
}

fn emit<T: Serialize>(report: &T, fingerprint: bool) -> Result<(), CliError> {
    if fingerprint {
        println!("{}", canonical::report_fingerprint(report)?);
    } else {
        println!("{}", serde_json::to_string_pretty(report)?);
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let Some(db) = &cli.db else {
        return Err(CliError::Usage(
            "missing --db (or OPENNESS_DB) database path".to_string(),
        ));
    };
    let conn = Connection::open_with_flags(db, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .map_err(StoreError::from)?;
    let store = SqliteStatusStore::new(&conn);
    info!(db = %db.display(), "computing report");

    match &cli.command {
        Commands::CatalogScores { dataset } => {
            let dataset = dataset
                .as_deref()
                .map(DatasetId::parse)
                .transpose()
                .map_err(|e| usage(&e))?;
            let report = catalog_score_report(&store, dataset.as_ref())?;
            emit(&report, cli.fingerprint)
        }
        Commands::ResourceScore { resource } => {
            let resource = ResourceId::parse(resource).map_err(|e| usage(&e))?;
            let report = resource_score_report(&store, &resource)?;
            emit(&report, cli.fingerprint)
        }
        Commands::BrokenLinks => {
            let report = broken_links_by_dataset_report(&store)?;
            emit(&report, cli.fingerprint)
        }
        Commands::OrgBrokenCounts {
            include_sub_organizations,
            kind,
        } => {
            let hierarchy = HierarchySnapshot::load(&conn)?;
            let report = organization_broken_counts(
                &store,
                &hierarchy,
                &kind.spec(),
                *include_sub_organizations,
            )?;
            emit(&report, cli.fingerprint)
        }
        Commands::OrgBrokenLinks {
            organization,
            include_sub_organizations,
        } => {
            let organization = OrganizationName::parse(organization).map_err(|e| usage(&e))?;
            let hierarchy = HierarchySnapshot::load(&conn)?;
            let report = broken_links_for_organization(
                &store,
                &hierarchy,
                &organization,
                *include_sub_organizations,
                &ExclusionSet::healthy_archiver_statuses(),
            )?;
            emit(&report, cli.fingerprint)
        }
        Commands::OrgDatasetScores {
            organization,
            include_sub_organizations,
        } => {
            let organization = OrganizationName::parse(organization).map_err(|e| usage(&e))?;
            let hierarchy = HierarchySnapshot::load(&conn)?;
            let report = dataset_scores_for_organization(
                &store,
                &hierarchy,
                &organization,
                *include_sub_organizations,
            )?;
            emit(&report, cli.fingerprint)
        }
        Commands::OrgBrokenScores { organization } => {
            let organization = OrganizationName::parse(organization).map_err(|e| usage(&e))?;
            let hierarchy = HierarchySnapshot::load(&conn)?;
            let report = broken_scores_for_organization(
                &store,
                &hierarchy,
                &organization,
                &ExclusionSet::not_broken_but_zero_stars(),
                &ExclusionSet::healthy_archiver_statuses(),
            )?;
            emit(&report, cli.fingerprint)
        }
    }
}

fn main() -> ProcessExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(ENV_OPENNESS_LOG).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ProcessExitCode::from(ExitCode::Success as u8),
        Err(err) => {
            eprintln!("openness: {err}");
            ProcessExitCode::from(err.exit_code() as u8)
        }
    }
}
