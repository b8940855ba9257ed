use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A configurable set of reason strings that suppress an otherwise-qualifying
/// "broken" classification.
///
/// The engine carries three independent policies (their intents are not
/// interchangeable): [`ExclusionSet::not_broken_but_zero_stars`] for the
/// organization score paths, [`ExclusionSet::healthy_archiver_statuses`] for
/// broken-link detection, and a fixed `License not open` exclusion private to
/// the legacy by-dataset report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExclusionSet(BTreeSet<String>);

impl ExclusionSet {
    #[must_use]
    pub fn new<I, S>(reasons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(reasons.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reasons for which a zero openness score does not mean broken (scoring
    /// was skipped by operator choice).
    #[must_use]
    pub fn not_broken_but_zero_stars() -> Self {
        Self::new(["Chose not to download"])
    }

    /// Archiver statuses that mean the link is healthy despite a status fact
    /// being present.
    #[must_use]
    pub fn healthy_archiver_statuses() -> Self {
        Self::new(["Chose not to download", "Archived successfully"])
    }

    #[must_use]
    pub fn contains(&self, reason: &str) -> bool {
        self.0.contains(reason)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
