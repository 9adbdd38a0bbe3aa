//! Marker-based test selection.
//!
//! A filter is a list of groups and each group a list of alternatives. A case
//! is selected when *every* group has at least one marker that matches it:
//!
//! - the marker equals the case's category (`valid` / `invalid`), or
//! - the marker is a case-insensitive substring of the subcategory or name.
//!
//! With no groups, everything is selected.

use crate::loader::TestCase;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerFilter {
    groups: Vec<Vec<String>>,
}

impl MarkerFilter {
    /// Build a filter from explicit groups. Empty markers and empty groups are dropped.
    pub fn new(groups: Vec<Vec<String>>) -> Self {
        let groups = groups
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|marker| marker.trim().to_string())
                    .filter(|marker| !marker.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|group| !group.is_empty())
            .collect();
        Self { groups }
    }

    /// Every marker is its own group: all must match.
    pub fn all_of<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(markers.into_iter().map(|m| vec![m.into()]).collect())
    }

    /// Command-line form: one group per argument, alternatives separated by commas.
    ///
    /// `["invalid", "array,table"]` selects invalid cases about arrays or tables.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(
            args.into_iter()
                .map(|arg| arg.as_ref().split(',').map(str::to_string).collect())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    pub fn matches(&self, case: &TestCase) -> bool {
        self.groups
            .iter()
            .all(|group| group.iter().any(|marker| marker_matches(marker, case)))
    }

    /// Keep the selected cases, preserving their order.
    pub fn select(&self, cases: Vec<TestCase>) -> Vec<TestCase> {
        let total = cases.len();
        let selected: Vec<TestCase> = cases.into_iter().filter(|c| self.matches(c)).collect();
        if !self.is_empty() {
            tracing::info!(total, selected = selected.len(), "applied marker filter");
        }
        selected
    }
}

fn marker_matches(marker: &str, case: &TestCase) -> bool {
    if marker == case.category.name() {
        return true;
    }
    let needle = marker.to_lowercase();
    case.subcategory.to_lowercase().contains(&needle) || case.name.to_lowercase().contains(&needle)
}
