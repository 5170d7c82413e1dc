//! Caller-owned state of an interactive search.
//!
//! A session holds the latest [`AggregatedResult`] and the records picked
//! from it. Running a new search replaces the result (results are never
//! merged across searches) and clears the selection.

use std::collections::BTreeSet;
use std::path::Path;

use crate::aggregate::SearchAggregator;
use crate::models::{AggregatedResult, PublicationRecord, SearchRequest, SourceType};
use crate::normalize::extract_year;
use crate::utils::{write_export, ExportError, ExportFormat};

/// Criteria for narrowing a result without searching again.
///
/// Unset criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub source: Option<SourceType>,
    /// Case-insensitive text that must appear in the title or abstract
    pub text: Option<String>,
    /// Earliest publication year, inclusive
    pub year_from: Option<u16>,
    /// Latest publication year, inclusive
    pub year_to: Option<u16>,
    pub require_abstract: bool,
}

impl RecordFilter {
    pub fn matches(&self, record: &PublicationRecord) -> bool {
        if self.source.is_some_and(|s| s != record.source) {
            return false;
        }
        if self.require_abstract && !record.has_abstract() {
            return false;
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let found = record.title.to_lowercase().contains(&needle)
                || (record.has_abstract() && record.abstract_text.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        if self.year_from.is_some() || self.year_to.is_some() {
            // Records without a year cannot satisfy a year bound
            let Ok(year) = extract_year(&record.year).parse::<u16>() else {
                return false;
            };
            if self.year_from.is_some_and(|from| year < from) || self.year_to.is_some_and(|to| year > to) {
                return false;
            }
        }
        true
    }
}

/// The result of the latest search plus the user's selection
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    result: Option<AggregatedResult>,
    selected: BTreeSet<usize>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a search and make its result the session's current result
    pub async fn search(
        &mut self,
        aggregator: &SearchAggregator,
        request: &SearchRequest,
    ) -> &AggregatedResult {
        let result = aggregator.aggregate(request).await;
        self.replace(result)
    }

    /// Replace the current result, clearing the selection
    pub fn replace(&mut self, result: AggregatedResult) -> &AggregatedResult {
        self.selected.clear();
        self.result.insert(result)
    }

    pub fn result(&self) -> Option<&AggregatedResult> {
        self.result.as_ref()
    }

    /// Records of the current result, empty before the first search
    pub fn records(&self) -> &[PublicationRecord] {
        self.result
            .as_ref()
            .map(|r| r.records.as_slice())
            .unwrap_or_default()
    }

    /// Records of the current result matching `filter`, with their positions
    pub fn narrow(&self, filter: &RecordFilter) -> Vec<(usize, &PublicationRecord)> {
        self.records()
            .iter()
            .enumerate()
            .filter(|(_, record)| filter.matches(record))
            .collect()
    }

    /// Select the record at `index`. Returns false if there is no such record.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.records().len() {
            self.selected.insert(index);
            true
        } else {
            false
        }
    }

    pub fn deselect(&mut self, index: usize) {
        self.selected.remove(&index);
    }

    /// Select every record matching `filter`; returns how many were added
    pub fn select_matching(&mut self, filter: &RecordFilter) -> usize {
        let indices: Vec<usize> = self.narrow(filter).into_iter().map(|(i, _)| i).collect();
        indices
            .into_iter()
            .filter(|i| self.selected.insert(*i))
            .count()
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Selected records, in result order
    pub fn selected(&self) -> Vec<&PublicationRecord> {
        let records = self.records();
        self.selected.iter().filter_map(|&i| records.get(i)).collect()
    }

    /// Write the selection, or the whole result when nothing is selected
    pub fn export(&self, path: &Path) -> Result<ExportFormat, ExportError> {
        if self.selected.is_empty() {
            write_export(path, self.records())
        } else {
            write_export(path, self.selected())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProviderOutcome;
    use crate::sources::mock::make_record;

    fn result(query: &str, titles: &[(SourceType, &str, &str)]) -> AggregatedResult {
        let records: Vec<PublicationRecord> = titles
            .iter()
            .enumerate()
            .map(|(i, (source, title, year))| {
                let mut record = make_record(*source, &i.to_string(), title);
                record.year = year.to_string();
                record
            })
            .collect();
        AggregatedResult {
            query: query.to_string(),
            outcomes: vec![ProviderOutcome::success(SourceType::PubMed, records.len())],
            records,
        }
    }

    #[test]
    fn test_new_search_replaces_previous() {
        let mut session = SearchSession::new();
        assert!(session.records().is_empty());

        session.replace(result(
            "cancer",
            &[(SourceType::PubMed, "A", "2020"), (SourceType::PubMed, "B", "2021")],
        ));
        assert!(session.select(1));

        session.replace(result("diabetes", &[(SourceType::OpenAlex, "C", "2019")]));
        assert_eq!(session.records().len(), 1);
        assert_eq!(session.records()[0].title, "C");
        assert_eq!(session.result().unwrap().query, "diabetes");
        assert!(session.selected().is_empty());
    }

    #[test]
    fn test_select_out_of_range() {
        let mut session = SearchSession::new();
        session.replace(result("q", &[(SourceType::PubMed, "A", "2020")]));
        assert!(session.select(0));
        assert!(!session.select(5));
        assert_eq!(session.selected().len(), 1);
        session.deselect(0);
        assert!(session.selected().is_empty());
    }

    #[test]
    fn test_narrow() {
        let mut session = SearchSession::new();
        session.replace(result(
            "q",
            &[
                (SourceType::PubMed, "Cancer genomics", "2018"),
                (SourceType::EuropePmc, "Tumour cancer imaging", "2022"),
                (SourceType::EuropePmc, "Heart disease", "n/a"),
            ],
        ));

        let by_text = RecordFilter {
            text: Some("CANCER".into()),
            ..Default::default()
        };
        assert_eq!(session.narrow(&by_text).len(), 2);

        let by_source_and_year = RecordFilter {
            source: Some(SourceType::EuropePmc),
            year_from: Some(2020),
            ..Default::default()
        };
        let narrowed = session.narrow(&by_source_and_year);
        assert_eq!(narrowed.len(), 1);
        assert_eq!(narrowed[0].0, 1);

        let with_abstract = RecordFilter {
            require_abstract: true,
            ..Default::default()
        };
        assert!(session.narrow(&with_abstract).is_empty());

        // narrowing is a view; the result is untouched
        assert_eq!(session.records().len(), 3);
    }

    #[test]
    fn test_export_selection_or_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = SearchSession::new();
        session.replace(result(
            "q",
            &[(SourceType::PubMed, "First", "2020"), (SourceType::PubMed, "Second", "2021")],
        ));

        let all = dir.path().join("all.csv");
        session.export(&all).unwrap();
        assert_eq!(std::fs::read_to_string(&all).unwrap().lines().count(), 3);

        let filter = RecordFilter {
            text: Some("second".into()),
            ..Default::default()
        };
        assert_eq!(session.select_matching(&filter), 1);

        let picked = dir.path().join("picked.json");
        assert_eq!(session.export(&picked).unwrap(), ExportFormat::Json);
        let parsed: Vec<PublicationRecord> =
            serde_json::from_str(&std::fs::read_to_string(&picked).unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title, "Second");
    }
}
