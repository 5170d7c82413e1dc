//! Canonical publication record shared by every provider.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The provider a record was retrieved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceType {
    #[serde(rename = "pubmed")]
    PubMed,
    #[serde(rename = "europe_pmc")]
    EuropePmc,
    #[serde(rename = "core")]
    Core,
    #[serde(rename = "openalex")]
    OpenAlex,
    #[serde(rename = "google_scholar")]
    GoogleScholar,
    #[serde(rename = "semantic")]
    SemanticScholar,
}

impl SourceType {
    /// Every provider, in the order they are listed to users
    pub const ALL: [SourceType; 6] = [
        SourceType::PubMed,
        SourceType::EuropePmc,
        SourceType::Core,
        SourceType::OpenAlex,
        SourceType::GoogleScholar,
        SourceType::SemanticScholar,
    ];

    /// Returns the display name of the source
    pub fn name(&self) -> &'static str {
        match self {
            SourceType::PubMed => "PubMed",
            SourceType::EuropePmc => "Europe PMC",
            SourceType::Core => "CORE",
            SourceType::OpenAlex => "OpenAlex",
            SourceType::GoogleScholar => "Google Scholar",
            SourceType::SemanticScholar => "Semantic Scholar",
        }
    }

    /// Returns the stable source identifier (used on the command line and in config)
    pub fn id(&self) -> &'static str {
        match self {
            SourceType::PubMed => "pubmed",
            SourceType::EuropePmc => "europe_pmc",
            SourceType::Core => "core",
            SourceType::OpenAlex => "openalex",
            SourceType::GoogleScholar => "google_scholar",
            SourceType::SemanticScholar => "semantic",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a provider name cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider '{0}'")]
pub struct UnknownSource(pub String);

impl FromStr for SourceType {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();

        match key.as_str() {
            "pubmed" => Ok(SourceType::PubMed),
            "europepmc" | "epmc" => Ok(SourceType::EuropePmc),
            "core" => Ok(SourceType::Core),
            "openalex" => Ok(SourceType::OpenAlex),
            "googlescholar" | "scholar" => Ok(SourceType::GoogleScholar),
            "semantic" | "semanticscholar" | "s2" => Ok(SourceType::SemanticScholar),
            _ => Err(UnknownSource(s.to_string())),
        }
    }
}

/// A publication normalized from any provider's payload.
///
/// Every field holds either a real value or [`PublicationRecord::NOT_AVAILABLE`],
/// so table rendering and export never have to branch on absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    /// Provider that produced this record
    pub source: SourceType,

    /// Provider-native identifier (PMID, OpenAlex work id, CORE id, ...)
    pub identifier: String,

    pub title: String,

    /// Four-digit publication year
    pub year: String,

    /// Journal or publisher
    pub venue: String,

    #[serde(rename = "abstract")]
    pub abstract_text: String,

    /// Bare DOI, without resolver prefix
    pub doi: String,

    /// Author names joined with "; "
    pub authors: String,

    /// Landing page URL
    pub url: String,
}

impl PublicationRecord {
    /// Placeholder for a field the provider did not supply
    pub const NOT_AVAILABLE: &'static str = "n/a";

    /// Create a record with every field set to the sentinel
    pub fn empty(source: SourceType) -> Self {
        let na = || Self::NOT_AVAILABLE.to_string();
        Self {
            source,
            identifier: na(),
            title: na(),
            year: na(),
            venue: na(),
            abstract_text: na(),
            doi: na(),
            authors: na(),
            url: na(),
        }
    }

    /// True if the value is a real value rather than the sentinel
    pub fn is_present(value: &str) -> bool {
        value != Self::NOT_AVAILABLE
    }

    pub fn has_doi(&self) -> bool {
        Self::is_present(&self.doi)
    }

    pub fn has_abstract(&self) -> bool {
        Self::is_present(&self.abstract_text)
    }

    /// All fields in export column order
    pub fn fields(&self) -> [&str; 9] {
        [
            self.source.name(),
            &self.identifier,
            &self.title,
            &self.year,
            &self.venue,
            &self.authors,
            &self.doi,
            &self.url,
            &self.abstract_text,
        ]
    }

    /// Column headers matching [`PublicationRecord::fields`]
    pub const FIELD_NAMES: [&'static str; 9] = [
        "source",
        "identifier",
        "title",
        "year",
        "venue",
        "authors",
        "doi",
        "url",
        "abstract",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ids_round_trip() {
        for source in SourceType::ALL {
            assert_eq!(source.id().parse::<SourceType>().unwrap(), source);
        }
    }

    #[test]
    fn test_source_parse_aliases() {
        assert_eq!("Europe-PMC".parse::<SourceType>().unwrap(), SourceType::EuropePmc);
        assert_eq!("semantic_scholar".parse::<SourceType>().unwrap(), SourceType::SemanticScholar);
        assert_eq!(" PubMed ".parse::<SourceType>().unwrap(), SourceType::PubMed);
        assert!("arxiv".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_empty_record_uses_sentinel() {
        let record = PublicationRecord::empty(SourceType::Core);
        assert!(record.fields()[1..].iter().all(|f| *f == "n/a"));
        assert!(!record.has_doi());
        assert!(!record.has_abstract());
    }

    #[test]
    fn test_abstract_serializes_as_abstract() {
        let record = PublicationRecord::empty(SourceType::PubMed);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["abstract"], "n/a");
        assert_eq!(json["source"], "pubmed");
    }
}
