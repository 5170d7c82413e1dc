//! Field mapping table for each provider.

use super::{FieldMapping, FieldRule};
use crate::models::SourceType;

/// PubMed `esummary` document (one entry of `result.<uid>`)
pub const PUBMED: FieldMapping = FieldMapping {
    identifier: FieldRule::Path("uid"),
    title: FieldRule::Path("title"),
    year: FieldRule::FirstOf(&["pubdate", "epubdate", "sortpubdate"]),
    venue: FieldRule::FirstOf(&["fulljournalname", "source"]),
    // esummary carries no abstract; it is fetched on demand through efetch
    abstract_text: FieldRule::Missing,
    doi: FieldRule::Lookup {
        array: "articleids",
        key: "idtype",
        equals: "doi",
        value: "value",
    },
    authors: FieldRule::Join {
        array: "authors",
        item: "name",
    },
    url: FieldRule::Prefixed {
        path: "uid",
        prefix: "https://pubmed.ncbi.nlm.nih.gov/",
    },
};

/// Europe PMC `resultList.result[]` entry (resultType=core)
pub const EUROPE_PMC: FieldMapping = FieldMapping {
    identifier: FieldRule::FirstOf(&["pmid", "id"]),
    title: FieldRule::Markup("title"),
    year: FieldRule::FirstOf(&["pubYear", "firstPublicationDate", "journalInfo.dateOfPublication"]),
    venue: FieldRule::FirstOf(&[
        "journalInfo.journal.title",
        "journalTitle",
        "bookOrReportDetails.publisher",
    ]),
    // abstractText carries HTML (<h4> section headings, <i>, <sup>)
    abstract_text: FieldRule::Markup("abstractText"),
    doi: FieldRule::Path("doi"),
    authors: FieldRule::Chain(&[
        FieldRule::Path("authorString"),
        FieldRule::Join {
            array: "authorList.author",
            item: "fullName",
        },
    ]),
    url: FieldRule::Chain(&[
        FieldRule::Prefixed {
            path: "pmid",
            prefix: "https://europepmc.org/article/MED/",
        },
        FieldRule::Path("fullTextUrlList.fullTextUrl.0.url"),
    ]),
};

/// CORE v3 `results[]` work
pub const CORE: FieldMapping = FieldMapping {
    identifier: FieldRule::Path("id"),
    title: FieldRule::Path("title"),
    year: FieldRule::FirstOf(&["yearPublished", "publishedDate"]),
    venue: FieldRule::FirstOf(&["publisher", "journals.0.title"]),
    abstract_text: FieldRule::Path("abstract"),
    doi: FieldRule::Path("doi"),
    authors: FieldRule::Join {
        array: "authors",
        item: "name",
    },
    url: FieldRule::FirstOf(&["downloadUrl", "sourceFulltextUrls.0", "links.0.url"]),
};

/// OpenAlex `results[]` work
pub const OPENALEX: FieldMapping = FieldMapping {
    identifier: FieldRule::Trimmed {
        path: "id",
        prefix: "https://openalex.org/",
    },
    title: FieldRule::FirstOf(&["title", "display_name"]),
    year: FieldRule::FirstOf(&["publication_year", "publication_date"]),
    venue: FieldRule::FirstOf(&[
        "primary_location.source.display_name",
        "host_venue.display_name",
        "primary_location.source.host_organization_name",
    ]),
    abstract_text: FieldRule::InvertedIndex("abstract_inverted_index"),
    doi: FieldRule::Path("doi"),
    authors: FieldRule::Join {
        array: "authorships",
        item: "author.display_name",
    },
    url: FieldRule::FirstOf(&["primary_location.landing_page_url", "doi", "id"]),
};

/// Semantic Scholar `data[]` paper
pub const SEMANTIC_SCHOLAR: FieldMapping = FieldMapping {
    identifier: FieldRule::Path("paperId"),
    title: FieldRule::Path("title"),
    year: FieldRule::FirstOf(&["year", "publicationDate"]),
    venue: FieldRule::FirstOf(&["venue", "journal.name", "publicationVenue.name"]),
    abstract_text: FieldRule::Path("abstract"),
    doi: FieldRule::Path("externalIds.DOI"),
    authors: FieldRule::Join {
        array: "authors",
        item: "name",
    },
    url: FieldRule::Path("url"),
};

/// Google Scholar result block, reshaped from HTML by the scraper
pub const GOOGLE_SCHOLAR: FieldMapping = FieldMapping {
    identifier: FieldRule::Path("cluster_id"),
    title: FieldRule::Path("title"),
    year: FieldRule::Path("byline"),
    venue: FieldRule::Path("venue"),
    abstract_text: FieldRule::Path("snippet"),
    doi: FieldRule::Missing,
    authors: FieldRule::Path("authors"),
    url: FieldRule::Path("link"),
};

/// The mapping table used for a provider
pub fn mapping_for(source: SourceType) -> &'static FieldMapping {
    match source {
        SourceType::PubMed => &PUBMED,
        SourceType::EuropePmc => &EUROPE_PMC,
        SourceType::Core => &CORE,
        SourceType::OpenAlex => &OPENALEX,
        SourceType::GoogleScholar => &GOOGLE_SCHOLAR,
        SourceType::SemanticScholar => &SEMANTIC_SCHOLAR,
    }
}

#[cfg(test)]
mod tests {
    use crate::models::SourceType;
    use crate::normalize::normalize;
    use serde_json::json;

    #[test]
    fn test_pubmed_summary() {
        let doc = json!({
            "uid": "34567890",
            "pubdate": "2021 Jan 15",
            "source": "Nat Med",
            "fulljournalname": "Nature medicine",
            "title": "Tumour heterogeneity in cancer.",
            "authors": [{"name": "Smith J", "authtype": "Author"}, {"name": "Doe A"}],
            "articleids": [
                {"idtype": "pubmed", "value": "34567890"},
                {"idtype": "doi", "value": "10.1038/s41591-021-0001"}
            ]
        });

        let record = normalize(&doc, SourceType::PubMed);
        assert_eq!(record.identifier, "34567890");
        assert_eq!(record.year, "2021");
        assert_eq!(record.venue, "Nature medicine");
        assert_eq!(record.doi, "10.1038/s41591-021-0001");
        assert_eq!(record.authors, "Smith J; Doe A");
        assert_eq!(record.abstract_text, "n/a");
        assert_eq!(record.url, "https://pubmed.ncbi.nlm.nih.gov/34567890");
    }

    #[test]
    fn test_europe_pmc_result() {
        let doc = json!({
            "id": "PPR123",
            "source": "PPR",
            "title": "A preprint",
            "authorString": "Lee K, Park S.",
            "firstPublicationDate": "2022-03-01",
            "fullTextUrlList": {"fullTextUrl": [{"url": "https://example.org/ppr123"}]}
        });

        let record = normalize(&doc, SourceType::EuropePmc);
        assert_eq!(record.identifier, "PPR123");
        assert_eq!(record.year, "2022");
        assert_eq!(record.venue, "n/a");
        assert_eq!(record.url, "https://example.org/ppr123");
        assert_eq!(record.authors, "Lee K, Park S.");
    }

    #[test]
    fn test_core_work() {
        let doc = json!({
            "id": 1234567,
            "title": "Open access study",
            "yearPublished": 2018,
            "publisher": "Elsevier",
            "doi": "10.1016/j.test.2018.01.001",
            "authors": [{"name": "Garcia M"}],
            "downloadUrl": "https://core.ac.uk/download/1234567.pdf"
        });

        let record = normalize(&doc, SourceType::Core);
        assert_eq!(record.identifier, "1234567");
        assert_eq!(record.year, "2018");
        assert_eq!(record.venue, "Elsevier");
        assert_eq!(record.abstract_text, "n/a");
    }

    #[test]
    fn test_openalex_work() {
        let doc = json!({
            "id": "https://openalex.org/W2741809807",
            "doi": "https://doi.org/10.7717/peerj.4375",
            "title": "The state of OA",
            "publication_year": 2018,
            "primary_location": {
                "landing_page_url": "https://doi.org/10.7717/peerj.4375",
                "source": {"display_name": "PeerJ"}
            },
            "authorships": [{"author": {"display_name": "Heather Piwowar"}}],
            "abstract_inverted_index": {"Despite": [0], "growing": [1], "interest": [2]}
        });

        let record = normalize(&doc, SourceType::OpenAlex);
        assert_eq!(record.identifier, "W2741809807");
        assert_eq!(record.doi, "10.7717/peerj.4375");
        assert_eq!(record.venue, "PeerJ");
        assert_eq!(record.abstract_text, "Despite growing interest");
        assert_eq!(record.authors, "Heather Piwowar");
    }

    #[test]
    fn test_semantic_scholar_paper() {
        let doc = json!({
            "paperId": "649def34f8be52c8b66281af98ae884c09aef38b",
            "title": "Construction of the Literature Graph",
            "year": 2018,
            "venue": "",
            "journal": {"name": "NAACL"},
            "externalIds": {"DOI": "10.18653/v1/N18-3011"},
            "abstract": null,
            "authors": [{"authorId": "1", "name": "Waleed Ammar"}],
            "url": "https://www.semanticscholar.org/paper/649def34"
        });

        let record = normalize(&doc, SourceType::SemanticScholar);
        assert_eq!(record.year, "2018");
        assert_eq!(record.venue, "NAACL");
        assert_eq!(record.doi, "10.18653/v1/N18-3011");
        assert_eq!(record.abstract_text, "n/a");
    }

    #[test]
    fn test_google_scholar_block() {
        let doc = json!({
            "cluster_id": "abc123",
            "title": "Deep learning",
            "byline": "Y LeCun, Y Bengio, G Hinton - nature, 2015 - nature.com",
            "authors": "Y LeCun, Y Bengio, G Hinton",
            "venue": "nature",
            "link": "https://www.nature.com/articles/nature14539"
        });

        let record = normalize(&doc, SourceType::GoogleScholar);
        assert_eq!(record.year, "2015");
        assert_eq!(record.venue, "nature");
        assert_eq!(record.doi, "n/a");
    }
}
