//! Mapping of provider payloads onto [`PublicationRecord`].
//!
//! Each provider is described by one declarative [`FieldMapping`] (see
//! [`mappings`]). A single generic [`normalize`] routine walks that table, so
//! adding a provider means adding a mapping rather than another block of
//! lookup code.
//!
//! Payloads are `serde_json::Value`s. Providers that answer in XML or HTML
//! reshape their response into a JSON object first.
//!
//! Paths are dot-separated object keys; a numeric segment indexes into an
//! array (`"fullTextUrlList.fullTextUrl.0.url"`).

pub mod mappings;

use regex::Regex;
use scraper::{Html, Node};
use serde_json::Value;
use std::sync::OnceLock;

use crate::models::{PublicationRecord, SourceType};

pub use mappings::mapping_for;

/// How one canonical field is pulled out of a provider payload
#[derive(Debug, Clone, Copy)]
pub enum FieldRule {
    /// The provider never supplies this field
    Missing,
    /// Value at a path
    Path(&'static str),
    /// First path that yields a value
    FirstOf(&'static [&'static str]),
    /// First rule that yields a value
    Chain(&'static [FieldRule]),
    /// Array of objects, one value per element, joined with "; "
    Join {
        array: &'static str,
        item: &'static str,
    },
    /// Value of the first array element whose `key` equals `equals`
    Lookup {
        array: &'static str,
        key: &'static str,
        equals: &'static str,
        value: &'static str,
    },
    /// Text rebuilt from a word -> positions index
    InvertedIndex(&'static str),
    /// Value at a path that may hold HTML markup; only its text is kept
    Markup(&'static str),
    /// Value at a path with a fixed prefix prepended
    Prefixed {
        path: &'static str,
        prefix: &'static str,
    },
    /// Value at a path with a leading prefix removed when present
    Trimmed {
        path: &'static str,
        prefix: &'static str,
    },
}

impl FieldRule {
    /// Apply the rule. `None` means the provider did not supply the field.
    pub fn extract(&self, payload: &Value) -> Option<String> {
        match *self {
            FieldRule::Missing => None,
            FieldRule::Path(path) => lookup(payload, path).and_then(leaf_text),
            FieldRule::FirstOf(paths) => paths
                .iter()
                .find_map(|p| lookup(payload, p).and_then(leaf_text)),
            FieldRule::Chain(rules) => rules.iter().find_map(|r| r.extract(payload)),
            FieldRule::Join { array, item } => {
                let names: Vec<String> = lookup(payload, array)?
                    .as_array()?
                    .iter()
                    .filter_map(|entry| lookup(entry, item).and_then(leaf_text))
                    .collect();
                non_empty(names.join("; "))
            }
            FieldRule::Lookup {
                array,
                key,
                equals,
                value,
            } => lookup(payload, array)?
                .as_array()?
                .iter()
                .find(|entry| {
                    entry
                        .get(key)
                        .and_then(Value::as_str)
                        .is_some_and(|k| k.eq_ignore_ascii_case(equals))
                })
                .and_then(|entry| lookup(entry, value))
                .and_then(leaf_text),
            FieldRule::InvertedIndex(path) => rebuild_inverted_index(lookup(payload, path)?),
            FieldRule::Markup(path) => lookup(payload, path)
                .and_then(leaf_text)
                .and_then(|text| non_empty(collapse_whitespace(&strip_markup(&text)))),
            FieldRule::Prefixed { path, prefix } => lookup(payload, path)
                .and_then(leaf_text)
                .map(|v| format!("{}{}", prefix, v)),
            FieldRule::Trimmed { path, prefix } => lookup(payload, path)
                .and_then(leaf_text)
                .and_then(|v| non_empty(v.strip_prefix(prefix).unwrap_or(&v).to_string())),
        }
    }
}

/// Extraction rules for every canonical field of one provider
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub identifier: FieldRule,
    pub title: FieldRule,
    pub year: FieldRule,
    pub venue: FieldRule,
    pub abstract_text: FieldRule,
    pub doi: FieldRule,
    pub authors: FieldRule,
    pub url: FieldRule,
}

/// Map one provider payload onto a canonical record.
///
/// Total: every field of the result is either a real value or
/// [`PublicationRecord::NOT_AVAILABLE`], whatever the payload looks like.
pub fn normalize(payload: &Value, source: SourceType) -> PublicationRecord {
    let mapping = mapping_for(source);
    let field = |rule: &FieldRule| or_sentinel(rule.extract(payload));

    PublicationRecord {
        source,
        identifier: field(&mapping.identifier),
        title: field(&mapping.title),
        year: mapping
            .year
            .extract(payload)
            .map(|raw| extract_year(&raw))
            .unwrap_or_else(sentinel),
        venue: field(&mapping.venue),
        abstract_text: field(&mapping.abstract_text),
        doi: or_sentinel(mapping.doi.extract(payload).and_then(|d| clean_doi(&d))),
        authors: field(&mapping.authors),
        url: field(&mapping.url),
    }
}

/// Leading four-digit year token of a free-form date string, or the sentinel.
///
/// `"2021 Jan 15"` gives `"2021"`, `"2019-06"` gives `"2019"`.
pub fn extract_year(text: &str) -> String {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    let re = YEAR.get_or_init(|| Regex::new(r"\b(\d{4})\b").expect("valid year regex"));

    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(sentinel)
}

/// Strip resolver prefixes from a DOI
pub fn clean_doi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let prefixes = [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ];

    let bare = prefixes
        .iter()
        .find(|p| lower.starts_with(*p))
        .map(|p| &trimmed[p.len()..])
        .unwrap_or(trimmed);

    non_empty(bare.trim().to_string())
}

/// Follow a dot-separated path through objects and arrays
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Object(map) => map.get(segment),
        _ => None,
    })
}

fn leaf_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => non_empty(collapse_whitespace(s)),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(leaf_text).collect();
            non_empty(parts.join("; "))
        }
        _ => None,
    }
}

fn rebuild_inverted_index(index: &Value) -> Option<String> {
    let mut words: Vec<(u64, &str)> = index
        .as_object()?
        .iter()
        .flat_map(|(word, positions)| {
            positions
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(Value::as_u64)
                .map(move |pos| (pos, word.as_str()))
        })
        .collect();
    words.sort_by_key(|(pos, _)| *pos);

    let text: Vec<&str> = words.into_iter().map(|(_, w)| w).collect();
    non_empty(text.join(" "))
}

/// Elements whose text stands apart from its neighbours
const BLOCK_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "p", "div", "li", "br", "section"];

/// Text content of an HTML fragment, entities decoded
fn strip_markup(text: &str) -> String {
    if !text.contains('<') && !text.contains('&') {
        return text.to_string();
    }

    let fragment = Html::parse_fragment(text);
    let mut out = String::with_capacity(text.len());
    for node in fragment.root_element().descendants() {
        if let Node::Text(content) = node.value() {
            let block = node
                .parent()
                .and_then(|parent| parent.value().as_element().map(|e| BLOCK_TAGS.contains(&e.name())))
                .unwrap_or(false);
            if block {
                out.push(' ');
                out.push_str(content);
                out.push(' ');
            } else {
                out.push_str(content);
            }
        }
    }
    out
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() || s == PublicationRecord::NOT_AVAILABLE {
        None
    } else {
        Some(s)
    }
}

fn sentinel() -> String {
    PublicationRecord::NOT_AVAILABLE.to_string()
}

fn or_sentinel(value: Option<String>) -> String {
    value.unwrap_or_else(sentinel)
}
