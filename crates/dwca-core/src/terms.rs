//! Controlled vocabulary: Darwin Core terms and archive row types
//!
//! The registry is loaded once (from the embedded vocabulary or an external,
//! versioned source) and is read-only afterwards. Components receive it by
//! reference.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;

const EMBEDDED_TERMS: &str = include_str!("../data/terms.csv");
const EMBEDDED_ROW_TYPES: &str = include_str!("../data/row_types.csv");

/// Namespace prefixes that show up in exported column headers
const NAMESPACE_PREFIXES: &[&str] = &["dwc:", "dcterms:", "dcterms_", "dc:", "ggbn:", "ggbn_"];

/// The category of a table in an archive
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RowType {
    Occurrence,
    Event,
    Taxon,
    Multimedia,
    MeasurementOrFact,
    ResourceRelationship,
    Identification,
    /// Any other extension, identified by its row type URI
    Extension(String),
}

impl RowType {
    /// Look up a row type by its short name, ignoring case, `_` and `-`
    ///
    /// Examples: "occurrence", "Event", "measurement_or_fact".
    pub fn from_name(name: &str) -> Option<Self> {
        let folded: String = name
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match folded.as_str() {
            "occurrence" => Some(RowType::Occurrence),
            "event" => Some(RowType::Event),
            "taxon" => Some(RowType::Taxon),
            "multimedia" => Some(RowType::Multimedia),
            "measurementorfact" => Some(RowType::MeasurementOrFact),
            "resourcerelationship" => Some(RowType::ResourceRelationship),
            "identification" => Some(RowType::Identification),
            _ => None,
        }
    }

    /// Short lowercase name, also used for default file names
    pub fn name(&self) -> String {
        match self {
            RowType::Occurrence => "occurrence".to_string(),
            RowType::Event => "event".to_string(),
            RowType::Taxon => "taxon".to_string(),
            RowType::Multimedia => "multimedia".to_string(),
            RowType::MeasurementOrFact => "measurementorfact".to_string(),
            RowType::ResourceRelationship => "resourcerelationship".to_string(),
            RowType::Identification => "identification".to_string(),
            RowType::Extension(uri) => extract_term(uri).to_lowercase(),
        }
    }

    /// The Darwin Core class whose terms belong to this row type
    pub fn class_name(&self) -> Option<&str> {
        match self {
            RowType::Occurrence => Some("Occurrence"),
            RowType::Event => Some("Event"),
            RowType::Taxon => Some("Taxon"),
            RowType::MeasurementOrFact => Some("MeasurementOrFact"),
            RowType::ResourceRelationship => Some("ResourceRelationship"),
            RowType::Identification => Some("Identification"),
            RowType::Multimedia | RowType::Extension(_) => None,
        }
    }

    /// Default data file name inside an archive
    pub fn default_file_name(&self) -> String {
        format!("{}.csv", self.name())
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowType::Extension(uri) => write!(f, "{}", uri),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl From<RowType> for String {
    fn from(row_type: RowType) -> Self {
        row_type.to_string()
    }
}

impl TryFrom<String> for RowType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        if let Some(row_type) = RowType::from_name(&value) {
            return Ok(row_type);
        }
        if value.contains("://") {
            return Ok(RowType::Extension(value));
        }
        Err(Error::UnknownRowType(value))
    }
}

/// One vocabulary term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    /// Canonical term name, e.g. "occurrenceID"
    #[serde(rename = "term")]
    pub name: String,
    /// Full term URI
    pub uri: String,
    /// Namespace prefix ("dwc", "dc", ...)
    pub prefix: String,
    /// Class the term is organised in, if any
    #[serde(default)]
    pub class: Option<String>,
}

/// A row type known to the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowTypeEntry {
    pub row_type: RowType,
    pub uri: String,
    pub prefix: String,
    pub default_keys: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RowTypeRecord {
    name: String,
    uri: String,
    prefix: String,
    #[serde(default)]
    default_keys: Option<String>,
}

/// Term names per row type and the row type URI mapping
#[derive(Debug, Clone)]
pub struct TermRegistry {
    terms: Vec<Term>,
    by_name: HashMap<String, Vec<usize>>,
    by_uri: HashMap<String, usize>,
    row_types: Vec<RowTypeEntry>,
}

impl TermRegistry {
    /// Load the vocabulary bundled with this crate
    pub fn load_embedded() -> Result<Self> {
        Self::from_readers(
            "embedded",
            EMBEDDED_TERMS.as_bytes(),
            EMBEDDED_ROW_TYPES.as_bytes(),
        )
    }

    /// Load a vocabulary from CSV sources
    ///
    /// `terms` needs the columns `term,uri,prefix[,class]`, `row_types` the
    /// columns `name,uri,prefix[,default_keys]` where default keys are
    /// separated by `|`.
    pub fn from_readers<T: Read, R: Read>(source_name: &str, terms: T, row_types: R) -> Result<Self> {
        let load_error = |message: String| Error::VocabularyLoad {
            source_name: source_name.to_string(),
            message,
        };

        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(terms);
        let mut term_list: Vec<Term> = Vec::new();
        for result in reader.deserialize() {
            let term: Term = result.map_err(|e| load_error(e.to_string()))?;
            if term.name.is_empty() || term.uri.is_empty() {
                return Err(load_error(format!(
                    "empty term or uri at entry {}",
                    term_list.len() + 1
                )));
            }
            term_list.push(term);
        }
        if term_list.is_empty() {
            return Err(load_error("no terms found".to_string()));
        }

        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(row_types);
        let mut entries: Vec<RowTypeEntry> = Vec::new();
        for result in reader.deserialize() {
            let record: RowTypeRecord = result.map_err(|e| load_error(e.to_string()))?;
            let row_type =
                RowType::from_name(&record.name).unwrap_or_else(|| RowType::Extension(record.uri.clone()));
            let default_keys = record
                .default_keys
                .as_deref()
                .map(|keys| {
                    keys.split('|')
                        .map(str::trim)
                        .filter(|k| !k.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            entries.push(RowTypeEntry {
                row_type,
                uri: record.uri,
                prefix: record.prefix,
                default_keys,
            });
        }
        if entries.is_empty() {
            return Err(load_error("no row types found".to_string()));
        }

        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_uri: HashMap<String, usize> = HashMap::new();
        let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
        for (idx, term) in term_list.iter().enumerate() {
            let folded = term.name.to_lowercase();
            if !seen.insert((folded.clone(), term.class.clone())) {
                return Err(load_error(format!(
                    "term '{}' declared twice for class {}",
                    term.name,
                    term.class.as_deref().unwrap_or("<none>")
                )));
            }
            by_name.entry(folded).or_default().push(idx);
            by_uri.entry(term.uri.clone()).or_insert(idx);
        }

        for entry in &entries {
            if entry.default_keys.len() > 1 {
                log::debug!(
                    "row type {} uses a compound default key {:?}",
                    entry.row_type,
                    entry.default_keys
                );
            }
        }

        log::debug!(
            "loaded vocabulary '{}': {} terms, {} row types",
            source_name,
            term_list.len(),
            entries.len()
        );

        Ok(Self {
            terms: term_list,
            by_name,
            by_uri,
            row_types: entries,
        })
    }

    /// All known terms
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// All known row types
    pub fn row_types(&self) -> &[RowTypeEntry] {
        &self.row_types
    }

    fn find_term(&self, row_type: &RowType, raw: &str) -> Option<&Term> {
        let raw = raw.trim();
        if let Some(&idx) = self.by_uri.get(raw) {
            return Some(&self.terms[idx]);
        }

        let candidate = canonical_candidate(raw);
        let indices = self.by_name.get(&candidate.to_lowercase())?;
        let class = row_type.class_name();
        indices
            .iter()
            .find(|&&i| class.is_some() && self.terms[i].class.as_deref() == class)
            .or_else(|| indices.first())
            .map(|&i| &self.terms[i])
    }

    /// Map a raw column name onto its canonical term name
    pub fn resolve(&self, row_type: &RowType, raw_field_name: &str) -> Result<String> {
        self.find_term(row_type, raw_field_name)
            .map(|t| t.name.clone())
            .ok_or_else(|| Error::UnknownTerm {
                row_type: row_type.to_string(),
                term: raw_field_name.to_string(),
            })
    }

    /// URI of a (canonical or raw) field name, if it is a known term
    pub fn term_uri(&self, row_type: &RowType, field_name: &str) -> Option<&str> {
        self.find_term(row_type, field_name).map(|t| t.uri.as_str())
    }

    /// Term registered under a URI
    pub fn resolve_uri(&self, uri: &str) -> Option<&Term> {
        self.by_uri.get(uri.trim()).map(|&idx| &self.terms[idx])
    }

    /// Default key columns for a row type (empty for unconstrained extensions)
    pub fn default_keys(&self, row_type: &RowType) -> Vec<String> {
        self.row_types
            .iter()
            .find(|e| &e.row_type == row_type)
            .map(|e| e.default_keys.clone())
            .unwrap_or_default()
    }

    /// Row type URI written to descriptors
    pub fn row_type_uri<'a>(&'a self, row_type: &'a RowType) -> Option<&'a str> {
        if let Some(entry) = self.row_types.iter().find(|e| &e.row_type == row_type) {
            return Some(entry.uri.as_str());
        }
        match row_type {
            RowType::Extension(uri) => Some(uri.as_str()),
            _ => None,
        }
    }

    /// Row type for a descriptor URI; unregistered URIs become generic extensions
    pub fn row_type_for_uri(&self, uri: &str) -> RowType {
        let uri = uri.trim();
        self.row_types
            .iter()
            .find(|e| e.uri == uri)
            .map(|e| e.row_type.clone())
            .unwrap_or_else(|| RowType::Extension(uri.to_string()))
    }

    /// Row type for a short name such as a file stem
    pub fn row_type_by_name(&self, name: &str) -> Option<RowType> {
        if let Some(row_type) = RowType::from_name(name) {
            return Some(row_type);
        }
        let folded = name.trim().to_lowercase();
        self.row_types
            .iter()
            .find(|e| e.row_type.name() == folded)
            .map(|e| e.row_type.clone())
    }
}

/// Strip namespace prefixes and reduce URIs to their term name
fn canonical_candidate(raw: &str) -> String {
    let mut name = raw.trim();
    for prefix in NAMESPACE_PREFIXES {
        if let Some(stripped) = name.strip_prefix(prefix) {
            name = stripped;
        }
    }
    extract_term(name).to_string()
}

/// Find a term name based on a term or a URI
///
/// Examples:
/// - "http://rs.tdwg.org/dwc/terms/occurrenceID" -> "occurrenceID"
/// - "http://example.org/vocab#colour" -> "colour"
/// - "scientificName" -> "scientificName"
pub fn extract_term(term: &str) -> &str {
    let term = term.trim();
    if !term.contains("://") {
        return term;
    }
    let tail = term.trim_end_matches(['/', '#']);
    match tail.rfind(['/', '#']) {
        Some(pos) if pos + 1 < tail.len() => &tail[pos + 1..],
        _ => tail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TermRegistry {
        TermRegistry::load_embedded().unwrap()
    }

    #[test]
    fn test_resolve_exact_and_case_insensitive() {
        let reg = registry();
        assert_eq!(reg.resolve(&RowType::Occurrence, "occurrenceID").unwrap(), "occurrenceID");
        assert_eq!(reg.resolve(&RowType::Occurrence, "OCCURRENCEID").unwrap(), "occurrenceID");
        assert_eq!(reg.resolve(&RowType::Occurrence, " scientificname ").unwrap(), "scientificName");
    }

    #[test]
    fn test_resolve_prefixed_and_uri_names() {
        let reg = registry();
        assert_eq!(reg.resolve(&RowType::Occurrence, "dwc:eventDate").unwrap(), "eventDate");
        assert_eq!(reg.resolve(&RowType::Multimedia, "dcterms:format").unwrap(), "format");
        assert_eq!(
            reg.resolve(&RowType::Occurrence, "http://rs.gbif.org/terms/1.0/gbifID").unwrap(),
            "gbifID"
        );
    }

    #[test]
    fn test_resolve_unknown_term() {
        let reg = registry();
        let err = reg.resolve(&RowType::Occurrence, "myCustomField").unwrap_err();
        assert!(matches!(err, Error::UnknownTerm { .. }));
    }

    #[test]
    fn test_default_keys() {
        let reg = registry();
        assert_eq!(reg.default_keys(&RowType::Occurrence), vec!["occurrenceID"]);
        assert_eq!(reg.default_keys(&RowType::Event), vec!["eventID"]);
        assert!(reg.default_keys(&RowType::Multimedia).is_empty());
    }

    #[test]
    fn test_row_type_uri_mapping() {
        let reg = registry();
        assert_eq!(
            reg.row_type_uri(&RowType::Multimedia),
            Some("http://rs.gbif.org/terms/1.0/Multimedia")
        );
        assert_eq!(
            reg.row_type_for_uri("http://rs.tdwg.org/dwc/terms/Event"),
            RowType::Event
        );
        let custom = reg.row_type_for_uri("http://rs.gbif.org/terms/1.0/DNADerivedData");
        assert_eq!(
            custom,
            RowType::Extension("http://rs.gbif.org/terms/1.0/DNADerivedData".to_string())
        );
        assert_eq!(custom.name(), "dnaderiveddata");
    }

    #[test]
    fn test_term_uri() {
        let reg = registry();
        assert_eq!(
            reg.term_uri(&RowType::Multimedia, "identifier"),
            Some("http://purl.org/dc/terms/identifier")
        );
        assert_eq!(reg.term_uri(&RowType::Occurrence, "notATerm"), None);
    }

    #[test]
    fn test_row_type_from_name() {
        assert_eq!(RowType::from_name("Occurrence"), Some(RowType::Occurrence));
        assert_eq!(
            RowType::from_name("measurement_or_fact"),
            Some(RowType::MeasurementOrFact)
        );
        assert_eq!(RowType::from_name("unknown"), None);
    }

    #[test]
    fn test_row_type_serde_as_string() {
        let json = serde_json::to_string(&RowType::Event).unwrap();
        assert_eq!(json, "\"event\"");
        let parsed: RowType = serde_json::from_str("\"http://example.org/Thing\"").unwrap();
        assert_eq!(parsed, RowType::Extension("http://example.org/Thing".to_string()));
        assert!(serde_json::from_str::<RowType>("\"nonsense\"").is_err());
    }

    #[test]
    fn test_load_failure_is_reported() {
        let err = TermRegistry::from_readers("broken", "term,uri\n".as_bytes(), "name,uri,prefix\n".as_bytes())
            .unwrap_err();
        assert!(matches!(err, Error::VocabularyLoad { .. }));

        let dup = "term,uri,prefix,class\na,http://x/a,x,C\nA,http://x/A,x,C\n";
        let rows = "name,uri,prefix,default_keys\noccurrence,http://x/Occ,x,a\n";
        let err = TermRegistry::from_readers("dup", dup.as_bytes(), rows.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::VocabularyLoad { .. }));
    }

    #[test]
    fn test_extract_term() {
        assert_eq!(extract_term("http://rs.tdwg.org/dwc/terms/occurrenceID"), "occurrenceID");
        assert_eq!(extract_term("http://example.org/vocab#colour"), "colour");
        assert_eq!(extract_term("plain"), "plain");
    }
}
