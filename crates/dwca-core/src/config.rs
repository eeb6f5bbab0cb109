//! Configuration: CSV dialects, archive defaults and key lookups

use crate::error::{Error, Result};
use crate::terms::{extract_term, RowType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Key columns to use per row type when merging, deleting or validating
pub type KeyLookup = BTreeMap<RowType, Vec<String>>;

/// Record terminator of a delimited file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    Lf,
    #[default]
    Crlf,
}

impl LineTerminator {
    /// Escaped spelling used in descriptors
    pub fn escaped(&self) -> &'static str {
        match self {
            LineTerminator::Lf => "\\n",
            LineTerminator::Crlf => "\\r\\n",
        }
    }

    /// Parse an escaped or literal terminator spelling
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "\\n" | "\n" => Ok(LineTerminator::Lf),
            "\\r\\n" | "\r\n" | "" => Ok(LineTerminator::Crlf),
            other => Err(Error::Dialect(format!("unsupported line terminator '{}'", other))),
        }
    }
}

/// How a delimited table is encoded
///
/// The default follows the general DwC conventions: comma-delimited,
/// double quotes around text, CRLF between records and one header line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvDialect {
    pub delimiter: char,
    pub quote: char,
    pub line_terminator: LineTerminator,
    pub encoding: String,
    pub ignore_header_lines: usize,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            line_terminator: LineTerminator::Crlf,
            encoding: "UTF-8".to_string(),
            ignore_header_lines: 1,
        }
    }
}

impl CsvDialect {
    /// Tab-separated variant of the default dialect
    pub fn tsv() -> Self {
        Self {
            delimiter: '\t',
            ..Self::default()
        }
    }

    /// Build a dialect from the escaped spellings found in descriptors
    ///
    /// Examples: `"\\t"` is a tab, `"&quot;"` is a double quote and an empty
    /// enclosure falls back to a double quote.
    pub fn from_escaped(delimiter: &str, quote: &str, line_terminator: &str) -> Result<Self> {
        Ok(Self {
            delimiter: unescape_char(delimiter)?,
            quote: if quote.is_empty() { '"' } else { unescape_char(quote)? },
            line_terminator: LineTerminator::parse(line_terminator)?,
            ..Self::default()
        })
    }

    pub(crate) fn delimiter_byte(&self) -> Result<u8> {
        ascii_byte(self.delimiter, "delimiter")
    }

    pub(crate) fn quote_byte(&self) -> Result<u8> {
        ascii_byte(self.quote, "quote")
    }
}

fn unescape_char(value: &str) -> Result<char> {
    let translated = match value {
        "\\t" => "\t",
        "&quot;" => "\"",
        "\\n" => "\n",
        other => other,
    };
    let mut chars = translated.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::Dialect(format!("expected a single character, got '{}'", value))),
    }
}

fn ascii_byte(c: char, what: &str) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(Error::Dialect(format!("{} '{}' is not an ASCII character", what, c)))
    }
}

/// Settings for building and writing archives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Dialect used for written data files
    pub dialect: CsvDialect,
    /// File name of the JSON descriptor
    pub descriptor_file: String,
    /// File name of the rendered Darwin Core text descriptor
    pub meta_xml_file: String,
    /// File name of the metadata block
    pub metadata_file: String,
    /// Separators between URLs in an associated media field
    pub media_delimiters: Vec<char>,
    /// Synthesize a multimedia extension from associated media links
    pub extract_associated_media: bool,
    /// Keep the associated media column in the core after extraction
    pub keep_associated_media: bool,
    /// Infer missing format/type in supplied multimedia extensions
    pub fill_media_info: bool,
    /// Validate core keys when creating an archive
    pub validate_on_create: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dialect: CsvDialect::default(),
            descriptor_file: "meta.json".to_string(),
            meta_xml_file: "meta.xml".to_string(),
            metadata_file: "eml.json".to_string(),
            media_delimiters: vec!['|', ';'],
            extract_associated_media: true,
            keep_associated_media: false,
            fill_media_info: true,
            validate_on_create: true,
        }
    }
}

impl ArchiveConfig {
    /// Load a config file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the config file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Parse a key lookup entry such as `occurrence=occurrenceID` or
/// `multimedia=occurrenceID,identifier`
///
/// Key names given as URIs are reduced to their term name.
pub fn parse_key_spec(spec: &str) -> Result<(RowType, Vec<String>)> {
    let (row_type, keys) = spec
        .split_once('=')
        .ok_or_else(|| Error::Dialect(format!("expected TYPE=KEY[,KEY...], got '{}'", spec)))?;
    let row_type = RowType::try_from(row_type.trim().to_string())?;
    let keys: Vec<String> = split_key_list(keys);
    if keys.is_empty() {
        return Err(Error::MissingKey {
            row_type: row_type.to_string(),
        });
    }
    Ok((row_type, keys))
}

/// Split a comma separated key list, reducing URIs to term names
pub fn split_key_list(keys: &str) -> Vec<String> {
    keys.split(',')
        .map(|k| extract_term(k.trim()).to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_dialect() {
        let dialect = CsvDialect::default();
        assert_eq!(dialect.delimiter, ',');
        assert_eq!(dialect.quote, '"');
        assert_eq!(dialect.line_terminator, LineTerminator::Crlf);
        assert_eq!(dialect.ignore_header_lines, 1);
    }

    #[test]
    fn test_dialect_from_escaped() {
        let dialect = CsvDialect::from_escaped("\\t", "&quot;", "\\n").unwrap();
        assert_eq!(dialect.delimiter, '\t');
        assert_eq!(dialect.quote, '"');
        assert_eq!(dialect.line_terminator, LineTerminator::Lf);

        let dialect = CsvDialect::from_escaped(",", "", "\\r\\n").unwrap();
        assert_eq!(dialect.quote, '"');
        assert!(CsvDialect::from_escaped(",,", "\"", "\\n").is_err());
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let dialect = CsvDialect {
            delimiter: '§',
            ..CsvDialect::default()
        };
        assert!(matches!(dialect.delimiter_byte(), Err(Error::Dialect(_))));
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: ArchiveConfig = serde_json::from_str(r#"{"media_delimiters": ["|"]}"#).unwrap();
        assert_eq!(config.media_delimiters, vec!['|']);
        assert_eq!(config.descriptor_file, "meta.json");
        assert!(config.validate_on_create);
    }

    #[test]
    fn test_parse_key_spec() {
        let (row_type, keys) = parse_key_spec("multimedia=occurrenceID, identifier").unwrap();
        assert_eq!(row_type, RowType::Multimedia);
        assert_eq!(keys, vec!["occurrenceID", "identifier"]);

        let (_, keys) = parse_key_spec("occurrence=http://rs.gbif.org/terms/1.0/gbifID").unwrap();
        assert_eq!(keys, vec!["gbifID"]);

        assert!(parse_key_spec("occurrence").is_err());
        assert!(parse_key_spec("occurrence=").is_err());
    }
}
