//! Ingestion: turn raw delimited tables into archive tables
//!
//! Column names are canonicalised against the term registry (unknown names
//! pass through untouched), keys are defaulted from the registry and a
//! multimedia extension can be derived from an associated media column.

use crate::archive::{Archive, Metadata};
use crate::config::ArchiveConfig;
use crate::error::{Error, Result};
use crate::media::{infer_media, split_media_urls};
use crate::parser::RawTable;
use crate::table::Table;
use crate::terms::{extract_term, RowType, TermRegistry};
use std::collections::HashSet;

/// Column holding `|` separated media links in occurrence exports
pub const ASSOCIATED_MEDIA: &str = "associatedMedia";

/// One table to ingest, with what the caller declared about it
#[derive(Debug, Clone)]
pub struct TableInput {
    pub raw: RawTable,
    pub row_type: RowType,
    /// Uniqueness keys; registry default when `None`
    pub keys: Option<Vec<String>>,
    /// Extension link to the core keys; the core key names when `None`
    pub foreign_key: Option<Vec<String>>,
}

impl TableInput {
    pub fn new(raw: RawTable, row_type: RowType) -> Self {
        Self {
            raw,
            row_type,
            keys: None,
            foreign_key: None,
        }
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: Vec<String>) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }
}

/// Pick the core among a set of row types
///
/// An event table wins over an occurrence table; anything else is ambiguous.
pub fn infer_core<'a, I>(row_types: I) -> Result<RowType>
where
    I: IntoIterator<Item = &'a RowType>,
{
    let row_types: Vec<&RowType> = row_types.into_iter().collect();
    for candidate in [RowType::Event, RowType::Occurrence] {
        if row_types.contains(&&candidate) {
            return Ok(candidate);
        }
    }
    Err(Error::AmbiguousCore {
        inputs: row_types.iter().map(|r| r.to_string()).collect(),
    })
}

/// Converts raw inputs into tables and archives
pub struct Normalizer<'a> {
    registry: &'a TermRegistry,
    config: &'a ArchiveConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(registry: &'a TermRegistry, config: &'a ArchiveConfig) -> Self {
        Self { registry, config }
    }

    /// Canonical name of one field; unknown names are kept as given
    pub fn canonical_name(&self, row_type: &RowType, raw: &str) -> String {
        match self.registry.resolve(row_type, raw) {
            Ok(name) => name,
            Err(_) => {
                log::debug!("{}: '{}' is not a known term, keeping it as is", row_type, raw.trim());
                raw.trim().to_string()
            }
        }
    }

    /// Canonicalise the headers of a raw table
    pub fn canonical_columns(&self, raw: &RawTable, row_type: &RowType) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(raw.headers.len());
        for (index, header) in raw.headers.iter().enumerate() {
            if header.trim().is_empty() {
                return Err(Error::BlankColumn {
                    source_name: raw.name.clone(),
                    index,
                });
            }
            let name = self.canonical_name(row_type, header);
            if !seen.insert(name.clone()) {
                return Err(Error::DuplicateColumn {
                    row_type: row_type.to_string(),
                    column: name,
                });
            }
            columns.push(name);
        }
        Ok(columns)
    }

    /// Canonicalise declared key names, which may be given as URIs
    pub fn canonical_keys(&self, row_type: &RowType, keys: &[String]) -> Vec<String> {
        keys.iter()
            .map(|k| self.canonical_name(row_type, extract_term(k)))
            .collect()
    }

    /// Build a core table from a raw input
    ///
    /// Without declared keys the registry default is used; a row type
    /// without one fails with `MissingKey`.
    pub fn normalize(
        &self,
        raw: &RawTable,
        row_type: &RowType,
        declared_keys: Option<&[String]>,
    ) -> Result<Table> {
        let columns = self.canonical_columns(raw, row_type)?;
        let keys = match declared_keys {
            Some(keys) if !keys.is_empty() => self.canonical_keys(row_type, keys),
            _ => self.registry.default_keys(row_type),
        };
        if keys.is_empty() {
            return Err(Error::MissingKey {
                row_type: row_type.to_string(),
            });
        }

        let table = Table::core(row_type.clone(), columns, keys)?.with_rows(raw.rows.iter().cloned());
        log::info!(
            "loaded {} core: {} rows, {} columns",
            row_type,
            table.row_count(),
            table.column_count()
        );
        Ok(table)
    }

    /// Build an extension table linked to `core_keys`
    pub fn normalize_extension(
        &self,
        raw: &RawTable,
        row_type: &RowType,
        core_keys: &[String],
        foreign_key: Option<&[String]>,
        declared_keys: Option<&[String]>,
    ) -> Result<Table> {
        let columns = self.canonical_columns(raw, row_type)?;
        let foreign_key = match foreign_key {
            Some(fk) if !fk.is_empty() => self.canonical_keys(row_type, fk),
            _ => core_keys.to_vec(),
        };
        let keys = match declared_keys {
            Some(keys) if !keys.is_empty() => self.canonical_keys(row_type, keys),
            _ => {
                let defaults = self.registry.default_keys(row_type);
                if defaults.iter().all(|k| columns.contains(k)) {
                    defaults
                } else {
                    log::debug!("{}: default keys {:?} not present, leaving unkeyed", row_type, defaults);
                    Vec::new()
                }
            }
        };

        let mut table =
            Table::extension(row_type.clone(), columns, foreign_key, keys)?.with_rows(raw.rows.iter().cloned());
        if *row_type == RowType::Multimedia && self.config.fill_media_info {
            fill_media_info(&mut table);
        }
        log::info!(
            "loaded {} extension: {} rows, {} columns",
            row_type,
            table.row_count(),
            table.column_count()
        );
        Ok(table)
    }

    /// Build a complete archive from a core input and extension inputs
    pub fn build_archive(
        &self,
        core: TableInput,
        extensions: Vec<TableInput>,
        metadata: Metadata,
    ) -> Result<Archive> {
        let mut core_table = self.normalize(&core.raw, &core.row_type, core.keys.as_deref())?;

        let has_multimedia = extensions.iter().any(|e| e.row_type == RowType::Multimedia);
        let derived = if self.config.extract_associated_media && !has_multimedia {
            extract_multimedia(
                &mut core_table,
                &self.config.media_delimiters,
                self.config.keep_associated_media,
            )?
        } else {
            None
        };

        let core_keys = core_table.keys.clone();
        let mut archive = Archive::new(core_table, metadata)?;
        for input in extensions {
            if input.row_type == core.row_type {
                return Err(Error::DuplicateExtension(input.row_type.to_string()));
            }
            let table = self.normalize_extension(
                &input.raw,
                &input.row_type,
                &core_keys,
                input.foreign_key.as_deref(),
                input.keys.as_deref(),
            )?;
            archive.add_extension(table)?;
        }
        if let Some(multimedia) = derived {
            archive.add_extension(multimedia)?;
        }
        Ok(archive)
    }
}

/// Derive a multimedia extension from the core's associated media column
///
/// Each link becomes one row carrying the core key, the link as
/// `identifier` and, where the extension allows it, the inferred `format`
/// and `type`. Core rows without a key are skipped. The column is removed
/// from the core unless `keep_column` is set. Returns `None` when the core
/// has no such column or no links.
pub fn extract_multimedia(core: &mut Table, delimiters: &[char], keep_column: bool) -> Result<Option<Table>> {
    let Some(media_idx) = core.column_index(ASSOCIATED_MEDIA) else {
        return Ok(None);
    };
    let key_indices = core.column_indices(&core.keys)?;

    let mut columns = core.keys.clone();
    columns.extend(["identifier".to_string(), "format".to_string(), "type".to_string()]);
    let mut keys = core.keys.clone();
    keys.push("identifier".to_string());
    let mut multimedia = Table::extension(RowType::Multimedia, columns, core.keys.clone(), keys)?;

    let mut seen: HashSet<(Vec<String>, String)> = HashSet::new();
    let mut skipped = 0;
    for row in &core.rows {
        let urls = split_media_urls(row.get(media_idx), delimiters);
        if urls.is_empty() {
            continue;
        }
        let Some(key) = row.key(&key_indices) else {
            skipped += 1;
            continue;
        };
        for url in urls {
            if !seen.insert((key.clone(), url.clone())) {
                continue;
            }
            let (format, media_type) = match infer_media(&url) {
                Some(info) => (
                    info.format,
                    info.media_type.map(|t| t.as_str().to_string()).unwrap_or_default(),
                ),
                None => (String::new(), String::new()),
            };
            let mut cells = key.clone();
            cells.extend([url, format, media_type]);
            multimedia.push_row(cells);
        }
    }
    if skipped > 0 {
        log::warn!("{} core row(s) with media links but no key were skipped", skipped);
    }

    if !keep_column {
        core.remove_column(ASSOCIATED_MEDIA)?;
    }
    if multimedia.row_count() == 0 {
        return Ok(None);
    }
    log::info!("derived {} multimedia rows from {}", multimedia.row_count(), ASSOCIATED_MEDIA);
    Ok(Some(multimedia))
}

/// Fill empty `format`/`type` cells of a multimedia table from its links
///
/// Missing columns are appended. Cells that already hold a value are kept.
pub fn fill_media_info(table: &mut Table) {
    let Some(id_idx) = table.column_index("identifier") else {
        return;
    };
    let format_idx = table.add_column("format");
    let type_idx = table.add_column("type");

    let mut filled = 0;
    for row in &mut table.rows {
        let needs_format = row.get(format_idx).trim().is_empty();
        let needs_type = row.get(type_idx).trim().is_empty();
        if !needs_format && !needs_type {
            continue;
        }
        let Some(info) = infer_media(row.get(id_idx)) else {
            continue;
        };
        if needs_format {
            row.cells[format_idx] = info.format;
        }
        if needs_type {
            if let Some(media_type) = info.media_type {
                row.cells[type_idx] = media_type.as_str().to_string();
            }
        }
        filled += 1;
    }
    if filled > 0 {
        log::debug!("inferred media info for {} multimedia row(s)", filled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CsvDialect;
    use crate::parser::parse_csv_str;

    fn raw(csv: &str) -> RawTable {
        parse_csv_str(csv, "input.csv", &CsvDialect::default()).unwrap()
    }

    fn registry() -> TermRegistry {
        TermRegistry::load_embedded().unwrap()
    }

    #[test]
    fn test_normalize_canonicalises_and_defaults_keys() {
        let registry = registry();
        let config = ArchiveConfig::default();
        let normalizer = Normalizer::new(&registry, &config);

        let table = normalizer
            .normalize(
                &raw("dwc:occurrenceID,SCIENTIFICNAME,myField\n1,Aus bus,x\n"),
                &RowType::Occurrence,
                None,
            )
            .unwrap();
        assert_eq!(table.columns, vec!["occurrenceID", "scientificName", "myField"]);
        assert_eq!(table.keys, vec!["occurrenceID"]);
        assert_eq!(table.rows[0].cells, vec!["1", "Aus bus", "x"]);
    }

    #[test]
    fn test_normalize_declared_keys() {
        let registry = registry();
        let config = ArchiveConfig::default();
        let normalizer = Normalizer::new(&registry, &config);

        let keys = vec!["http://rs.tdwg.org/dwc/terms/catalogNumber".to_string()];
        let table = normalizer
            .normalize(&raw("catalogNumber,locality\nC1,here\n"), &RowType::Occurrence, Some(&keys))
            .unwrap();
        assert_eq!(table.keys, vec!["catalogNumber"]);
    }

    #[test]
    fn test_missing_key() {
        let registry = registry();
        let config = ArchiveConfig::default();
        let normalizer = Normalizer::new(&registry, &config);

        let err = normalizer
            .normalize(&raw("identifier\nhttp://x/a.jpg\n"), &RowType::Multimedia, None)
            .unwrap_err();
        assert!(matches!(err, Error::MissingKey { .. }));
    }

    #[test]
    fn test_blank_and_colliding_headers() {
        let registry = registry();
        let config = ArchiveConfig::default();
        let normalizer = Normalizer::new(&registry, &config);

        let err = normalizer
            .normalize(&raw("occurrenceID,,x\n1,2,3\n"), &RowType::Occurrence, None)
            .unwrap_err();
        assert!(matches!(err, Error::BlankColumn { index: 1, .. }));

        let err = normalizer
            .normalize(&raw("occurrenceID,dwc:occurrenceID\n1,1\n"), &RowType::Occurrence, None)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn { .. }));
    }

    #[test]
    fn test_infer_core() {
        assert_eq!(
            infer_core(&[RowType::Multimedia, RowType::Occurrence, RowType::Event]).unwrap(),
            RowType::Event
        );
        assert_eq!(
            infer_core(&[RowType::Occurrence, RowType::Multimedia]).unwrap(),
            RowType::Occurrence
        );
        let err = infer_core(&[RowType::Multimedia]).unwrap_err();
        assert!(matches!(err, Error::AmbiguousCore { .. }));
    }

    #[test]
    fn test_extract_multimedia() {
        let registry = registry();
        let config = ArchiveConfig::default();
        let normalizer = Normalizer::new(&registry, &config);
        let mut core = normalizer
            .normalize(
                &raw("occurrenceID,associatedMedia\n1,http://x/a.jpg|http://x/b.mp4\n2,\n3,http://x/c|http://x/c\n"),
                &RowType::Occurrence,
                None,
            )
            .unwrap();

        let media = extract_multimedia(&mut core, &['|'], false).unwrap().unwrap();
        assert_eq!(media.columns, vec!["occurrenceID", "identifier", "format", "type"]);
        assert_eq!(media.foreign_key(), ["occurrenceID".to_string()]);
        assert_eq!(media.row_count(), 3);
        assert_eq!(media.rows[0].cells, vec!["1", "http://x/a.jpg", "image/jpeg", "StillImage"]);
        assert_eq!(media.rows[1].cells, vec!["1", "http://x/b.mp4", "video/mp4", "MovingImage"]);
        assert_eq!(media.rows[2].cells, vec!["3", "http://x/c", "", ""]);
        assert!(!core.has_column(ASSOCIATED_MEDIA));
    }

    #[test]
    fn test_build_archive_links_extensions() {
        let registry = registry();
        let config = ArchiveConfig::default();
        let normalizer = Normalizer::new(&registry, &config);

        let core = TableInput::new(
            raw("occurrenceID,associatedMedia\n1,http://x/a.jpg\n"),
            RowType::Occurrence,
        );
        let mof = TableInput::new(
            raw("occurrenceID,measurementType,measurementValue\n1,length,3\n"),
            RowType::MeasurementOrFact,
        );
        let archive = normalizer.build_archive(core, vec![mof], Metadata::default()).unwrap();

        let mof = archive.extension(&RowType::MeasurementOrFact).unwrap();
        assert_eq!(mof.foreign_key(), ["occurrenceID".to_string()]);
        assert!(mof.keys.is_empty());
        assert_eq!(archive.extension(&RowType::Multimedia).unwrap().row_count(), 1);
    }

    #[test]
    fn test_supplied_multimedia_is_filled_not_derived() {
        let registry = registry();
        let config = ArchiveConfig::default();
        let normalizer = Normalizer::new(&registry, &config);

        let core = TableInput::new(
            raw("occurrenceID,associatedMedia\n1,http://x/other.png\n"),
            RowType::Occurrence,
        );
        let media = TableInput::new(
            raw("occurrenceID,identifier,format\n1,http://x/a.wav,\n1,http://x/b.jpg,image/png\n"),
            RowType::Multimedia,
        );
        let archive = normalizer.build_archive(core, vec![media], Metadata::default()).unwrap();

        assert!(archive.core.has_column(ASSOCIATED_MEDIA));
        let media = archive.extension(&RowType::Multimedia).unwrap();
        assert_eq!(media.row_count(), 2);
        assert_eq!(media.value(0, "format"), Some("audio/x-wav"));
        assert_eq!(media.value(0, "type"), Some("Sound"));
        assert_eq!(media.value(1, "format"), Some("image/png"));
        assert_eq!(media.value(1, "type"), Some("StillImage"));
    }
}
