//! Archive model: one core table, its extensions and the metadata block

use crate::error::{Error, Result};
use crate::table::{Role, Table};
use crate::terms::RowType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dataset metadata (title, license, citation ...)
///
/// Carried through every operation unchanged; nothing in this crate
/// interprets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub title: String,
    pub description: String,
    pub license: String,
    pub citation: String,
    pub rights: String,
    /// Any further fields supplied by the caller
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A Darwin Core Archive held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct Archive {
    /// The core table
    pub core: Table,
    /// Extension tables, at most one per row type
    pub extensions: BTreeMap<RowType, Table>,
    /// Metadata block
    pub metadata: Metadata,
}

impl Archive {
    /// Create an archive around a core table
    pub fn new(core: Table, metadata: Metadata) -> Result<Self> {
        if !core.is_core() {
            return Err(Error::Descriptor(format!(
                "{} table is not a core table",
                core.row_type
            )));
        }
        Ok(Self {
            core,
            extensions: BTreeMap::new(),
            metadata,
        })
    }

    /// Add an extension table
    ///
    /// The extension's foreign key must have as many columns as the core key.
    pub fn add_extension(&mut self, table: Table) -> Result<()> {
        let foreign_key = match &table.role {
            Role::Core => {
                return Err(Error::Descriptor(format!(
                    "{} table is a core table and cannot be added as an extension",
                    table.row_type
                )))
            }
            Role::Extension { foreign_key } => foreign_key,
        };
        if foreign_key.len() != self.core.keys.len() {
            return Err(Error::ForeignKeyMismatch {
                row_type: table.row_type.to_string(),
                expected: self.core.keys.len(),
                found: foreign_key.len(),
            });
        }
        if self.extensions.contains_key(&table.row_type) {
            return Err(Error::DuplicateExtension(table.row_type.to_string()));
        }
        self.extensions.insert(table.row_type.clone(), table);
        Ok(())
    }

    /// Builder-style variant of [`Archive::add_extension`]
    pub fn with_extension(mut self, table: Table) -> Result<Self> {
        self.add_extension(table)?;
        Ok(self)
    }

    /// Drop an extension, returning its table
    pub fn remove_extension(&mut self, row_type: &RowType) -> Result<Table> {
        let table = self
            .extensions
            .remove(row_type)
            .ok_or_else(|| Error::UnknownRowType(format!("archive has no {} extension", row_type)))?;
        log::info!("removed {} extension ({} rows)", row_type, table.row_count());
        Ok(table)
    }

    /// Get an extension by row type
    pub fn extension(&self, row_type: &RowType) -> Option<&Table> {
        self.extensions.get(row_type)
    }

    /// Core first, then extensions in row type order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        std::iter::once(&self.core).chain(self.extensions.values())
    }

    /// Total number of rows over all tables
    pub fn total_rows(&self) -> usize {
        self.tables().map(Table::row_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core() -> Table {
        Table::core(
            RowType::Occurrence,
            vec!["occurrenceID".into(), "scientificName".into()],
            vec!["occurrenceID".into()],
        )
        .unwrap()
        .with_rows([["1", "species1"]])
    }

    fn media() -> Table {
        Table::extension(
            RowType::Multimedia,
            vec!["occurrenceID".into(), "identifier".into()],
            vec!["occurrenceID".into()],
            vec![],
        )
        .unwrap()
        .with_rows([["1", "http://x/a.jpg"]])
    }

    #[test]
    fn test_add_extension() {
        let archive = Archive::new(core(), Metadata::default())
            .unwrap()
            .with_extension(media())
            .unwrap();
        assert!(archive.extension(&RowType::Multimedia).is_some());
        assert_eq!(archive.tables().count(), 2);
        assert_eq!(archive.total_rows(), 2);
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let mut archive = Archive::new(core(), Metadata::default()).unwrap();
        archive.add_extension(media()).unwrap();
        let err = archive.add_extension(media()).unwrap_err();
        assert!(matches!(err, Error::DuplicateExtension(_)));
    }

    #[test]
    fn test_core_role_enforced() {
        assert!(Archive::new(media(), Metadata::default()).is_err());
        let mut archive = Archive::new(core(), Metadata::default()).unwrap();
        assert!(archive.add_extension(core()).is_err());
    }

    #[test]
    fn test_foreign_key_width_must_match_core_key() {
        let mut archive = Archive::new(core(), Metadata::default()).unwrap();
        let ext = Table::extension(
            RowType::MeasurementOrFact,
            vec!["occurrenceID".into(), "measurementType".into()],
            vec!["occurrenceID".into(), "measurementType".into()],
            vec![],
        )
        .unwrap();
        let err = archive.add_extension(ext).unwrap_err();
        assert!(matches!(err, Error::ForeignKeyMismatch { expected: 1, found: 2, .. }));
    }

    #[test]
    fn test_remove_extension() {
        let mut archive = Archive::new(core(), Metadata::default())
            .unwrap()
            .with_extension(media())
            .unwrap();
        let removed = archive.remove_extension(&RowType::Multimedia).unwrap();
        assert_eq!(removed.row_count(), 1);
        assert!(archive.extensions.is_empty());

        let err = archive.remove_extension(&RowType::Multimedia).unwrap_err();
        assert!(matches!(err, Error::UnknownRowType(_)));
    }

    #[test]
    fn test_metadata_keeps_extra_fields() {
        let json = r#"{"title":"Birds","license":"CC-BY","pubDate":"2024-01-01"}"#;
        let metadata: Metadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.title, "Birds");
        assert_eq!(metadata.extra["pubDate"], "2024-01-01");
        let back = serde_json::to_value(&metadata).unwrap();
        assert_eq!(back["pubDate"], "2024-01-01");
    }
}
