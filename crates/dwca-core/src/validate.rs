//! Key validation: non-empty and unique key tuples per table
//!
//! Validation never stops at the first defect. Every table is checked in
//! full so one report carries the complete defect set.

use crate::archive::Archive;
use crate::config::KeyLookup;
use crate::error::{Error, Result};
use crate::table::{KeyTuple, Table};
use crate::terms::{RowType, TermRegistry};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// A row with at least one empty key value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyKeyViolation {
    /// Zero-based data row index
    pub row: usize,
    /// Key columns that are empty in this row
    pub columns: Vec<String>,
}

/// A key tuple shared by more than one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKeyViolation {
    pub key: KeyTuple,
    /// Zero-based data row indices, ascending
    pub rows: Vec<usize>,
}

/// Key validation result for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableValidation {
    pub row_type: RowType,
    pub keys: Vec<String>,
    /// Key columns that do not exist in the table at all
    pub missing_columns: Vec<String>,
    pub empty_keys: Vec<EmptyKeyViolation>,
    pub duplicate_keys: Vec<DuplicateKeyViolation>,
}

impl TableValidation {
    pub fn is_valid(&self) -> bool {
        self.missing_columns.is_empty() && self.empty_keys.is_empty() && self.duplicate_keys.is_empty()
    }
}

/// Validation result for a set of tables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub tables: Vec<TableValidation>,
}

impl ValidationReport {
    /// True when no table has a defect
    pub fn is_valid(&self) -> bool {
        self.tables.iter().all(TableValidation::is_valid)
    }

    /// Get the result for one table
    pub fn table(&self, row_type: &RowType) -> Option<&TableValidation> {
        self.tables.iter().find(|t| &t.row_type == row_type)
    }

    /// Turn a failed report into `Error::Validation`
    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed: Vec<&TableValidation> = self.tables.iter().filter(|t| !t.is_valid()).collect();
        if failed.is_empty() {
            return write!(f, "all keys valid");
        }
        for (i, table) in failed.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{} table (keys: {})", table.row_type, table.keys.join(", "))?;
            for column in &table.missing_columns {
                write!(f, "\n  missing key column '{}'", column)?;
            }
            for empty in &table.empty_keys {
                write!(f, "\n  row {}: empty key value in {}", empty.row, empty.columns.join(", "))?;
            }
            for dup in &table.duplicate_keys {
                let rows: Vec<String> = dup.rows.iter().map(|r| r.to_string()).collect();
                write!(f, "\n  duplicate key ({}) in rows {}", dup.key.join(", "), rows.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Key columns to use for a table
///
/// The explicit lookup wins, then the table's own keys, then the registry
/// default for the row type.
pub fn effective_keys(table: &Table, key_lookup: &KeyLookup, registry: &TermRegistry) -> Vec<String> {
    if let Some(keys) = key_lookup.get(&table.row_type) {
        return keys.clone();
    }
    if !table.keys.is_empty() {
        return table.keys.clone();
    }
    registry.default_keys(&table.row_type)
}

/// Check that every key tuple in the table is non-empty and unique
pub fn validate_keys(table: &Table, keys: &[String]) -> TableValidation {
    let mut result = TableValidation {
        row_type: table.row_type.clone(),
        keys: keys.to_vec(),
        missing_columns: Vec::new(),
        empty_keys: Vec::new(),
        duplicate_keys: Vec::new(),
    };

    let mut indices = Vec::with_capacity(keys.len());
    for key in keys {
        match table.column_index(key) {
            Some(idx) => indices.push(idx),
            None => result.missing_columns.push(key.clone()),
        }
    }
    if !result.missing_columns.is_empty() {
        return result;
    }

    let mut seen: HashMap<KeyTuple, Vec<usize>> = HashMap::new();
    let mut order: Vec<KeyTuple> = Vec::new();
    for (row_idx, row) in table.rows.iter().enumerate() {
        match row.key(&indices) {
            Some(key) => {
                let rows = seen.entry(key.clone()).or_default();
                if rows.len() == 1 {
                    order.push(key);
                }
                rows.push(row_idx);
            }
            None => {
                let columns = keys
                    .iter()
                    .zip(&indices)
                    .filter(|(_, idx)| row.get(**idx).trim().is_empty())
                    .map(|(name, _)| name.clone())
                    .collect();
                result.empty_keys.push(EmptyKeyViolation { row: row_idx, columns });
            }
        }
    }

    result.duplicate_keys = order
        .into_iter()
        .filter_map(|key| {
            let rows = seen.remove(&key)?;
            Some(DuplicateKeyViolation { key, rows })
        })
        .collect();

    if !result.is_valid() {
        log::warn!(
            "{} table: {} row(s) with empty keys, {} duplicated key(s)",
            table.row_type,
            result.empty_keys.len(),
            result.duplicate_keys.len()
        );
        for dup in &result.duplicate_keys {
            log::debug!("duplicate key {:?} in rows {:?}", dup.key, dup.rows);
        }
    }

    result
}

/// Validate the core and every extension that carries keys
pub fn validate(archive: &Archive, key_lookup: &KeyLookup, registry: &TermRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();
    for table in archive.tables() {
        let keys = effective_keys(table, key_lookup, registry);
        if keys.is_empty() {
            if table.is_core() {
                report.tables.push(TableValidation {
                    row_type: table.row_type.clone(),
                    keys,
                    missing_columns: vec!["<no key declared>".to_string()],
                    empty_keys: Vec::new(),
                    duplicate_keys: Vec::new(),
                });
            }
            continue;
        }
        report.tables.push(validate_keys(table, &keys));
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Metadata;

    fn table(rows: &[[&str; 3]]) -> Table {
        Table::core(
            RowType::Occurrence,
            vec!["occurrenceID".into(), "catalogNumber".into(), "scientificName".into()],
            vec!["occurrenceID".into()],
        )
        .unwrap()
        .with_rows(rows.iter().map(|r| r.iter().copied()))
    }

    #[test]
    fn test_valid_table() {
        let t = table(&[["1", "a", "x"], ["2", "b", "y"]]);
        let result = validate_keys(&t, &t.keys);
        assert!(result.is_valid());
    }

    #[test]
    fn test_collects_all_defects() {
        let t = table(&[
            ["1", "a", "x"],
            ["", "b", "y"],
            ["1", "c", "z"],
            ["  ", "d", "w"],
            ["2", "e", "v"],
            ["2", "f", "u"],
        ]);
        let result = validate_keys(&t, &t.keys);
        assert_eq!(result.empty_keys.len(), 2);
        assert_eq!(result.empty_keys[0].row, 1);
        assert_eq!(result.empty_keys[1].columns, vec!["occurrenceID"]);
        assert_eq!(
            result.duplicate_keys,
            vec![
                DuplicateKeyViolation { key: vec!["1".into()], rows: vec![0, 2] },
                DuplicateKeyViolation { key: vec!["2".into()], rows: vec![4, 5] },
            ]
        );
    }

    #[test]
    fn test_compound_key_and_trimming() {
        let t = table(&[["1", "a", "x"], ["1", "b", "y"], [" 1 ", "a ", "z"]]);
        let keys = vec!["occurrenceID".to_string(), "catalogNumber".to_string()];
        let result = validate_keys(&t, &keys);
        assert_eq!(result.duplicate_keys.len(), 1);
        assert_eq!(result.duplicate_keys[0].rows, vec![0, 2]);
    }

    #[test]
    fn test_key_comparison_is_case_sensitive() {
        let t = table(&[["abc", "", ""], ["ABC", "", ""]]);
        assert!(validate_keys(&t, &t.keys).is_valid());
    }

    #[test]
    fn test_missing_key_column() {
        let t = table(&[["1", "a", "x"]]);
        let result = validate_keys(&t, &["eventID".to_string()]);
        assert_eq!(result.missing_columns, vec!["eventID"]);
        assert!(!result.is_valid());
    }

    #[test]
    fn test_archive_validation_uses_lookup() {
        let registry = TermRegistry::load_embedded().unwrap();
        let archive = Archive::new(table(&[["1", "a", "x"], ["2", "a", "y"]]), Metadata::default()).unwrap();

        let report = validate(&archive, &KeyLookup::new(), &registry);
        assert!(report.is_valid());

        let mut lookup = KeyLookup::new();
        lookup.insert(RowType::Occurrence, vec!["catalogNumber".to_string()]);
        let report = validate(&archive, &lookup, &registry);
        assert!(!report.is_valid());
        let text = report.to_string();
        assert!(text.contains("duplicate key (a) in rows 0, 1"), "{}", text);
        assert!(matches!(report.into_result(), Err(Error::Validation(_))));
    }
}
