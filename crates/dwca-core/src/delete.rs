//! Key-based deletion of records, cascading from core to extensions

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::table::{KeyTuple, Table};
use crate::terms::RowType;
use crate::validate::{validate_keys, ValidationReport};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Non-fatal conditions reported by an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Warning {
    /// None of the supplied keys matched a record
    NoMatch { row_type: RowType, keys: usize },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::NoMatch { row_type, keys } => {
                write!(f, "none of the {} key(s) matched a {} record", keys, row_type)
            }
        }
    }
}

/// Result of a delete
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub archive: Archive,
    /// Rows removed per table
    pub removed: BTreeMap<RowType, usize>,
    pub warnings: Vec<Warning>,
}

/// Delete the records listed in `records`
///
/// `records.row_type` selects the table: the core (optionally cascading to
/// extensions) or a single extension. `records.keys` names the columns to
/// match on; when empty the target table's keys are used. Matching may use
/// any columns of the target, e.g. `catalogNumber`; the cascade then
/// follows the core keys of the deleted rows.
pub fn delete(base: &Archive, records: &Table, cascade: bool) -> Result<DeleteOutcome> {
    let targets_core = records.row_type == base.core.row_type;
    let target = if targets_core {
        &base.core
    } else {
        base.extension(&records.row_type)
            .ok_or_else(|| Error::UnknownRowType(format!("archive has no {} table", records.row_type)))?
    };

    let match_columns = if !records.keys.is_empty() {
        records.keys.clone()
    } else if !target.keys.is_empty() {
        target.keys.clone()
    } else {
        target.foreign_key().to_vec()
    };
    if match_columns.is_empty() {
        return Err(Error::MissingKey {
            row_type: records.row_type.to_string(),
        });
    }

    // Empty keys in the delete list are defects; repeated keys are harmless
    let mut check = validate_keys(records, &match_columns);
    check.duplicate_keys.clear();
    if !check.is_valid() {
        return Err(Error::Validation(ValidationReport { tables: vec![check] }));
    }

    let delete_indices = records.column_indices(&match_columns)?;
    let to_delete: HashSet<KeyTuple> = records.rows.iter().filter_map(|r| r.key(&delete_indices)).collect();
    let target_indices = target.column_indices(&match_columns)?;

    let mut archive = base.clone();
    let mut removed = BTreeMap::new();
    let mut warnings = Vec::new();

    let deleted_core_keys = {
        let table: &mut Table = if targets_core {
            &mut archive.core
        } else {
            archive
                .extensions
                .get_mut(&records.row_type)
                .ok_or_else(|| Error::UnknownRowType(records.row_type.to_string()))?
        };
        let link_indices = if targets_core {
            table.column_indices(&table.keys)?
        } else {
            Vec::new()
        };

        let before = table.row_count();
        let mut deleted_keys: HashSet<KeyTuple> = HashSet::new();
        table.rows.retain(|row| {
            let matched = row.key(&target_indices).is_some_and(|k| to_delete.contains(&k));
            if matched {
                if let Some(core_key) = row.key(&link_indices) {
                    deleted_keys.insert(core_key);
                }
            }
            !matched
        });
        removed.insert(records.row_type.clone(), before - table.row_count());
        deleted_keys
    };

    if removed.get(&records.row_type).copied().unwrap_or(0) == 0 {
        log::warn!(
            "delete: none of the {} key(s) matched a {} record",
            to_delete.len(),
            records.row_type
        );
        warnings.push(Warning::NoMatch {
            row_type: records.row_type.clone(),
            keys: to_delete.len(),
        });
        return Ok(DeleteOutcome {
            archive: base.clone(),
            removed,
            warnings,
        });
    }

    if targets_core && cascade {
        for (row_type, table) in archive.extensions.iter_mut() {
            let indices = table.column_indices(table.foreign_key())?;
            let before = table.row_count();
            table
                .rows
                .retain(|row| !row.key(&indices).is_some_and(|k| deleted_core_keys.contains(&k)));
            removed.insert(row_type.clone(), before - table.row_count());
        }
    }

    for (row_type, count) in &removed {
        log::info!("deleted {} {} row(s)", count, row_type);
    }

    Ok(DeleteOutcome {
        archive,
        removed,
        warnings,
    })
}
