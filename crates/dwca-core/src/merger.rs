//! Merge engine: key-based upsert of a delta archive into a base archive

use crate::archive::Archive;
use crate::config::KeyLookup;
use crate::error::{Error, Result};
use crate::table::{KeyTuple, Row, Table};
use crate::terms::{RowType, TermRegistry};
use crate::validate::{effective_keys, validate_keys, ValidationReport};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// What a merge did to one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    /// Rows in the base table before the merge
    pub base_rows: usize,
    /// Rows in the delta table
    pub delta_rows: usize,
    /// Delta rows appended as new records
    pub inserted: usize,
    /// Base rows replaced by a delta row with the same key
    pub replaced: usize,
    /// Extension rows dropped because their core record is gone
    pub orphans_removed: usize,
    /// Base extension rows dropped because the delta re-supplied their core
    /// record (extension sync only)
    pub superseded: usize,
    /// Columns that only the delta had
    pub new_columns: Vec<String>,
}

/// Result of a merge
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub archive: Archive,
    /// Statistics per table
    pub stats: BTreeMap<RowType, MergeStats>,
}

/// Merge `delta` into `base`
///
/// Inputs are not modified. Both archives are validated first; any empty or
/// duplicate key in a keyed table aborts the merge with `Error::Validation`.
///
/// With `extension_sync`, an extension the delta carries replaces the base
/// rows of every core record the delta supplies, and extension rows whose
/// foreign key is not a core key after the merge are dropped.
pub fn merge(
    base: &Archive,
    delta: &Archive,
    key_lookup: &KeyLookup,
    extension_sync: bool,
    registry: &TermRegistry,
) -> Result<MergeOutcome> {
    if base.core.row_type != delta.core.row_type {
        return Err(Error::CoreMismatch {
            base: base.core.row_type.to_string(),
            delta: delta.core.row_type.to_string(),
        });
    }

    // Resolve keys and validate everything before building the result
    let mut plan: Vec<(RowType, Vec<String>)> = Vec::new();
    let mut report = ValidationReport::default();
    let row_types: BTreeSet<&RowType> = base.extensions.keys().chain(delta.extensions.keys()).collect();
    let core_keys = merge_keys(&base.core, &delta.core, key_lookup, registry);
    if core_keys.is_empty() {
        return Err(Error::MissingKey {
            row_type: base.core.row_type.to_string(),
        });
    }
    report.tables.push(validate_keys(&base.core, &core_keys));
    report.tables.push(validate_keys(&delta.core, &core_keys));
    for row_type in row_types {
        let keys = match (base.extension(row_type), delta.extension(row_type)) {
            (Some(b), Some(d)) => {
                let keys = merge_keys(b, d, key_lookup, registry);
                if !keys.is_empty() {
                    report.tables.push(validate_keys(b, &keys));
                    report.tables.push(validate_keys(d, &keys));
                }
                keys
            }
            _ => Vec::new(),
        };
        plan.push((row_type.clone(), keys));
    }
    if !report.is_valid() {
        log::error!("merge aborted, key validation failed:\n{}", report);
        return Err(Error::Validation(report));
    }

    let mut stats = BTreeMap::new();
    let (core, core_stats) = merge_tables(&base.core, &delta.core, &core_keys)?;
    log_stats(&core.row_type, &core_stats);
    stats.insert(core.row_type.clone(), core_stats);

    let mut archive = Archive::new(core, base.metadata.clone())?;
    for (row_type, keys) in plan {
        let base_ext = base.extension(&row_type);
        let delta_ext = delta.extension(&row_type);

        // Base rows of re-supplied core records give way to the delta's rows
        let mut superseded = 0;
        let pruned = match (base_ext, delta_ext) {
            (Some(b), Some(_)) if extension_sync => {
                let refreshed = key_set(&delta.core, &link_columns(&delta.core, b))?;
                let mut table = b.clone();
                superseded = retain_linked(&mut table, |k| !refreshed.contains(k))?;
                Some(table)
            }
            _ => None,
        };
        let base_ext = pruned.as_ref().or(base_ext);

        let (mut table, mut table_stats) = match (base_ext, delta_ext) {
            (Some(b), Some(d)) if keys.is_empty() => append_distinct(b, d),
            (Some(b), Some(d)) => merge_tables(b, d, &keys)?,
            (Some(b), None) => (b.clone(), MergeStats {
                base_rows: b.row_count(),
                ..MergeStats::default()
            }),
            (None, Some(d)) => (d.clone(), MergeStats {
                delta_rows: d.row_count(),
                inserted: d.row_count(),
                new_columns: d.columns.clone(),
                ..MergeStats::default()
            }),
            (None, None) => continue,
        };
        table_stats.superseded = superseded;
        table_stats.base_rows += superseded;

        if extension_sync {
            let live = key_set(&archive.core, &link_columns(&archive.core, &table))?;
            table_stats.orphans_removed = retain_linked(&mut table, |k| live.contains(k))?;
        }
        log_stats(&row_type, &table_stats);
        stats.insert(row_type, table_stats);
        archive.add_extension(table)?;
    }

    Ok(MergeOutcome { archive, stats })
}

/// Keys used to match rows of one table type
fn merge_keys(base: &Table, delta: &Table, key_lookup: &KeyLookup, registry: &TermRegistry) -> Vec<String> {
    let keys = effective_keys(base, key_lookup, registry);
    if keys.is_empty() {
        effective_keys(delta, key_lookup, registry)
    } else {
        keys
    }
}

/// Column union: base order first, then delta-only columns
fn union_columns(base: &Table, delta: &Table) -> (Vec<String>, Vec<String>) {
    let new_columns: Vec<String> = delta
        .columns
        .iter()
        .filter(|c| !base.has_column(c))
        .cloned()
        .collect();
    let mut columns = base.columns.clone();
    columns.extend(new_columns.iter().cloned());
    (columns, new_columns)
}

fn merged_shell(base: &Table, columns: Vec<String>) -> Table {
    Table {
        row_type: base.row_type.clone(),
        role: base.role.clone(),
        columns,
        keys: base.keys.clone(),
        rows: Vec::new(),
    }
}

/// Upsert the rows of `delta` into `base` by key
///
/// A delta row whose key exists in `base` updates that row in place: cells
/// of the columns the delta has are overwritten, base-only columns keep
/// their values. Other delta rows are appended. Both tables must already be
/// validated for `keys`, which become the merged table's keys.
pub fn merge_tables(base: &Table, delta: &Table, keys: &[String]) -> Result<(Table, MergeStats)> {
    let (columns, new_columns) = union_columns(base, delta);
    let mut merged = merged_shell(base, columns);
    merged.keys = keys.to_vec();
    merged.rows = base.project_rows(&merged.columns);
    let delta_rows = delta.project_rows(&merged.columns);

    let key_indices = merged.column_indices(keys)?;
    let update_indices = merged.column_indices(&delta.columns)?;
    let mut index: HashMap<KeyTuple, usize> = merged
        .rows
        .iter()
        .enumerate()
        .filter_map(|(i, row)| row.key(&key_indices).map(|k| (k, i)))
        .collect();

    let mut stats = MergeStats {
        base_rows: base.row_count(),
        delta_rows: delta.row_count(),
        new_columns,
        ..MergeStats::default()
    };

    for row in delta_rows {
        let key = row.key(&key_indices).ok_or_else(|| Error::MissingKey {
            row_type: base.row_type.to_string(),
        })?;
        match index.get(&key) {
            Some(&pos) => {
                let target = &mut merged.rows[pos];
                for &i in &update_indices {
                    target.cells[i] = row.cells[i].clone();
                }
                stats.replaced += 1;
            }
            None => {
                index.insert(key, merged.rows.len());
                merged.rows.push(row);
                stats.inserted += 1;
            }
        }
    }

    Ok((merged, stats))
}

/// Append delta rows that are not already present, for tables without keys
fn append_distinct(base: &Table, delta: &Table) -> (Table, MergeStats) {
    let (columns, new_columns) = union_columns(base, delta);
    let mut merged = merged_shell(base, columns);
    merged.rows = base.project_rows(&merged.columns);

    let mut seen: HashSet<Row> = merged.rows.iter().cloned().collect();
    let mut inserted = 0;
    for row in delta.project_rows(&merged.columns) {
        if seen.insert(row.clone()) {
            merged.rows.push(row);
            inserted += 1;
        }
    }

    let stats = MergeStats {
        base_rows: base.row_count(),
        delta_rows: delta.row_count(),
        inserted,
        new_columns,
        ..MergeStats::default()
    };
    (merged, stats)
}

/// Core columns an extension's foreign key refers to
///
/// Columns of the same name when the core has them all, otherwise the core
/// keys position by position.
fn link_columns(core: &Table, extension: &Table) -> Vec<String> {
    let foreign_key = extension.foreign_key();
    if foreign_key.iter().all(|c| core.has_column(c)) {
        foreign_key.to_vec()
    } else {
        core.keys.clone()
    }
}

/// Key tuples of `table` over `columns`
fn key_set(table: &Table, columns: &[String]) -> Result<HashSet<KeyTuple>> {
    let indices = table.column_indices(columns)?;
    Ok(table.rows.iter().filter_map(|r| r.key(&indices)).collect())
}

/// Keep extension rows whose foreign key passes `keep`; rows with an empty
/// foreign key are dropped. Returns how many rows were removed.
fn retain_linked<F>(table: &mut Table, keep: F) -> Result<usize>
where
    F: Fn(&KeyTuple) -> bool,
{
    let indices = table.column_indices(table.foreign_key())?;
    let before = table.row_count();
    table.rows.retain(|row| row.key(&indices).is_some_and(|k| keep(&k)));
    Ok(before - table.row_count())
}

fn log_stats(row_type: &RowType, stats: &MergeStats) {
    log::info!(
        "merged {}: {} base + {} delta rows, {} inserted, {} replaced, {} superseded, {} orphans removed",
        row_type,
        stats.base_rows,
        stats.delta_rows,
        stats.inserted,
        stats.replaced,
        stats.superseded,
        stats.orphans_removed
    );
    if !stats.new_columns.is_empty() {
        log::debug!("{}: new columns {:?}", row_type, stats.new_columns);
    }
}
