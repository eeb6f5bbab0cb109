//! In-memory table model shared by core and extension tables

use crate::error::{Error, Result};
use crate::terms::RowType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered key values of one row, compared as a tuple
pub type KeyTuple = Vec<String>;

/// Whether a table is the archive's core or an extension linked to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Core,
    /// Extension rows reference core rows through `foreign_key`, whose
    /// columns line up positionally with the core keys
    Extension { foreign_key: Vec<String> },
}

/// A table (core or extension) of an archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Row type of the table
    pub row_type: RowType,
    /// Core or extension
    pub role: Role,
    /// Column names, unique and ordered
    pub columns: Vec<String>,
    /// Columns forming the uniqueness constraint
    pub keys: Vec<String>,
    /// Row data aligned to `columns`
    pub rows: Vec<Row>,
}

impl Table {
    /// Create an empty table, checking that keys refer to existing columns
    pub fn new(row_type: RowType, role: Role, columns: Vec<String>, keys: Vec<String>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(Error::DuplicateColumn {
                    row_type: row_type.to_string(),
                    column: column.clone(),
                });
            }
        }

        let foreign_key: &[String] = match &role {
            Role::Core => &[],
            Role::Extension { foreign_key } => foreign_key,
        };
        for key in keys.iter().chain(foreign_key) {
            if !seen.contains(key.as_str()) {
                return Err(Error::KeyColumnNotFound {
                    row_type: row_type.to_string(),
                    column: key.clone(),
                });
            }
        }

        Ok(Self {
            row_type,
            role,
            columns,
            keys,
            rows: Vec::new(),
        })
    }

    /// Create an empty core table
    pub fn core(row_type: RowType, columns: Vec<String>, keys: Vec<String>) -> Result<Self> {
        Self::new(row_type, Role::Core, columns, keys)
    }

    /// Create an empty extension table
    pub fn extension(
        row_type: RowType,
        columns: Vec<String>,
        foreign_key: Vec<String>,
        keys: Vec<String>,
    ) -> Result<Self> {
        Self::new(row_type, Role::Extension { foreign_key }, columns, keys)
    }

    /// Append rows given as string slices (handy for building fixtures)
    pub fn with_rows<I, R, S>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for row in rows {
            self.push_row(row.into_iter().map(Into::into).collect());
        }
        self
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_core(&self) -> bool {
        matches!(self.role, Role::Core)
    }

    /// Foreign key columns (empty for the core)
    pub fn foreign_key(&self) -> &[String] {
        match &self.role {
            Role::Core => &[],
            Role::Extension { foreign_key } => foreign_key,
        }
    }

    /// Find a column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Get a cell value by row index and column name
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r.get(idx))
    }

    /// Append a row, padding or truncating it to the column count
    pub fn push_row(&mut self, mut cells: Vec<String>) {
        cells.resize(self.columns.len(), String::new());
        self.rows.push(Row::new(cells));
    }

    /// Add a column filled with empty values, returning its index
    pub fn add_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.cells.push(String::new());
        }
        self.columns.len() - 1
    }

    /// Remove a column and its cells; key columns cannot be removed
    pub fn remove_column(&mut self, name: &str) -> Result<bool> {
        if self.keys.iter().chain(self.foreign_key()).any(|k| k == name) {
            return Err(Error::ProtectedColumn {
                row_type: self.row_type.to_string(),
                column: name.to_string(),
            });
        }
        let Some(idx) = self.column_index(name) else {
            return Ok(false);
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            if idx < row.cells.len() {
                row.cells.remove(idx);
            }
        }
        Ok(true)
    }

    /// Resolve column names to indices
    pub fn column_indices(&self, names: &[String]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.column_index(name).ok_or_else(|| Error::KeyColumnNotFound {
                    row_type: self.row_type.to_string(),
                    column: name.clone(),
                })
            })
            .collect()
    }

    /// Rows re-aligned to another column order; missing columns become empty
    pub fn project_rows(&self, columns: &[String]) -> Vec<Row> {
        let mapping: Vec<Option<usize>> = columns.iter().map(|c| self.column_index(c)).collect();
        self.rows
            .iter()
            .map(|row| {
                Row::new(
                    mapping
                        .iter()
                        .map(|idx| idx.map(|i| row.get(i).to_string()).unwrap_or_default())
                        .collect(),
                )
            })
            .collect()
    }
}

/// A row of data
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Row {
    /// Cell values for each column
    pub cells: Vec<String>,
}

impl Row {
    /// Create a new row
    pub fn new(cells: Vec<String>) -> Self {
        Self { cells }
    }

    /// Get a cell value by column index; missing cells read as empty
    pub fn get(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }

    /// True when every cell is empty or whitespace
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }

    /// Key tuple for the given column indices
    ///
    /// Values are trimmed; `None` if any component is empty, since an empty
    /// key is treated as absent rather than as a distinct value.
    pub fn key(&self, indices: &[usize]) -> Option<KeyTuple> {
        let mut key = Vec::with_capacity(indices.len());
        for &idx in indices {
            let value = self.get(idx).trim();
            if value.is_empty() {
                return None;
            }
            key.push(value.to_string());
        }
        Some(key)
    }
}
