//! Directory scanner for discovering and grouping archive input files

use crate::config::CsvDialect;
use crate::error::Result;
use crate::terms::{RowType, TermRegistry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files holding the parts of one table
#[derive(Debug, Clone, PartialEq)]
pub struct InputGroup {
    /// Row type named by the file stems
    pub row_type: RowType,
    /// Member files, sorted by path
    pub files: Vec<PathBuf>,
    /// Dialect guessed from the extension of the first file
    pub dialect: CsvDialect,
}

/// Result of scanning a directory
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Root directory that was scanned
    pub root: PathBuf,
    /// Discovered groups keyed by row type
    pub groups: BTreeMap<RowType, InputGroup>,
    /// Delimited files whose name does not match any row type
    pub unrecognized: Vec<PathBuf>,
}

impl ScanResult {
    /// Find a group by row type
    pub fn group(&self, row_type: &RowType) -> Option<&InputGroup> {
        self.groups.get(row_type)
    }

    /// Total number of recognised files
    pub fn total_files(&self) -> usize {
        self.groups.values().map(|g| g.files.len()).sum()
    }
}

/// Scan a directory for delimited files and group them by row type
///
/// `.csv` files are read as comma-separated, `.tsv` and `.txt` files as
/// tab-separated.
pub fn scan_directory<P: AsRef<Path>>(root: P, registry: &TermRegistry) -> Result<ScanResult> {
    let root = root.as_ref();
    let mut file_map: BTreeMap<RowType, Vec<PathBuf>> = BTreeMap::new();
    let mut unrecognized = Vec::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || dialect_for(path).is_none() {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        match row_type_for_stem(stem, registry) {
            Some(row_type) => file_map.entry(row_type).or_default().push(path.to_path_buf()),
            None => {
                log::warn!("skipping {}: file name does not name a row type", path.display());
                unrecognized.push(path.to_path_buf());
            }
        }
    }

    let groups = file_map
        .into_iter()
        .filter_map(|(row_type, mut files)| {
            files.sort();
            let dialect = dialect_for(files.first()?)?;
            Some((
                row_type.clone(),
                InputGroup {
                    row_type,
                    files,
                    dialect,
                },
            ))
        })
        .collect();

    Ok(ScanResult {
        root: root.to_path_buf(),
        groups,
        unrecognized,
    })
}

/// Dialect implied by a file extension (`.csv`, `.tsv`, `.txt`)
pub fn dialect_for(path: &Path) -> Option<CsvDialect> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Some(CsvDialect::default()),
        "tsv" | "txt" => Some(CsvDialect::tsv()),
        _ => None,
    }
}

/// Find the row type named by a file stem
///
/// Examples:
/// - "occurrence" -> Occurrence
/// - "occurrence_part2" -> Occurrence
/// - "measurement_or_fact" -> MeasurementOrFact
/// - "notes" -> None
fn row_type_for_stem(stem: &str, registry: &TermRegistry) -> Option<RowType> {
    let mut candidate = stem;
    loop {
        if let Some(row_type) = registry.row_type_by_name(candidate) {
            return Some(row_type);
        }
        let (head, _) = candidate.rsplit_once(['_', '-', '.'])?;
        candidate = head;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_row_type_for_stem() {
        let registry = TermRegistry::load_embedded().unwrap();
        assert_eq!(row_type_for_stem("occurrence", &registry), Some(RowType::Occurrence));
        assert_eq!(row_type_for_stem("Occurrence_part2", &registry), Some(RowType::Occurrence));
        assert_eq!(
            row_type_for_stem("measurement_or_fact", &registry),
            Some(RowType::MeasurementOrFact)
        );
        assert_eq!(row_type_for_stem("notes", &registry), None);
    }

    #[test]
    fn test_scan_groups_files() {
        let registry = TermRegistry::load_embedded().unwrap();
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("occurrence.csv"), "occurrenceID\n1\n").unwrap();
        fs::write(dir.path().join("occurrence_2.csv"), "occurrenceID\n2\n").unwrap();
        fs::write(dir.path().join("multimedia.tsv"), "occurrenceID\tidentifier\n").unwrap();
        fs::write(dir.path().join("readme.md"), "ignored").unwrap();
        fs::write(dir.path().join("notes.csv"), "a\n").unwrap();

        let scan = scan_directory(dir.path(), &registry).unwrap();
        assert_eq!(scan.total_files(), 3);
        assert_eq!(scan.group(&RowType::Occurrence).unwrap().files.len(), 2);
        assert_eq!(scan.group(&RowType::Multimedia).unwrap().dialect.delimiter, '\t');
        assert_eq!(scan.unrecognized.len(), 1);
    }
}
