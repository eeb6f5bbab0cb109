//! CSV parser for delimited archive tables

use crate::config::CsvDialect;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// A delimited table as read from disk, before any term canonicalisation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    /// Where the table came from (file path or a caller-supplied name)
    pub name: String,
    /// Header names, trimmed; empty when the dialect has no header line
    pub headers: Vec<String>,
    /// Cell values; trimmed with entirely empty rows dropped, except for
    /// tables read with [`read_data_file`]
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a raw table from in-memory values
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    /// Concatenate tables read from several files
    ///
    /// Headers are unioned in first-seen order and rows re-aligned to them.
    /// Exact duplicate rows across the inputs are dropped, keeping the first.
    pub fn concat(tables: Vec<RawTable>) -> Option<RawTable> {
        let mut tables = tables.into_iter();
        let first = tables.next()?;
        let rest: Vec<RawTable> = tables.collect();
        if rest.is_empty() {
            return Some(first);
        }

        let mut headers = first.headers.clone();
        for table in &rest {
            for header in &table.headers {
                if !headers.contains(header) {
                    headers.push(header.clone());
                }
            }
        }

        let name = first.name.clone();
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut rows = Vec::new();
        let mut dropped = 0;
        for table in std::iter::once(first).chain(rest) {
            let mapping: Vec<Option<usize>> = headers
                .iter()
                .map(|h| table.headers.iter().position(|t| t == h))
                .collect();
            for row in table.rows {
                let aligned: Vec<String> = mapping
                    .iter()
                    .map(|idx| idx.and_then(|i| row.get(i).cloned()).unwrap_or_default())
                    .collect();
                if seen.insert(aligned.clone()) {
                    rows.push(aligned);
                } else {
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            log::info!("dropped {} duplicate row(s) while concatenating {}", dropped, name);
        }

        Some(RawTable { name, headers, rows })
    }
}

/// Parse a delimited file into a RawTable
pub fn parse_csv<P: AsRef<Path>>(path: P, dialect: &CsvDialect) -> Result<RawTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_table(BufReader::new(file), path.to_path_buf(), dialect, Cells::Trimmed)
}

/// Parse delimited text (useful for testing and in-memory inputs)
pub fn parse_csv_str(content: &str, source_name: &str, dialect: &CsvDialect) -> Result<RawTable> {
    read_table(content.as_bytes(), PathBuf::from(source_name), dialect, Cells::Trimmed)
}

/// Parse delimited bytes supplied as input
pub fn parse_csv_bytes(content: &[u8], source_name: &str, dialect: &CsvDialect) -> Result<RawTable> {
    read_table(content, PathBuf::from(source_name), dialect, Cells::Trimmed)
}

/// Read a data file written into an archive
///
/// Unlike the input parsers, cell values are kept exactly as stored and
/// rows whose cells are all empty are kept.
pub fn read_data_file(content: &[u8], source_name: &str, dialect: &CsvDialect) -> Result<RawTable> {
    read_table(content, PathBuf::from(source_name), dialect, Cells::Verbatim)
}

/// How cell values are taken from a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cells {
    /// Trim whitespace and drop rows that end up empty (input files)
    Trimmed,
    /// Keep values as stored (archive data files)
    Verbatim,
}

/// Parse several files that hold parts of the same table
pub fn parse_csv_files<P: AsRef<Path>>(paths: &[P], dialect: &CsvDialect) -> Result<RawTable> {
    let tables = paths
        .iter()
        .map(|p| parse_csv(p, dialect))
        .collect::<Result<Vec<_>>>()?;
    RawTable::concat(tables).ok_or_else(|| Error::CsvParse {
        path: PathBuf::new(),
        message: "no input files given".to_string(),
    })
}

fn read_table<R: Read>(reader: R, path: PathBuf, dialect: &CsvDialect, cells_mode: Cells) -> Result<RawTable> {
    let decode = decoder_for(&dialect.encoding)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // Allow varying number of fields
        .delimiter(dialect.delimiter_byte()?)
        .quote(dialect.quote_byte()?)
        .from_reader(reader);

    let decode_record = |record: &csv::ByteRecord| -> Result<Vec<String>> {
        record
            .iter()
            .map(|field| {
                decode(field).ok_or_else(|| Error::CsvParse {
                    path: path.clone(),
                    message: format!(
                        "invalid {} text on line {}",
                        dialect.encoding,
                        record.position().map_or(0, |p| p.line())
                    ),
                })
            })
            .collect()
    };

    let mut records = csv_reader.byte_records();
    let mut headers = Vec::new();
    for line in 0..dialect.ignore_header_lines {
        let Some(record) = records.next() else {
            break;
        };
        let record = record.map_err(|e| Error::Csv {
            path: path.clone(),
            source: e,
        })?;
        // The first header line names the columns, further ones are skipped
        if line == 0 {
            headers = decode_record(&record)?
                .into_iter()
                .map(|h| h.trim().to_string())
                .collect();
        }
    }

    if dialect.ignore_header_lines > 0 && headers.is_empty() {
        return Err(Error::CsvParse {
            path: path.clone(),
            message: "no columns found in CSV".to_string(),
        });
    }

    let mut rows = Vec::new();
    let mut blank = 0;
    for (row_idx, result) in records.enumerate() {
        let record = result.map_err(|e| Error::Csv {
            path: path.clone(),
            source: e,
        })?;

        let mut cells = decode_record(&record)?;
        if cells_mode == Cells::Trimmed {
            for cell in cells.iter_mut() {
                let trimmed = cell.trim();
                if trimmed.len() != cell.len() {
                    *cell = trimmed.to_string();
                }
            }
            if cells.iter().all(String::is_empty) {
                blank += 1;
                continue;
            }
        }

        if !headers.is_empty() {
            if cells.len() > headers.len() {
                log::warn!(
                    "row {} in {} has more cells than columns, truncating",
                    row_idx + 1,
                    path.display()
                );
            }
            cells.resize(headers.len(), String::new());
        }
        rows.push(cells);
    }

    if blank > 0 {
        log::debug!("skipped {} empty row(s) in {}", blank, path.display());
    }

    Ok(RawTable {
        name: path.display().to_string(),
        headers,
        rows,
    })
}

/// Pick a byte decoder for the declared encoding
fn decoder_for(encoding: &str) -> Result<fn(&[u8]) -> Option<String>> {
    match encoding.trim().to_ascii_lowercase().replace('_', "-").as_str() {
        "" | "utf-8" | "utf8" => Ok(decode_utf8 as fn(&[u8]) -> Option<String>),
        "iso-8859-1" | "latin1" | "latin-1" => Ok(decode_latin1 as fn(&[u8]) -> Option<String>),
        other => Err(Error::Dialect(format!("unsupported encoding '{}'", other))),
    }
}

fn decode_utf8(bytes: &[u8]) -> Option<String> {
    std::str::from_utf8(bytes).ok().map(str::to_string)
}

fn decode_latin1(bytes: &[u8]) -> Option<String> {
    Some(bytes.iter().map(|&b| b as char).collect())
}
