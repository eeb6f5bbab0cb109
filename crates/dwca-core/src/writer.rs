//! Delimited text output for tables

use crate::config::{CsvDialect, LineTerminator};
use crate::error::{Error, Result};
use crate::table::Table;
use std::path::PathBuf;

/// Encode a table as delimited text using the given dialect
///
/// One header line is written when the dialect declares header lines;
/// only UTF-8 output is supported.
pub fn write_table(table: &Table, dialect: &CsvDialect) -> Result<Vec<u8>> {
    let encoding = dialect.encoding.trim().to_ascii_lowercase();
    if !matches!(encoding.as_str(), "" | "utf-8" | "utf8") {
        return Err(Error::Dialect(format!(
            "cannot write {} tables, only UTF-8 is supported",
            dialect.encoding
        )));
    }
    if dialect.ignore_header_lines > 1 {
        return Err(Error::Dialect(format!(
            "cannot write {} header lines, at most one is supported",
            dialect.ignore_header_lines
        )));
    }

    let terminator = match dialect.line_terminator {
        LineTerminator::Lf => csv::Terminator::Any(b'\n'),
        LineTerminator::Crlf => csv::Terminator::CRLF,
    };
    let mut writer = csv::WriterBuilder::new()
        .delimiter(dialect.delimiter_byte()?)
        .quote(dialect.quote_byte()?)
        .terminator(terminator)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    let path = PathBuf::from(table.row_type.default_file_name());
    let csv_error = |e: csv::Error| Error::Csv {
        path: path.clone(),
        source: e,
    };

    if dialect.ignore_header_lines == 1 {
        writer.write_record(&table.columns).map_err(csv_error)?;
    }
    for row in &table.rows {
        let cells = (0..table.column_count()).map(|i| row.get(i));
        writer.write_record(cells).map_err(csv_error)?;
    }

    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}
