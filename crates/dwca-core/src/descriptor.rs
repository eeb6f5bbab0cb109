//! Archive descriptor: which file holds which table and how its columns map
//! onto vocabulary terms
//!
//! The descriptor is kept as JSON next to the data. The Darwin Core text
//! descriptor (`meta.xml`) is written alongside it and can be read back, so
//! archives produced by other tools load too.

use crate::archive::{Archive, Metadata};
use crate::config::CsvDialect;
use crate::error::{Error, Result};
use crate::parser::read_data_file;
use crate::table::{KeyTuple, Role, Table};
use crate::terms::{extract_term, TermRegistry};
use crate::writer::write_table;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

const DWC_TEXT_NS: &str = "http://rs.tdwg.org/dwc/text/";

/// Name of the generated record id column of a compound-keyed core
pub const CORE_ID_COLUMN: &str = "id";
/// Name of the generated link column of an extension with a compound foreign key
pub const EXTENSION_ID_COLUMN: &str = "coreid";

/// One column of a data file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Column position in the file; `None` for constant fields
    #[serde(default)]
    pub index: Option<usize>,
    /// Column name in the table model
    #[serde(default)]
    pub name: String,
    /// Term URI, absent for columns outside the vocabulary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    /// Value used where the file has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// Layout of one data file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub row_type_uri: String,
    pub file_name: String,
    #[serde(default)]
    pub dialect: CsvDialect,
    /// Column holding the record id (core) or core id (extension)
    #[serde(default)]
    pub id_index: Option<usize>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub foreign_key: Vec<String>,
    /// Column written only to link compound keys; dropped again on decode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_column: Option<String>,
    pub fields: Vec<FieldMapping>,
}

/// The archive descriptor document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// File name of the metadata block
    #[serde(default)]
    pub metadata_file: Option<String>,
    #[serde(default)]
    pub generated_at: Option<DateTime<Utc>>,
    pub core: TableDescriptor,
    #[serde(default)]
    pub extensions: Vec<TableDescriptor>,
}

impl Descriptor {
    /// Load a descriptor from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Save the descriptor to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(Error::Json)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Core first, then extensions
    pub fn tables(&self) -> impl Iterator<Item = &TableDescriptor> {
        std::iter::once(&self.core).chain(self.extensions.iter())
    }

    /// Render the Darwin Core text descriptor (meta.xml)
    ///
    /// Columns without a term URI are written with their name as the term.
    pub fn to_meta_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut archive = BytesStart::new("archive");
        archive.push_attribute(("xmlns", DWC_TEXT_NS));
        if let Some(metadata) = &self.metadata_file {
            archive.push_attribute(("metadata", metadata.as_str()));
        }
        writer.write_event(Event::Start(archive))?;
        write_xml_table(&mut writer, "core", "id", &self.core)?;
        for ext in &self.extensions {
            write_xml_table(&mut writer, "extension", "coreid", ext)?;
        }
        writer.write_event(Event::End(BytesEnd::new("archive")))?;

        String::from_utf8(writer.into_inner()).map_err(|e| Error::Descriptor(e.to_string()))
    }

    /// Read a Darwin Core text descriptor (meta.xml)
    ///
    /// Field names are left empty and resolved from the terms on decode. An
    /// `id`/`coreid` index without a matching field gets a column of its own
    /// named `id` or `coreid`.
    pub fn from_meta_xml(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut metadata_file = None;
        let mut core = None;
        let mut extensions = Vec::new();
        let mut current: Option<(bool, TableDescriptor)> = None;
        let mut in_location = false;

        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"archive" => metadata_file = attribute(&e, "metadata")?,
                    b"core" => current = Some((true, table_from_xml(&e)?)),
                    b"extension" => current = Some((false, table_from_xml(&e)?)),
                    b"location" => in_location = true,
                    b"id" | b"coreid" => {
                        if let Some((_, table)) = current.as_mut() {
                            table.id_index = parse_index(attribute(&e, "index")?)?;
                        }
                    }
                    b"field" => {
                        if let Some((_, table)) = current.as_mut() {
                            table.fields.push(field_from_xml(&e)?);
                        }
                    }
                    _ => {}
                },
                Event::Text(text) if in_location => {
                    if let Some((_, table)) = current.as_mut() {
                        if table.file_name.is_empty() {
                            let location = text.unescape().map_err(quick_xml::Error::from)?;
                            table.file_name = location.trim().to_string();
                        }
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"location" => in_location = false,
                    b"core" | b"extension" => {
                        if let Some((is_core, mut table)) = current.take() {
                            add_id_field(&mut table, is_core);
                            if table.file_name.is_empty() {
                                return Err(Error::Descriptor(format!(
                                    "{} table declares no file location",
                                    table.row_type_uri
                                )));
                            }
                            if is_core {
                                core = Some(table);
                            } else {
                                extensions.push(table);
                            }
                        }
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        let core = core.ok_or_else(|| Error::Descriptor("meta.xml declares no core table".to_string()))?;
        log::debug!(
            "read meta.xml: core {} and {} extension(s)",
            core.file_name,
            extensions.len()
        );
        Ok(Self {
            metadata_file,
            generated_at: None,
            core,
            extensions,
        })
    }
}

fn write_xml_table(
    writer: &mut Writer<Vec<u8>>,
    element: &str,
    id_element: &str,
    table: &TableDescriptor,
) -> Result<()> {
    let dialect = &table.dialect;
    let delimiter = match dialect.delimiter {
        '\t' => "\\t".to_string(),
        other => other.to_string(),
    };
    let quote = dialect.quote.to_string();
    let ignore_header_lines = dialect.ignore_header_lines.to_string();

    let mut start = BytesStart::new(element);
    start.push_attribute(("encoding", dialect.encoding.as_str()));
    start.push_attribute(("rowType", table.row_type_uri.as_str()));
    start.push_attribute(("fieldsTerminatedBy", delimiter.as_str()));
    start.push_attribute(("linesTerminatedBy", dialect.line_terminator.escaped()));
    start.push_attribute(("fieldsEnclosedBy", quote.as_str()));
    start.push_attribute(("ignoreHeaderLines", ignore_header_lines.as_str()));
    writer.write_event(Event::Start(start))?;

    writer.write_event(Event::Start(BytesStart::new("files")))?;
    writer.write_event(Event::Start(BytesStart::new("location")))?;
    writer.write_event(Event::Text(BytesText::new(&table.file_name)))?;
    writer.write_event(Event::End(BytesEnd::new("location")))?;
    writer.write_event(Event::End(BytesEnd::new("files")))?;

    if let Some(idx) = table.id_index {
        let idx = idx.to_string();
        let mut id = BytesStart::new(id_element);
        id.push_attribute(("index", idx.as_str()));
        writer.write_event(Event::Empty(id))?;
    }
    for field in &table.fields {
        if table.link_column.as_deref() == Some(field.name.as_str()) {
            continue;
        }
        let mut el = BytesStart::new("field");
        let index = field.index.map(|i| i.to_string());
        if let Some(index) = &index {
            el.push_attribute(("index", index.as_str()));
        }
        el.push_attribute(("term", field.term.as_deref().unwrap_or(&field.name)));
        if let Some(default) = &field.default {
            el.push_attribute(("default", default.as_str()));
        }
        writer.write_event(Event::Empty(el))?;
    }

    writer.write_event(Event::End(BytesEnd::new(element)))?;
    Ok(())
}

/// Unescaped value of an attribute, matched by local name
fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value().map_err(quick_xml::Error::from)?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_index(value: Option<String>) -> Result<Option<usize>> {
    value
        .map(|v| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| Error::Descriptor(format!("invalid column index '{}'", v)))
        })
        .transpose()
}

fn table_from_xml(element: &BytesStart<'_>) -> Result<TableDescriptor> {
    let row_type_uri = attribute(element, "rowType")?
        .ok_or_else(|| Error::Descriptor("table element without rowType".to_string()))?;
    let delimiter = attribute(element, "fieldsTerminatedBy")?.unwrap_or_else(|| ",".to_string());
    let quote = attribute(element, "fieldsEnclosedBy")?.unwrap_or_default();
    let lines = attribute(element, "linesTerminatedBy")?.unwrap_or_else(|| "\\n".to_string());

    let mut dialect = CsvDialect::from_escaped(&delimiter, &quote, &lines)?;
    if let Some(encoding) = attribute(element, "encoding")? {
        dialect.encoding = encoding;
    }
    dialect.ignore_header_lines = parse_index(attribute(element, "ignoreHeaderLines")?)?.unwrap_or(0);

    Ok(TableDescriptor {
        row_type_uri,
        file_name: String::new(),
        dialect,
        id_index: None,
        keys: Vec::new(),
        foreign_key: Vec::new(),
        link_column: None,
        fields: Vec::new(),
    })
}

fn field_from_xml(element: &BytesStart<'_>) -> Result<FieldMapping> {
    let term = attribute(element, "term")?
        .ok_or_else(|| Error::Descriptor("field element without term".to_string()))?;
    Ok(FieldMapping {
        index: parse_index(attribute(element, "index")?)?,
        name: String::new(),
        term: Some(term),
        default: attribute(element, "default")?,
    })
}

/// Give an `id`/`coreid` index that no field maps a column of its own
fn add_id_field(table: &mut TableDescriptor, is_core: bool) {
    let Some(idx) = table.id_index else {
        return;
    };
    if table.fields.iter().any(|f| f.index == Some(idx)) {
        return;
    }
    let name = if is_core { CORE_ID_COLUMN } else { EXTENSION_ID_COLUMN };
    table.fields.insert(
        0,
        FieldMapping {
            index: Some(idx),
            name: name.to_string(),
            term: None,
            default: None,
        },
    );
}

/// Describe every table of an archive
///
/// Data files are named after their row type and written with `dialect`.
pub fn encode(archive: &Archive, registry: &TermRegistry, dialect: &CsvDialect) -> Result<Descriptor> {
    let mut file_names = HashSet::new();
    let mut describe = |table: &Table| -> Result<TableDescriptor> {
        let descriptor = encode_table(table, registry, dialect)?;
        if !file_names.insert(descriptor.file_name.clone()) {
            return Err(Error::Descriptor(format!(
                "two tables would be written to {}",
                descriptor.file_name
            )));
        }
        Ok(descriptor)
    };

    let core = describe(&archive.core)?;
    let extensions = archive
        .extensions
        .values()
        .map(&mut describe)
        .collect::<Result<Vec<_>>>()?;

    Ok(Descriptor {
        metadata_file: None,
        generated_at: None,
        core,
        extensions,
    })
}

/// Single column value standing for a compound key
///
/// Parts are joined with `:`; backslashes and colons inside a part are
/// escaped so distinct keys never share an id.
pub fn link_value(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| p.trim().replace('\\', "\\\\").replace(':', "\\:"))
        .collect::<Vec<_>>()
        .join(":")
}

fn encode_table(table: &Table, registry: &TermRegistry, dialect: &CsvDialect) -> Result<TableDescriptor> {
    let row_type_uri = registry
        .row_type_uri(&table.row_type)
        .ok_or_else(|| Error::Descriptor(format!("no row type URI known for {}", table.row_type)))?
        .to_string();

    let (link_columns, link_name) = match &table.role {
        Role::Core => (&table.keys[..], CORE_ID_COLUMN),
        Role::Extension { foreign_key } => (&foreign_key[..], EXTENSION_ID_COLUMN),
    };

    // A compound key is linked through one generated column in front
    let link_column = if link_columns.len() > 1 {
        if table.has_column(link_name) {
            return Err(Error::Descriptor(format!(
                "{} table has a '{}' column, which is reserved for the compound key link",
                table.row_type, link_name
            )));
        }
        Some(link_name.to_string())
    } else {
        None
    };
    let offset = usize::from(link_column.is_some());

    let mut fields: Vec<FieldMapping> = link_column
        .iter()
        .map(|name| FieldMapping {
            index: Some(0),
            name: name.clone(),
            term: None,
            default: None,
        })
        .collect();
    fields.extend(table.columns.iter().enumerate().map(|(i, name)| FieldMapping {
        index: Some(i + offset),
        name: name.clone(),
        term: registry.term_uri(&table.row_type, name).map(str::to_string),
        default: None,
    }));

    let id_index = match &link_column {
        Some(_) => Some(0),
        None => link_columns
            .first()
            .and_then(|c| table.column_index(c))
            .map(|i| i + offset),
    };

    Ok(TableDescriptor {
        row_type_uri,
        file_name: table.row_type.default_file_name(),
        dialect: dialect.clone(),
        id_index,
        keys: table.keys.clone(),
        foreign_key: table.foreign_key().to_vec(),
        link_column,
        fields,
    })
}

/// Write every table as delimited text, keyed by file name
pub fn encode_tables(archive: &Archive, descriptor: &Descriptor) -> Result<BTreeMap<String, Vec<u8>>> {
    let described = descriptor.tables().count();
    let present = archive.tables().count();
    if described != present {
        return Err(Error::Descriptor(format!(
            "descriptor lists {} tables but the archive has {}",
            described, present
        )));
    }

    let mut files = BTreeMap::new();
    for (table, td) in archive.tables().zip(descriptor.tables()) {
        let bytes = match &td.link_column {
            Some(name) => write_table(&with_link_column(table, name)?, &td.dialect)?,
            None => write_table(table, &td.dialect)?,
        };
        log::debug!("encoded {} ({} rows, {} bytes)", td.file_name, table.row_count(), bytes.len());
        files.insert(td.file_name.clone(), bytes);
    }
    Ok(files)
}

/// Copy of `table` with a leading column holding each row's link value
fn with_link_column(table: &Table, name: &str) -> Result<Table> {
    let link: &[String] = match &table.role {
        Role::Core => &table.keys,
        Role::Extension { foreign_key } => foreign_key,
    };
    let indices = table.column_indices(link)?;

    let mut columns = vec![name.to_string()];
    columns.extend(table.columns.iter().cloned());
    let mut linked = Table {
        row_type: table.row_type.clone(),
        role: table.role.clone(),
        columns,
        keys: table.keys.clone(),
        rows: Vec::with_capacity(table.row_count()),
    };
    for row in &table.rows {
        let key: Option<KeyTuple> = row.key(&indices);
        let mut cells = vec![key.map(|k| link_value(&k)).unwrap_or_default()];
        cells.extend(row.cells.iter().cloned());
        linked.push_row(cells);
    }
    Ok(linked)
}

/// Rebuild an archive from its descriptor and data files
///
/// Term URIs are mapped back to canonical names; URIs outside the
/// vocabulary become columns named after their last path segment.
pub fn decode(
    descriptor: &Descriptor,
    files: &BTreeMap<String, Vec<u8>>,
    metadata: Metadata,
    registry: &TermRegistry,
) -> Result<Archive> {
    let core = decode_table(&descriptor.core, files, registry, true)?;
    let mut archive = Archive::new(core, metadata)?;
    for td in &descriptor.extensions {
        archive.add_extension(decode_table(td, files, registry, false)?)?;
    }
    Ok(archive)
}

fn decode_table(
    td: &TableDescriptor,
    files: &BTreeMap<String, Vec<u8>>,
    registry: &TermRegistry,
    is_core: bool,
) -> Result<Table> {
    let row_type = registry.row_type_for_uri(&td.row_type_uri);
    let bytes = files
        .get(&td.file_name)
        .ok_or_else(|| Error::Descriptor(format!("data file {} is missing", td.file_name)))?;
    let raw = read_data_file(bytes, &td.file_name, &td.dialect)?;

    let fields: Vec<&FieldMapping> = td
        .fields
        .iter()
        .filter(|f| td.link_column.as_deref() != Some(f.name.as_str()))
        .collect();

    let mut columns = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        let name = if !field.name.trim().is_empty() {
            field.name.trim().to_string()
        } else if let Some(term) = &field.term {
            registry
                .resolve_uri(term)
                .map(|t| t.name.clone())
                .unwrap_or_else(|| extract_term(term).to_string())
        } else {
            return Err(Error::Descriptor(format!(
                "field {} of {} has neither a name nor a term",
                i, td.file_name
            )));
        };
        match field.index {
            None if field.default.is_none() => {
                return Err(Error::Descriptor(format!(
                    "field {} of {} has neither an index nor a default",
                    name, td.file_name
                )))
            }
            Some(idx) if !raw.headers.is_empty() && idx >= raw.headers.len() => {
                return Err(Error::Descriptor(format!(
                    "field {} of {} points at column {} but the file has {}",
                    name,
                    td.file_name,
                    idx,
                    raw.headers.len()
                )))
            }
            _ => {}
        }
        columns.push(name);
    }

    let id_column = || -> Result<Vec<String>> {
        let idx = td
            .id_index
            .ok_or_else(|| Error::Descriptor(format!("{} declares no id column", td.file_name)))?;
        fields
            .iter()
            .position(|f| f.index == Some(idx))
            .map(|pos| vec![columns[pos].clone()])
            .ok_or_else(|| Error::Descriptor(format!("{} has no field at id index {}", td.file_name, idx)))
    };

    let role = if is_core {
        Role::Core
    } else if td.foreign_key.is_empty() {
        Role::Extension {
            foreign_key: id_column()?,
        }
    } else {
        Role::Extension {
            foreign_key: td.foreign_key.clone(),
        }
    };
    let keys = if is_core && td.keys.is_empty() {
        id_column()?
    } else {
        td.keys.clone()
    };

    let rows: Vec<Vec<String>> = raw
        .rows
        .iter()
        .map(|row| {
            fields
                .iter()
                .map(|field| {
                    let value = field.index.and_then(|i| row.get(i)).cloned().unwrap_or_default();
                    if value.is_empty() {
                        field.default.clone().unwrap_or_default()
                    } else {
                        value
                    }
                })
                .collect()
        })
        .collect();

    let table = Table::new(row_type, role, columns, keys)?.with_rows(rows);
    log::debug!("decoded {}: {} rows", td.file_name, table.row_count());
    Ok(table)
}
