//! Archive assembly: ingestion, merge/delete and serialisation in one place
//!
//! The assembler owns the configuration and an optional post-processing hook
//! that runs on every archive just before it is serialised. Physical packing
//! is delegated to a [`Packer`]; [`DirectoryPacker`] lays the files out in a
//! plain directory and [`ZipPacker`] in a zip file.

use crate::archive::{Archive, Metadata};
use crate::config::{ArchiveConfig, KeyLookup};
use crate::delete::{delete, DeleteOutcome};
use crate::descriptor::{decode, encode, encode_tables, Descriptor};
use crate::error::{Error, Result};
use crate::merger::{merge, MergeOutcome};
use crate::normalize::{infer_core, Normalizer, TableInput};
use crate::parser::{parse_csv_files, RawTable};
use crate::scanner::{dialect_for, scan_directory};
use crate::table::Table;
use crate::terms::{RowType, TermRegistry};
use crate::validate::{validate, validate_keys, TableValidation, ValidationReport};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Transform applied to an archive before it is serialised
pub type PostProcess = Box<dyn Fn(Archive) -> Result<Archive>>;

/// A serialised archive: descriptor plus file contents by name
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveBundle {
    pub descriptor: Descriptor,
    /// Data files, metadata and rendered descriptors, keyed by file name
    pub files: BTreeMap<String, Vec<u8>>,
}

impl ArchiveBundle {
    /// Build a bundle from the raw files of a container
    ///
    /// The JSON descriptor wins; without it the `meta.xml` descriptor is read.
    pub fn from_files(
        mut files: BTreeMap<String, Vec<u8>>,
        descriptor_file: &str,
        meta_xml_file: &str,
    ) -> Result<Self> {
        let descriptor = if let Some(json) = files.remove(descriptor_file) {
            let json = String::from_utf8(json)
                .map_err(|_| Error::Descriptor(format!("{} is not valid UTF-8", descriptor_file)))?;
            Descriptor::from_json(&json)?
        } else if let Some(xml) = files.get(meta_xml_file) {
            log::info!("no {}, reading {}", descriptor_file, meta_xml_file);
            let xml = std::str::from_utf8(xml)
                .map_err(|_| Error::Descriptor(format!("{} is not valid UTF-8", meta_xml_file)))?;
            Descriptor::from_meta_xml(xml)?
        } else {
            return Err(Error::Descriptor(format!(
                "archive has neither {} nor {}",
                descriptor_file, meta_xml_file
            )));
        };
        Ok(Self { descriptor, files })
    }

    /// Write the bundle into a directory, creating it if needed
    pub fn write_to_dir<P: AsRef<Path>>(&self, dir: P, descriptor_file: &str) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        for (name, bytes) in &self.files {
            fs::write(dir.join(name), bytes)?;
        }
        self.descriptor.save(dir.join(descriptor_file))?;
        log::info!("wrote {} file(s) to {}", self.files.len() + 1, dir.display());
        Ok(())
    }

    /// Read a bundle from a directory
    ///
    /// Uses the JSON descriptor when present and `meta.xml` otherwise, then
    /// reads only the files the descriptor references.
    pub fn read_from_dir<P: AsRef<Path>>(dir: P, descriptor_file: &str, meta_xml_file: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let json_path = dir.join(descriptor_file);
        let xml_path = dir.join(meta_xml_file);
        let descriptor = if json_path.is_file() {
            Descriptor::load(json_path)?
        } else if xml_path.is_file() {
            log::info!("no {} in {}, reading {}", descriptor_file, dir.display(), meta_xml_file);
            let xml = fs::read_to_string(&xml_path).map_err(|e| Error::FileRead {
                path: xml_path.clone(),
                source: e,
            })?;
            Descriptor::from_meta_xml(&xml)?
        } else {
            return Err(Error::Descriptor(format!(
                "{} has neither {} nor {}",
                dir.display(),
                descriptor_file,
                meta_xml_file
            )));
        };

        let mut names: Vec<String> = descriptor.tables().map(|t| t.file_name.clone()).collect();
        if let Some(metadata) = &descriptor.metadata_file {
            if dir.join(metadata).is_file() {
                names.push(metadata.clone());
            } else {
                log::warn!("metadata file {} not found in {}", metadata, dir.display());
            }
        }

        let mut files = BTreeMap::new();
        for name in names {
            let path = dir.join(&name);
            let bytes = fs::read(&path).map_err(|e| Error::FileRead { path, source: e })?;
            files.insert(name, bytes);
        }
        Ok(Self { descriptor, files })
    }
}

/// Physical container I/O for archive bundles
pub trait Packer {
    /// Store a bundle at `target`
    fn pack(&self, bundle: &ArchiveBundle, target: &Path) -> Result<()>;
    /// Read a bundle from `source`
    fn unpack(&self, source: &Path) -> Result<ArchiveBundle>;
}

/// Stores bundles as plain directories
#[derive(Debug, Clone)]
pub struct DirectoryPacker {
    pub descriptor_file: String,
    pub meta_xml_file: String,
}

impl DirectoryPacker {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            descriptor_file: config.descriptor_file.clone(),
            meta_xml_file: config.meta_xml_file.clone(),
        }
    }
}

impl Packer for DirectoryPacker {
    fn pack(&self, bundle: &ArchiveBundle, target: &Path) -> Result<()> {
        bundle.write_to_dir(target, &self.descriptor_file)
    }

    fn unpack(&self, source: &Path) -> Result<ArchiveBundle> {
        ArchiveBundle::read_from_dir(source, &self.descriptor_file, &self.meta_xml_file)
    }
}

/// Stores bundles as a flat, deflated zip file
#[derive(Debug, Clone)]
pub struct ZipPacker {
    pub descriptor_file: String,
    pub meta_xml_file: String,
}

impl ZipPacker {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            descriptor_file: config.descriptor_file.clone(),
            meta_xml_file: config.meta_xml_file.clone(),
        }
    }
}

impl Packer for ZipPacker {
    fn pack(&self, bundle: &ArchiveBundle, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(target)?;
        let mut zip = ZipWriter::new(file);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, bytes) in &bundle.files {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        zip.start_file(self.descriptor_file.as_str(), options)?;
        zip.write_all(bundle.descriptor.to_json()?.as_bytes())?;
        zip.finish()?;

        log::info!("wrote {} file(s) to {}", bundle.files.len() + 1, target.display());
        Ok(())
    }

    fn unpack(&self, source: &Path) -> Result<ArchiveBundle> {
        let file = fs::File::open(source).map_err(|e| Error::FileRead {
            path: source.to_path_buf(),
            source: e,
        })?;
        let mut zip = ZipArchive::new(file)?;

        let mut files = BTreeMap::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            // Archives zipped from a folder carry it as a path prefix
            let name = entry.name().rsplit('/').next().unwrap_or_default().to_string();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes)?;
            files.insert(name, bytes);
        }
        log::debug!("read {} file(s) from {}", files.len(), source.display());
        ArchiveBundle::from_files(files, &self.descriptor_file, &self.meta_xml_file)
    }
}

/// Packer matching a path: zip for `.zip`, a directory otherwise
pub fn packer_for(path: &Path, config: &ArchiveConfig) -> Box<dyn Packer> {
    let is_zip = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"));
    if is_zip {
        Box::new(ZipPacker::new(config))
    } else {
        Box::new(DirectoryPacker::new(config))
    }
}

/// Entry point for creating, merging, deleting, validating and serialising
/// archives
pub struct ArchiveAssembler<'a> {
    registry: &'a TermRegistry,
    config: ArchiveConfig,
    post_process: Option<PostProcess>,
}

impl<'a> ArchiveAssembler<'a> {
    pub fn new(registry: &'a TermRegistry, config: ArchiveConfig) -> Self {
        Self {
            registry,
            config,
            post_process: None,
        }
    }

    /// Install a hook run on every archive right before serialisation
    pub fn with_post_process<F>(mut self, hook: F) -> Self
    where
        F: Fn(Archive) -> Result<Archive> + 'static,
    {
        self.post_process = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    pub fn registry(&self) -> &TermRegistry {
        self.registry
    }

    fn normalizer(&self) -> Normalizer<'_> {
        Normalizer::new(self.registry, &self.config)
    }

    /// Read one input table from one or more files
    ///
    /// The dialect follows the file extension, falling back to the
    /// configured dialect.
    pub fn read_input<P: AsRef<Path>>(&self, paths: &[P], row_type: RowType) -> Result<TableInput> {
        let dialect = paths
            .first()
            .and_then(|p| dialect_for(p.as_ref()))
            .unwrap_or_else(|| self.config.dialect.clone());
        let raw = parse_csv_files(paths, &dialect)?;
        Ok(TableInput::new(raw, row_type))
    }

    /// Build an archive from a core input and extension inputs
    pub fn create(&self, core: TableInput, extensions: Vec<TableInput>, metadata: Metadata) -> Result<Archive> {
        let archive = self.normalizer().build_archive(core, extensions, metadata)?;
        if self.config.validate_on_create {
            let report = self.validate(&archive, &KeyLookup::new());
            if !report.is_valid() {
                log::error!("created archive has key defects:\n{}", report);
                return Err(Error::Validation(report));
            }
        }
        log::info!(
            "created {} archive with {} extension(s), {} rows in total",
            archive.core.row_type,
            archive.extensions.len(),
            archive.total_rows()
        );
        Ok(archive)
    }

    /// Build an archive from every delimited file in a directory
    ///
    /// Row types come from the file names; the event table becomes the core
    /// if present, otherwise the occurrence table.
    pub fn create_from_directory<P: AsRef<Path>>(
        &self,
        dir: P,
        key_lookup: &KeyLookup,
        metadata: Metadata,
    ) -> Result<Archive> {
        let scan = scan_directory(dir.as_ref(), self.registry)?;
        let core_type = infer_core(scan.groups.keys())?;

        let mut core = None;
        let mut extensions = Vec::new();
        for (row_type, group) in &scan.groups {
            let raw = parse_csv_files(&group.files, &group.dialect)?;
            let mut input = TableInput::new(raw, row_type.clone());
            if let Some(keys) = key_lookup.get(row_type) {
                input = input.with_keys(keys.clone());
            }
            if *row_type == core_type {
                core = Some(input);
            } else {
                extensions.push(input);
            }
        }
        let core = core.ok_or_else(|| Error::AmbiguousCore {
            inputs: scan.groups.keys().map(|r| r.to_string()).collect(),
        })?;
        self.create(core, extensions, metadata)
    }

    /// Upsert `delta` into `base`
    pub fn merge(
        &self,
        base: &Archive,
        delta: &Archive,
        key_lookup: &KeyLookup,
        extension_sync: bool,
    ) -> Result<MergeOutcome> {
        merge(base, delta, key_lookup, extension_sync, self.registry)
    }

    /// Build the table of records to delete from a raw input
    ///
    /// The row type defaults to the core's. Without declared keys the
    /// target table's keys are matched.
    pub fn delete_input(
        &self,
        base: &Archive,
        raw: &RawTable,
        row_type: Option<RowType>,
        keys: Option<&[String]>,
    ) -> Result<Table> {
        let row_type = row_type.unwrap_or_else(|| base.core.row_type.clone());
        let normalizer = self.normalizer();
        let columns = normalizer.canonical_columns(raw, &row_type)?;
        let keys = keys
            .map(|k| normalizer.canonical_keys(&row_type, k))
            .unwrap_or_default();
        Ok(Table::core(row_type, columns, keys)?.with_rows(raw.rows.iter().cloned()))
    }

    /// Delete records from `base`
    pub fn delete(&self, base: &Archive, records: &Table, cascade: bool) -> Result<DeleteOutcome> {
        delete(base, records, cascade)
    }

    /// Validate the keys of every table
    pub fn validate(&self, archive: &Archive, key_lookup: &KeyLookup) -> ValidationReport {
        validate(archive, key_lookup, self.registry)
    }

    /// Check the keys of a single input file before it joins an archive
    ///
    /// Without `keys` the registry default of the row type is checked.
    pub fn validate_file<P: AsRef<Path>>(
        &self,
        paths: &[P],
        row_type: RowType,
        keys: Option<&[String]>,
    ) -> Result<TableValidation> {
        let input = self.read_input(paths, row_type)?;
        let table = self.normalizer().normalize(&input.raw, &input.row_type, keys)?;
        let result = validate_keys(&table, &table.keys);
        if !result.is_valid() {
            log::warn!(
                "{} has {} empty and {} duplicate key(s)",
                table.row_type,
                result.empty_keys.len(),
                result.duplicate_keys.len()
            );
        }
        Ok(result)
    }

    /// Copy of `base` without the extension of `row_type`
    pub fn remove_extension(&self, base: &Archive, row_type: &RowType) -> Result<Archive> {
        let mut archive = base.clone();
        archive.remove_extension(row_type)?;
        Ok(archive)
    }

    /// Run the post-processing hook and serialise the archive
    pub fn assemble(&self, archive: Archive) -> Result<ArchiveBundle> {
        let archive = match &self.post_process {
            Some(hook) => hook(archive)?,
            None => archive,
        };

        let mut descriptor = encode(&archive, self.registry, &self.config.dialect)?;
        descriptor.metadata_file = Some(self.config.metadata_file.clone());
        descriptor.generated_at = Some(Utc::now());

        let mut files = encode_tables(&archive, &descriptor)?;
        files.insert(
            self.config.metadata_file.clone(),
            serde_json::to_vec_pretty(&archive.metadata)?,
        );
        files.insert(self.config.meta_xml_file.clone(), descriptor.to_meta_xml()?.into_bytes());

        Ok(ArchiveBundle { descriptor, files })
    }

    /// Rebuild an archive from a bundle
    pub fn load(&self, bundle: &ArchiveBundle) -> Result<Archive> {
        let metadata = match bundle
            .descriptor
            .metadata_file
            .as_ref()
            .and_then(|name| bundle.files.get(name))
        {
            Some(bytes) => serde_json::from_slice(bytes).unwrap_or_else(|e| {
                log::warn!("metadata is not a JSON metadata block ({}), using defaults", e);
                Metadata::default()
            }),
            None => Metadata::default(),
        };
        decode(&bundle.descriptor, &bundle.files, metadata, self.registry)
    }

    /// Assemble and pack an archive with a directory packer
    pub fn write_dir<P: AsRef<Path>>(&self, archive: Archive, dir: P) -> Result<ArchiveBundle> {
        let bundle = self.assemble(archive)?;
        DirectoryPacker::new(&self.config).pack(&bundle, dir.as_ref())?;
        Ok(bundle)
    }

    /// Unpack and load an archive from a directory
    pub fn read_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Archive> {
        let bundle = DirectoryPacker::new(&self.config).unpack(dir.as_ref())?;
        self.load(&bundle)
    }

    /// Assemble and pack an archive, as a zip file when `target` ends in `.zip`
    pub fn write<P: AsRef<Path>>(&self, archive: Archive, target: P) -> Result<ArchiveBundle> {
        let bundle = self.assemble(archive)?;
        packer_for(target.as_ref(), &self.config).pack(&bundle, target.as_ref())?;
        Ok(bundle)
    }

    /// Unpack and load an archive from a directory or zip file
    pub fn read<P: AsRef<Path>>(&self, source: P) -> Result<Archive> {
        let bundle = packer_for(source.as_ref(), &self.config).unpack(source.as_ref())?;
        self.load(&bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CsvDialect;
    use crate::parser::parse_csv_str;

    fn input(csv: &str, row_type: RowType) -> TableInput {
        TableInput::new(parse_csv_str(csv, "input.csv", &CsvDialect::default()).unwrap(), row_type)
    }

    #[test]
    fn test_create_rejects_duplicate_core_keys() {
        let registry = TermRegistry::load_embedded().unwrap();
        let assembler = ArchiveAssembler::new(&registry, ArchiveConfig::default());
        let err = assembler
            .create(input("occurrenceID\n1\n1\n", RowType::Occurrence), vec![], Metadata::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_post_process_runs_before_serialisation() {
        let registry = TermRegistry::load_embedded().unwrap();
        let assembler = ArchiveAssembler::new(&registry, ArchiveConfig::default()).with_post_process(|mut archive| {
            archive.metadata.title = "processed".to_string();
            let idx = archive.core.add_column("basisOfRecord");
            for row in &mut archive.core.rows {
                row.cells[idx] = "HumanObservation".to_string();
            }
            Ok(archive)
        });
        let archive = assembler
            .create(input("occurrenceID\n1\n", RowType::Occurrence), vec![], Metadata::default())
            .unwrap();
        let bundle = assembler.assemble(archive).unwrap();
        assert!(bundle.files.contains_key("eml.json"));
        assert!(bundle.files.contains_key("meta.xml"));
        assert!(bundle.descriptor.generated_at.is_some());

        let loaded = assembler.load(&bundle).unwrap();
        assert_eq!(loaded.metadata.title, "processed");
        assert_eq!(loaded.core.value(0, "basisOfRecord"), Some("HumanObservation"));
    }

    #[test]
    fn test_failing_hook_aborts_assembly() {
        let registry = TermRegistry::load_embedded().unwrap();
        let assembler = ArchiveAssembler::new(&registry, ArchiveConfig::default())
            .with_post_process(|_| Err(Error::PostProcess("rejected".to_string())));
        let archive = assembler
            .create(input("occurrenceID\n1\n", RowType::Occurrence), vec![], Metadata::default())
            .unwrap();
        assert!(matches!(assembler.assemble(archive), Err(Error::PostProcess(_))));
    }

    #[test]
    fn test_delete_input_defaults_to_core() {
        let registry = TermRegistry::load_embedded().unwrap();
        let assembler = ArchiveAssembler::new(&registry, ArchiveConfig::default());
        let base = assembler
            .create(input("occurrenceID,catalogNumber\n1,C1\n2,C2\n", RowType::Occurrence), vec![], Metadata::default())
            .unwrap();
        let raw = parse_csv_str("dwc:catalogNumber\nC2\n", "delete.csv", &CsvDialect::default()).unwrap();
        let records = assembler
            .delete_input(&base, &raw, None, Some(&["catalogNumber".to_string()]))
            .unwrap();
        assert_eq!(records.row_type, RowType::Occurrence);
        assert_eq!(records.columns, vec!["catalogNumber"]);
        let outcome = assembler.delete(&base, &records, true).unwrap();
        assert_eq!(outcome.archive.core.row_count(), 1);
    }

    #[test]
    fn test_write_and_read_dir() {
        let registry = TermRegistry::load_embedded().unwrap();
        let assembler = ArchiveAssembler::new(&registry, ArchiveConfig::default());
        let archive = assembler
            .create(
                input("occurrenceID,associatedMedia\n1,http://x/a.jpg\n", RowType::Occurrence),
                vec![],
                Metadata {
                    title: "Test".to_string(),
                    ..Metadata::default()
                },
            )
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        assembler.write_dir(archive.clone(), dir.path()).unwrap();
        assert!(dir.path().join("meta.json").is_file());
        assert!(dir.path().join("multimedia.csv").is_file());

        let loaded = assembler.read_dir(dir.path()).unwrap();
        assert_eq!(loaded, archive);
    }

    #[test]
    fn test_validate_file() {
        let registry = TermRegistry::load_embedded().unwrap();
        let assembler = ArchiveAssembler::new(&registry, ArchiveConfig::default());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("occurrence.csv");
        fs::write(&path, "catalogNumber,scientificName\nC1,a\nC1,b\n,c\n").unwrap();

        let result = assembler
            .validate_file(&[&path], RowType::Occurrence, Some(&["catalogNumber".to_string()]))
            .unwrap();
        assert!(!result.is_valid());
        assert_eq!(result.duplicate_keys.len(), 1);
        assert_eq!(result.empty_keys.len(), 1);

        let err = assembler.validate_file(&[&path], RowType::Occurrence, None).unwrap_err();
        assert!(matches!(err, Error::KeyColumnNotFound { .. }));
    }

    #[test]
    fn test_remove_extension() {
        let registry = TermRegistry::load_embedded().unwrap();
        let assembler = ArchiveAssembler::new(&registry, ArchiveConfig::default());
        let archive = assembler
            .create(
                input("occurrenceID,associatedMedia\n1,http://x/a.jpg\n", RowType::Occurrence),
                vec![],
                Metadata::default(),
            )
            .unwrap();

        let trimmed = assembler.remove_extension(&archive, &RowType::Multimedia).unwrap();
        assert!(trimmed.extensions.is_empty());
        assert_eq!(trimmed.core, archive.core);
        assert!(archive.extension(&RowType::Multimedia).is_some());

        let err = assembler.remove_extension(&trimmed, &RowType::Multimedia).unwrap_err();
        assert!(matches!(err, Error::UnknownRowType(_)));
    }

    #[test]
    fn test_read_dir_falls_back_to_meta_xml() {
        let registry = TermRegistry::load_embedded().unwrap();
        let assembler = ArchiveAssembler::new(&registry, ArchiveConfig::default());
        let archive = assembler
            .create(
                input(
                    "occurrenceID,scientificName,associatedMedia\n1,Puma concolor,http://x/a.jpg\n2,Lynx rufus,\n",
                    RowType::Occurrence,
                ),
                vec![],
                Metadata {
                    title: "Cats".to_string(),
                    ..Metadata::default()
                },
            )
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        assembler.write_dir(archive.clone(), dir.path()).unwrap();
        fs::remove_file(dir.path().join("meta.json")).unwrap();

        let loaded = assembler.read_dir(dir.path()).unwrap();
        assert_eq!(loaded.metadata.title, "Cats");
        assert_eq!(loaded.core.keys, archive.core.keys);
        assert_eq!(loaded.core.rows, archive.core.rows);
        let media = loaded.extension(&RowType::Multimedia).unwrap();
        assert_eq!(media.foreign_key(), ["occurrenceID"]);
        assert_eq!(media.rows, archive.extension(&RowType::Multimedia).unwrap().rows);
    }

    #[test]
    fn test_read_dir_without_descriptor() {
        let registry = TermRegistry::load_embedded().unwrap();
        let assembler = ArchiveAssembler::new(&registry, ArchiveConfig::default());
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(assembler.read_dir(dir.path()), Err(Error::Descriptor(_))));
    }

    #[test]
    fn test_zip_round_trip() {
        let registry = TermRegistry::load_embedded().unwrap();
        let assembler = ArchiveAssembler::new(&registry, ArchiveConfig::default());
        let archive = assembler
            .create(
                input("occurrenceID,associatedMedia\n1,http://x/a.jpg|http://x/b.png\n", RowType::Occurrence),
                vec![],
                Metadata::default(),
            )
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out").join("archive.zip");

        let bundle = assembler.write(archive.clone(), &target).unwrap();
        assert!(target.is_file());
        let mut zip = ZipArchive::new(fs::File::open(&target).unwrap()).unwrap();
        assert_eq!(zip.len(), bundle.files.len() + 1);
        assert!(zip.by_name("meta.xml").is_ok());

        let loaded = assembler.read(&target).unwrap();
        assert_eq!(loaded, archive);
    }
}
