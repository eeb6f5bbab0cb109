//! dwca-core: Core library for building, merging and validating Darwin Core Archives
//!
//! This library provides functionality to:
//! - Resolve column names against the Darwin Core term vocabulary
//! - Parse delimited files into core and extension tables
//! - Derive a multimedia extension from associated media links
//! - Validate key columns (non-empty, unique)
//! - Merge a delta archive into a base archive and delete records by key
//! - Encode and decode the archive descriptor and write archive bundles

pub mod archive;
pub mod assembler;
pub mod config;
pub mod delete;
pub mod descriptor;
pub mod error;
pub mod media;
pub mod merger;
pub mod normalize;
pub mod parser;
pub mod scanner;
pub mod table;
pub mod terms;
pub mod validate;
pub mod writer;

pub use archive::{Archive, Metadata};
pub use assembler::{packer_for, ArchiveAssembler, ArchiveBundle, DirectoryPacker, Packer, PostProcess, ZipPacker};
pub use config::{parse_key_spec, split_key_list, ArchiveConfig, CsvDialect, KeyLookup, LineTerminator};
pub use delete::{delete, DeleteOutcome, Warning};
pub use descriptor::{
    decode, encode, encode_tables, link_value, Descriptor, FieldMapping, TableDescriptor, CORE_ID_COLUMN,
    EXTENSION_ID_COLUMN,
};
pub use error::{Error, Result};
pub use media::{infer_media, split_media_urls, MediaInfo, MediaType};
pub use merger::{merge, merge_tables, MergeOutcome, MergeStats};
pub use normalize::{extract_multimedia, fill_media_info, infer_core, Normalizer, TableInput};
pub use parser::{parse_csv, parse_csv_bytes, parse_csv_files, parse_csv_str, read_data_file, RawTable};
pub use scanner::{scan_directory, InputGroup, ScanResult};
pub use table::{KeyTuple, Role, Row, Table};
pub use terms::{extract_term, RowType, RowTypeEntry, Term, TermRegistry};
pub use validate::{
    effective_keys, validate, validate_keys, DuplicateKeyViolation, EmptyKeyViolation, TableValidation,
    ValidationReport,
};
pub use writer::write_table;
