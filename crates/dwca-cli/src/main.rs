//! Darwin Core Archive CLI
//!
//! Command-line tool for creating, merging, deleting from and validating
//! Darwin Core Archives.

use clap::{Parser, Subcommand};
use dwca_core::{
    parse_key_spec, split_key_list, Archive, ArchiveAssembler, ArchiveConfig, Error, KeyLookup,
    Metadata, RowType, TableInput, TermRegistry, ValidationReport,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dwca")]
#[command(about = "Darwin Core Archive builder", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Archive config file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an archive from delimited files
    Create {
        /// Core table file(s); several files are concatenated
        #[arg(long, required_unless_present = "dir")]
        core: Vec<PathBuf>,

        /// Core row type (inferred from the file name if omitted)
        #[arg(long)]
        core_type: Option<String>,

        /// Core key columns (comma-separated)
        #[arg(long)]
        keys: Option<String>,

        /// Extension file as FILE=TYPE (TYPE inferred from the file name if omitted)
        #[arg(long)]
        ext: Vec<String>,

        /// Directory of files named after their row types
        #[arg(long, conflicts_with = "core")]
        dir: Option<PathBuf>,

        /// Extension keys as TYPE=KEY[,KEY...]
        #[arg(long)]
        key: Vec<String>,

        /// Metadata file (JSON)
        #[arg(short, long)]
        metadata: Option<PathBuf>,

        /// Output directory or zip file (ending in .zip)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Merge a delta archive into a base archive
    Merge {
        /// Base archive directory or zip file
        #[arg(long)]
        base: PathBuf,

        /// Delta archive directory or zip file
        #[arg(long)]
        delta: PathBuf,

        /// Keys per row type as TYPE=KEY[,KEY...]
        #[arg(long)]
        key: Vec<String>,

        /// Drop extension rows whose core record no longer exists
        #[arg(long)]
        extension_sync: bool,

        /// Output directory or zip file (ending in .zip)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Delete records listed in a file
    Delete {
        /// Archive directory or zip file
        #[arg(long)]
        base: PathBuf,

        /// File listing the records to delete
        #[arg(long)]
        records: PathBuf,

        /// Row type to delete from (defaults to the core)
        #[arg(long = "type")]
        row_type: Option<String>,

        /// Columns to match on (comma-separated)
        #[arg(long)]
        keys: Option<String>,

        /// Keep extension rows of deleted core records
        #[arg(long)]
        no_cascade: bool,

        /// Output directory or zip file (ending in .zip)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Validate the keys of an archive or of input files
    Validate {
        /// Archive directory or zip file
        #[arg(long, required_unless_present = "file")]
        archive: Option<PathBuf>,

        /// Input file(s) to check before building an archive
        #[arg(long, conflicts_with = "archive")]
        file: Vec<PathBuf>,

        /// Row type of the input files (inferred from the file name if omitted)
        #[arg(long = "type")]
        row_type: Option<String>,

        /// Key columns of the input files (comma-separated)
        #[arg(long)]
        keys: Option<String>,

        /// Keys per row type as TYPE=KEY[,KEY...]
        #[arg(long)]
        key: Vec<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop one extension from an archive
    RemoveExtension {
        /// Archive directory or zip file
        #[arg(long)]
        base: PathBuf,

        /// Row type of the extension to drop
        #[arg(long = "type")]
        row_type: String,

        /// Output directory or zip file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List vocabulary terms
    Terms {
        /// Only terms with this namespace prefix (e.g. dwc, dc)
        #[arg(short, long)]
        prefix: Option<String>,
    },

    /// Show the tables of an archive
    Inspect {
        /// Archive directory or zip file
        #[arg(long)]
        archive: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> dwca_core::Result<()> {
    let config = match &cli.config {
        Some(path) => ArchiveConfig::load(path)?,
        None => ArchiveConfig::default(),
    };
    let registry = TermRegistry::load_embedded()?;
    log::debug!("loaded {} vocabulary terms", registry.terms().len());
    let assembler = ArchiveAssembler::new(&registry, config);

    match cli.command {
        Commands::Create {
            core,
            core_type,
            keys,
            ext,
            dir,
            key,
            metadata,
            output,
        } => {
            let metadata = load_metadata(metadata.as_deref())?;
            let key_lookup = parse_key_lookup(&key)?;
            let archive = match dir {
                Some(dir) => assembler.create_from_directory(&dir, &key_lookup, metadata)?,
                None => cmd_create_from_files(&assembler, &core, core_type, keys, &ext, &key_lookup, metadata)?,
            };
            write_archive(&assembler, archive, &output)
        }
        Commands::Merge {
            base,
            delta,
            key,
            extension_sync,
            output,
        } => cmd_merge(&assembler, &base, &delta, &key, extension_sync, &output),
        Commands::Delete {
            base,
            records,
            row_type,
            keys,
            no_cascade,
            output,
        } => cmd_delete(&assembler, &base, &records, row_type, keys, !no_cascade, &output),
        Commands::Validate {
            archive,
            file,
            row_type,
            keys,
            key,
            json,
        } => match archive {
            Some(archive) => cmd_validate(&assembler, &archive, &key, json),
            None => cmd_validate_files(&assembler, &file, row_type, keys, json),
        },
        Commands::RemoveExtension {
            base,
            row_type,
            output,
        } => cmd_remove_extension(&assembler, &base, row_type, &output),
        Commands::Terms { prefix } => cmd_terms(&registry, prefix.as_deref()),
        Commands::Inspect { archive } => cmd_inspect(&assembler, &archive),
    }
}

fn load_metadata(path: Option<&Path>) -> dwca_core::Result<Metadata> {
    let Some(path) = path else {
        return Ok(Metadata::default());
    };
    let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn parse_key_lookup(specs: &[String]) -> dwca_core::Result<KeyLookup> {
    let mut lookup = KeyLookup::new();
    for spec in specs {
        let (row_type, keys) = parse_key_spec(spec)?;
        lookup.insert(row_type, keys);
    }
    Ok(lookup)
}

/// Row type given on the command line, or the one named by the file
fn row_type_for(registry: &TermRegistry, declared: Option<&str>, path: &Path) -> dwca_core::Result<RowType> {
    if let Some(name) = declared {
        return RowType::try_from(name.to_string());
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    registry
        .row_type_by_name(stem)
        .ok_or_else(|| Error::UnknownRowType(stem.to_string()))
}

fn cmd_create_from_files(
    assembler: &ArchiveAssembler<'_>,
    core: &[PathBuf],
    core_type: Option<String>,
    keys: Option<String>,
    ext: &[String],
    key_lookup: &KeyLookup,
    metadata: Metadata,
) -> dwca_core::Result<Archive> {
    let first = core
        .first()
        .ok_or_else(|| Error::Descriptor("no core input file given".to_string()))?;
    let core_type = row_type_for(assembler.registry(), core_type.as_deref(), first)?;
    let mut core_input = assembler.read_input(core, core_type.clone())?;
    if let Some(keys) = keys.as_deref().map(split_key_list) {
        core_input = core_input.with_keys(keys);
    } else if let Some(keys) = key_lookup.get(&core_type) {
        core_input = core_input.with_keys(keys.clone());
    }

    let mut extensions: Vec<TableInput> = Vec::new();
    for spec in ext {
        let (file, declared) = match spec.rsplit_once('=') {
            Some((file, row_type)) => (PathBuf::from(file), Some(row_type)),
            None => (PathBuf::from(spec), None),
        };
        let row_type = row_type_for(assembler.registry(), declared, &file)?;
        let mut input = assembler.read_input(&[file], row_type.clone())?;
        if let Some(keys) = key_lookup.get(&row_type) {
            input = input.with_keys(keys.clone());
        }
        extensions.push(input);
    }

    assembler.create(core_input, extensions, metadata)
}

fn write_archive(assembler: &ArchiveAssembler<'_>, archive: Archive, output: &Path) -> dwca_core::Result<()> {
    let summary: Vec<String> = archive
        .tables()
        .map(|t| format!("{} ({} rows)", t.row_type, t.row_count()))
        .collect();
    assembler.write(archive, output)?;
    println!("Wrote archive to {}", output.display());
    for line in summary {
        println!("  {}", line);
    }
    Ok(())
}

fn cmd_merge(
    assembler: &ArchiveAssembler<'_>,
    base: &Path,
    delta: &Path,
    key: &[String],
    extension_sync: bool,
    output: &Path,
) -> dwca_core::Result<()> {
    let key_lookup = parse_key_lookup(key)?;
    let base = assembler.read(base)?;
    let delta = assembler.read(delta)?;
    let outcome = assembler.merge(&base, &delta, &key_lookup, extension_sync)?;

    println!("Merge summary:");
    for (row_type, stats) in &outcome.stats {
        println!(
            "  {}: {} inserted, {} replaced, {} superseded, {} orphans removed",
            row_type, stats.inserted, stats.replaced, stats.superseded, stats.orphans_removed
        );
        if !stats.new_columns.is_empty() {
            println!("    new columns: {}", stats.new_columns.join(", "));
        }
    }
    write_archive(assembler, outcome.archive, output)
}

fn cmd_delete(
    assembler: &ArchiveAssembler<'_>,
    base: &Path,
    records: &Path,
    row_type: Option<String>,
    keys: Option<String>,
    cascade: bool,
    output: &Path,
) -> dwca_core::Result<()> {
    let base = assembler.read(base)?;
    let row_type = row_type.map(RowType::try_from).transpose()?;
    let keys = keys.as_deref().map(split_key_list);

    let input = assembler.read_input(&[records], row_type.clone().unwrap_or_else(|| base.core.row_type.clone()))?;
    let records = assembler.delete_input(&base, &input.raw, row_type, keys.as_deref())?;
    let outcome = assembler.delete(&base, &records, cascade)?;

    for warning in &outcome.warnings {
        println!("Warning: {}", warning);
    }
    for (row_type, count) in &outcome.removed {
        println!("  {}: {} row(s) deleted", row_type, count);
    }
    write_archive(assembler, outcome.archive, output)
}

fn cmd_validate(assembler: &ArchiveAssembler<'_>, archive: &Path, key: &[String], json: bool) -> dwca_core::Result<()> {
    let key_lookup = parse_key_lookup(key)?;
    let archive = assembler.read(archive)?;
    let report = assembler.validate(&archive, &key_lookup);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for table in &report.tables {
            let status = if table.is_valid() { "ok" } else { "FAILED" };
            println!("{} [{}]: {}", table.row_type, table.keys.join(", "), status);
        }
    }
    report.into_result()
}

fn cmd_validate_files(
    assembler: &ArchiveAssembler<'_>,
    files: &[PathBuf],
    row_type: Option<String>,
    keys: Option<String>,
    json: bool,
) -> dwca_core::Result<()> {
    let first = files
        .first()
        .ok_or_else(|| Error::Descriptor("no input file given".to_string()))?;
    let row_type = row_type_for(assembler.registry(), row_type.as_deref(), first)?;
    let keys = keys.as_deref().map(split_key_list);
    let result = assembler.validate_file(files, row_type, keys.as_deref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let status = if result.is_valid() { "ok" } else { "FAILED" };
        println!("{} [{}]: {}", result.row_type, result.keys.join(", "), status);
        for empty in &result.empty_keys {
            println!("  row {}: empty key", empty.row);
        }
        for duplicate in &result.duplicate_keys {
            println!("  rows {:?}: duplicate key {}", duplicate.rows, duplicate.key.join(", "));
        }
    }
    ValidationReport {
        tables: vec![result],
    }
    .into_result()
}

fn cmd_remove_extension(
    assembler: &ArchiveAssembler<'_>,
    base: &Path,
    row_type: String,
    output: &Path,
) -> dwca_core::Result<()> {
    let base = assembler.read(base)?;
    let row_type = RowType::try_from(row_type)?;
    let archive = assembler.remove_extension(&base, &row_type)?;
    println!("Removed {} extension", row_type);
    write_archive(assembler, archive, output)
}

fn cmd_terms(registry: &TermRegistry, prefix: Option<&str>) -> dwca_core::Result<()> {
    let terms: Vec<_> = registry
        .terms()
        .iter()
        .filter(|t| prefix.map_or(true, |p| t.prefix.eq_ignore_ascii_case(p)))
        .collect();

    println!("Terms ({}):", terms.len());
    for term in terms {
        println!("  {}:{}\t{}", term.prefix, term.name, term.uri);
    }
    Ok(())
}

fn cmd_inspect(assembler: &ArchiveAssembler<'_>, dir: &Path) -> dwca_core::Result<()> {
    let archive = assembler.read(dir)?;

    if !archive.metadata.title.is_empty() {
        println!("Title: {}", archive.metadata.title);
    }
    for table in archive.tables() {
        let role = if table.is_core() { "core" } else { "extension" };
        println!(
            "{} {} ({} rows, {} columns)",
            role,
            table.row_type,
            table.row_count(),
            table.column_count()
        );
        if !table.keys.is_empty() {
            println!("  keys: {}", table.keys.join(", "));
        }
        if !table.foreign_key().is_empty() {
            println!("  linked by: {}", table.foreign_key().join(", "));
        }
        println!("  columns: {}", table.columns.join(", "));
    }
    Ok(())
}
