use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::config::ReportMode;

#[derive(Debug, Parser)]
#[command(author, version, about = "Remap coded CSV columns through a lookup table", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replace target column values with mapped averages and report unmapped rows
    Remap(RemapArgs),
    /// Build a reusable lookup index (.idx) from a mapping table
    Index(IndexArgs),
    /// Show how mapping and dataset columns would be resolved
    Inspect(InspectArgs),
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("lookup").required(true).args(["mapping", "mapping_index"])))]
pub struct RemapArgs {
    /// Main dataset to transform (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Transformed output file (`-` writes stdout)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Report of identifiers with blank or unmapped values
    #[arg(short = 'r', long = "report")]
    pub report: PathBuf,
    /// Mapping table with sender code, category number and average columns
    #[arg(long = "mapping")]
    pub mapping: Option<PathBuf>,
    /// Lookup index built by the `index` command
    #[arg(long = "mapping-index")]
    pub mapping_index: Option<PathBuf>,
    /// YAML file with run settings; flags take precedence
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Rows per batch (defaults to 125000)
    #[arg(long = "batch-size", value_parser = clap::value_parser!(usize))]
    pub batch_size: Option<usize>,
    /// Name prefix selecting the columns to remap (defaults to `amt_`)
    #[arg(long = "target-prefix")]
    pub target_prefix: Option<String>,
    /// Identifier column candidates in priority order (repeatable)
    #[arg(long = "id-column", action = clap::ArgAction::Append)]
    pub id_columns: Vec<String>,
    /// Report layout
    #[arg(long = "report-mode", value_enum)]
    pub report_mode: Option<ReportMode>,
    /// CSV delimiter of the main dataset
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// CSV delimiter of the mapping table
    #[arg(long = "mapping-delimiter", value_parser = parse_delimiter)]
    pub mapping_delimiter: Option<u8>,
    /// Delimiter for the output and report (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the main dataset (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Character encoding of the mapping table (defaults to utf-8)
    #[arg(long = "mapping-encoding")]
    pub mapping_encoding: Option<String>,
    /// Character encoding for the output and report (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
    /// Write a JSON run summary to this path
    #[arg(long = "summary")]
    pub summary: Option<PathBuf>,
    /// Print per-column hit/miss/blank counts when the run finishes
    #[arg(long = "stats")]
    pub stats: bool,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Mapping table to index
    #[arg(long = "mapping")]
    pub mapping: PathBuf,
    /// Output index file (.idx)
    #[arg(short = 'o', long = "index")]
    pub index: PathBuf,
    /// CSV delimiter of the mapping table
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the mapping table (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("sources").required(true).multiple(true).args(["mapping", "input"])))]
pub struct InspectArgs {
    /// Mapping table whose columns should be resolved
    #[arg(long = "mapping")]
    pub mapping: Option<PathBuf>,
    /// Main dataset whose header should be resolved
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// YAML file with run settings
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Name prefix selecting the columns to remap
    #[arg(long = "target-prefix")]
    pub target_prefix: Option<String>,
    /// Identifier column candidates in priority order (repeatable)
    #[arg(long = "id-column", action = clap::ArgAction::Append)]
    pub id_columns: Vec<String>,
    /// CSV delimiter of the main dataset
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// CSV delimiter of the mapping table
    #[arg(long = "mapping-delimiter", value_parser = parse_delimiter)]
    pub mapping_delimiter: Option<u8>,
    /// Character encoding of both inputs (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
