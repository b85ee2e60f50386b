pub mod batch;
pub mod cli;
pub mod columns;
pub mod config;
pub mod engine;
pub mod error;
pub mod inspect;
pub mod io_utils;
pub mod lookup;
pub mod mapping;
pub mod pipeline;
pub mod table;
pub mod writer;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    config::RemapConfig,
    pipeline::{LookupSource, RemapOptions},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_remap", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Remap(args) => handle_remap(&args),
        Commands::Index(args) => handle_index(&args),
        Commands::Inspect(args) => inspect::execute(&args),
    }
}

fn handle_remap(args: &cli::RemapArgs) -> Result<()> {
    let config = RemapConfig::layered(
        args.config.as_deref(),
        args.batch_size,
        args.target_prefix.as_deref(),
        &args.id_columns,
        args.report_mode,
    )?;
    let lookup = match (&args.mapping, &args.mapping_index) {
        (_, Some(index)) => LookupSource::Index {
            path: index.clone(),
        },
        (Some(mapping), None) => LookupSource::Table {
            path: mapping.clone(),
            delimiter: args.mapping_delimiter,
            encoding: args.mapping_encoding.clone(),
        },
        (None, None) => return Err(anyhow!("Provide --mapping or --mapping-index")),
    };
    info!(
        "Remapping '{}' -> {:?} (delimiter '{}', batch size {})",
        args.input.display(),
        args.output,
        printable_delimiter(io_utils::resolve_input_delimiter(&args.input, args.delimiter)),
        config.batch_size
    );
    let options = RemapOptions {
        input: args.input.clone(),
        output: args.output.clone(),
        report: args.report.clone(),
        lookup,
        config,
        delimiter: args.delimiter,
        output_delimiter: args.output_delimiter,
        input_encoding: args.input_encoding.clone(),
        output_encoding: args.output_encoding.clone(),
    };
    let summary =
        pipeline::run(&options).with_context(|| format!("Remapping {:?}", args.input))?;
    if let Some(path) = &args.summary {
        pipeline::save_summary(&summary, path)?;
        info!("Run summary written to {:?}", path);
    }
    if args.stats {
        let rendered = table::render_column_stats(&summary.columns);
        // stdout already carries the CSV when the output is `-`
        if io_utils::is_dash(&args.output) {
            eprint!("{rendered}");
        } else {
            print!("{rendered}");
        }
    }
    Ok(())
}

fn handle_index(args: &cli::IndexArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.mapping, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Indexing mapping '{}' with delimiter '{}'",
        args.mapping.display(),
        printable_delimiter(delimiter)
    );
    let index = mapping::load_lookup_index(&args.mapping, delimiter, encoding)
        .with_context(|| format!("Building lookup index from {:?}", args.mapping))?;
    index
        .save(&args.index)
        .with_context(|| format!("Writing lookup index to {:?}", args.index))?;
    info!(
        "Lookup index with {} key(s) written to {:?}",
        index.len(),
        args.index
    );
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
