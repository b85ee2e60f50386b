//! One remap run from inputs to finished outputs.
//!
//! Ordering matters: the lookup source and the main dataset header are
//! resolved before either output is created, so configuration failures never
//! leave output files behind. After that, batches stream through the engine
//! one at a time; a schema error skips its batch, every other error aborts.

use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    batch::{Batch, BatchReader},
    columns::ColumnPlan,
    config::{RemapConfig, ReportMode},
    engine::{ColumnStats, TransformEngine},
    error::{RemapError, RemapResult},
    io_utils,
    lookup::LookupIndex,
    mapping,
    writer::{IncrementalWriter, OutputLayout},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupSource {
    /// Delimited mapping table, indexed at start-up.
    Table {
        path: PathBuf,
        delimiter: Option<u8>,
        encoding: Option<String>,
    },
    /// Index file produced by the `index` command.
    Index { path: PathBuf },
}

impl LookupSource {
    pub fn table(path: impl Into<PathBuf>) -> Self {
        LookupSource::Table {
            path: path.into(),
            delimiter: None,
            encoding: None,
        }
    }

    pub fn load(&self) -> RemapResult<LookupIndex> {
        match self {
            LookupSource::Table {
                path,
                delimiter,
                encoding,
            } => {
                let delimiter = io_utils::resolve_input_delimiter(path, *delimiter);
                let encoding = io_utils::resolve_encoding(encoding.as_deref())?;
                mapping::load_lookup_index(path, delimiter, encoding)
            }
            LookupSource::Index { path } => {
                let index = LookupIndex::load(path)?;
                info!("Loaded {} mapping key(s) from index {:?}", index.len(), path);
                Ok(index)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemapOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub report: PathBuf,
    pub lookup: LookupSource,
    pub config: RemapConfig,
    pub delimiter: Option<u8>,
    pub output_delimiter: Option<u8>,
    pub input_encoding: Option<String>,
    pub output_encoding: Option<String>,
}

impl RemapOptions {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        report: impl Into<PathBuf>,
        lookup: LookupSource,
    ) -> Self {
        RemapOptions {
            input: input.into(),
            output: output.into(),
            report: report.into(),
            lookup,
            config: RemapConfig::default(),
            delimiter: None,
            output_delimiter: None,
            input_encoding: None,
            output_encoding: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub id_column: String,
    pub target_columns: Vec<String>,
    pub lookup_entries: usize,
    pub batches_read: usize,
    pub batches_written: usize,
    pub skipped_batches: Vec<usize>,
    pub rows_read: usize,
    pub rows_written: usize,
    pub report_rows: usize,
    pub columns: BTreeMap<String, ColumnStats>,
}

pub fn run(options: &RemapOptions) -> RemapResult<RunSummary> {
    options.config.validate()?;
    if io_utils::same_file(&options.output, &options.input) {
        return Err(RemapError::configuration(format!(
            "Output path {:?} must differ from the input path",
            options.output
        )));
    }
    if io_utils::same_file(&options.report, &options.output)
        || io_utils::same_file(&options.report, &options.input)
    {
        return Err(RemapError::configuration(format!(
            "Report path {:?} must differ from the input and output paths",
            options.report
        )));
    }
    if io_utils::is_dash(&options.report) {
        return Err(RemapError::configuration(
            "The unmapped report must be written to a file",
        ));
    }

    let index = options.lookup.load()?;

    let delimiter = io_utils::resolve_input_delimiter(&options.input, options.delimiter);
    let input_encoding = io_utils::resolve_encoding(options.input_encoding.as_deref())?;
    let output_encoding = io_utils::resolve_encoding(options.output_encoding.as_deref())?;
    let output_delimiter =
        io_utils::resolve_output_delimiter(&options.output, options.output_delimiter, delimiter);
    let report_delimiter =
        io_utils::resolve_output_delimiter(&options.report, None, output_delimiter);

    let reader = io_utils::open_csv_reader_from_path(&options.input, delimiter)?;
    let batches = BatchReader::new(
        reader,
        input_encoding,
        options.config.batch_size,
        format!("{:?}", options.input),
    )?;
    let plan = ColumnPlan::resolve(
        batches.headers(),
        &options.config.id_columns,
        &options.config.target_prefix,
    )?;
    announce_plan(&plan, &options.config.target_prefix);

    let output = io_utils::open_csv_writer(&options.output, output_delimiter, output_encoding)?;
    let report = io_utils::open_csv_writer(&options.report, report_delimiter, output_encoding)?;
    let writer = IncrementalWriter::new(
        output,
        report,
        OutputLayout::new(plan.headers(), plan.id_column()),
        plan.id_column(),
        options.config.report_mode,
    );

    let engine = TransformEngine::new(&index, &plan)
        .with_occurrences(options.config.report_mode == ReportMode::Detailed);
    let mut summary = RunSummary {
        id_column: plan.id_column().to_string(),
        target_columns: plan.targets().to_vec(),
        lookup_entries: index.len(),
        ..RunSummary::default()
    };
    process_batches(batches, &engine, writer, &mut summary)?;

    info!(
        "Remap complete: {} of {} row(s) written to {:?} across {} batch(es); {} report row(s) in {:?}",
        summary.rows_written,
        summary.rows_read,
        options.output,
        summary.batches_written,
        summary.report_rows,
        options.report
    );
    if !summary.skipped_batches.is_empty() {
        warn!(
            "Skipped {} batch(es) with schema errors: {:?}",
            summary.skipped_batches.len(),
            summary.skipped_batches
        );
    }
    for (column, stats) in &summary.columns {
        debug!(
            "Column '{}': {} hit(s), {} miss(es), {} blank(s)",
            column, stats.hits, stats.misses, stats.blanks
        );
    }
    Ok(summary)
}

/// Drives batches from `batches` through `engine` into `writer`.
pub fn process_batches<I, O, R>(
    batches: I,
    engine: &TransformEngine<'_>,
    mut writer: IncrementalWriter<O, R>,
    summary: &mut RunSummary,
) -> RemapResult<(O, R)>
where
    I: IntoIterator<Item = RemapResult<Batch>>,
    O: Write,
    R: Write,
{
    for batch in batches {
        let mut batch = batch?;
        summary.batches_read += 1;
        summary.rows_read += batch.len();
        info!(
            "Processing batch {} ({} row(s) from data row {})",
            batch.index + 1,
            batch.len(),
            batch.first_row
        );
        let outcome = match engine.transform(&mut batch) {
            Ok(outcome) => outcome,
            Err(err) if err.is_recoverable() => {
                warn!("Skipping batch {}: {err}", batch.index + 1);
                summary.skipped_batches.push(batch.index);
                continue;
            }
            Err(err) => return Err(err),
        };
        summary.report_rows += writer.write_unmapped(&outcome)?;
        summary.rows_written += writer.write_batch(&batch)?;
        summary.batches_written += 1;
        for (column, stats) in &outcome.columns {
            summary.columns.entry(column.clone()).or_default().merge(stats);
        }
    }
    writer.finish()
}

fn announce_plan(plan: &ColumnPlan, prefix: &str) {
    info!("Identifier column: '{}'", plan.id_column());
    if plan.targets().is_empty() {
        warn!(
            "No columns starting with '{prefix}' found in the main dataset; values will pass through unchanged"
        );
    } else {
        info!(
            "Found {} target column(s): {:?}",
            plan.targets().len(),
            plan.targets()
        );
    }
}

/// Writes the run summary as pretty JSON.
pub fn save_summary(summary: &RunSummary, path: &Path) -> RemapResult<()> {
    let file = std::fs::File::create(path)
        .map_err(|err| RemapError::io(format!("Creating summary file {path:?}"), err))?;
    serde_json::to_writer_pretty(file, summary).map_err(|err| {
        RemapError::io(format!("Writing summary file {path:?}"), err.into())
    })
}
