//! Column resolution preview.
//!
//! Resolves the mapping roles and/or the main dataset's identifier and target
//! columns exactly as `remap` would, and prints them without touching any data.

use anyhow::{Context, Result};
use log::info;

use crate::{
    batch::BatchReader,
    cli::InspectArgs,
    columns::ColumnPlan,
    config::RemapConfig,
    io_utils, mapping,
    table::{self, Align},
};

pub fn execute(args: &InspectArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let config = RemapConfig::layered(
        args.config.as_deref(),
        None,
        args.target_prefix.as_deref(),
        &args.id_columns,
        None,
    )?;

    if let Some(path) = &args.mapping {
        let delimiter = io_utils::resolve_input_delimiter(path, args.mapping_delimiter);
        let columns = mapping::inspect_columns(path, delimiter, encoding)
            .with_context(|| format!("Resolving mapping columns of {path:?}"))?;
        let headers = ["role", "column"].map(String::from);
        let rows = vec![
            vec!["sender code".to_string(), columns.sender],
            vec!["category number".to_string(), columns.category],
            vec!["average value".to_string(), columns.average],
        ];
        table::print_table(&headers, &rows, &[]);
    }

    if let Some(path) = &args.input {
        let delimiter = io_utils::resolve_input_delimiter(path, args.delimiter);
        let reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let batches = BatchReader::new(reader, encoding, 1, format!("{path:?}"))?;
        let plan = ColumnPlan::resolve(batches.headers(), &config.id_columns, &config.target_prefix)
            .with_context(|| format!("Resolving dataset columns of {path:?}"))?;
        let headers = ["#", "column", "role"].map(String::from);
        let rows = plan
            .headers()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let role = if name == plan.id_column() {
                    "identifier"
                } else if plan.targets().contains(name) {
                    "target"
                } else {
                    ""
                };
                vec![(idx + 1).to_string(), name.clone(), role.to_string()]
            })
            .collect::<Vec<_>>();
        if args.mapping.is_some() {
            println!();
        }
        table::print_table(&headers, &rows, &[Align::Right]);
        info!(
            "{:?}: identifier '{}', {} target column(s) with prefix '{}'",
            path,
            plan.id_column(),
            plan.targets().len(),
            config.target_prefix
        );
    }
    Ok(())
}
