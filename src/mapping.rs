//! Mapping table loader.
//!
//! The mapping table carries one row per (sender code, category number) pair
//! with its average value. Column names vary between deliveries, so the three
//! roles are discovered through [`MappingColumns::resolve`] after sanitizing
//! the header.

use std::{io, io::Read, path::Path};

use encoding_rs::Encoding;
use log::{debug, info, warn};

use crate::{
    columns::{MappingColumns, sanitize_headers},
    error::{ErrorContext, RemapError, RemapResult},
    io_utils,
    lookup::{LookupIndex, MappingEntry},
};

/// Reads the mapping table at `path` into a [`LookupIndex`].
///
/// A missing file or unresolvable columns are configuration errors.
pub fn load_lookup_index(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> RemapResult<LookupIndex> {
    let mut reader = open_mapping(path, delimiter)?;
    let (columns, entries) = read_entries(&mut reader, encoding, path)?;
    let index = LookupIndex::from_entries(entries);
    info!(
        "Indexed {} mapping key(s) from {:?} using columns '{}', '{}' -> '{}'",
        index.len(),
        path,
        columns.sender,
        columns.category,
        columns.average
    );
    if index.overwritten_keys() > 0 {
        warn!(
            "{} duplicate composite key(s) in {:?}; the last occurrence wins",
            index.overwritten_keys(),
            path
        );
    }
    Ok(index)
}

/// Reads only the mapping header and resolves the column roles.
pub fn inspect_columns(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> RemapResult<MappingColumns> {
    let mut reader = open_mapping(path, delimiter)?;
    let headers = mapping_headers(&mut reader, encoding, path)?;
    MappingColumns::resolve(&headers)
}

fn open_mapping(path: &Path, delimiter: u8) -> RemapResult<csv::Reader<Box<dyn Read>>> {
    if io_utils::is_dash(path) {
        return Err(RemapError::configuration(
            "The mapping table cannot be read from stdin; provide a file path",
        ));
    }
    io_utils::open_csv_reader_from_path(path, delimiter).map_err(|err| match err {
        RemapError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound => {
            RemapError::configuration(format!("Mapping file {path:?} not found"))
        }
        other => other,
    })
}

fn mapping_headers<R: Read>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
    path: &Path,
) -> RemapResult<Vec<String>> {
    let raw = io_utils::reader_headers(reader, encoding, path)?;
    let headers = sanitize_headers(&raw, &format!("{path:?}"))?;
    debug!("Mapping columns after sanitizing: {:?}", headers);
    Ok(headers)
}

/// Resolves the column roles and collects one entry per data row. Blank key
/// parts contribute an empty string to the composite key.
pub fn read_entries<R: Read>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
    path: &Path,
) -> RemapResult<(MappingColumns, Vec<MappingEntry>)> {
    let headers = mapping_headers(reader, encoding, path)?;
    let columns = MappingColumns::resolve(&headers).map_err(|err| match err {
        RemapError::Configuration { message } => {
            RemapError::configuration(format!("Mapping table {path:?}: {message}"))
        }
        other => other,
    })?;
    let (sender_idx, category_idx, average_idx) = columns.indices(&headers)?;

    let mut entries = Vec::new();
    let mut record = csv::ByteRecord::new();
    let mut row = 0usize;
    while reader
        .read_byte_record(&mut record)
        .context_with(|| format!("Reading mapping row {} of {path:?}", row + 2))?
    {
        row += 1;
        let decoded = io_utils::decode_record(&record, encoding)?;
        let field = |idx: usize| decoded.get(idx).map(String::as_str).unwrap_or("");
        entries.push(MappingEntry::new(
            field(sender_idx),
            field(category_idx),
            field(average_idx),
        ));
    }
    Ok((columns, entries))
}
