//! I/O utilities for CSV reading, writing, encoding, and delimiter resolution.
//!
//! Every file touched by a remap run is opened through this module:
//!
//! - **Delimiter resolution**: `.tsv` means tab, anything else defaults to comma
//!   unless overridden.
//! - **Encoding**: input decoding and output transcoding via `encoding_rs`,
//!   defaulting to UTF-8.
//! - **stdin/stdout**: the `-` path reads the main dataset from stdin or writes
//!   the transformed output to stdout.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::error::{ErrorContext, RemapError, RemapResult};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

/// True when both paths name the same file, either lexically or after
/// resolving links and relative segments. `-` never matches a real file.
pub fn same_file(left: &Path, right: &Path) -> bool {
    if is_dash(left) || is_dash(right) {
        return false;
    }
    if left == right {
        return true;
    }
    match (std::fs::canonicalize(left), std::fs::canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

pub fn resolve_encoding(label: Option<&str>) -> RemapResult<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| RemapError::configuration(format!("Unknown encoding '{value}'"))),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: &Path, provided: Option<u8>, fallback: u8) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        Some(ext) if ext.eq_ignore_ascii_case("csv") => DEFAULT_CSV_DELIMITER,
        _ => fallback,
    }
}

/// Builds a header-aware reader. Records may be shorter than the header;
/// callers decide what a missing trailing field means.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> RemapResult<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).context_with(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(open_csv_reader(reader, delimiter))
}

pub fn open_csv_writer(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> RemapResult<csv::Writer<Box<dyn Write>>> {
    let base: Box<dyn Write> = if is_dash(path) {
        Box::new(io::stdout())
    } else {
        Box::new(BufWriter::new(
            File::create(path).context_with(|| format!("Creating output file {path:?}"))?,
        ))
    };
    Ok(csv_writer(base, delimiter, encoding))
}

pub fn csv_writer<W>(
    inner: W,
    delimiter: u8,
    encoding: &'static Encoding,
) -> csv::Writer<Box<dyn Write>>
where
    W: Write + 'static,
{
    let writer: Box<dyn Write> = if encoding == UTF_8 {
        Box::new(inner)
    } else {
        Box::new(TranscodingWriter::new(inner, encoding))
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    builder.from_writer(writer)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> RemapResult<String> {
    if encoding == UTF_8 {
        return std::str::from_utf8(bytes).map(str::to_owned).map_err(|err| {
            RemapError::io(
                "Decoding UTF-8 text",
                io::Error::new(io::ErrorKind::InvalidData, err),
            )
        });
    }
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(RemapError::io(
            "Decoding text",
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid byte sequence for encoding {}", encoding.name()),
            ),
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> RemapResult<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn reader_headers<R>(
    reader: &mut csv::Reader<R>,
    encoding: &'static Encoding,
    source: &Path,
) -> RemapResult<Vec<String>>
where
    R: Read,
{
    let headers = reader
        .byte_headers()
        .context_with(|| format!("Reading header of {source:?}"))?
        .clone();
    decode_record(&headers, encoding)
}

/// Re-encodes UTF-8 produced by the CSV writer into the requested output
/// encoding. Incomplete multi-byte sequences are held back until the next
/// write or the final flush.
struct TranscodingWriter<W: Write> {
    inner: W,
    encoding: &'static Encoding,
    pending: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoding,
            pending: Vec::new(),
        }
    }

    fn drain_complete(&mut self, at_end: bool) -> io::Result<()> {
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(err) if err.error_len().is_some() => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "Invalid UTF-8 sequence in output stream",
                ));
            }
            Err(err) => err.valid_up_to(),
        };
        if at_end && valid_up_to < self.pending.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Incomplete UTF-8 sequence at end of output stream",
            ));
        }
        if valid_up_to == 0 {
            return Ok(());
        }
        let complete: Vec<u8> = self.pending.drain(..valid_up_to).collect();
        let text = std::str::from_utf8(&complete)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let (encoded, _, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Text cannot be represented in {}", self.encoding.name()),
            ));
        }
        self.inner.write_all(&encoded)
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drain_complete(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_complete(true)?;
        self.inner.flush()
    }
}
