//! Chunked reading of the main dataset.
//!
//! [`BatchReader`] yields fixed-size [`Batch`]es lazily. Values stay raw text;
//! records shorter than the header keep their short length so the engine can
//! tell an absent field from an empty one.

use std::io::{self, Read};

use encoding_rs::Encoding;
use log::debug;

use crate::{
    columns::sanitize_headers,
    error::{ErrorContext, RemapError, RemapResult},
    io_utils,
};

pub const DEFAULT_BATCH_SIZE: usize = 125_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Zero-based position of the batch in the run.
    pub index: usize,
    /// One-based data row number of the first record.
    pub first_row: usize,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct BatchReader<R: Read> {
    reader: csv::Reader<R>,
    encoding: &'static Encoding,
    headers: Vec<String>,
    batch_size: usize,
    source: String,
    record: csv::ByteRecord,
    next_index: usize,
    rows_read: usize,
    finished: bool,
}

impl<R: Read> BatchReader<R> {
    /// Consumes the header row and sanitizes it.
    pub fn new(
        mut reader: csv::Reader<R>,
        encoding: &'static Encoding,
        batch_size: usize,
        source: impl Into<String>,
    ) -> RemapResult<Self> {
        let source = source.into();
        if batch_size == 0 {
            return Err(RemapError::configuration("Batch size must be at least 1"));
        }
        let raw = reader
            .byte_headers()
            .context_with(|| format!("Reading header of {source}"))?
            .clone();
        let raw = io_utils::decode_record(&raw, encoding)?;
        let headers = sanitize_headers(&raw, &source)?;
        debug!("Main dataset columns after sanitizing: {:?}", headers);
        Ok(BatchReader {
            reader,
            encoding,
            headers,
            batch_size,
            source,
            record: csv::ByteRecord::new(),
            next_index: 0,
            rows_read: 0,
            finished: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    fn read_batch(&mut self) -> RemapResult<Option<Batch>> {
        let first_row = self.rows_read + 1;
        let mut rows = Vec::with_capacity(self.batch_size.min(8_192));
        while rows.len() < self.batch_size {
            let more = self
                .reader
                .read_byte_record(&mut self.record)
                .context_with(|| {
                    format!("Reading data row {} of {}", self.rows_read + 1, self.source)
                })?;
            if !more {
                self.finished = true;
                break;
            }
            self.rows_read += 1;
            if self.record.len() > self.headers.len() {
                return Err(RemapError::io(
                    format!("Reading data row {} of {}", self.rows_read, self.source),
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "record has {} fields but the header has {}",
                            self.record.len(),
                            self.headers.len()
                        ),
                    ),
                ));
            }
            rows.push(io_utils::decode_record(&self.record, self.encoding)?);
        }
        if rows.is_empty() {
            return Ok(None);
        }
        let batch = Batch {
            index: self.next_index,
            first_row,
            headers: self.headers.clone(),
            rows,
        };
        self.next_index += 1;
        Ok(Some(batch))
    }
}

impl<R: Read> Iterator for BatchReader<R> {
    type Item = RemapResult<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_batch() {
            Ok(batch) => batch.map(Ok),
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::UTF_8;

    fn reader_for(data: &str, batch_size: usize) -> BatchReader<&[u8]> {
        let csv_reader = io_utils::open_csv_reader(data.as_bytes(), b',');
        BatchReader::new(csv_reader, UTF_8, batch_size, "input.csv").expect("batch reader")
    }

    #[test]
    fn splits_rows_into_fixed_size_batches() {
        let reader = reader_for("id,amt_a\n1,a\n2,b\n3,c\n4,d\n5,e\n", 2);
        let batches = reader.collect::<RemapResult<Vec<_>>>().unwrap();
        let sizes = batches.iter().map(Batch::len).collect::<Vec<_>>();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(
            batches.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(batches[2].first_row, 5);
        assert_eq!(batches[1].rows[0], vec!["3".to_string(), "c".to_string()]);
    }

    #[test]
    fn exact_multiple_does_not_yield_an_empty_batch() {
        let reader = reader_for("id\n1\n2\n", 2);
        let batches = reader.collect::<RemapResult<Vec<_>>>().unwrap();
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn header_only_input_yields_nothing() {
        let mut reader = reader_for("id,amt_a\n", 10);
        assert_eq!(reader.headers(), ["id".to_string(), "amt_a".to_string()]);
        assert!(reader.next().is_none());
    }

    #[test]
    fn headers_are_sanitized_and_values_kept_raw() {
        let mut reader = reader_for("ID Col,Amt A\n007, 5 \n", 10);
        assert_eq!(reader.headers(), ["ID_Col".to_string(), "Amt_A".to_string()]);
        let batch = reader.next().unwrap().unwrap();
        assert_eq!(batch.rows[0], vec!["007".to_string(), " 5 ".to_string()]);
    }

    #[test]
    fn short_records_keep_their_length() {
        let mut reader = reader_for("x,id,amt_a\n1\n", 10);
        let batch = reader.next().unwrap().unwrap();
        assert_eq!(batch.rows[0].len(), 1);
    }

    #[test]
    fn overlong_records_are_fatal() {
        let mut reader = reader_for("id,amt_a\n1,2,3\n", 10);
        let err = reader.next().unwrap().unwrap_err();
        let cause = std::error::Error::source(&err).expect("io cause");
        assert!(cause.to_string().contains("record has 3 fields"));
        assert!(reader.next().is_none());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let csv_reader = io_utils::open_csv_reader("id\n".as_bytes(), b',');
        let err = BatchReader::new(csv_reader, UTF_8, 0, "input.csv").err().unwrap();
        assert!(matches!(err, RemapError::Configuration { .. }));
    }
}
