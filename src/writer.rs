//! Incremental output of transformed batches and the unmapped report.
//!
//! Both outputs are truncated when the run opens them, so whether a header has
//! been written is tracked with one-shot flags rather than by probing files.

use std::io::Write;

use crate::{
    batch::Batch,
    config::ReportMode,
    engine::BatchOutcome,
    error::{ErrorContext, RemapError, RemapResult},
};

/// Column order of the primary output: identifier first, the rest unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    headers: Vec<String>,
    order: Vec<usize>,
}

impl OutputLayout {
    pub fn new(headers: &[String], id_column: &str) -> Self {
        let id_position = headers.iter().position(|h| h == id_column);
        let mut order = Vec::with_capacity(headers.len());
        order.extend(id_position);
        order.extend((0..headers.len()).filter(|idx| Some(*idx) != id_position));
        let reordered = order.iter().map(|idx| headers[*idx].clone()).collect();
        OutputLayout {
            headers: reordered,
            order,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn project<'r>(&self, row: &'r [String]) -> impl Iterator<Item = &'r str> {
        self.order
            .iter()
            .map(move |idx| row.get(*idx).map(String::as_str).unwrap_or(""))
    }
}

pub fn report_headers(id_column: &str, mode: ReportMode) -> Vec<String> {
    match mode {
        ReportMode::Ids => vec![id_column.to_string()],
        ReportMode::Detailed => vec![
            id_column.to_string(),
            "column".to_string(),
            "original_value".to_string(),
            "reason".to_string(),
        ],
    }
}

pub struct IncrementalWriter<O: Write, R: Write> {
    output: csv::Writer<O>,
    report: csv::Writer<R>,
    layout: OutputLayout,
    report_headers: Vec<String>,
    mode: ReportMode,
    output_header_written: bool,
    report_header_written: bool,
    rows_written: usize,
    report_rows_written: usize,
}

impl<O: Write, R: Write> IncrementalWriter<O, R> {
    pub fn new(
        output: csv::Writer<O>,
        report: csv::Writer<R>,
        layout: OutputLayout,
        id_column: &str,
        mode: ReportMode,
    ) -> Self {
        IncrementalWriter {
            output,
            report,
            layout,
            report_headers: report_headers(id_column, mode),
            mode,
            output_header_written: false,
            report_header_written: false,
            rows_written: 0,
            report_rows_written: 0,
        }
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn report_rows_written(&self) -> usize {
        self.report_rows_written
    }

    fn ensure_output_header(&mut self) -> RemapResult<()> {
        if !self.output_header_written {
            self.output
                .write_record(self.layout.headers())
                .context_with(|| "Writing output header")?;
            self.output_header_written = true;
        }
        Ok(())
    }

    fn ensure_report_header(&mut self) -> RemapResult<()> {
        if !self.report_header_written {
            self.report
                .write_record(&self.report_headers)
                .context_with(|| "Writing report header")?;
            self.report_header_written = true;
        }
        Ok(())
    }

    /// Appends a transformed batch, writing the header before the first one.
    pub fn write_batch(&mut self, batch: &Batch) -> RemapResult<usize> {
        self.ensure_output_header()?;
        for (offset, row) in batch.rows.iter().enumerate() {
            self.output
                .write_record(self.layout.project(row))
                .context_with(|| format!("Writing output row {}", batch.first_row + offset))?;
        }
        self.rows_written += batch.len();
        Ok(batch.len())
    }

    /// Appends the batch's unmapped entries; an empty outcome writes nothing.
    pub fn write_unmapped(&mut self, outcome: &BatchOutcome) -> RemapResult<usize> {
        let written = match self.mode {
            ReportMode::Ids => {
                if outcome.unmapped.is_empty() {
                    return Ok(0);
                }
                self.ensure_report_header()?;
                for id in outcome.unmapped.iter() {
                    self.report
                        .write_record([id])
                        .context_with(|| "Writing report row")?;
                }
                outcome.unmapped.len()
            }
            ReportMode::Detailed => {
                if outcome.occurrences.is_empty() {
                    return Ok(0);
                }
                self.ensure_report_header()?;
                for occurrence in &outcome.occurrences {
                    self.report
                        .write_record([
                            occurrence.id.as_str(),
                            occurrence.column.as_str(),
                            occurrence.original_value.as_str(),
                            occurrence.reason.as_str(),
                        ])
                        .context_with(|| "Writing report row")?;
                }
                outcome.occurrences.len()
            }
        };
        self.report_rows_written += written;
        Ok(written)
    }

    /// Guarantees both headers exist, flushes, and hands back the sinks.
    pub fn finish(mut self) -> RemapResult<(O, R)> {
        self.ensure_output_header()?;
        self.ensure_report_header()?;
        self.output
            .flush()
            .context_with(|| "Flushing output")?;
        self.report
            .flush()
            .context_with(|| "Flushing report")?;
        let output = self
            .output
            .into_inner()
            .map_err(|err| RemapError::io("Closing output", err.into_error()))?;
        let report = self
            .report
            .into_inner()
            .map_err(|err| RemapError::io("Closing report", err.into_error()))?;
        Ok((output, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{UnmappedOccurrence, UnmappedReason};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn writer(
        headers: &[&str],
        id: &str,
        mode: ReportMode,
    ) -> IncrementalWriter<Vec<u8>, Vec<u8>> {
        IncrementalWriter::new(
            csv::Writer::from_writer(Vec::new()),
            csv::Writer::from_writer(Vec::new()),
            OutputLayout::new(&strings(headers), id),
            id,
            mode,
        )
    }

    fn batch(index: usize, rows: &[&[&str]]) -> Batch {
        Batch {
            index,
            first_row: 1,
            headers: strings(&["amt_a", "id"]),
            rows: rows.iter().map(|row| strings(row)).collect(),
        }
    }

    fn outcome(ids: &[&str]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for id in ids {
            outcome.unmapped.insert(id);
        }
        outcome
    }

    #[test]
    fn layout_moves_identifier_first() {
        let layout = OutputLayout::new(&strings(&["a", "b", "id", "c"]), "id");
        assert_eq!(layout.headers(), strings(&["id", "a", "b", "c"]).as_slice());
        let row = strings(&["1", "2", "3"]);
        assert_eq!(layout.project(&row).collect::<Vec<_>>(), vec!["3", "1", "2", ""]);
    }

    #[test]
    fn output_header_is_written_once() {
        let mut writer = writer(&["amt_a", "id"], "id", ReportMode::Ids);
        writer.write_batch(&batch(0, &[&["10.2", "1"]])).unwrap();
        writer.write_batch(&batch(1, &[&["", "2"]])).unwrap();
        writer.write_unmapped(&outcome(&["2"])).unwrap();
        let (output, report) = writer.finish().unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "id,amt_a\n1,10.2\n2,\n");
        assert_eq!(String::from_utf8(report).unwrap(), "id\n2\n");
    }

    #[test]
    fn empty_unmapped_sets_write_nothing_until_finish() {
        let mut writer = writer(&["amt_a", "id"], "id", ReportMode::Ids);
        writer.write_batch(&batch(0, &[&["10.2", "1"]])).unwrap();
        assert_eq!(writer.write_unmapped(&outcome(&[])).unwrap(), 0);
        let (_, report) = writer.finish().unwrap();
        assert_eq!(String::from_utf8(report).unwrap(), "id\n");
    }

    #[test]
    fn report_header_precedes_first_non_empty_set_only() {
        let mut writer = writer(&["amt_a", "id"], "id", ReportMode::Ids);
        writer.write_unmapped(&outcome(&[])).unwrap();
        writer.write_unmapped(&outcome(&["4", "5"])).unwrap();
        writer.write_unmapped(&outcome(&["9"])).unwrap();
        assert_eq!(writer.report_rows_written(), 3);
        let (_, report) = writer.finish().unwrap();
        assert_eq!(String::from_utf8(report).unwrap(), "id\n4\n5\n9\n");
    }

    #[test]
    fn finish_without_batches_still_writes_headers() {
        let writer = writer(&["amt_a", "id"], "id", ReportMode::Detailed);
        let (output, report) = writer.finish().unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "id,amt_a\n");
        assert_eq!(
            String::from_utf8(report).unwrap(),
            "id,column,original_value,reason\n"
        );
    }

    #[test]
    fn detailed_mode_writes_each_occurrence() {
        let mut writer = writer(&["amt_a", "id"], "id", ReportMode::Detailed);
        let mut outcome = outcome(&["7"]);
        outcome.occurrences = vec![
            UnmappedOccurrence {
                id: "7".into(),
                column: "amt_a".into(),
                original_value: "X1".into(),
                reason: UnmappedReason::Miss,
            },
            UnmappedOccurrence {
                id: "7".into(),
                column: "amt_b".into(),
                original_value: String::new(),
                reason: UnmappedReason::Blank,
            },
        ];
        assert_eq!(writer.write_unmapped(&outcome).unwrap(), 2);
        let (_, report) = writer.finish().unwrap();
        assert_eq!(
            String::from_utf8(report).unwrap(),
            "id,column,original_value,reason\n7,amt_a,X1,miss\n7,amt_b,,blank\n"
        );
    }
}
