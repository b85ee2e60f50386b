use std::fmt::Write as _;

use crate::engine::ColumnStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Renders rows as a plain-text table. Columns without an explicit alignment
/// are left aligned.
pub fn render_table(headers: &[String], rows: &[Vec<String>], align: &[Align]) -> String {
    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, align));
    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths, &[]));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, align));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>], align: &[Align]) {
    print!("{}", render_table(headers, rows, align));
}

fn format_row(values: &[String], widths: &[usize], align: &[Align]) -> String {
    let cells = values
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(idx, (value, &width))| {
            let value = value.replace(['\n', '\r', '\t'], " ");
            match align.get(idx).copied().unwrap_or(Align::Left) {
                Align::Left => format!("{value:<width$}"),
                Align::Right => format!("{value:>width$}"),
            }
        })
        .collect::<Vec<_>>();
    cells.join("  ").trim_end().to_string()
}

/// Per-column hit/miss/blank counts with a totals row.
pub fn render_column_stats<'a, I>(columns: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a ColumnStats)>,
{
    let headers = ["column", "hits", "misses", "blanks"].map(String::from);
    let mut total = ColumnStats::default();
    let mut rows = Vec::new();
    for (name, stats) in columns {
        total.merge(stats);
        rows.push(stats_row(name, stats));
    }
    rows.push(stats_row("total", &total));
    render_table(
        &headers,
        &rows,
        &[Align::Left, Align::Right, Align::Right, Align::Right],
    )
}

fn stats_row(name: &str, stats: &ColumnStats) -> Vec<String> {
    vec![
        name.to_string(),
        stats.hits.to_string(),
        stats.misses.to_string(),
        stats.blanks.to_string(),
    ]
}
