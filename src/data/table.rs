//! Minimal in-memory data frame with CSV import and export

use thiserror::Error;

/// Errors that can occur when parsing CSV text
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// A quoted field was never closed
    #[error("Unterminated quoted field on line {0}")]
    UnterminatedQuote(usize),

    /// A row has a different number of fields than the header
    #[error("Row on line {line} has {found} fields, expected {expected}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// The text had no header line
    #[error("CSV input has no header row")]
    Empty,
}

/// Tabular data: a header row plus string cells
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    /// Column names
    pub columns: Vec<String>,
    /// Data rows, each with one cell per column
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Creates a table from column names and rows
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    /// Parses CSV text whose first record is the header
    ///
    /// Quoted fields may contain the delimiter, doubled quotes and line breaks.
    /// Blank lines are skipped.
    pub fn from_csv(text: &str, delimiter: char) -> Result<Self, TableError> {
        let mut records = parse_records(text, delimiter)?.into_iter();
        let (_, columns) = records.next().ok_or(TableError::Empty)?;

        let mut rows = Vec::new();
        for (line, record) in records {
            if record.len() != columns.len() {
                return Err(TableError::RaggedRow {
                    line,
                    expected: columns.len(),
                    found: record.len(),
                });
            }
            rows.push(record);
        }

        Ok(Self { columns, rows })
    }

    /// Renders the table as comma-separated text with a header line
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        write_record(&mut out, &self.columns);
        for row in &self.rows {
            write_record(&mut out, row);
        }
        out
    }

    /// Returns the cells of the named column, if present
    ///
    /// Rows too short to have the column yield an empty cell.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).map_or("", String::as_str))
                .collect(),
        )
    }
}

/// Splits text into records, each tagged with the 1-based line it starts on
fn parse_records(text: &str, delimiter: char) -> Result<Vec<(usize, Vec<String>)>, TableError> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push((record_line, std::mem::take(&mut record)));
                }
                record.clear();
                line += 1;
                record_line = line;
            }
            c if c == delimiter => record.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(TableError::UnterminatedQuote(record_line));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push((record_line, record));
    }

    Ok(records)
}

fn write_record(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}
