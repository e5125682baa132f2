use std::collections::VecDeque;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;

use csv::{ReaderBuilder, StringRecordsIntoIter, Trim};

use crate::error::IngestError;

/// One data row of a CSV, addressable by header name
///
/// All records produced by one ingest share the same header list, so the
/// column order is identical across records.
#[derive(Clone, Debug, PartialEq)]
pub struct RowRecord {
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl RowRecord {
    /// Raw cell value for a column, or `None` if the header has no such column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|idx| self.values[idx].as_str())
    }

    /// Number of columns (always the header width)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(column, value)` pairs in header order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }
}

/// Lazy reader over the data rows of a CSV stream
///
/// The header line is consumed on construction. Rows are yielded in input
/// order; the reader is finite and cannot be restarted.
///
/// Field-count leniency: a short row is padded with empty strings and a long
/// row is truncated to the header width. A blank data line is a row with
/// every field missing, so it comes out as a record of empty strings.
pub struct RowReader<R: Read> {
    headers: Arc<[String]>,
    records: StringRecordsIntoIter<KeepBlankLines<R>>,
}

impl<R: Read> RowReader<R> {
    /// Start reading a comma-delimited stream with a header line
    ///
    /// # Errors
    /// * `IngestError::MissingHeader` if the stream is empty
    /// * `IngestError::Csv` if the header cannot be decoded
    pub fn new(reader: R) -> Result<Self, IngestError> {
        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(KeepBlankLines::new(reader));

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(idx, h)| {
                // strip a UTF-8 byte order mark left on the first header
                if idx == 0 {
                    h.trim_start_matches('\u{feff}').to_string()
                } else {
                    h.to_string()
                }
            })
            .collect();

        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(IngestError::MissingHeader);
        }

        Ok(Self {
            headers: headers.into(),
            records: csv_reader.into_records(),
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = Result<RowRecord, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(e.into())),
        };

        let width = self.headers.len();
        let mut values: Vec<String> = record.iter().take(width).map(str::to_owned).collect();
        values.resize(width, String::new());

        Some(Ok(RowRecord {
            headers: Arc::clone(&self.headers),
            values,
        }))
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Start,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

/// Rewrites each blank line after the header as a single empty quoted field
///
/// The csv reader skips empty lines outright; `""` keeps the line as a
/// one-field record that [`RowReader`] pads to the header width. Line breaks
/// inside quoted fields are left alone.
struct KeepBlankLines<R> {
    inner: R,
    pending: VecDeque<u8>,
    field: Field,
    line_start: bool,
    prev_cr: bool,
    seen_header: bool,
}

impl<R: Read> KeepBlankLines<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            field: Field::Start,
            line_start: false,
            prev_cr: false,
            seen_header: false,
        }
    }

    fn push(&mut self, b: u8) {
        let newline = b == b'\n' || b == b'\r';
        let crlf_tail = b == b'\n' && self.prev_cr;

        if newline && self.line_start && self.seen_header && !crlf_tail {
            self.pending.extend(b"\"\"");
        }
        self.pending.push_back(b);

        self.field = match (self.field, b) {
            (Field::Quoted, b'"') => Field::QuoteInQuoted,
            (Field::Quoted, _) => Field::Quoted,
            (Field::QuoteInQuoted, b'"') => Field::Quoted,
            (Field::Start, b'"') => Field::Quoted,
            (_, b',') => Field::Start,
            (_, b'\n' | b'\r') => Field::Start,
            _ => Field::Unquoted,
        };

        let quoted = self.field == Field::Quoted;
        if newline && !quoted {
            self.line_start = true;
        } else if !newline {
            self.line_start = false;
            self.seen_header = true;
        }
        self.prev_cr = b == b'\r' && !quoted;
    }
}

impl<R: Read> Read for KeepBlankLines<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut chunk = [0u8; 8 * 1024];
        while self.pending.is_empty() {
            let n = self.inner.read(&mut chunk)?;
            if n == 0 {
                return Ok(0);
            }
            for &b in &chunk[..n] {
                self.push(b);
            }
        }

        let n = buf.len().min(self.pending.len());
        for (slot, b) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = b;
        }
        Ok(n)
    }
}

/// A fully buffered CSV: header plus every data row
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub headers: Vec<String>,
    pub rows: Vec<RowRecord>,
}

impl Dataset {
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }
}

/// Read an entire CSV stream into a [`Dataset`]
///
/// # Arguments
/// * `reader` - Comma-delimited text with a header line
///
/// # Returns
/// * `Result<Dataset, IngestError>` - Header and `line count - 1` records
///
/// # Examples
/// ```
/// use chart_studio::ingest::read_rows;
///
/// let data = read_rows("city,visits\nOslo,3\nLima\n".as_bytes()).unwrap();
/// assert_eq!(data.rows.len(), 2);
/// assert_eq!(data.rows[1].get("visits"), Some(""));
/// ```
pub fn read_rows<R: Read>(reader: R) -> Result<Dataset, IngestError> {
    let rows = RowReader::new(reader)?;
    let headers = rows.headers().to_vec();
    let rows = rows.collect::<Result<Vec<_>, _>>()?;

    Ok(Dataset { headers, rows })
}

/// Read a CSV file from disk
///
/// # Errors
/// * `IngestError::Io` if the file is missing or unreadable
pub async fn read_csv_file(path: impl AsRef<Path>) -> Result<Dataset, IngestError> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    read_rows(bytes.as_slice())
}
