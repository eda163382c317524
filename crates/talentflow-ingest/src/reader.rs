//! Streaming spreadsheet reader
//!
//! Opens an uploaded spreadsheet as a forward-only cursor over its rows.
//! Two formats are accepted: CSV (streamed record-at-a-time off disk via
//! the `csv` crate) and XLSX (the zip container cannot be parsed
//! incrementally, so `calamine` decodes the sheet once and a cursor walks
//! the decoded range row by row, converting cells only as each row is
//! requested). In both cases callers only ever see one [`RawRow`] at a
//! time and the cursor cannot be rewound.
//!
//! Cell values are unwrapped to plain scalars: `calamine` yields the cached
//! result of formula cells, never the formula source, and rich/typed cells
//! collapse to JSON strings, numbers or booleans.

use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

/// Spreadsheet formats accepted for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Xlsx,
}

impl SheetFormat {
    /// The exact set of accepted file extensions.
    pub const ACCEPTED_EXTENSIONS: [&'static str; 2] = ["csv", "xlsx"];

    /// Detect the format from a file extension, case-insensitively.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(SheetFormat::Csv),
            "xlsx" => Some(SheetFormat::Xlsx),
            _ => None,
        }
    }
}

/// Errors raised by the spreadsheet reader.
///
/// A corrupt file is reported distinctly from an empty one: a genuinely
/// empty sheet opens fine and yields no headers and no rows.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("unsupported file type '{0}' (accepted: .csv, .xlsx)")]
    UnsupportedFormat(String),

    #[error("failed to open spreadsheet '{path}': {message}")]
    Open { path: String, message: String },

    #[error("corrupt spreadsheet data at row {row}: {message}")]
    Corrupt { row: u32, message: String },
}

/// One data row pulled off the cursor.
///
/// `number` is the physical row number in the file, counting the header
/// row as row 1, so the first data row is row 2.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub number: u32,
    pub values: Vec<Value>,
}

impl RawRow {
    /// Pair this row's cells with their column headers.
    ///
    /// Columns with an empty header are skipped; missing trailing cells are
    /// treated as null.
    pub fn to_map(&self, headers: &[String]) -> Map<String, Value> {
        let mut map = Map::new();
        for (index, header) in headers.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let value = self.values.get(index).cloned().unwrap_or(Value::Null);
            map.insert(header.clone(), value);
        }
        map
    }
}

enum RowsInner {
    Csv(csv::StringRecordsIntoIter<std::fs::File>),
    Xlsx(XlsxCursor),
    Empty,
}

impl std::fmt::Debug for RowsInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowsInner::Csv(_) => f.debug_tuple("Csv").finish(),
            RowsInner::Xlsx(cursor) => f.debug_tuple("Xlsx").field(cursor).finish(),
            RowsInner::Empty => f.debug_tuple("Empty").finish(),
        }
    }
}

/// Row-at-a-time cursor over a decoded worksheet.
///
/// The decoded `Range` is what calamine hands back for the sheet; cells
/// are converted to JSON values one row at a time as the cursor advances,
/// never as a whole-sheet copy.
#[derive(Debug)]
struct XlsxCursor {
    range: calamine::Range<calamine::Data>,
    next_row: usize,
}

impl XlsxCursor {
    fn next_values(&mut self) -> Option<Vec<Value>> {
        if self.next_row >= self.range.height() {
            return None;
        }
        let row = self.next_row;
        self.next_row += 1;

        let width = self.range.width();
        Some(
            (0..width)
                .map(|col| {
                    self.range
                        .get((row, col))
                        .map(cell_to_value)
                        .unwrap_or(Value::Null)
                })
                .collect(),
        )
    }
}

/// Forward-only, non-restartable cursor over a spreadsheet's data rows.
///
/// The header row is consumed at open time and exposed via
/// [`SheetReader::headers`]; iteration yields data rows only.
#[derive(Debug)]
pub struct SheetReader {
    headers: Vec<String>,
    rows: RowsInner,
    next_row_number: u32,
}

impl SheetReader {
    /// Open a spreadsheet and read its header row.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let path = path.as_ref();
        let format = SheetFormat::from_path(path).ok_or_else(|| {
            ReaderError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_string(),
            )
        })?;

        match format {
            SheetFormat::Csv => Self::open_csv(path),
            SheetFormat::Xlsx => Self::open_xlsx(path),
        }
    }

    fn open_csv(path: &Path) -> Result<Self, ReaderError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .map_err(|e| ReaderError::Open {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        let mut records = reader.into_records();
        let headers = match records.next() {
            Some(Ok(record)) => record.iter().map(|h| h.trim().to_string()).collect(),
            Some(Err(e)) => {
                return Err(ReaderError::Corrupt {
                    row: 1,
                    message: e.to_string(),
                })
            }
            None => Vec::new(),
        };

        Ok(Self {
            headers,
            rows: RowsInner::Csv(records),
            next_row_number: 2,
        })
    }

    fn open_xlsx(path: &Path) -> Result<Self, ReaderError> {
        use calamine::{open_workbook, Data, Reader, Xlsx};

        let mut workbook: Xlsx<_> = open_workbook(path).map_err(|e: calamine::XlsxError| ReaderError::Open {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let range = match workbook.worksheet_range_at(0) {
            Some(Ok(range)) => range,
            Some(Err(e)) => {
                return Err(ReaderError::Corrupt {
                    row: 1,
                    message: e.to_string(),
                })
            }
            None => {
                return Ok(Self {
                    headers: Vec::new(),
                    rows: RowsInner::Empty,
                    next_row_number: 2,
                })
            }
        };

        let headers = if range.height() == 0 {
            Vec::new()
        } else {
            (0..range.width())
                .map(|col| match range.get((0, col)) {
                    None | Some(Data::Empty) => String::new(),
                    Some(other) => other.to_string().trim().to_string(),
                })
                .collect()
        };

        Ok(Self {
            headers,
            rows: RowsInner::Xlsx(XlsxCursor { range, next_row: 1 }),
            next_row_number: 2,
        })
    }

    /// Column headers as they physically appear in the first row.
    ///
    /// Empty-header columns are preserved positionally so data cells keep
    /// their column alignment; use [`open_headers`] for the filtered list.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl Iterator for SheetReader {
    type Item = Result<RawRow, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        let number = self.next_row_number;
        let item = match &mut self.rows {
            RowsInner::Csv(records) => records.next().map(|result| {
                result
                    .map(|record| RawRow {
                        number,
                        values: record
                            .iter()
                            .map(|cell| Value::String(cell.to_string()))
                            .collect(),
                    })
                    .map_err(|e| ReaderError::Corrupt {
                        row: number,
                        message: e.to_string(),
                    })
            }),
            RowsInner::Xlsx(cursor) => cursor
                .next_values()
                .map(|values| Ok(RawRow { number, values })),
            RowsInner::Empty => None,
        };

        if item.is_some() {
            self.next_row_number += 1;
        }
        item
    }
}

/// Read just the header row of a spreadsheet, dropping empty headers.
///
/// This is what mapping resolution and signature computation work from.
pub fn open_headers(path: impl AsRef<Path>) -> Result<Vec<String>, ReaderError> {
    let reader = SheetReader::open(path)?;
    Ok(reader
        .headers
        .into_iter()
        .filter(|h| !h.is_empty())
        .collect())
}

fn cell_to_value(cell: &calamine::Data) -> Value {
    use calamine::Data;

    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => serde_json::Number::from_f64(dt.as_f64())
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) => Value::Null,
    }
}
