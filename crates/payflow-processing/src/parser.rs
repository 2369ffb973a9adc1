//! Row parser for uploaded wage files.
//!
//! Both formats yield the same thing: one [`ParsedRow`] of positional string fields per
//! content row, with the header row consumed up front. Blank rows are skipped and a
//! row that cannot be decoded is logged and skipped without stopping the stream.

use std::io::Cursor;

use bytes::Bytes;
use calamine::{open_workbook_auto_from_rs, Data, DataType, Range, Reader};
use chrono::NaiveTime;
use payflow_core::AppError;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File is empty or invalid")]
    EmptyFile,

    #[error("Failed to read spreadsheet: {0}")]
    Spreadsheet(String),
}

impl From<ParseError> for AppError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::UnsupportedFileType(ext) => AppError::UnsupportedFileType(ext),
            ParseError::EmptyFile => AppError::EmptyFile("no header row".to_string()),
            ParseError::Spreadsheet(msg) => AppError::InvalidInput(msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Spreadsheet,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Result<Self, ParseError> {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Ok(FileKind::Csv),
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Ok(FileKind::Spreadsheet),
            other => Err(ParseError::UnsupportedFileType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParserOptions {
    /// Zero-based column whose date-formatted cells are emitted as `YYYY-MM-DD`.
    pub date_column: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self { date_column: 4 }
    }
}

/// One content row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    /// 1-based line (CSV) or sheet row number, for log correlation
    pub line: u64,
    pub fields: Vec<String>,
}

impl ParsedRow {
    fn is_blank(&self) -> bool {
        self.fields.iter().all(|f| f.trim().is_empty())
    }
}

/// Lazy, single-pass sequence of content rows.
pub struct RowStream {
    inner: RowSource,
}

enum RowSource {
    Csv(csv::StringRecordsIntoIter<Cursor<Bytes>>),
    Sheet(SheetRows),
}

struct SheetRows {
    range: Range<Data>,
    next_row: usize,
    first_row: u32,
    first_col: usize,
    date_column: usize,
}

impl SheetRows {
    fn row_at(&self, row: usize) -> ParsedRow {
        let mut fields = vec![String::new(); self.first_col];
        for col in 0..self.range.width() {
            let text = match self.range.get((row, col)) {
                Some(cell) => cell_text(cell, self.first_col + col == self.date_column),
                None => String::new(),
            };
            fields.push(text);
        }
        ParsedRow {
            line: u64::from(self.first_row) + row as u64 + 1,
            fields,
        }
    }
}

/// Date-formatted cells never leak their serial number. The date column always gets a
/// bare `YYYY-MM-DD`; other columns keep the time of day when there is one.
fn cell_text(cell: &Data, date_column: bool) -> String {
    if !matches!(cell, Data::DateTime(_) | Data::DateTimeIso(_)) {
        return cell.to_string();
    }
    match cell.as_datetime() {
        Some(datetime) if !date_column && datetime.time() != NaiveTime::MIN => {
            datetime.format("%Y-%m-%d %H:%M:%S").to_string()
        }
        Some(datetime) => datetime.date().format("%Y-%m-%d").to_string(),
        None => match cell.as_date() {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => cell.to_string(),
        },
    }
}

impl Iterator for RowStream {
    type Item = ParsedRow;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            RowSource::Csv(records) => loop {
                match records.next()? {
                    Ok(record) => {
                        let row = ParsedRow {
                            line: record.position().map(|p| p.line()).unwrap_or_default(),
                            fields: record.iter().map(str::to_string).collect(),
                        };
                        if row.is_blank() {
                            continue;
                        }
                        return Some(row);
                    }
                    Err(e) => {
                        let line = e.position().map(|p| p.line()).unwrap_or_default();
                        tracing::warn!(row = line, error = %e, "Skipping unreadable CSV row");
                    }
                }
            },
            RowSource::Sheet(sheet) => loop {
                if sheet.next_row >= sheet.range.height() {
                    return None;
                }
                let row = sheet.row_at(sheet.next_row);
                sheet.next_row += 1;
                if row.is_blank() {
                    continue;
                }
                return Some(row);
            },
        }
    }
}

/// Open `data` according to its extension and consume the header row.
///
/// A file with a header but no content rows yields an empty stream; a file with no
/// header at all fails with [`ParseError::EmptyFile`].
pub fn parse_rows(
    data: Bytes,
    extension: &str,
    options: &ParserOptions,
) -> Result<RowStream, ParseError> {
    match FileKind::from_extension(extension)? {
        FileKind::Csv => parse_csv(data),
        FileKind::Spreadsheet => parse_sheet(data, options),
    }
}

fn parse_csv(data: Bytes) -> Result<RowStream, ParseError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(data));
    let mut records = reader.into_records();

    match records.next() {
        None => return Err(ParseError::EmptyFile),
        Some(Ok(header)) => {
            tracing::debug!(columns = header.len(), "CSV header consumed");
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "CSV header row unreadable, treating it as consumed");
        }
    }

    Ok(RowStream {
        inner: RowSource::Csv(records),
    })
}

fn parse_sheet(data: Bytes, options: &ParserOptions) -> Result<RowStream, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::EmptyFile)?
        .map_err(|e| ParseError::Spreadsheet(e.to_string()))?;

    let (first_row, first_col) = match range.start() {
        Some(start) if range.height() > 0 => start,
        _ => return Err(ParseError::EmptyFile),
    };

    Ok(RowStream {
        inner: RowSource::Sheet(SheetRows {
            range,
            next_row: 1,
            first_row,
            first_col: first_col as usize,
            date_column: options.date_column,
        }),
    })
}
