//! Payflow Processing Library
//!
//! Turns an uploaded wage file into canonical records:
//!
//! - [`upload_guard`]: size/extension checks and content hashing before anything is stored
//! - [`parser`]: CSV and spreadsheet rows as positional string fields
//! - [`normalizer`]: positional fields into an [`UploadedRecord`](payflow_core::models::UploadedRecord)

pub mod normalizer;
pub mod parser;
pub mod upload_guard;

pub use normalizer::{normalize_row, NormalizedRow, StructuralRowError, MIN_COLUMNS};
pub use parser::{parse_rows, FileKind, ParseError, ParsedRow, ParserOptions, RowStream};
pub use upload_guard::{compute_file_hash, UploadGuardError, UploadValidator};
