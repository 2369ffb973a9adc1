//! Data models for the payment flow
//!
//! Organized by domain: uploaded files, their records, the payables and receipts
//! derived from them, status enums, paging, and response shapes.

mod file;
mod pagination;
mod payable;
mod receipt;
mod record;
mod status;
mod summary;
mod tenant;

pub use file::*;
pub use pagination::*;
pub use payable::*;
pub use receipt::*;
pub use record::*;
pub use status::*;
pub use summary::*;
pub use tenant::*;
