//! Payflow Storage Library
//!
//! Raw upload storage: the [`Storage`] trait and a local filesystem backend.
//!
//! # Storage key format
//!
//! Keys are tenant-scoped: `{folder}/board-{board_id}[/employer-{id}][/toli-{id}]/{filename}`.
//! Keys must not contain `..` or a leading `/`.

pub(crate) mod keys;
pub mod local;
pub mod traits;

pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult, StoredObject};
