//! Payflow Services Layer
//!
//! The ingestion -> validation -> request-generation pipeline. [`PaymentFlowService`]
//! is the single facade callers use; the pieces it coordinates are public so they can
//! be driven on their own:
//!
//! - [`validator`]: the batch validator capability and its in-process rule implementation
//! - [`bridge`]: validation and payment creation delegated to the database procedures
//! - [`workflow`]: file status transitions and counters
//! - [`request`]: payable records and receipts for validated records

pub mod bridge;
pub mod request;
mod service;
mod summaries;
pub mod validator;
pub mod workflow;

pub use bridge::{parse_validation_output, ProcedureBridge};
pub use payflow_processing::UploadValidator;
pub use payflow_storage::{LocalStorage, Storage, StorageError, StorageResult};
pub use request::{GenerationReport, RequestGenerator};
pub use service::{FileUpload, PayflowStores, PaymentFlowService};
pub use validator::{RuleValidator, ValidationOutcome, Validator};
