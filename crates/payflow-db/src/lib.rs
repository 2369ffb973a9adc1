//! Payflow Database Layer
//!
//! Repository traits for files, records, payables, receipts, tenant access and the
//! stored-procedure gateway, with PostgreSQL implementations and in-memory stores.

pub mod db;
pub mod memory;
pub mod repository_traits;

pub use db::{
    PayableRecordRepository, PaymentProcedureExecutor, ReceiptRepository, TenantAccessRepository,
    UploadedFileRepository, UploadedRecordRepository,
};

pub use db::transaction::{with_transaction, TransactionGuard};

pub use repository_traits::{
    PayableRecordStore, ProcedureGateway, ReceiptStore, RecordStatusUpdate, TenantAccessResolver,
    UploadedFileStore, UploadedRecordStore,
};
