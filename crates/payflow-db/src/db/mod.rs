//! PostgreSQL repositories
//!
//! One repository per table, each holding a cloned `PgPool`.

pub mod payable;
pub mod procedure;
pub mod receipt;
pub mod tenant_access;
pub mod transaction;
pub mod uploaded_file;
pub mod uploaded_record;

pub use payable::PayableRecordRepository;
pub use procedure::PaymentProcedureExecutor;
pub use receipt::ReceiptRepository;
pub use tenant_access::TenantAccessRepository;
pub use uploaded_file::UploadedFileRepository;
pub use uploaded_record::UploadedRecordRepository;
