//! Repository trait abstractions
//!
//! The pipeline only talks to persistence through these traits, so the same
//! services run against PostgreSQL or the in-memory stores in [`crate::memory`].

use async_trait::async_trait;
use payflow_core::models::{
    NewPayableRecord, NewReceipt, NewUploadedFile, Page, PayableRecord, Principal, Receipt,
    RecordQuery, RecordStatus, StatusCounts, TenantKeys, UploadedFile, UploadedRecord,
};
use payflow_core::AppError;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::db::{
    PayableRecordRepository, PaymentProcedureExecutor, ReceiptRepository, TenantAccessRepository,
    UploadedFileRepository, UploadedRecordRepository,
};

/// Status change applied to a single record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordStatusUpdate {
    pub record_id: Uuid,
    pub status: RecordStatus,
    pub rejection_reason: Option<String>,
    pub receipt_number: Option<String>,
}

impl RecordStatusUpdate {
    pub fn validated(record_id: Uuid) -> Self {
        Self {
            record_id,
            status: RecordStatus::Validated,
            rejection_reason: None,
            receipt_number: None,
        }
    }

    pub fn rejected(record_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            record_id,
            status: RecordStatus::Rejected,
            rejection_reason: Some(reason.into()),
            receipt_number: None,
        }
    }

    pub fn request_generated(record_id: Uuid, receipt_number: impl Into<String>) -> Self {
        Self {
            record_id,
            status: RecordStatus::RequestGenerated,
            rejection_reason: None,
            receipt_number: Some(receipt_number.into()),
        }
    }
}

#[async_trait]
pub trait UploadedFileStore: Send + Sync {
    async fn create(&self, new: NewUploadedFile) -> Result<UploadedFile, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<UploadedFile>, AppError>;

    /// Persist counters, status and reference number.
    async fn update(&self, file: &UploadedFile) -> Result<(), AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

#[async_trait]
pub trait UploadedRecordStore: Send + Sync {
    /// Insert a whole batch; either every record is stored or none is.
    async fn insert_many(&self, records: &[UploadedRecord]) -> Result<u64, AppError>;

    async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<UploadedRecord>, AppError>;

    async fn find_by_file_and_status(
        &self,
        file_id: Uuid,
        status: RecordStatus,
    ) -> Result<Vec<UploadedRecord>, AppError>;

    /// Apply one status change. Fails with `NotFound` if the record is gone.
    async fn update_status(&self, update: &RecordStatusUpdate) -> Result<(), AppError>;

    async fn status_counts(&self, file_id: Uuid) -> Result<StatusCounts, AppError>;

    /// Sum of `amount` over the file's records in `status`.
    async fn sum_amount(&self, file_id: Uuid, status: RecordStatus) -> Result<Decimal, AppError>;

    async fn find_page(&self, query: &RecordQuery) -> Result<Page<UploadedRecord>, AppError>;

    async fn distinct_file_ids(&self) -> Result<Vec<Uuid>, AppError>;

    async fn delete_by_file(&self, file_id: Uuid) -> Result<u64, AppError>;
}

#[async_trait]
pub trait PayableRecordStore: Send + Sync {
    async fn insert(&self, new: NewPayableRecord) -> Result<PayableRecord, AppError>;

    async fn set_receipt_number(&self, id: Uuid, receipt_number: &str) -> Result<(), AppError>;

    async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<PayableRecord>, AppError>;

    async fn find_by_receipt(&self, receipt_number: &str) -> Result<Vec<PayableRecord>, AppError>;
}

#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Create a receipt with a fresh number and the next attempt number for its file.
    async fn create(&self, new: NewReceipt) -> Result<Receipt, AppError>;

    async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<Receipt>, AppError>;
}

/// Resolves which tenant a principal uploads on behalf of.
#[async_trait]
pub trait TenantAccessResolver: Send + Sync {
    async fn resolve(&self, principal: &Principal) -> Result<Option<TenantKeys>, AppError>;
}

/// Database-side validation and payment creation.
///
/// Implementations bind `user_id` (when present) to the session before each call
/// and carry on without it if binding fails.
#[async_trait]
pub trait ProcedureGateway: Send + Sync {
    /// Returns the procedure's JSON outcome as text.
    async fn validate_uploaded_data(
        &self,
        file_id: Uuid,
        user_id: Option<i64>,
    ) -> Result<String, AppError>;

    /// Returns the receipt or reference produced by the procedure.
    async fn create_payments(&self, file_id: Uuid, user_id: Option<i64>)
        -> Result<String, AppError>;
}

// Implementations for concrete repository types

#[async_trait]
impl UploadedFileStore for UploadedFileRepository {
    async fn create(&self, new: NewUploadedFile) -> Result<UploadedFile, AppError> {
        self.create_file(new).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadedFile>, AppError> {
        self.get_file(id).await
    }

    async fn update(&self, file: &UploadedFile) -> Result<(), AppError> {
        self.update_file(file).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.delete_file(id).await
    }
}

#[async_trait]
impl UploadedRecordStore for UploadedRecordRepository {
    async fn insert_many(&self, records: &[UploadedRecord]) -> Result<u64, AppError> {
        self.insert_records(records).await
    }

    async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<UploadedRecord>, AppError> {
        self.find_by_file(file_id).await
    }

    async fn find_by_file_and_status(
        &self,
        file_id: Uuid,
        status: RecordStatus,
    ) -> Result<Vec<UploadedRecord>, AppError> {
        self.find_by_file_and_status(file_id, status).await
    }

    async fn update_status(&self, update: &RecordStatusUpdate) -> Result<(), AppError> {
        self.update_status(update).await
    }

    async fn status_counts(&self, file_id: Uuid) -> Result<StatusCounts, AppError> {
        self.status_counts(file_id).await
    }

    async fn sum_amount(&self, file_id: Uuid, status: RecordStatus) -> Result<Decimal, AppError> {
        self.sum_amount(file_id, status).await
    }

    async fn find_page(&self, query: &RecordQuery) -> Result<Page<UploadedRecord>, AppError> {
        self.find_page(query).await
    }

    async fn distinct_file_ids(&self) -> Result<Vec<Uuid>, AppError> {
        self.distinct_file_ids().await
    }

    async fn delete_by_file(&self, file_id: Uuid) -> Result<u64, AppError> {
        self.delete_by_file(file_id).await
    }
}

#[async_trait]
impl PayableRecordStore for PayableRecordRepository {
    async fn insert(&self, new: NewPayableRecord) -> Result<PayableRecord, AppError> {
        self.insert_payable(new).await
    }

    async fn set_receipt_number(&self, id: Uuid, receipt_number: &str) -> Result<(), AppError> {
        self.set_receipt_number(id, receipt_number).await
    }

    async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<PayableRecord>, AppError> {
        self.find_by_file(file_id).await
    }

    async fn find_by_receipt(&self, receipt_number: &str) -> Result<Vec<PayableRecord>, AppError> {
        self.find_by_receipt(receipt_number).await
    }
}

#[async_trait]
impl ReceiptStore for ReceiptRepository {
    async fn create(&self, new: NewReceipt) -> Result<Receipt, AppError> {
        self.create_receipt(new).await
    }

    async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<Receipt>, AppError> {
        self.find_by_file(file_id).await
    }
}

#[async_trait]
impl TenantAccessResolver for TenantAccessRepository {
    async fn resolve(&self, principal: &Principal) -> Result<Option<TenantKeys>, AppError> {
        self.find_for_principal(principal).await
    }
}

#[async_trait]
impl ProcedureGateway for PaymentProcedureExecutor {
    async fn validate_uploaded_data(
        &self,
        file_id: Uuid,
        user_id: Option<i64>,
    ) -> Result<String, AppError> {
        self.validate_uploaded_data(file_id, user_id).await
    }

    async fn create_payments(
        &self,
        file_id: Uuid,
        user_id: Option<i64>,
    ) -> Result<String, AppError> {
        self.create_payments(file_id, user_id).await
    }
}
