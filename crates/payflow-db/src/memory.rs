//! In-memory store implementations
//!
//! Back the pipeline without a database: used by the CLI's `--in-memory` mode and by
//! service tests. Stores can be told to fail for specific items so best-effort batch
//! behaviour can be exercised.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use payflow_core::models::{
    generate_receipt_number, NewPayableRecord, NewReceipt, NewUploadedFile, Page, PayableRecord,
    Principal, Receipt, RecordQuery, RecordSortField, RecordStatus, SortDirection, StatusCounts,
    TenantKeys, UploadedFile, UploadedRecord,
};
use payflow_core::AppError;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::repository_traits::{
    PayableRecordStore, ProcedureGateway, ReceiptStore, RecordStatusUpdate, TenantAccessResolver,
    UploadedFileStore, UploadedRecordStore,
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::Internal("In-memory store lock poisoned".to_string()))
}

fn injected(what: &str, id: Uuid) -> AppError {
    AppError::Internal(format!("Injected failure: {} {}", what, id))
}

/// In-memory uploaded files
#[derive(Clone, Default)]
pub struct InMemoryFileStore {
    files: Arc<Mutex<HashMap<Uuid, UploadedFile>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file directly, bypassing `create`.
    pub fn add_file(&self, file: UploadedFile) -> Result<(), AppError> {
        lock(&self.files)?.insert(file.id, file);
        Ok(())
    }

    /// Every stored file, newest upload first.
    pub fn all(&self) -> Result<Vec<UploadedFile>, AppError> {
        let mut files: Vec<UploadedFile> = lock(&self.files)?.values().cloned().collect();
        files.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(files)
    }
}

#[async_trait]
impl UploadedFileStore for InMemoryFileStore {
    async fn create(&self, new: NewUploadedFile) -> Result<UploadedFile, AppError> {
        let file = UploadedFile::from_new(new);
        lock(&self.files)?.insert(file.id, file.clone());
        Ok(file)
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadedFile>, AppError> {
        Ok(lock(&self.files)?.get(&id).cloned())
    }

    async fn update(&self, file: &UploadedFile) -> Result<(), AppError> {
        let mut files = lock(&self.files)?;
        match files.get_mut(&file.id) {
            Some(existing) => {
                existing.total_records = file.total_records;
                existing.success_count = file.success_count;
                existing.failure_count = file.failure_count;
                existing.status = file.status;
                existing.file_reference_number = file.file_reference_number.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("File {} not found", file.id))),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(lock(&self.files)?.remove(&id).is_some())
    }
}

/// In-memory uploaded records, kept in insertion order
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<Vec<UploadedRecord>>>,
    failing_updates: Arc<Mutex<HashSet<Uuid>>>,
    fail_inserts: Arc<Mutex<bool>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every status update of `record_id` fail.
    pub fn fail_updates_for(&self, record_id: Uuid) -> Result<(), AppError> {
        lock(&self.failing_updates)?.insert(record_id);
        Ok(())
    }

    pub fn clear_update_failures(&self) -> Result<(), AppError> {
        lock(&self.failing_updates)?.clear();
        Ok(())
    }

    /// Make bulk inserts fail until cleared.
    pub fn set_fail_inserts(&self, fail: bool) -> Result<(), AppError> {
        *lock(&self.fail_inserts)? = fail;
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<UploadedRecord>, AppError> {
        Ok(lock(&self.records)?.clone())
    }
}

fn compare_records(field: RecordSortField, a: &UploadedRecord, b: &UploadedRecord) -> Ordering {
    // Mirrors SQL ordering where NULLs sort after values in ascending order.
    fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
        match (a, b) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    match field {
        RecordSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        RecordSortField::WorkerId => nulls_last(&a.worker_id, &b.worker_id),
        RecordSortField::EmployeeName => nulls_last(&a.employee_name, &b.employee_name),
        RecordSortField::Amount => nulls_last(&a.amount, &b.amount),
        RecordSortField::Status => a.status.code().cmp(&b.status.code()),
    }
}

#[async_trait]
impl UploadedRecordStore for InMemoryRecordStore {
    async fn insert_many(&self, records: &[UploadedRecord]) -> Result<u64, AppError> {
        if *lock(&self.fail_inserts)? {
            return Err(AppError::Internal(
                "Injected failure: bulk insert".to_string(),
            ));
        }
        let mut stored = lock(&self.records)?;
        stored.extend(records.iter().cloned());
        Ok(records.len() as u64)
    }

    async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<UploadedRecord>, AppError> {
        Ok(lock(&self.records)?
            .iter()
            .filter(|r| r.file_id == file_id)
            .cloned()
            .collect())
    }

    async fn find_by_file_and_status(
        &self,
        file_id: Uuid,
        status: RecordStatus,
    ) -> Result<Vec<UploadedRecord>, AppError> {
        Ok(lock(&self.records)?
            .iter()
            .filter(|r| r.file_id == file_id && r.status == status)
            .cloned()
            .collect())
    }

    async fn update_status(&self, update: &RecordStatusUpdate) -> Result<(), AppError> {
        if lock(&self.failing_updates)?.contains(&update.record_id) {
            return Err(injected("status update for record", update.record_id));
        }

        let mut records = lock(&self.records)?;
        let record = records
            .iter_mut()
            .find(|r| r.id == update.record_id)
            .ok_or_else(|| AppError::NotFound(format!("Record {} not found", update.record_id)))?;

        if !record.status.can_transition_to(update.status) {
            return Err(AppError::InvalidTransition(format!(
                "record {} is {} and cannot become {}",
                record.id, record.status, update.status
            )));
        }

        record.status = update.status;
        record.rejection_reason = update.rejection_reason.clone();
        if update.receipt_number.is_some() {
            record.receipt_number = update.receipt_number.clone();
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn status_counts(&self, file_id: Uuid) -> Result<StatusCounts, AppError> {
        let records = lock(&self.records)?;
        Ok(StatusCounts::from_pairs(
            records
                .iter()
                .filter(|r| r.file_id == file_id)
                .map(|r| (r.status, 1)),
        ))
    }

    async fn sum_amount(&self, file_id: Uuid, status: RecordStatus) -> Result<Decimal, AppError> {
        Ok(lock(&self.records)?
            .iter()
            .filter(|r| r.file_id == file_id && r.status == status)
            .filter_map(|r| r.amount)
            .sum())
    }

    async fn find_page(&self, query: &RecordQuery) -> Result<Page<UploadedRecord>, AppError> {
        let mut matching: Vec<UploadedRecord> = lock(&self.records)?
            .iter()
            .filter(|r| r.file_id == query.file_id)
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .filter(|r| query.created.map_or(true, |range| range.contains(r.created_at)))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ordering = compare_records(query.sort_by, a, b);
            let ordering = match query.sort_dir {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            ordering.then_with(|| a.id.cmp(&b.id))
        });

        Ok(Page::from_full(matching, query.page))
    }

    async fn distinct_file_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let records = lock(&self.records)?;
        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for record in records.iter() {
            if seen.insert(record.file_id) {
                ids.push(record.file_id);
            }
        }
        // Latest first-inserted file leads, matching the SQL ordering.
        ids.reverse();
        Ok(ids)
    }

    async fn delete_by_file(&self, file_id: Uuid) -> Result<u64, AppError> {
        let mut records = lock(&self.records)?;
        let before = records.len();
        records.retain(|r| r.file_id != file_id);
        Ok((before - records.len()) as u64)
    }
}

/// In-memory payable records
#[derive(Clone, Default)]
pub struct InMemoryPayableStore {
    payables: Arc<Mutex<Vec<PayableRecord>>>,
    failing_inserts: Arc<Mutex<HashSet<Uuid>>>,
    failing_backfills: Arc<Mutex<HashSet<Uuid>>>,
}

impl InMemoryPayableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail creating the payable derived from `source_record_id`.
    pub fn fail_insert_for_source(&self, source_record_id: Uuid) -> Result<(), AppError> {
        lock(&self.failing_inserts)?.insert(source_record_id);
        Ok(())
    }

    /// Fail the receipt backfill of the payable derived from `source_record_id`.
    pub fn fail_backfill_for_source(&self, source_record_id: Uuid) -> Result<(), AppError> {
        lock(&self.failing_backfills)?.insert(source_record_id);
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<PayableRecord>, AppError> {
        Ok(lock(&self.payables)?.clone())
    }
}

#[async_trait]
impl PayableRecordStore for InMemoryPayableStore {
    async fn insert(&self, new: NewPayableRecord) -> Result<PayableRecord, AppError> {
        if lock(&self.failing_inserts)?.contains(&new.source_record_id) {
            return Err(injected("payable insert for record", new.source_record_id));
        }
        let payable = new.into_payable(Uuid::new_v4());
        lock(&self.payables)?.push(payable.clone());
        Ok(payable)
    }

    async fn set_receipt_number(&self, id: Uuid, receipt_number: &str) -> Result<(), AppError> {
        let failing = lock(&self.failing_backfills)?.clone();
        let mut payables = lock(&self.payables)?;
        let payable = payables
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Payable {} not found", id)))?;

        if failing.contains(&payable.source_record_id) {
            return Err(injected("receipt backfill for payable", id));
        }
        payable.receipt_number = Some(receipt_number.to_string());
        Ok(())
    }

    async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<PayableRecord>, AppError> {
        Ok(lock(&self.payables)?
            .iter()
            .filter(|p| p.file_id == file_id)
            .cloned()
            .collect())
    }

    async fn find_by_receipt(&self, receipt_number: &str) -> Result<Vec<PayableRecord>, AppError> {
        Ok(lock(&self.payables)?
            .iter()
            .filter(|p| p.receipt_number.as_deref() == Some(receipt_number))
            .cloned()
            .collect())
    }
}

/// In-memory receipts
#[derive(Clone, Default)]
pub struct InMemoryReceiptStore {
    receipts: Arc<Mutex<Vec<Receipt>>>,
    fail_creates: Arc<Mutex<bool>>,
}

impl InMemoryReceiptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_creates(&self, fail: bool) -> Result<(), AppError> {
        *lock(&self.fail_creates)? = fail;
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<Receipt>, AppError> {
        Ok(lock(&self.receipts)?.clone())
    }
}

#[async_trait]
impl ReceiptStore for InMemoryReceiptStore {
    async fn create(&self, new: NewReceipt) -> Result<Receipt, AppError> {
        if *lock(&self.fail_creates)? {
            return Err(injected("receipt create for file", new.file_id));
        }

        let mut receipts = lock(&self.receipts)?;
        let attempt = receipts
            .iter()
            .filter(|r| r.file_id == new.file_id)
            .map(|r| r.attempt)
            .max()
            .unwrap_or(0)
            + 1;

        let now = Utc::now();
        let receipt = Receipt {
            receipt_number: generate_receipt_number(now),
            file_id: new.file_id,
            attempt,
            record_count: new.payable_ids.len() as i32,
            payable_ids: new.payable_ids,
            total_amount: new.total_amount,
            created_at: now,
        };
        receipts.push(receipt.clone());
        Ok(receipt)
    }

    async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<Receipt>, AppError> {
        Ok(lock(&self.receipts)?
            .iter()
            .filter(|r| r.file_id == file_id)
            .cloned()
            .collect())
    }
}

/// Resolves every authenticated principal to one fixed set of tenant keys.
#[derive(Clone, Debug, Default)]
pub struct StaticTenantResolver {
    keys: Option<TenantKeys>,
}

impl StaticTenantResolver {
    pub fn new(keys: Option<TenantKeys>) -> Self {
        Self { keys }
    }
}

#[async_trait]
impl TenantAccessResolver for StaticTenantResolver {
    async fn resolve(&self, principal: &Principal) -> Result<Option<TenantKeys>, AppError> {
        if !principal.authenticated {
            return Ok(None);
        }
        Ok(self.keys)
    }
}

/// A procedure call seen by [`ScriptedProcedureGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureCall {
    pub procedure: &'static str,
    pub file_id: Uuid,
    pub user_id: Option<i64>,
}

/// Procedure gateway returning canned outputs, recording every call.
#[derive(Clone)]
pub struct ScriptedProcedureGateway {
    validate_output: Arc<Mutex<Result<String, String>>>,
    create_output: Arc<Mutex<Result<String, String>>>,
    calls: Arc<Mutex<Vec<ProcedureCall>>>,
}

impl Default for ScriptedProcedureGateway {
    fn default() -> Self {
        Self {
            validate_output: Arc::new(Mutex::new(Ok(
                r#"{"total_records":0,"valid_count":0,"invalid_count":0}"#.to_string(),
            ))),
            create_output: Arc::new(Mutex::new(Ok("RCP-PROC-0001".to_string()))),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ScriptedProcedureGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Ok(json)` is returned verbatim; `Err(msg)` becomes a procedure failure.
    pub fn set_validate_output(&self, output: Result<String, String>) -> Result<(), AppError> {
        *lock(&self.validate_output)? = output;
        Ok(())
    }

    pub fn set_create_output(&self, output: Result<String, String>) -> Result<(), AppError> {
        *lock(&self.create_output)? = output;
        Ok(())
    }

    pub fn calls(&self) -> Result<Vec<ProcedureCall>, AppError> {
        Ok(lock(&self.calls)?.clone())
    }

    fn record(
        &self,
        procedure: &'static str,
        file_id: Uuid,
        user_id: Option<i64>,
    ) -> Result<(), AppError> {
        lock(&self.calls)?.push(ProcedureCall {
            procedure,
            file_id,
            user_id,
        });
        Ok(())
    }
}

#[async_trait]
impl ProcedureGateway for ScriptedProcedureGateway {
    async fn validate_uploaded_data(
        &self,
        file_id: Uuid,
        user_id: Option<i64>,
    ) -> Result<String, AppError> {
        self.record("validate_uploaded_data", file_id, user_id)?;
        lock(&self.validate_output)?
            .clone()
            .map_err(AppError::ProcedureInvocation)
    }

    async fn create_payments(
        &self,
        file_id: Uuid,
        user_id: Option<i64>,
    ) -> Result<String, AppError> {
        self.record("create_payments", file_id, user_id)?;
        lock(&self.create_output)?
            .clone()
            .map_err(AppError::ProcedureInvocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payflow_core::models::PageRequest;

    fn record(file_id: Uuid, worker: &str, amount: i64) -> UploadedRecord {
        let mut record = UploadedRecord::empty(file_id, TenantKeys::new(1, None, None));
        record.worker_id = Some(worker.to_string());
        record.amount = Some(Decimal::new(amount, 0));
        record
    }

    #[tokio::test]
    async fn test_record_store_counts_and_updates() {
        let store = InMemoryRecordStore::new();
        let file_id = Uuid::new_v4();
        let records = vec![record(file_id, "W1", 10), record(file_id, "W2", 20)];
        store.insert_many(&records).await.unwrap();
        let other_file = Uuid::new_v4();
        store.insert_many(&[record(other_file, "X", 5)]).await.unwrap();

        store
            .update_status(&RecordStatusUpdate::validated(records[0].id))
            .await
            .unwrap();

        let counts = store.status_counts(file_id).await.unwrap();
        assert_eq!(counts.uploaded, 1);
        assert_eq!(counts.validated, 1);
        assert_eq!(
            store.sum_amount(file_id, RecordStatus::Validated).await.unwrap(),
            Decimal::new(10, 0)
        );
        assert_eq!(
            store.distinct_file_ids().await.unwrap(),
            vec![other_file, file_id]
        );
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let store = InMemoryRecordStore::new();
        let err = store
            .update_status(&RecordStatusUpdate::validated(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_refuses_backward_or_skipping_moves() {
        let store = InMemoryRecordStore::new();
        let file_id = Uuid::new_v4();
        let rejected = record(file_id, "W1", 10);
        let fresh = record(file_id, "W2", 20);
        store
            .insert_many(&[rejected.clone(), fresh.clone()])
            .await
            .unwrap();
        store
            .update_status(&RecordStatusUpdate::rejected(rejected.id, "bad"))
            .await
            .unwrap();

        let err = store
            .update_status(&RecordStatusUpdate::request_generated(rejected.id, "R1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        let err = store
            .update_status(&RecordStatusUpdate::validated(rejected.id))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        let err = store
            .update_status(&RecordStatusUpdate::request_generated(fresh.id, "R1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));

        let stored = store.all().unwrap();
        assert_eq!(stored[0].status, RecordStatus::Rejected);
        assert_eq!(stored[0].rejection_reason.as_deref(), Some("bad"));
        assert!(stored[0].receipt_number.is_none());
        assert_eq!(stored[1].status, RecordStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_injected_update_failure() {
        let store = InMemoryRecordStore::new();
        let file_id = Uuid::new_v4();
        let r = record(file_id, "W1", 10);
        store.insert_many(std::slice::from_ref(&r)).await.unwrap();
        store.fail_updates_for(r.id).unwrap();

        assert!(store
            .update_status(&RecordStatusUpdate::validated(r.id))
            .await
            .is_err());
        let counts = store.status_counts(file_id).await.unwrap();
        assert_eq!(counts.uploaded, 1);
    }

    #[tokio::test]
    async fn test_find_page_sorts_and_filters() {
        let store = InMemoryRecordStore::new();
        let file_id = Uuid::new_v4();
        let records = vec![
            record(file_id, "W3", 30),
            record(file_id, "W1", 10),
            record(file_id, "W2", 20),
        ];
        store.insert_many(&records).await.unwrap();
        store
            .update_status(&RecordStatusUpdate::rejected(records[0].id, "bad"))
            .await
            .unwrap();

        let page = store
            .find_page(&RecordQuery {
                file_id,
                sort_by: RecordSortField::Amount,
                sort_dir: SortDirection::Desc,
                page: PageRequest::new(0, 2),
                ..RecordQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.data[0].worker_id.as_deref(), Some("W3"));
        assert_eq!(page.data[1].worker_id.as_deref(), Some("W2"));
        assert!(page.has_next);

        let uploaded_only = store
            .find_page(&RecordQuery {
                file_id,
                status: Some(RecordStatus::Uploaded),
                sort_by: RecordSortField::WorkerId,
                sort_dir: SortDirection::Asc,
                page: PageRequest::new(0, 10),
                ..RecordQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(uploaded_only.total_elements, 2);
        assert_eq!(uploaded_only.data[0].worker_id.as_deref(), Some("W1"));
    }

    #[tokio::test]
    async fn test_receipt_attempts_increment_per_file() {
        let store = InMemoryReceiptStore::new();
        let file_id = Uuid::new_v4();
        let new = NewReceipt {
            file_id,
            payable_ids: vec![Uuid::new_v4()],
            total_amount: Decimal::new(100, 0),
        };
        let first = store.create(new.clone()).await.unwrap();
        let second = store.create(new).await.unwrap();
        assert_eq!(first.attempt, 1);
        assert_eq!(second.attempt, 2);
        assert_ne!(first.receipt_number, second.receipt_number);
    }

    #[tokio::test]
    async fn test_static_tenant_resolver_requires_authentication() {
        let resolver = StaticTenantResolver::new(Some(TenantKeys::new(1, None, None)));
        assert!(resolver
            .resolve(&Principal::anonymous())
            .await
            .unwrap()
            .is_none());
        assert!(resolver
            .resolve(&Principal::authenticated("clerk", None))
            .await
            .unwrap()
            .is_some());
    }
}
