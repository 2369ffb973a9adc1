//! End-to-end pipeline tests over the in-memory stores and a temp-dir storage backend.

use std::sync::Arc;

use payflow_core::models::{
    FileSortField, FileStatus, FileSummaryQuery, NewUploadedFile, NextAction, OverallStatus,
    PageRequest, Principal, RecordQuery, RecordSortField, RecordStatus, SortDirection,
    TenantKeys, UploadedFile,
};
use payflow_core::validation::{MSG_AMOUNT_REQUIRED, MSG_WORKER_ID_REQUIRED};
use payflow_core::{AppError, PayflowConfig, ValidationMode};
use payflow_db::memory::{
    InMemoryFileStore, InMemoryPayableStore, InMemoryReceiptStore, InMemoryRecordStore,
    ScriptedProcedureGateway, StaticTenantResolver,
};
use payflow_db::{ProcedureGateway, UploadedFileStore};
use payflow_services::{FileUpload, LocalStorage, PayflowStores, PaymentFlowService};
use rust_decimal::Decimal;
use tempfile::TempDir;

const HEADER: &str = "worker_id,employee_name,employer_reg_no,toli_reg_no,month,d1,d2,d3,d4,d5,d6,d7,d8,d9,d10,d11,d12,d13,d14,d15,d16,d17,d18,d19,d20,d21,d22,d23,d24,d25,d26,d27,d28,d29,d30,d31,total_days,amount,advance,net_payable,payment_type,txn_ref,reserved1,reserved2";

fn wage_row(worker: &str, name: &str, amount: &str) -> String {
    let days = vec!["1"; 31].join(",");
    format!(
        "{},{},EMP1,TOLI1,2024-01,{},31,{},0,{},BANK,TXN-{},,",
        worker, name, days, amount, amount, worker
    )
}

fn csv(rows: &[String]) -> String {
    let mut out = String::from(HEADER);
    for row in rows {
        out.push('\n');
        out.push_str(row);
    }
    out.push('\n');
    out
}

struct Harness {
    service: PaymentFlowService,
    files: InMemoryFileStore,
    records: InMemoryRecordStore,
    payables: InMemoryPayableStore,
    receipts: InMemoryReceiptStore,
    gateway: ScriptedProcedureGateway,
    _dir: TempDir,
}

async fn harness(configure: impl FnOnce(&mut PayflowConfig)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PayflowConfig::default();
    configure(&mut config);

    let files = InMemoryFileStore::new();
    let records = InMemoryRecordStore::new();
    let payables = InMemoryPayableStore::new();
    let receipts = InMemoryReceiptStore::new();
    let gateway = ScriptedProcedureGateway::new();

    let stores = PayflowStores {
        files: Arc::new(files.clone()),
        records: Arc::new(records.clone()),
        payables: Arc::new(payables.clone()),
        receipts: Arc::new(receipts.clone()),
        tenants: Arc::new(StaticTenantResolver::new(Some(TenantKeys::new(
            1,
            Some(2),
            Some(3),
        )))),
    };
    let storage = Arc::new(LocalStorage::new(dir.path()).await.unwrap());
    let procedure: Arc<dyn ProcedureGateway> = Arc::new(gateway.clone());

    let service = PaymentFlowService::new(&config, stores, storage, Some(procedure)).unwrap();

    Harness {
        service,
        files,
        records,
        payables,
        receipts,
        gateway,
        _dir: dir,
    }
}

fn clerk() -> Principal {
    Principal::authenticated("1001", None)
}

fn upload(rows: &[String]) -> FileUpload {
    FileUpload::new("wages.csv", csv(rows).into_bytes())
}

#[tokio::test]
async fn test_upload_parses_and_validates_each_row() {
    let h = harness(|_| {}).await;
    let rows = vec![
        wage_row("W1", "Jane Doe", "15000"),
        wage_row("W2", "John Roe", "-5"),
        "W3,Short Row".to_string(),
    ];

    let response = h.service.handle_upload(upload(&rows), &clerk()).await.unwrap();

    assert_eq!(response.record_count, 3);
    assert_eq!(response.status, FileStatus::Validated);
    assert!(response.error.is_none());
    assert!(response.receipt_number.is_none());
    let validation = response.validation.unwrap();
    assert_eq!(validation.valid, 1);
    assert_eq!(validation.invalid, 2);

    let file = h.files.get(response.file_id).await.unwrap().unwrap();
    assert_eq!(file.total_records, 3);
    assert_eq!(file.success_count + file.failure_count, file.total_records);
    assert_eq!(file.file_hash.len(), 64);
    assert!(file.stored_path.contains("workerpayments"));

    let results = h
        .service
        .get_validation_results(response.file_id)
        .await
        .unwrap();
    assert_eq!(results.passed_records.len(), 1);
    assert_eq!(results.passed_records[0].worker_id.as_deref(), Some("W1"));
    assert_eq!(results.failed_records.len(), 2);

    let all = h.records.all().unwrap();
    let negative = all
        .iter()
        .find(|r| r.worker_id.as_deref() == Some("W2"))
        .unwrap();
    assert!(negative
        .rejection_reason
        .as_deref()
        .unwrap()
        .contains(MSG_AMOUNT_REQUIRED));
    let short = all.iter().find(|r| r.worker_id.is_none()).unwrap();
    assert!(short
        .rejection_reason
        .as_deref()
        .unwrap()
        .starts_with(MSG_WORKER_ID_REQUIRED));
}

#[tokio::test]
async fn test_quoted_comma_name_survives_pipeline() {
    let h = harness(|_| {}).await;
    let rows = vec![wage_row("W1", "\"Doe, Jane\"", "100")];

    let response = h.service.handle_upload(upload(&rows), &clerk()).await.unwrap();
    assert_eq!(response.record_count, 1);

    let records = h.records.all().unwrap();
    assert_eq!(records[0].employee_name.as_deref(), Some("Doe, Jane"));
    assert_eq!(records[0].status, RecordStatus::Validated);
}

#[tokio::test]
async fn test_generate_request_end_to_end() {
    let h = harness(|_| {}).await;
    let rows = vec![
        wage_row("W1", "Jane", "100"),
        wage_row("W2", "John", "200"),
        wage_row("W3", "Jim", "2000000"),
    ];
    let uploaded = h.service.handle_upload(upload(&rows), &clerk()).await.unwrap();
    let file_id = uploaded.file_id;

    let summary = h.service.get_file_status_summary(file_id).await.unwrap();
    assert_eq!(summary.next_action, NextAction::GenerateRequest);
    assert_eq!(summary.workflow_status, OverallStatus::Mixed);

    let generated = h.service.generate_request(file_id).await.unwrap();
    assert_eq!(generated.processed_records, 2);
    assert_eq!(generated.status, FileStatus::RequestGenerated);
    assert!(generated.request_reference.starts_with("REQ-"));
    assert_eq!(generated.next_action, NextAction::ViewRequests);

    let receipts = h.receipts.all().unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].receipt_number, generated.receipt_number);
    let payables = h.payables.all().unwrap();
    assert_eq!(payables.len(), 2);
    assert!(payables
        .iter()
        .all(|p| p.receipt_number.as_deref() == Some(generated.receipt_number.as_str())));

    let file = h.files.get(file_id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::RequestGenerated);
    assert_eq!(
        file.file_reference_number.as_deref(),
        Some(generated.request_reference.as_str())
    );

    let again = h.service.generate_request(file_id).await.unwrap_err();
    assert!(matches!(again, AppError::RequestAlreadyGenerated { .. }));
    assert_eq!(h.receipts.all().unwrap().len(), 1);
}

#[tokio::test]
async fn test_generate_without_validated_records_leaves_file_unchanged() {
    let h = harness(|_| {}).await;
    let rows = vec![wage_row("W1", "Jane", "0")];
    let uploaded = h.service.handle_upload(upload(&rows), &clerk()).await.unwrap();
    assert_eq!(uploaded.status, FileStatus::ValidationFailed);

    let err = h
        .service
        .generate_request(uploaded.file_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoValidatedRecords(_)));

    let file = h.files.get(uploaded.file_id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::ValidationFailed);
    assert!(file.file_reference_number.is_none());
    assert!(h.receipts.all().unwrap().is_empty());
}

#[tokio::test]
async fn test_generation_that_moves_no_record_leaves_file_retryable() {
    let h = harness(|_| {}).await;
    let uploaded = h
        .service
        .handle_upload(upload(&[wage_row("W1", "Jane", "100")]), &clerk())
        .await
        .unwrap();
    let file_id = uploaded.file_id;
    let record_id = h.records.all().unwrap()[0].id;
    h.records.fail_updates_for(record_id).unwrap();

    let err = h.service.generate_request(file_id).await.unwrap_err();
    match err {
        AppError::RequestNotApplied {
            file_id: failed_file,
            receipt_number,
            failures,
        } => {
            assert_eq!(failed_file, file_id);
            assert!(!receipt_number.is_empty());
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].id, record_id);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let file = h.files.get(file_id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Validated);
    assert!(file.file_reference_number.is_none());
    let summary = h.service.get_file_status_summary(file_id).await.unwrap();
    assert_eq!(summary.counts.validated, 1);
    assert_eq!(summary.next_action, NextAction::GenerateRequest);

    h.records.clear_update_failures().unwrap();
    let retried = h.service.generate_request(file_id).await.unwrap();
    assert_eq!(retried.processed_records, 1);
    assert_eq!(retried.status, FileStatus::RequestGenerated);
    let receipts = h.receipts.all().unwrap();
    assert_eq!(receipts.len(), 2);
    assert_eq!(receipts[1].attempt, 2);
}

#[tokio::test]
async fn test_upload_guards() {
    let h = harness(|c| c.max_upload_size_bytes = 64).await;

    let err = h
        .service
        .handle_upload(upload(&[]), &Principal::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NoTenantAccess(_)));

    let err = h
        .service
        .handle_upload(FileUpload::new("wages.pdf", b"x".to_vec()), &clerk())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnsupportedFileType(_)));

    let err = h
        .service
        .handle_upload(FileUpload::new("wages.csv", Vec::new()), &clerk())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::EmptyFile(_)));

    let err = h
        .service
        .handle_upload(upload(&[wage_row("W1", "Jane", "1")]), &clerk())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::PayloadTooLarge(_)));

    assert!(h.files.all().unwrap().is_empty());
}

#[tokio::test]
async fn test_auto_generate_request_on_upload() {
    let h = harness(|c| c.auto_generate_request = true).await;
    let rows = vec![wage_row("W1", "Jane", "100")];

    let response = h.service.handle_upload(upload(&rows), &clerk()).await.unwrap();
    assert_eq!(response.status, FileStatus::RequestGenerated);
    assert!(response.receipt_number.is_some());
    assert_eq!(h.payables.all().unwrap().len(), 1);
}

#[tokio::test]
async fn test_procedure_mode_creates_payments_when_all_valid() {
    let h = harness(|c| c.validation_mode = ValidationMode::Procedure).await;
    h.gateway
        .set_validate_output(Ok(
            r#"{"total_records":1,"valid_count":1,"invalid_count":0}"#.to_string(),
        ))
        .unwrap();

    let rows = vec![wage_row("W1", "Jane", "100")];
    let response = h.service.handle_upload(upload(&rows), &clerk()).await.unwrap();

    assert_eq!(response.status, FileStatus::RequestGenerated);
    assert_eq!(response.receipt_number.as_deref(), Some("RCP-PROC-0001"));
    assert!(response.validation.unwrap().all_valid);

    let calls = h.gateway.calls().unwrap();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.user_id == Some(1001)));
}

#[tokio::test]
async fn test_procedure_mode_skips_payments_when_some_invalid() {
    let h = harness(|c| c.validation_mode = ValidationMode::Procedure).await;
    h.gateway
        .set_validate_output(Ok(
            r#"{"total_records":2,"valid_count":1,"invalid_count":1}"#.to_string(),
        ))
        .unwrap();

    let rows = vec![wage_row("W1", "Jane", "100"), wage_row("W2", "John", "-1")];
    let response = h.service.handle_upload(upload(&rows), &clerk()).await.unwrap();

    assert_eq!(response.status, FileStatus::Validated);
    assert!(response.receipt_number.is_none());
    assert_eq!(h.gateway.calls().unwrap().len(), 1);
}

#[tokio::test]
async fn test_procedure_failure_marks_file_failed() {
    let h = harness(|c| c.validation_mode = ValidationMode::Procedure).await;
    h.gateway
        .set_validate_output(Err("procedure timed out".to_string()))
        .unwrap();

    let rows = vec![wage_row("W1", "Jane", "100")];
    let response = h.service.handle_upload(upload(&rows), &clerk()).await.unwrap();

    assert_eq!(response.status, FileStatus::ValidationFailed);
    assert!(response.error.unwrap().contains("procedure timed out"));
    assert!(response.validation.is_none());
}

#[tokio::test]
async fn test_payment_procedure_failure_marks_file_failed() {
    let h = harness(|c| c.validation_mode = ValidationMode::Procedure).await;
    h.gateway
        .set_validate_output(Ok(
            r#"{"total_records":1,"valid_count":1,"invalid_count":0}"#.to_string(),
        ))
        .unwrap();
    h.gateway
        .set_create_output(Err("insufficient funds".to_string()))
        .unwrap();

    let rows = vec![wage_row("W1", "Jane", "100")];
    let response = h.service.handle_upload(upload(&rows), &clerk()).await.unwrap();

    assert_eq!(response.status, FileStatus::ValidationFailed);
    assert!(response.receipt_number.is_none());
    assert!(response.error.unwrap().contains("insufficient funds"));
}

#[tokio::test]
async fn test_validate_file_rerun_is_a_no_op() {
    let h = harness(|_| {}).await;
    let rows = vec![wage_row("W1", "Jane", "100"), wage_row("W2", "John", "-1")];
    let uploaded = h.service.handle_upload(upload(&rows), &clerk()).await.unwrap();

    let response = h.service.validate_file(uploaded.file_id, &clerk()).await.unwrap();
    assert_eq!(response.passed, 1);
    assert_eq!(response.failed, 1);
    assert_eq!(response.status, FileStatus::Validated);
    assert_eq!(response.next_action, NextAction::GenerateRequest);

    let missing = h
        .service
        .validate_file(uuid::Uuid::new_v4(), &clerk())
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_paginated_views() {
    let h = harness(|_| {}).await;
    let small = h
        .service
        .handle_upload(upload(&[wage_row("W1", "Jane", "100")]), &clerk())
        .await
        .unwrap();
    let large = h
        .service
        .handle_upload(
            upload(&[
                wage_row("W2", "John", "100"),
                wage_row("W3", "Jim", "-1"),
                wage_row("W4", "Joe", "300"),
            ]),
            &clerk(),
        )
        .await
        .unwrap();

    let page = h
        .service
        .get_paginated_file_summaries(&FileSummaryQuery {
            sort_by: Some(FileSortField::TotalRecords),
            sort_dir: SortDirection::Asc,
            page: PageRequest::new(0, 10),
            ..FileSummaryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total_elements, 2);
    assert_eq!(page.data[0].file_id, small.file_id);
    assert_eq!(page.data[1].file_id, large.file_id);
    assert_eq!(page.data[1].validated_count, 2);
    assert_eq!(page.data[1].total_validated_amount, Decimal::from(400));
    assert!(page.data[1].ready_for_payment);

    let rejected_only = h
        .service
        .get_paginated_file_summaries(&FileSummaryQuery {
            status: Some(RecordStatus::Rejected),
            page: PageRequest::new(0, 1),
            ..FileSummaryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(rejected_only.total_elements, 1);
    assert_eq!(rejected_only.data[0].file_id, large.file_id);
    assert!(!rejected_only.has_next);
    assert!(!rejected_only.has_previous);

    let records = h
        .service
        .get_validation_results_paginated(&RecordQuery {
            file_id: large.file_id,
            sort_by: RecordSortField::WorkerId,
            sort_dir: SortDirection::Asc,
            page: PageRequest::new(1, 1),
            ..RecordQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(records.records.total_elements, 3);
    assert_eq!(records.records.total_pages, 3);
    assert!(records.records.has_next);
    assert!(records.records.has_previous);
    assert_eq!(records.records.data[0].worker_id.as_deref(), Some("W3"));
    assert_eq!(records.applied_filters.status, "all");

    let filtered = h
        .service
        .get_validation_results_paginated(&RecordQuery {
            file_id: large.file_id,
            status: Some(RecordStatus::Rejected),
            page: PageRequest::new(0, 10),
            ..RecordQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(filtered.records.data.len(), 1);
    assert_eq!(filtered.applied_filters.status, "REJECTED");

    let invalid_page = h
        .service
        .get_validation_results_paginated(&RecordQuery {
            file_id: large.file_id,
            page: PageRequest::new(0, 0),
            ..RecordQuery::default()
        })
        .await;
    assert!(invalid_page.is_err());
}

#[tokio::test]
async fn test_file_summaries_list_only_files_with_records() {
    let h = harness(|_| {}).await;
    let older = h
        .service
        .handle_upload(upload(&[wage_row("W1", "Jane", "100")]), &clerk())
        .await
        .unwrap();
    let newer = h
        .service
        .handle_upload(upload(&[wage_row("W2", "John", "200")]), &clerk())
        .await
        .unwrap();

    let empty = UploadedFile::from_new(NewUploadedFile {
        filename: "empty.csv".to_string(),
        stored_path: "/tmp/empty.csv".to_string(),
        file_hash: "none".to_string(),
        file_type: "csv".to_string(),
        uploaded_by: "clerk".to_string(),
        tenant: TenantKeys::new(1, Some(2), Some(3)),
    });
    let empty_id = empty.id;
    h.files.add_file(empty).unwrap();

    let page = h
        .service
        .get_paginated_file_summaries(&FileSummaryQuery {
            page: PageRequest::new(0, 10),
            ..FileSummaryQuery::default()
        })
        .await
        .unwrap();
    let ids: Vec<_> = page.data.iter().map(|s| s.file_id).collect();
    assert_eq!(ids, vec![newer.file_id, older.file_id]);
    assert_eq!(page.total_elements, 2);

    let single = h
        .service
        .get_paginated_file_summaries(&FileSummaryQuery {
            file_id: Some(older.file_id),
            page: PageRequest::new(0, 10),
            ..FileSummaryQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(single.total_elements, 1);
    assert_eq!(single.data[0].file_id, older.file_id);

    for file_id in [Some(empty_id), Some(uuid::Uuid::new_v4())] {
        let none = h
            .service
            .get_paginated_file_summaries(&FileSummaryQuery {
                file_id,
                page: PageRequest::new(0, 10),
                ..FileSummaryQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(none.total_elements, 0);
    }
}

#[tokio::test]
async fn test_overview_reupload_and_delete() {
    let h = harness(|_| {}).await;
    let first = h
        .service
        .handle_upload(upload(&[wage_row("W1", "Jane", "-1")]), &clerk())
        .await
        .unwrap();

    let overview = h.service.get_file_overview(first.file_id).await.unwrap();
    assert_eq!(overview.file_name, "wages.csv");
    assert_eq!(overview.file_status, FileStatus::ValidationFailed);
    assert!(!overview.ready_for_payment);

    let reupload = h
        .service
        .reupload_file(first.file_id, upload(&[wage_row("W1", "Jane", "10")]), &clerk())
        .await
        .unwrap();
    assert_eq!(reupload.previous_file_id, first.file_id);
    assert_ne!(reupload.new_file_id, first.file_id);
    assert_eq!(reupload.upload.status, FileStatus::Validated);

    let deleted = h.service.delete_file(first.file_id).await.unwrap();
    assert_eq!(deleted.deleted_records, 1);
    assert!(h.files.get(first.file_id).await.unwrap().is_none());
    assert!(matches!(
        h.service.get_file_overview(first.file_id).await,
        Err(AppError::NotFound(_))
    ));

    let missing = h
        .service
        .reupload_file(first.file_id, upload(&[]), &clerk())
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound(_)));
}
