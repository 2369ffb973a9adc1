//! Caller-facing response shapes for the pipeline operations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::pagination::Page;
use super::record::RecordSummary;
use super::status::{FileStatus, NextAction, OverallStatus, StatusCounts};

/// One item a best-effort batch could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub id: Uuid,
    pub error: String,
}

/// Outcome of applying a write to many items independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub applied: usize,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn record_success(&mut self) {
        self.applied += 1;
    }

    pub fn record_failure(&mut self, id: Uuid, error: impl ToString) {
        self.failures.push(ItemFailure {
            id,
            error: error.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.applied += other.applied;
        self.failures.extend(other.failures);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total: i64,
    pub valid: i64,
    pub invalid: i64,
    pub all_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_id: Uuid,
    pub message: String,
    pub path: String,
    pub record_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_number: Option<String>,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateFileResponse {
    pub file_id: Uuid,
    pub passed: i64,
    pub failed: i64,
    pub status: FileStatus,
    pub next_action: NextAction,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResults {
    pub file_id: Uuid,
    pub passed_records: Vec<RecordSummary>,
    pub failed_records: Vec<RecordSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedFilters {
    /// Status filter name, or `all`.
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResultsPage {
    pub file_id: Uuid,
    #[serde(flatten)]
    pub records: Page<RecordSummary>,
    pub applied_filters: AppliedFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequestResponse {
    pub file_id: Uuid,
    pub message: String,
    pub request_reference: String,
    pub receipt_number: String,
    pub processed_records: usize,
    pub status: FileStatus,
    pub next_action: NextAction,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStatusSummary {
    pub file_id: Uuid,
    pub total_records: i64,
    pub counts: StatusCounts,
    pub file_status: FileStatus,
    pub workflow_status: OverallStatus,
    pub next_action: NextAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub file_id: Uuid,
    pub file_name: String,
    pub upload_date: DateTime<Utc>,
    pub total_records: i64,
    pub validated_count: i64,
    pub total_validated_amount: Decimal,
    pub status_summary: StatusCounts,
    pub overall_status: OverallStatus,
    pub ready_for_payment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOverview {
    pub file_id: Uuid,
    pub file_name: String,
    pub upload_date: DateTime<Utc>,
    pub total_records: i64,
    pub validated_count: i64,
    pub total_validated_amount: Decimal,
    pub status_summary: StatusCounts,
    pub file_status: FileStatus,
    pub ready_for_payment: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReuploadResponse {
    pub previous_file_id: Uuid,
    pub new_file_id: Uuid,
    pub upload: UploadResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileResponse {
    pub file_id: Uuid,
    pub deleted_records: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_report_merge() {
        let mut report = BatchReport::default();
        report.record_success();
        report.record_failure(Uuid::nil(), "boom");

        let mut other = BatchReport::default();
        other.record_success();
        report.merge(other);

        assert_eq!(report.applied, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_upload_response_omits_absent_parts() {
        let response = UploadResponse {
            file_id: Uuid::nil(),
            message: "File uploaded".to_string(),
            path: "workerpayments/x.csv".to_string(),
            record_count: 2,
            validation: None,
            receipt_number: None,
            status: FileStatus::Validated,
            error: None,
            failures: Vec::new(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["recordCount"], 2);
        assert_eq!(json["status"], "VALIDATED");
        assert!(json.get("error").is_none());
        assert!(json.get("receiptNumber").is_none());
        assert!(json.get("failures").is_none());
    }
}
