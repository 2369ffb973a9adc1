use std::sync::Arc;

use async_trait::async_trait;
use payflow_core::models::{BatchReport, Principal, RecordStatus};
use payflow_core::validation::{check_record, RecordVerdict};
use payflow_core::AppError;
use payflow_db::{RecordStatusUpdate, UploadedRecordStore};
use uuid::Uuid;

use super::{ValidationOutcome, Validator};

/// Applies the record rules in process, one record at a time.
///
/// Only UPLOADED records are examined, so re-running on a file leaves records that
/// already have a verdict alone. A record whose verdict cannot be saved is reported
/// and left UPLOADED for the next run.
#[derive(Clone)]
pub struct RuleValidator {
    records: Arc<dyn UploadedRecordStore>,
}

impl RuleValidator {
    pub fn new(records: Arc<dyn UploadedRecordStore>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Validator for RuleValidator {
    fn name(&self) -> &'static str {
        "rules"
    }

    #[tracing::instrument(skip(self, _principal), fields(validator = "rules", file_id = %file_id))]
    async fn validate(
        &self,
        file_id: Uuid,
        _principal: &Principal,
    ) -> Result<ValidationOutcome, AppError> {
        let pending = self
            .records
            .find_by_file_and_status(file_id, RecordStatus::Uploaded)
            .await?;

        let mut report = BatchReport::default();

        for record in &pending {
            let update = match check_record(record) {
                RecordVerdict::Valid => RecordStatusUpdate::validated(record.id),
                RecordVerdict::Rejected(reason) => {
                    tracing::debug!(record_id = %record.id, reason = %reason, "Record rejected");
                    RecordStatusUpdate::rejected(record.id, reason)
                }
            };

            match self.records.update_status(&update).await {
                Ok(()) => report.record_success(),
                Err(e) => {
                    tracing::error!(
                        record_id = %record.id,
                        error = %e,
                        "Failed to save validation verdict, skipping record"
                    );
                    report.record_failure(record.id, &e);
                }
            }
        }

        let counts = self.records.status_counts(file_id).await?;
        let valid = counts.validated + counts.request_generated;
        let invalid = counts.rejected;

        tracing::info!(
            file_id = %file_id,
            examined = pending.len(),
            saved = report.applied,
            failed = report.failures.len(),
            valid,
            invalid,
            "Rule validation pass complete"
        );

        Ok(ValidationOutcome {
            total: counts.total(),
            valid,
            invalid,
            all_valid: invalid == 0 && counts.uploaded == 0,
            raw_json: None,
            failures: report.failures,
        })
    }
}
