//! File lifecycle transitions and counter bookkeeping.
//!
//! ```text
//! UPLOADED --validate--> VALIDATED | VALIDATION_FAILED
//! VALIDATED --generate request--> REQUEST_GENERATED
//! VALIDATED --payment procedure fails--> VALIDATION_FAILED
//! ```
//!
//! Re-applying the current status is allowed and only refreshes counters.

use payflow_core::models::{FileStatus, StatusCounts, UploadedFile};
use payflow_core::AppError;

use crate::validator::ValidationOutcome;

/// Move `file` to `next`, refusing transitions the lifecycle does not allow.
pub fn transition(file: &mut UploadedFile, next: FileStatus) -> Result<(), AppError> {
    if file.status == next {
        return Ok(());
    }
    if !file.status.can_transition_to(next) {
        return Err(AppError::InvalidTransition(format!(
            "file {} cannot move from {} to {}",
            file.id, file.status, next
        )));
    }
    tracing::debug!(file_id = %file.id, from = %file.status, to = %next, "File status transition");
    file.status = next;
    Ok(())
}

/// Whether a validation pass may run on a file in this state.
pub fn ensure_validatable(file: &UploadedFile) -> Result<(), AppError> {
    match file.status {
        FileStatus::Uploaded | FileStatus::Validated => Ok(()),
        FileStatus::ValidationFailed => Err(AppError::InvalidTransition(format!(
            "file {} failed validation; re-upload a corrected file",
            file.id
        ))),
        FileStatus::RequestGenerated => Err(AppError::InvalidTransition(format!(
            "file {} already has a payment request",
            file.id
        ))),
    }
}

/// Set success/failure counters, clamped so they never exceed the parsed total.
pub fn set_counters(file: &mut UploadedFile, valid: i64, invalid: i64) {
    let total = i64::from(file.total_records.max(0));
    let success = valid.clamp(0, total);
    let failure = invalid.clamp(0, total - success);
    file.success_count = success as i32;
    file.failure_count = failure as i32;
}

/// Counters recomputed from record statuses.
pub fn refresh_counters(file: &mut UploadedFile, counts: &StatusCounts) {
    set_counters(
        file,
        counts.validated + counts.request_generated,
        counts.rejected,
    );
}

/// VALIDATED when at least one record passed, VALIDATION_FAILED otherwise.
pub fn apply_validation_outcome(
    file: &mut UploadedFile,
    outcome: &ValidationOutcome,
) -> Result<FileStatus, AppError> {
    set_counters(file, outcome.valid, outcome.invalid);
    let next = if outcome.valid > 0 {
        FileStatus::Validated
    } else {
        FileStatus::ValidationFailed
    };
    transition(file, next)?;
    Ok(next)
}

/// A validator or payment procedure error: the file ends VALIDATION_FAILED.
pub fn mark_validation_failed(file: &mut UploadedFile, reason: &str) -> Result<(), AppError> {
    tracing::warn!(file_id = %file.id, reason = %reason, "Marking file VALIDATION_FAILED");
    transition(file, FileStatus::ValidationFailed)
}

/// Final step of request generation.
pub fn mark_request_generated(file: &mut UploadedFile, reference: String) -> Result<(), AppError> {
    transition(file, FileStatus::RequestGenerated)?;
    file.file_reference_number = Some(reference);
    Ok(())
}
