//! Error types module
//!
//! All service-level failures are unified under [`AppError`]. Per-row problems found
//! while parsing or normalizing a file are *not* represented here: they are recovered
//! locally by the processing crate and only ever logged or attached to the row.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;
use uuid::Uuid;

use crate::models::ItemFailure;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented.
/// Lets any transport render a structured error without matching on variants.
pub trait ErrorMetadata {
    /// HTTP-style status code
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "NO_TENANT_ACCESS")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File is empty or invalid: {0}")]
    EmptyFile(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("No tenant access: {0}")]
    NoTenantAccess(String),

    #[error("No validated records found for file {0}")]
    NoValidatedRecords(Uuid),

    #[error("Request already generated for file {file_id} (reference {reference})")]
    RequestAlreadyGenerated { file_id: Uuid, reference: String },

    /// A receipt was created but no source record could be moved to REQUEST_GENERATED.
    #[error("Request generation for file {file_id} applied to no records (receipt {receipt_number}, {} failures)", failures.len())]
    RequestNotApplied {
        file_id: Uuid,
        receipt_number: String,
        failures: Vec<ItemFailure>,
    },

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Procedure invocation failed: {0}")]
    ProcedureInvocation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
/// client_message stays per-variant for dynamic content.
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedFileType(_) => (
            415,
            "UNSUPPORTED_FILE_TYPE",
            false,
            Some("Upload a .csv, .xls or .xlsx file"),
            false,
            LogLevel::Debug,
        ),
        AppError::EmptyFile(_) => (
            400,
            "EMPTY_FILE",
            false,
            Some("Upload a file with a header row"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Split the batch into smaller files"),
            false,
            LogLevel::Debug,
        ),
        AppError::NoTenantAccess(_) => (
            403,
            "NO_TENANT_ACCESS",
            false,
            Some("Ask an administrator to assign a board to this user"),
            false,
            LogLevel::Warn,
        ),
        AppError::NoValidatedRecords(_) => (
            409,
            "NO_VALIDATED_RECORDS",
            true,
            Some("Validate the file before generating a request"),
            false,
            LogLevel::Debug,
        ),
        AppError::RequestAlreadyGenerated { .. } => (
            409,
            "REQUEST_ALREADY_GENERATED",
            false,
            Some("Use the existing request reference"),
            false,
            LogLevel::Warn,
        ),
        AppError::RequestNotApplied { .. } => (
            500,
            "REQUEST_NOT_APPLIED",
            true,
            Some("Retry request generation; the file is still VALIDATED"),
            false,
            LogLevel::Error,
        ),
        AppError::InvalidTransition(_) => (
            409,
            "INVALID_TRANSITION",
            false,
            Some("Check the file status before retrying"),
            false,
            LogLevel::Warn,
        ),
        AppError::ProcedureInvocation(_) => (
            502,
            "PROCEDURE_ERROR",
            true,
            Some("Retry validation after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::UnsupportedFileType(_) => "UnsupportedFileType",
            AppError::EmptyFile(_) => "EmptyFile",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::NoTenantAccess(_) => "NoTenantAccess",
            AppError::NoValidatedRecords(_) => "NoValidatedRecords",
            AppError::RequestAlreadyGenerated { .. } => "RequestAlreadyGenerated",
            AppError::RequestNotApplied { .. } => "RequestNotApplied",
            AppError::InvalidTransition(_) => "InvalidTransition",
            AppError::ProcedureInvocation(_) => "ProcedureInvocation",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access file storage".to_string(),
            AppError::ProcedureInvocation(_) => "Database validation procedure failed".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::NoValidatedRecords(_) => {
                "No validated records found to generate request".to_string()
            }
            AppError::RequestAlreadyGenerated { reference, .. } => {
                format!("Request already generated with reference {}", reference)
            }
            AppError::RequestNotApplied { receipt_number, failures, .. } => format!(
                "No records could be moved to REQUEST_GENERATED under receipt {} ({} failures)",
                receipt_number,
                failures.len()
            ),
            AppError::InvalidInput(ref msg)
            | AppError::NotFound(ref msg)
            | AppError::EmptyFile(ref msg)
            | AppError::PayloadTooLarge(ref msg)
            | AppError::NoTenantAccess(ref msg)
            | AppError::InvalidTransition(ref msg) => msg.clone(),
            AppError::UnsupportedFileType(ref ext) => format!("Unsupported file type: {}", ext),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.client_message(), "Failed to access database");
        assert!(err.is_sensitive());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_no_tenant_access() {
        let err = AppError::NoTenantAccess("User has no tenant access assigned".to_string());
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(err.error_code(), "NO_TENANT_ACCESS");
        assert!(!err.is_recoverable());
        assert_eq!(err.client_message(), "User has no tenant access assigned");
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_error_metadata_no_validated_records() {
        let id = Uuid::new_v4();
        let err = AppError::NoValidatedRecords(id);
        assert_eq!(err.http_status_code(), 409);
        assert!(err.is_recoverable());
        assert!(err.to_string().contains(&id.to_string()));
        assert_eq!(
            err.client_message(),
            "No validated records found to generate request"
        );
    }

    #[test]
    fn test_request_not_applied_carries_failures() {
        let err = AppError::RequestNotApplied {
            file_id: Uuid::new_v4(),
            receipt_number: "RCP-1".to_string(),
            failures: vec![ItemFailure {
                id: Uuid::new_v4(),
                error: "locked".to_string(),
            }],
        };
        assert_eq!(err.error_code(), "REQUEST_NOT_APPLIED");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("RCP-1"));
        assert!(err.client_message().contains("1 failures"));
    }

    #[test]
    fn test_procedure_error_hides_details() {
        let err = AppError::ProcedureInvocation("connection reset by peer".to_string());
        assert!(err.is_sensitive());
        assert!(!err.client_message().contains("connection reset"));
        assert_eq!(err.error_type(), "ProcedureInvocation");
    }

    #[test]
    fn test_detailed_message_includes_source_chain() {
        let err = AppError::from(anyhow::anyhow!("disk full").context("writing upload"));
        let details = err.detailed_message();
        assert!(details.contains("writing upload"));
        assert!(details.contains("Caused by"));
    }
}
