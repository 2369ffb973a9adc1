//! Delegated validation and payment creation through the database procedures.

use std::sync::Arc;

use async_trait::async_trait;
use payflow_core::models::Principal;
use payflow_core::AppError;
use payflow_db::ProcedureGateway;
use serde::Deserialize;
use uuid::Uuid;

use crate::validator::{ValidationOutcome, Validator};

#[derive(Debug, Default, Deserialize)]
struct ProcedureCounts {
    #[serde(default)]
    total_records: i64,
    #[serde(default)]
    valid_count: i64,
    #[serde(default)]
    invalid_count: i64,
}

/// Read the validate procedure's JSON output.
///
/// Missing keys count as zero. Output that is not a JSON object yields an all-zero
/// outcome with `all_valid = false`; the raw text is always kept.
pub fn parse_validation_output(raw: &str) -> ValidationOutcome {
    match serde_json::from_str::<ProcedureCounts>(raw) {
        Ok(counts) => ValidationOutcome {
            total: counts.total_records,
            valid: counts.valid_count,
            invalid: counts.invalid_count,
            all_valid: counts.invalid_count == 0,
            raw_json: Some(raw.to_string()),
            failures: Vec::new(),
        },
        Err(e) => {
            tracing::warn!(error = %e, raw = %raw, "Unparseable validation procedure output");
            ValidationOutcome {
                raw_json: Some(raw.to_string()),
                ..ValidationOutcome::default()
            }
        }
    }
}

pub struct ProcedureBridge {
    gateway: Arc<dyn ProcedureGateway>,
}

impl ProcedureBridge {
    pub fn new(gateway: Arc<dyn ProcedureGateway>) -> Self {
        Self { gateway }
    }

    /// Numeric identity to bind to the procedure session, if one can be resolved.
    fn identity(principal: &Principal) -> Option<i64> {
        let user_id = principal.numeric_user_id();
        if user_id.is_none() {
            if principal.authenticated {
                tracing::warn!(
                    principal = %principal.name,
                    "Could not resolve a numeric user id, calling procedure without user context"
                );
            } else {
                tracing::warn!("No authenticated principal, calling procedure without user context");
            }
        }
        user_id
    }

    /// Create payments for a fully validated file; returns the procedure's receipt.
    #[tracing::instrument(skip(self, principal), fields(file_id = %file_id))]
    pub async fn create_payments(
        &self,
        file_id: Uuid,
        principal: &Principal,
    ) -> Result<String, AppError> {
        let user_id = Self::identity(principal);
        let receipt = self
            .gateway
            .create_payments(file_id, user_id)
            .await
            .inspect_err(|e| {
                tracing::error!(file_id = %file_id, error = %e, "Payment procedure failed");
            })?;

        tracing::info!(file_id = %file_id, receipt_number = %receipt, "Payment procedure created receipt");
        Ok(receipt)
    }
}

#[async_trait]
impl Validator for ProcedureBridge {
    fn name(&self) -> &'static str {
        "procedure"
    }

    #[tracing::instrument(skip(self, principal), fields(validator = "procedure", file_id = %file_id))]
    async fn validate(
        &self,
        file_id: Uuid,
        principal: &Principal,
    ) -> Result<ValidationOutcome, AppError> {
        let user_id = Self::identity(principal);
        let raw = self
            .gateway
            .validate_uploaded_data(file_id, user_id)
            .await
            .inspect_err(|e| {
                tracing::error!(file_id = %file_id, error = %e, "Validation procedure failed");
            })?;

        let outcome = parse_validation_output(&raw);
        tracing::info!(
            file_id = %file_id,
            total = outcome.total,
            valid = outcome.valid,
            invalid = outcome.invalid,
            all_valid = outcome.all_valid,
            "Validation procedure complete"
        );
        Ok(outcome)
    }
}
