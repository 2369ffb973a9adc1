//! Batch validation
//!
//! Two interchangeable ways of validating a file's records, picked by
//! [`ValidationMode`](payflow_core::ValidationMode): in-process rules ([`RuleValidator`])
//! or the database procedure ([`ProcedureBridge`](crate::bridge::ProcedureBridge)).
//! Both report a [`ValidationOutcome`], so the workflow never needs to know which one ran.

mod rules;

pub use rules::RuleValidator;

use async_trait::async_trait;
use payflow_core::models::{ItemFailure, Principal, ValidationSummary};
use payflow_core::AppError;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationOutcome {
    pub total: i64,
    pub valid: i64,
    pub invalid: i64,
    pub all_valid: bool,
    /// Raw procedure output, when a procedure produced the outcome
    pub raw_json: Option<String>,
    /// Records whose verdict could not be saved
    pub failures: Vec<ItemFailure>,
}

impl ValidationOutcome {
    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            total: self.total,
            valid: self.valid,
            invalid: self.invalid,
            all_valid: self.all_valid,
            raw: self.raw_json.clone(),
        }
    }
}

#[async_trait]
pub trait Validator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Validate every record of `file_id` still awaiting a verdict.
    async fn validate(
        &self,
        file_id: Uuid,
        principal: &Principal,
    ) -> Result<ValidationOutcome, AppError>;
}
