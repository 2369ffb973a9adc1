//! Business rules for a normalized record
//!
//! Rules are applied in a fixed order and every violated rule contributes its
//! message; a record is rejected when at least one message was produced.

use rust_decimal::Decimal;

use crate::models::UploadedRecord;

/// Maximum employee name length, counted in characters
pub const MAX_EMPLOYEE_NAME_LENGTH: usize = 255;

/// Largest amount accepted for a single record
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

pub const MSG_WORKER_ID_REQUIRED: &str = "Worker ID is required.";
pub const MSG_NAME_REQUIRED: &str = "Employee name is required.";
pub const MSG_NAME_TOO_LONG: &str = "Employee name must not exceed 255 characters.";
pub const MSG_AMOUNT_REQUIRED: &str = "Valid amount greater than 0 is required.";
pub const MSG_AMOUNT_TOO_HIGH: &str = "Amount seems unreasonably high (max 1,000,000).";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordVerdict {
    Valid,
    /// Space-joined messages of every violated rule, in rule order.
    Rejected(String),
}

impl RecordVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, RecordVerdict::Valid)
    }
}

pub fn check_record(record: &UploadedRecord) -> RecordVerdict {
    let mut messages: Vec<&'static str> = Vec::new();

    if record
        .worker_id
        .as_deref()
        .map_or(true, |id| id.trim().is_empty())
    {
        messages.push(MSG_WORKER_ID_REQUIRED);
    }

    match record.employee_name.as_deref() {
        Some(name) if !name.trim().is_empty() => {
            if name.chars().count() > MAX_EMPLOYEE_NAME_LENGTH {
                messages.push(MSG_NAME_TOO_LONG);
            }
        }
        _ => messages.push(MSG_NAME_REQUIRED),
    }

    match record.amount {
        Some(amount) if amount > Decimal::ZERO => {
            if amount > MAX_AMOUNT {
                messages.push(MSG_AMOUNT_TOO_HIGH);
            }
        }
        _ => messages.push(MSG_AMOUNT_REQUIRED),
    }

    if messages.is_empty() {
        RecordVerdict::Valid
    } else {
        RecordVerdict::Rejected(messages.join(" "))
    }
}
