//! Positional row to canonical [`UploadedRecord`].
//!
//! Column layout (zero-based): worker id, employee name, employer reg no, toli reg no,
//! month, day 1..31, total days, amount, advance, net payable, payment type, txn ref.
//! Rows must carry at least [`MIN_COLUMNS`] fields; anything after txn ref is ignored.

use std::str::FromStr;

use payflow_core::models::{TenantKeys, UploadedRecord, DAYS_PER_MONTH};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::parser::ParsedRow;

pub const MIN_COLUMNS: usize = 44;

const COL_WORKER_ID: usize = 0;
const COL_EMPLOYEE_NAME: usize = 1;
const COL_EMPLOYER_REG_NO: usize = 2;
const COL_TOLI_REG_NO: usize = 3;
const COL_MONTH: usize = 4;
const COL_FIRST_DAY: usize = 5;
const COL_TOTAL_DAYS: usize = COL_FIRST_DAY + DAYS_PER_MONTH;
const COL_AMOUNT: usize = COL_TOTAL_DAYS + 1;
const COL_ADVANCE: usize = COL_AMOUNT + 1;
const COL_NET_PAYABLE: usize = COL_ADVANCE + 1;
const COL_PAYMENT_TYPE: usize = COL_NET_PAYABLE + 1;
const COL_TXN_REF: usize = COL_PAYMENT_TYPE + 1;

/// A row with too few columns. The record is still kept, with only its keys set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Row {line}: insufficient columns (expected >= {expected}, got {found})")]
pub struct StructuralRowError {
    pub line: u64,
    pub found: usize,
    pub expected: usize,
}

#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub record: UploadedRecord,
    pub structural_error: Option<StructuralRowError>,
}

/// Map one parsed row onto a fresh UPLOADED record for `file_id`.
pub fn normalize_row(row: &ParsedRow, file_id: Uuid, tenant: &TenantKeys) -> NormalizedRow {
    let mut record = UploadedRecord::empty(file_id, *tenant);
    let fields = &row.fields;

    if fields.len() < MIN_COLUMNS {
        let err = StructuralRowError {
            line: row.line,
            found: fields.len(),
            expected: MIN_COLUMNS,
        };
        tracing::error!(file_id = %file_id, row = row.line, found = fields.len(), "{}", err);
        return NormalizedRow {
            record,
            structural_error: Some(err),
        };
    }

    record.worker_id = clean_field(&fields[COL_WORKER_ID]);
    record.employee_name = clean_field(&fields[COL_EMPLOYEE_NAME]);
    record.employer_reg_no = clean_field(&fields[COL_EMPLOYER_REG_NO]);
    record.toli_reg_no = clean_field(&fields[COL_TOLI_REG_NO]);
    record.month = clean_field(&fields[COL_MONTH]);
    for (day, raw) in record
        .days
        .iter_mut()
        .zip(&fields[COL_FIRST_DAY..COL_TOTAL_DAYS])
    {
        *day = parse_int_field(raw);
    }
    record.total_days = parse_int_field(&fields[COL_TOTAL_DAYS]);
    record.amount = parse_decimal_field(&fields[COL_AMOUNT]);
    record.advance = parse_decimal_field(&fields[COL_ADVANCE]);
    record.net_payable = parse_decimal_field(&fields[COL_NET_PAYABLE]);
    record.payment_type = clean_field(&fields[COL_PAYMENT_TYPE]);
    record.txn_ref = clean_field(&fields[COL_TXN_REF]);

    NormalizedRow {
        record,
        structural_error: None,
    }
}

/// Trim, strip surrounding quotes, blank to `None`.
pub fn clean_field(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches('"').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Whole numbers only; spreadsheet values like `22.0` are accepted.
pub fn parse_int_field(raw: &str) -> Option<i32> {
    let cleaned = clean_field(raw)?;
    if let Ok(value) = cleaned.parse::<i32>() {
        return Some(value);
    }
    parse_decimal_field(&cleaned)
        .filter(|d| d.fract().is_zero())
        .and_then(|d| d.to_i32())
}

pub fn parse_decimal_field(raw: &str) -> Option<Decimal> {
    let cleaned = clean_field(raw)?;
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}
