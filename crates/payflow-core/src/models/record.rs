use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::RecordStatus;
use super::tenant::TenantKeys;

pub const DAYS_PER_MONTH: usize = 31;

/// One normalized row belonging to an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedRecord {
    pub id: Uuid,
    pub file_id: Uuid,
    #[serde(flatten)]
    pub tenant: TenantKeys,
    pub worker_id: Option<String>,
    pub employee_name: Option<String>,
    pub employer_reg_no: Option<String>,
    pub toli_reg_no: Option<String>,
    pub month: Option<String>,
    /// Attendance for day 1..=31, positionally.
    pub days: [Option<i32>; DAYS_PER_MONTH],
    pub total_days: Option<i32>,
    pub amount: Option<Decimal>,
    pub advance: Option<Decimal>,
    pub net_payable: Option<Decimal>,
    pub payment_type: Option<String>,
    pub txn_ref: Option<String>,
    pub status: RecordStatus,
    pub rejection_reason: Option<String>,
    /// Receipt this record was paid under, once a request has been generated.
    pub receipt_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadedRecord {
    /// A fresh UPLOADED record carrying only the file and tenant keys.
    pub fn empty(file_id: Uuid, tenant: TenantKeys) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            file_id,
            tenant,
            worker_id: None,
            employee_name: None,
            employer_reg_no: None,
            toli_reg_no: None,
            month: None,
            days: [None; DAYS_PER_MONTH],
            total_days: None,
            amount: None,
            advance: None,
            net_payable: None,
            payment_type: None,
            txn_ref: None,
            status: RecordStatus::Uploaded,
            rejection_reason: None,
            receipt_number: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attendance for a 1-based day of the month.
    pub fn day(&self, day: usize) -> Option<i32> {
        if (1..=DAYS_PER_MONTH).contains(&day) {
            self.days[day - 1]
        } else {
            None
        }
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id,
            worker_id: self.worker_id.clone(),
            employee_name: self.employee_name.clone(),
            employer_reg_no: self.employer_reg_no.clone(),
            toli_reg_no: self.toli_reg_no.clone(),
            month: self.month.clone(),
            days: self.days,
            total_days: self.total_days,
            amount: self.amount,
            advance: self.advance,
            net_payable: self.net_payable,
            payment_type: self.payment_type.clone(),
            txn_ref: self.txn_ref.clone(),
            status: self.status,
            rejection_reason: self.rejection_reason.clone(),
        }
    }
}

/// Caller-facing view of a record. Days are flattened to `day1`..`day31`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSummary {
    pub id: Uuid,
    pub worker_id: Option<String>,
    pub employee_name: Option<String>,
    pub employer_reg_no: Option<String>,
    pub toli_reg_no: Option<String>,
    pub month: Option<String>,
    pub days: [Option<i32>; DAYS_PER_MONTH],
    pub total_days: Option<i32>,
    pub amount: Option<Decimal>,
    pub advance: Option<Decimal>,
    pub net_payable: Option<Decimal>,
    pub payment_type: Option<String>,
    pub txn_ref: Option<String>,
    pub status: RecordStatus,
    pub rejection_reason: Option<String>,
}

impl Serialize for RecordSummary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(15 + DAYS_PER_MONTH))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("workerId", &self.worker_id)?;
        map.serialize_entry("employeeName", &self.employee_name)?;
        map.serialize_entry("employerRegNo", &self.employer_reg_no)?;
        map.serialize_entry("toliRegNo", &self.toli_reg_no)?;
        map.serialize_entry("month", &self.month)?;
        for (idx, value) in self.days.iter().enumerate() {
            map.serialize_entry(&format!("day{}", idx + 1), value)?;
        }
        map.serialize_entry("totalDays", &self.total_days)?;
        map.serialize_entry("amount", &self.amount)?;
        map.serialize_entry("advance", &self.advance)?;
        map.serialize_entry("netPayable", &self.net_payable)?;
        map.serialize_entry("paymentType", &self.payment_type)?;
        map.serialize_entry("txnRef", &self.txn_ref)?;
        map.serialize_entry("status", &self.status)?;
        map.serialize_entry("rejectionReason", &self.rejection_reason)?;
        map.end()
    }
}
