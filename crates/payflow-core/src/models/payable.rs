use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::record::UploadedRecord;
use super::tenant::TenantKeys;

/// A payment line derived from one validated record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayableRecord {
    pub id: Uuid,
    pub file_id: Uuid,
    pub source_record_id: Uuid,
    #[serde(flatten)]
    pub tenant: TenantKeys,
    pub worker_id: Option<String>,
    pub employee_name: Option<String>,
    pub employer_reg_no: Option<String>,
    pub toli_reg_no: Option<String>,
    pub month: Option<String>,
    pub total_days: Option<i32>,
    pub basic_wages: Option<Decimal>,
    pub advance: Option<Decimal>,
    pub gross_wages: Option<Decimal>,
    pub levy: Option<Decimal>,
    pub net_wages_payable: Option<Decimal>,
    pub payment_type: Option<String>,
    pub txn_ref: Option<String>,
    /// Backfilled once the covering receipt exists.
    pub receipt_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Payable fields before persistence assigns an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayableRecord {
    pub file_id: Uuid,
    pub source_record_id: Uuid,
    pub tenant: TenantKeys,
    pub worker_id: Option<String>,
    pub employee_name: Option<String>,
    pub employer_reg_no: Option<String>,
    pub toli_reg_no: Option<String>,
    pub month: Option<String>,
    pub total_days: Option<i32>,
    pub basic_wages: Option<Decimal>,
    pub advance: Option<Decimal>,
    pub gross_wages: Option<Decimal>,
    pub levy: Option<Decimal>,
    pub net_wages_payable: Option<Decimal>,
    pub payment_type: Option<String>,
    pub txn_ref: Option<String>,
}

impl NewPayableRecord {
    /// Carry the monetary and identifying fields of a validated record forward.
    ///
    /// Net wages fall back to `amount - advance` when the row had no explicit net figure.
    pub fn from_record(record: &UploadedRecord) -> Self {
        let net_wages_payable = record.net_payable.or_else(|| {
            record
                .amount
                .map(|amount| amount - record.advance.unwrap_or(Decimal::ZERO))
        });

        Self {
            file_id: record.file_id,
            source_record_id: record.id,
            tenant: record.tenant,
            worker_id: record.worker_id.clone(),
            employee_name: record.employee_name.clone(),
            employer_reg_no: record.employer_reg_no.clone(),
            toli_reg_no: record.toli_reg_no.clone(),
            month: record.month.clone(),
            total_days: record.total_days,
            basic_wages: record.amount,
            advance: record.advance,
            gross_wages: record.amount,
            levy: None,
            net_wages_payable,
            payment_type: record.payment_type.clone(),
            txn_ref: record.txn_ref.clone(),
        }
    }

    pub fn into_payable(self, id: Uuid) -> PayableRecord {
        PayableRecord {
            id,
            file_id: self.file_id,
            source_record_id: self.source_record_id,
            tenant: self.tenant,
            worker_id: self.worker_id,
            employee_name: self.employee_name,
            employer_reg_no: self.employer_reg_no,
            toli_reg_no: self.toli_reg_no,
            month: self.month,
            total_days: self.total_days,
            basic_wages: self.basic_wages,
            advance: self.advance,
            gross_wages: self.gross_wages,
            levy: self.levy,
            net_wages_payable: self.net_wages_payable,
            payment_type: self.payment_type,
            txn_ref: self.txn_ref,
            receipt_number: None,
            created_at: Utc::now(),
        }
    }
}

impl PayableRecord {
    /// Amount this line contributes to its receipt total.
    pub fn payable_amount(&self) -> Decimal {
        self.net_wages_payable
            .or(self.gross_wages)
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_record_maps_wages() {
        let mut record = UploadedRecord::empty(Uuid::new_v4(), TenantKeys::new(3, Some(4), None));
        record.worker_id = Some("W1".to_string());
        record.amount = Some(Decimal::new(15000, 0));
        record.advance = Some(Decimal::new(500, 0));
        record.month = Some("2024-01".to_string());

        let new = NewPayableRecord::from_record(&record);
        assert_eq!(new.source_record_id, record.id);
        assert_eq!(new.basic_wages, Some(Decimal::new(15000, 0)));
        assert_eq!(new.gross_wages, Some(Decimal::new(15000, 0)));
        assert_eq!(new.net_wages_payable, Some(Decimal::new(14500, 0)));
        assert_eq!(new.levy, None);
        assert_eq!(new.tenant.board_id, 3);

        let payable = new.into_payable(Uuid::new_v4());
        assert!(payable.receipt_number.is_none());
        assert_eq!(payable.payable_amount(), Decimal::new(14500, 0));
    }

    #[test]
    fn test_explicit_net_payable_wins() {
        let mut record = UploadedRecord::empty(Uuid::new_v4(), TenantKeys::new(1, None, None));
        record.amount = Some(Decimal::new(1000, 0));
        record.advance = Some(Decimal::new(100, 0));
        record.net_payable = Some(Decimal::new(950, 0));

        let new = NewPayableRecord::from_record(&record);
        assert_eq!(new.net_wages_payable, Some(Decimal::new(950, 0)));
    }
}
