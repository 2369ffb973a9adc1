use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unit of aggregation for one request-generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub receipt_number: String,
    pub file_id: Uuid,
    /// 1 for the first generation run on a file, 2 for a repeat, and so on.
    pub attempt: i32,
    pub payable_ids: Vec<Uuid>,
    pub record_count: i32,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReceipt {
    pub file_id: Uuid,
    pub payable_ids: Vec<Uuid>,
    pub total_amount: Decimal,
}

/// `RCP-YYYYMMDD-xxxxxxxx`
pub fn generate_receipt_number(now: DateTime<Utc>) -> String {
    format!("RCP-{}-{}", now.format("%Y%m%d"), short_token())
}

/// `REQ-YYYYMMDD-xxxxxxxx`
pub fn generate_request_reference(now: DateTime<Utc>) -> String {
    format!("REQ-{}-{}", now.format("%Y%m%d"), short_token())
}

fn short_token() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    simple[..8].to_uppercase()
}
