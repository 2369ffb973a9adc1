use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::FileStatus;
use super::tenant::TenantKeys;

/// One uploaded batch and its lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: Uuid,
    pub filename: String,
    pub stored_path: String,
    pub file_hash: String,
    pub file_type: String,
    pub uploaded_by: String,
    pub upload_date: DateTime<Utc>,
    #[serde(flatten)]
    pub tenant: TenantKeys,
    pub total_records: i32,
    pub success_count: i32,
    pub failure_count: i32,
    pub status: FileStatus,
    /// Assigned when a payment request is generated.
    pub file_reference_number: Option<String>,
}

/// Fields known when a file is first accepted.
#[derive(Debug, Clone)]
pub struct NewUploadedFile {
    pub filename: String,
    pub stored_path: String,
    pub file_hash: String,
    pub file_type: String,
    pub uploaded_by: String,
    pub tenant: TenantKeys,
}

impl UploadedFile {
    pub fn from_new(new: NewUploadedFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: new.filename,
            stored_path: new.stored_path,
            file_hash: new.file_hash,
            file_type: new.file_type,
            uploaded_by: new.uploaded_by,
            upload_date: Utc::now(),
            tenant: new.tenant,
            total_records: 0,
            success_count: 0,
            failure_count: 0,
            status: FileStatus::Uploaded,
            file_reference_number: None,
        }
    }

    /// Counters never exceed the parsed total.
    pub fn counters_consistent(&self) -> bool {
        self.success_count >= 0
            && self.failure_count >= 0
            && self.success_count + self.failure_count <= self.total_records
    }
}

/// Lowercased extension of a filename, without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}
