//! Shared key generation for storage backends.

use payflow_core::models::TenantKeys;

/// `{folder}/{tenant prefix}/{filename}`
pub fn generate_storage_key(tenant: &TenantKeys, folder: &str, filename: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        format!("{}/{}", tenant.storage_prefix(), filename)
    } else {
        format!("{}/{}/{}", folder, tenant.storage_prefix(), filename)
    }
}
