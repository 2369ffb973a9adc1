use serde::{Deserialize, Serialize};

/// Tenant scoping keys resolved from the caller's access context, never from file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantKeys {
    pub board_id: i64,
    pub employer_id: Option<i64>,
    pub toli_id: Option<i64>,
}

impl TenantKeys {
    pub fn new(board_id: i64, employer_id: Option<i64>, toli_id: Option<i64>) -> Self {
        Self {
            board_id,
            employer_id,
            toli_id,
        }
    }

    /// Path segment used to keep stored uploads apart per tenant.
    pub fn storage_prefix(&self) -> String {
        let mut prefix = format!("board-{}", self.board_id);
        if let Some(employer_id) = self.employer_id {
            prefix.push_str(&format!("/employer-{}", employer_id));
        }
        if let Some(toli_id) = self.toli_id {
            prefix.push_str(&format!("/toli-{}", toli_id));
        }
        prefix
    }
}

/// The caller on whose behalf a pipeline operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub name: String,
    pub user_id: Option<i64>,
    pub authenticated: bool,
}

impl Principal {
    pub fn authenticated(name: impl Into<String>, user_id: Option<i64>) -> Self {
        Self {
            name: name.into(),
            user_id,
            authenticated: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            name: "anonymous".to_string(),
            user_id: None,
            authenticated: false,
        }
    }

    /// Best-effort numeric identity: the explicit id, else the name when it is all digits.
    pub fn numeric_user_id(&self) -> Option<i64> {
        if !self.authenticated {
            return None;
        }
        if self.user_id.is_some() {
            return self.user_id;
        }
        let name = self.name.trim();
        if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) {
            name.parse().ok()
        } else {
            None
        }
    }
}
