//! Configuration module
//!
//! Settings for the database pool, the upload guards, the ingestion parser and the
//! choice of validation path. Everything is read from the environment (optionally
//! seeded from a `.env` file).

use std::env;
use std::fmt;
use std::str::FromStr;

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const MAX_UPLOAD_SIZE_MB: usize = 25;
const SPREADSHEET_DATE_COLUMN: usize = 4;

/// Extensions the row parser knows how to read.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xls", "xlsx"];

/// Which validator runs after an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// In-process rule engine
    #[default]
    Rules,
    /// Database-side validation and payment procedures
    Procedure,
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMode::Rules => write!(f, "rules"),
            ValidationMode::Procedure => write!(f, "procedure"),
        }
    }
}

impl FromStr for ValidationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rules" | "rule" => Ok(ValidationMode::Rules),
            "procedure" | "proc" | "db" => Ok(ValidationMode::Procedure),
            _ => Err(anyhow::anyhow!("Invalid validation mode: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PayflowConfig {
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub environment: String,
    pub validation_mode: ValidationMode,
    /// Run request generation straight after a fully successful validation.
    pub auto_generate_request: bool,
    pub max_upload_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    /// Zero-based spreadsheet column rendered as an ISO date when date-formatted.
    pub spreadsheet_date_column: usize,
    pub local_storage_path: String,
    pub upload_folder: String,
}

impl Default for PayflowConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_max_connections: MAX_CONNECTIONS,
            db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            environment: "development".to_string(),
            validation_mode: ValidationMode::Rules,
            auto_generate_request: false,
            max_upload_size_bytes: MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            allowed_extensions: SUPPORTED_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            spreadsheet_date_column: SPREADSHEET_DATE_COLUMN,
            local_storage_path: "./data/uploads".to_string(),
            upload_folder: "workerpayments".to_string(),
        }
    }
}

impl PayflowConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());

        let db_max_connections = lookup("DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| MAX_CONNECTIONS.to_string())
            .parse::<u32>()
            .unwrap_or(MAX_CONNECTIONS);

        let db_timeout_seconds = lookup("DB_TIMEOUT_SECONDS")
            .unwrap_or_else(|| CONNECTION_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .unwrap_or(CONNECTION_TIMEOUT_SECS);

        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let validation_mode = match lookup("VALIDATION_MODE") {
            Some(raw) => raw.parse::<ValidationMode>()?,
            None => ValidationMode::Rules,
        };

        let auto_generate_request = lookup("AUTO_GENERATE_REQUEST")
            .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
            .unwrap_or(false);

        let max_upload_size_mb = lookup("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        let allowed_extensions = lookup("UPLOAD_ALLOWED_EXTENSIONS")
            .unwrap_or_else(|| SUPPORTED_EXTENSIONS.join(","))
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        let spreadsheet_date_column = lookup("SPREADSHEET_DATE_COLUMN")
            .unwrap_or_else(|| SPREADSHEET_DATE_COLUMN.to_string())
            .parse::<usize>()
            .unwrap_or(SPREADSHEET_DATE_COLUMN);

        let local_storage_path =
            lookup("LOCAL_STORAGE_PATH").unwrap_or_else(|| "./data/uploads".to_string());

        let upload_folder = lookup("UPLOAD_FOLDER").unwrap_or_else(|| "workerpayments".to_string());

        Ok(Self {
            database_url,
            db_max_connections,
            db_timeout_seconds,
            environment,
            validation_mode,
            auto_generate_request,
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            allowed_extensions,
            spreadsheet_date_column,
            local_storage_path,
            upload_folder,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.db_max_connections == 0 {
            return Err(anyhow::anyhow!("DB_MAX_CONNECTIONS must be greater than 0"));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        if self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "UPLOAD_ALLOWED_EXTENSIONS must list at least one extension"
            ));
        }

        if let Some(ext) = self
            .allowed_extensions
            .iter()
            .find(|ext| !SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        {
            return Err(anyhow::anyhow!(
                "UPLOAD_ALLOWED_EXTENSIONS contains unsupported extension '{}'",
                ext
            ));
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn require_database_url(&self) -> Result<&str, anyhow::Error> {
        self.database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))
    }

    pub fn db_max_connections(&self) -> u32 {
        self.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.db_timeout_seconds
    }

    pub fn validation_mode(&self) -> ValidationMode {
        self.validation_mode
    }

    pub fn auto_generate_request(&self) -> bool {
        self.auto_generate_request
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.max_upload_size_bytes
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn is_extension_allowed(&self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.').to_lowercase();
        self.allowed_extensions.iter().any(|e| *e == ext)
    }

    pub fn spreadsheet_date_column(&self) -> usize {
        self.spreadsheet_date_column
    }

    pub fn local_storage_path(&self) -> &str {
        &self.local_storage_path
    }

    pub fn upload_folder(&self) -> &str {
        &self.upload_folder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = PayflowConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.db_max_connections(), 20);
        assert_eq!(config.db_timeout_seconds(), 30);
        assert_eq!(config.validation_mode(), ValidationMode::Rules);
        assert!(!config.auto_generate_request());
        assert_eq!(config.max_upload_size_bytes(), 25 * 1024 * 1024);
        assert_eq!(config.allowed_extensions(), &["csv", "xls", "xlsx"]);
        assert_eq!(config.spreadsheet_date_column(), 4);
        assert_eq!(config.upload_folder(), "workerpayments");
        assert!(config.database_url.is_none());
        assert!(config.require_database_url().is_err());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let config = PayflowConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgresql://localhost/payflow"),
            ("DB_MAX_CONNECTIONS", "not-a-number"),
            ("VALIDATION_MODE", "procedure"),
            ("AUTO_GENERATE_REQUEST", "TRUE"),
            ("UPLOAD_ALLOWED_EXTENSIONS", " .CSV , xlsx "),
        ]))
        .unwrap();
        assert_eq!(config.db_max_connections(), 20);
        assert_eq!(config.validation_mode(), ValidationMode::Procedure);
        assert!(config.auto_generate_request());
        assert_eq!(config.allowed_extensions(), &["csv", "xlsx"]);
        assert!(config.is_extension_allowed(".CSV"));
        assert!(!config.is_extension_allowed("xls"));
        assert_eq!(
            config.require_database_url().unwrap(),
            "postgresql://localhost/payflow"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_validation_mode_is_rejected() {
        let result = PayflowConfig::from_lookup(lookup_from(&[("VALIDATION_MODE", "magic")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_unsupported_extension() {
        let config =
            PayflowConfig::from_lookup(lookup_from(&[("UPLOAD_ALLOWED_EXTENSIONS", "csv,pdf")]))
                .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pdf"));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = PayflowConfig {
            db_max_connections: 0,
            ..PayflowConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PayflowConfig {
            max_upload_size_bytes: 0,
            ..PayflowConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
