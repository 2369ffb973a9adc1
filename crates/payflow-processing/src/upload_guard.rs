use payflow_core::models::file_extension;
use payflow_core::AppError;
use sha2::{Digest, Sha256};

/// Reasons an upload is refused before anything is stored
#[derive(Debug, thiserror::Error)]
pub enum UploadGuardError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid file extension: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Empty file")]
    EmptyFile,
}

impl From<UploadGuardError> for AppError {
    fn from(err: UploadGuardError) -> Self {
        match err {
            UploadGuardError::FileTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            UploadGuardError::InvalidExtension { .. } => {
                AppError::UnsupportedFileType(err.to_string())
            }
            UploadGuardError::InvalidFilename(_) => AppError::InvalidInput(err.to_string()),
            UploadGuardError::EmptyFile => AppError::EmptyFile(err.to_string()),
        }
    }
}

/// Size and extension checks for an incoming wage file.
pub struct UploadValidator {
    max_file_size: usize,
    allowed_extensions: Vec<String>,
}

impl UploadValidator {
    pub fn new(max_file_size: usize, allowed_extensions: Vec<String>) -> Self {
        Self {
            max_file_size,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    pub fn validate_file_size(&self, size: usize) -> Result<(), UploadGuardError> {
        if size == 0 {
            return Err(UploadGuardError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(UploadGuardError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Returns the lowercased extension when it is on the allow-list.
    pub fn validate_extension(&self, filename: &str) -> Result<String, UploadGuardError> {
        let extension = file_extension(filename)
            .ok_or_else(|| UploadGuardError::InvalidFilename(filename.to_string()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(UploadGuardError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(extension)
    }

    /// Run every check; returns the accepted extension.
    pub fn validate_all(&self, filename: &str, size: usize) -> Result<String, UploadGuardError> {
        if filename.trim().is_empty() || filename.contains('/') || filename.contains('\\') {
            return Err(UploadGuardError::InvalidFilename(filename.to_string()));
        }
        let extension = self.validate_extension(filename)?;
        self.validate_file_size(size)?;
        Ok(extension)
    }
}

/// Lowercase hex SHA-256 of the file content.
pub fn compute_file_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
