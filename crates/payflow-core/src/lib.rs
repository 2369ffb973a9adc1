//! Payflow Core Library
//!
//! This crate provides the domain models, status enums, error types, configuration,
//! and record validation rules shared by every Payflow component.

pub mod config;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{PayflowConfig, ValidationMode};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    FileStatus, NextAction, OverallStatus, Principal, RecordStatus, TenantKeys, DAYS_PER_MONTH,
};
