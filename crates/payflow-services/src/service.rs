//! Upload, validation and request-generation entry points.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use payflow_core::models::{
    generate_request_reference, DeleteFileResponse, FileStatus, GenerateRequestResponse,
    ItemFailure, NewUploadedFile, NextAction, Principal, ReuploadResponse, UploadResponse, UploadedFile,
    UploadedRecord, ValidateFileResponse,
};
use payflow_core::{AppError, PayflowConfig, ValidationMode};
use payflow_db::{
    PayableRecordStore, ProcedureGateway, ReceiptStore, TenantAccessResolver, UploadedFileStore,
    UploadedRecordStore,
};
use payflow_processing::{
    compute_file_hash, normalize_row, parse_rows, ParserOptions, UploadValidator,
};
use payflow_storage::Storage;
use uuid::Uuid;

use crate::bridge::ProcedureBridge;
use crate::request::RequestGenerator;
use crate::validator::{RuleValidator, ValidationOutcome, Validator};
use crate::workflow;

/// Every persistence collaborator the pipeline needs.
#[derive(Clone)]
pub struct PayflowStores {
    pub files: Arc<dyn UploadedFileStore>,
    pub records: Arc<dyn UploadedRecordStore>,
    pub payables: Arc<dyn PayableRecordStore>,
    pub receipts: Arc<dyn ReceiptStore>,
    pub tenants: Arc<dyn TenantAccessResolver>,
}

/// A file as received from the caller.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub data: Bytes,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// The payment-flow pipeline for one deployment.
///
/// Every entry point takes the caller's [`Principal`] explicitly; nothing is read from
/// ambient state.
#[derive(Clone)]
pub struct PaymentFlowService {
    pub(crate) stores: PayflowStores,
    storage: Arc<dyn Storage>,
    validator: Arc<dyn Validator>,
    bridge: Option<Arc<ProcedureBridge>>,
    generator: RequestGenerator,
    upload_validator: Arc<UploadValidator>,
    parser_options: ParserOptions,
    upload_folder: String,
    auto_generate_request: bool,
}

impl PaymentFlowService {
    /// Wire the pipeline. Procedure mode requires `gateway`.
    pub fn new(
        config: &PayflowConfig,
        stores: PayflowStores,
        storage: Arc<dyn Storage>,
        gateway: Option<Arc<dyn ProcedureGateway>>,
    ) -> Result<Self, AppError> {
        let bridge = gateway.map(|g| Arc::new(ProcedureBridge::new(g)));

        let validator: Arc<dyn Validator> = match config.validation_mode() {
            ValidationMode::Rules => {
                Arc::new(RuleValidator::new(stores.records.clone())) as Arc<dyn Validator>
            }
            ValidationMode::Procedure => match &bridge {
                Some(bridge) => bridge.clone() as Arc<dyn Validator>,
                None => {
                    return Err(AppError::InvalidInput(
                        "procedure validation mode requires a procedure gateway".to_string(),
                    ))
                }
            },
        };

        tracing::info!(
            validator = validator.name(),
            auto_generate_request = config.auto_generate_request(),
            "Payment flow service initialized"
        );

        Ok(Self {
            generator: RequestGenerator::new(
                stores.records.clone(),
                stores.payables.clone(),
                stores.receipts.clone(),
            ),
            stores,
            storage,
            validator,
            bridge: if config.validation_mode() == ValidationMode::Procedure {
                bridge
            } else {
                None
            },
            upload_validator: Arc::new(UploadValidator::new(
                config.max_upload_size_bytes(),
                config.allowed_extensions().to_vec(),
            )),
            parser_options: ParserOptions {
                date_column: config.spreadsheet_date_column(),
            },
            upload_folder: config.upload_folder().to_string(),
            auto_generate_request: config.auto_generate_request(),
        })
    }

    pub(crate) async fn require_file(&self, file_id: Uuid) -> Result<UploadedFile, AppError> {
        self.stores
            .files
            .get(file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_id)))
    }

    /// Store, parse and persist one file, then validate it.
    ///
    /// In procedure mode a fully valid file also gets its payments created; in rules mode
    /// the payment request is generated right away when `AUTO_GENERATE_REQUEST` is set.
    /// Validator and procedure failures end the file in VALIDATION_FAILED and are
    /// reported in `error` rather than returned.
    #[tracing::instrument(skip(self, upload, principal), fields(filename = %upload.filename, size_bytes = upload.data.len()))]
    pub async fn handle_upload(
        &self,
        upload: FileUpload,
        principal: &Principal,
    ) -> Result<UploadResponse, AppError> {
        let tenant = self.stores.tenants.resolve(principal).await?.ok_or_else(|| {
            AppError::NoTenantAccess("User has no tenant access assigned for uploads".to_string())
        })?;

        let extension = self
            .upload_validator
            .validate_all(&upload.filename, upload.data.len())?;
        let file_hash = compute_file_hash(&upload.data);

        // Opening the stream consumes the header, so empty and unsupported files are
        // refused before anything is stored.
        let rows = parse_rows(upload.data.clone(), &extension, &self.parser_options)?;

        let stored_name = format!("{}_{}", Uuid::new_v4(), upload.filename);
        let stored = self
            .storage
            .upload(&tenant, &self.upload_folder, &stored_name, upload.data)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;

        let mut file = self
            .stores
            .files
            .create(NewUploadedFile {
                filename: upload.filename.clone(),
                stored_path: stored.path.clone(),
                file_hash,
                file_type: extension,
                uploaded_by: principal.name.clone(),
                tenant,
            })
            .await?;

        tracing::info!(file_id = %file.id, path = %stored.path, "File stored");

        let mut structural = 0usize;
        let records: Vec<UploadedRecord> = rows
            .map(|row| {
                let normalized = normalize_row(&row, file.id, &tenant);
                if normalized.structural_error.is_some() {
                    structural += 1;
                }
                normalized.record
            })
            .collect();

        file.total_records = records.len() as i32;
        self.stores.files.update(&file).await?;
        self.stores.records.insert_many(&records).await?;

        tracing::info!(
            file_id = %file.id,
            records = records.len(),
            structural_errors = structural,
            "Records saved"
        );

        let mut response = UploadResponse {
            file_id: file.id,
            message: String::new(),
            path: stored.path,
            record_count: file.total_records,
            validation: None,
            receipt_number: None,
            status: file.status,
            error: None,
            failures: Vec::new(),
        };

        match self.validator.validate(file.id, principal).await {
            Ok(outcome) => {
                workflow::apply_validation_outcome(&mut file, &outcome)?;
                response.validation = Some(outcome.summary());
                response.failures = outcome.failures.clone();
                self.stores.files.update(&file).await?;
                self.after_validation(&mut file, &outcome, principal, &mut response)
                    .await?;
            }
            Err(e) => {
                tracing::error!(file_id = %file.id, error = %e, "Validation failed for upload");
                workflow::mark_validation_failed(&mut file, &e.to_string())?;
                self.stores.files.update(&file).await?;
                response.error = Some(e.to_string());
            }
        }

        response.message = match (self.bridge.is_some(), response.error.is_some()) {
            (_, true) => "File uploaded, but validation did not complete.".to_string(),
            (true, false) => "File uploaded successfully. Validation executed in DB.".to_string(),
            (false, false) => format!(
                "File uploaded successfully. {} of {} records passed validation.",
                file.success_count, file.total_records
            ),
        };
        response.status = file.status;
        Ok(response)
    }

    async fn after_validation(
        &self,
        file: &mut UploadedFile,
        outcome: &ValidationOutcome,
        principal: &Principal,
        response: &mut UploadResponse,
    ) -> Result<(), AppError> {
        if let Some(bridge) = &self.bridge {
            if !(outcome.all_valid && outcome.valid > 0) {
                return Ok(());
            }
            match bridge.create_payments(file.id, principal).await {
                Ok(receipt) => {
                    workflow::mark_request_generated(file, receipt.clone())?;
                    response.receipt_number = Some(receipt);
                }
                Err(e) => {
                    workflow::mark_validation_failed(file, &e.to_string())?;
                    response.error = Some(e.to_string());
                }
            }
            self.stores.files.update(file).await?;
            return Ok(());
        }

        if self.auto_generate_request && outcome.valid > 0 {
            match self.generate_for(file).await {
                Ok(generated) => {
                    response.receipt_number = Some(generated.receipt_number);
                    response.failures.extend(generated.failures);
                }
                Err(e) => {
                    tracing::warn!(file_id = %file.id, error = %e, "Automatic request generation failed");
                    response.error = Some(e.to_string());
                }
            }
        }
        Ok(())
    }

    /// Run (or re-run) validation for a stored file.
    #[tracing::instrument(skip(self, principal), fields(file_id = %file_id))]
    pub async fn validate_file(
        &self,
        file_id: Uuid,
        principal: &Principal,
    ) -> Result<ValidateFileResponse, AppError> {
        let mut file = self.require_file(file_id).await?;
        workflow::ensure_validatable(&file)?;

        let outcome = match self.validator.validate(file_id, principal).await {
            Ok(outcome) => outcome,
            Err(e) => {
                workflow::mark_validation_failed(&mut file, &e.to_string())?;
                self.stores.files.update(&file).await?;
                let counts = self.stores.records.status_counts(file_id).await?;
                return Ok(ValidateFileResponse {
                    file_id,
                    passed: 0,
                    failed: 0,
                    status: file.status,
                    next_action: NextAction::from_counts(&counts),
                    message: format!("Validation failed: {}", e),
                    failures: Vec::new(),
                });
            }
        };

        workflow::apply_validation_outcome(&mut file, &outcome)?;
        self.stores.files.update(&file).await?;

        let counts = self.stores.records.status_counts(file_id).await?;
        let passed = counts.validated + counts.request_generated;
        let failed = counts.rejected;

        tracing::info!(file_id = %file_id, passed, failed, "Validation complete");

        let message = if counts.validated > 0 {
            format!(
                "Validation completed. {} records passed validation. Ready to generate request.",
                passed
            )
        } else {
            "Validation completed. No records passed validation; fix the file and re-upload."
                .to_string()
        };

        Ok(ValidateFileResponse {
            file_id,
            passed,
            failed,
            status: file.status,
            next_action: NextAction::from_counts(&counts),
            message,
            failures: outcome.failures,
        })
    }

    /// Generate the payment request for a validated file.
    ///
    /// Refuses a file that already has a request, so a repeated call never creates a
    /// second receipt through this entry point.
    #[tracing::instrument(skip(self), fields(file_id = %file_id))]
    pub async fn generate_request(
        &self,
        file_id: Uuid,
    ) -> Result<GenerateRequestResponse, AppError> {
        let mut file = self.require_file(file_id).await?;

        if file.status == FileStatus::RequestGenerated {
            return Err(AppError::RequestAlreadyGenerated {
                file_id,
                reference: file.file_reference_number.clone().unwrap_or_default(),
            });
        }

        let generated = self.generate_for(&mut file).await?;
        let counts = self.stores.records.status_counts(file_id).await?;

        Ok(GenerateRequestResponse {
            file_id,
            message: format!(
                "Payment request generated for {} records. Receipt: {}",
                generated.processed, generated.receipt_number
            ),
            request_reference: generated.reference,
            receipt_number: generated.receipt_number,
            processed_records: generated.processed,
            status: file.status,
            next_action: NextAction::from_counts(&counts),
            failures: generated.failures,
        })
    }

    async fn generate_for(&self, file: &mut UploadedFile) -> Result<GeneratedRequest, AppError> {
        let counts = self.stores.records.status_counts(file.id).await?;
        if counts.validated == 0 {
            return Err(AppError::NoValidatedRecords(file.id));
        }
        if !file.status.can_transition_to(FileStatus::RequestGenerated) {
            return Err(AppError::InvalidTransition(format!(
                "file {} is {} and cannot generate a request",
                file.id, file.status
            )));
        }

        let generation = self.generator.generate(file.id).await?;
        if generation.processed() == 0 {
            tracing::error!(
                file_id = %file.id,
                receipt_number = %generation.receipt.receipt_number,
                failed = generation.report.failures.len(),
                "No record reached REQUEST_GENERATED, file left VALIDATED"
            );
            return Err(AppError::RequestNotApplied {
                file_id: file.id,
                receipt_number: generation.receipt.receipt_number,
                failures: generation.report.failures,
            });
        }
        let reference = generate_request_reference(Utc::now());

        let counts = self.stores.records.status_counts(file.id).await?;
        workflow::refresh_counters(file, &counts);
        workflow::mark_request_generated(file, reference.clone())?;
        self.stores.files.update(file).await?;

        Ok(GeneratedRequest {
            reference,
            processed: generation.processed(),
            receipt_number: generation.receipt.receipt_number,
            failures: generation.report.failures,
        })
    }

    /// Upload a corrected file in place of an earlier one.
    #[tracing::instrument(skip(self, upload, principal), fields(previous_file_id = %previous_file_id))]
    pub async fn reupload_file(
        &self,
        previous_file_id: Uuid,
        upload: FileUpload,
        principal: &Principal,
    ) -> Result<ReuploadResponse, AppError> {
        self.require_file(previous_file_id).await?;
        let upload = self.handle_upload(upload, principal).await?;
        tracing::info!(
            previous_file_id = %previous_file_id,
            new_file_id = %upload.file_id,
            "File re-uploaded"
        );
        Ok(ReuploadResponse {
            previous_file_id,
            new_file_id: upload.file_id,
            upload,
        })
    }

    /// Delete a file and its uploaded records. Payables and receipts are kept.
    #[tracing::instrument(skip(self), fields(file_id = %file_id))]
    pub async fn delete_file(&self, file_id: Uuid) -> Result<DeleteFileResponse, AppError> {
        self.require_file(file_id).await?;
        let deleted_records = self.stores.records.delete_by_file(file_id).await?;
        self.stores.files.delete(file_id).await?;
        tracing::info!(file_id = %file_id, deleted_records, "File deleted");
        Ok(DeleteFileResponse {
            file_id,
            deleted_records,
        })
    }
}

struct GeneratedRequest {
    reference: String,
    processed: usize,
    receipt_number: String,
    failures: Vec<ItemFailure>,
}
