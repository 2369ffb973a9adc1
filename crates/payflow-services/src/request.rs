//! Payment request generation: validated records to payables under one receipt.

use std::sync::Arc;

use payflow_core::models::{
    BatchReport, NewPayableRecord, NewReceipt, PayableRecord, Receipt, RecordStatus,
};
use payflow_core::AppError;
use payflow_db::{PayableRecordStore, ReceiptStore, RecordStatusUpdate, UploadedRecordStore};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Result of one generation run.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    pub receipt: Receipt,
    /// `applied` counts source records moved to REQUEST_GENERATED
    pub report: BatchReport,
}

impl GenerationReport {
    pub fn processed(&self) -> usize {
        self.report.applied
    }
}

/// Converts a file's VALIDATED records into payable records and one receipt.
///
/// Every step after receipt creation is best-effort per item. Running it twice on the
/// same file creates a second receipt for whatever is still VALIDATED; callers guard
/// against that (see `PaymentFlowService::generate_request`).
#[derive(Clone)]
pub struct RequestGenerator {
    records: Arc<dyn UploadedRecordStore>,
    payables: Arc<dyn PayableRecordStore>,
    receipts: Arc<dyn ReceiptStore>,
}

impl RequestGenerator {
    pub fn new(
        records: Arc<dyn UploadedRecordStore>,
        payables: Arc<dyn PayableRecordStore>,
        receipts: Arc<dyn ReceiptStore>,
    ) -> Self {
        Self {
            records,
            payables,
            receipts,
        }
    }

    #[tracing::instrument(skip(self), fields(file_id = %file_id))]
    pub async fn generate(&self, file_id: Uuid) -> Result<GenerationReport, AppError> {
        let validated = self
            .records
            .find_by_file_and_status(file_id, RecordStatus::Validated)
            .await?;

        if validated.is_empty() {
            return Err(AppError::NoValidatedRecords(file_id));
        }

        let mut report = BatchReport::default();

        let mut created: Vec<PayableRecord> = Vec::with_capacity(validated.len());
        for record in &validated {
            match self
                .payables
                .insert(NewPayableRecord::from_record(record))
                .await
            {
                Ok(payable) => created.push(payable),
                Err(e) => {
                    tracing::error!(
                        record_id = %record.id,
                        error = %e,
                        "Failed to create payable record, skipping"
                    );
                    report.record_failure(record.id, &e);
                }
            }
        }

        if created.is_empty() {
            return Err(AppError::Internal(format!(
                "no payable records could be created for file {}",
                file_id
            )));
        }

        let total_amount: Decimal = created.iter().map(PayableRecord::payable_amount).sum();
        let receipt = self
            .receipts
            .create(NewReceipt {
                file_id,
                payable_ids: created.iter().map(|p| p.id).collect(),
                total_amount,
            })
            .await
            .inspect_err(|e| {
                tracing::error!(
                    file_id = %file_id,
                    payables = created.len(),
                    error = %e,
                    "Receipt creation failed; payable records remain without a receipt"
                );
            })?;

        tracing::info!(
            file_id = %file_id,
            receipt_number = %receipt.receipt_number,
            attempt = receipt.attempt,
            payables = created.len(),
            total_amount = %total_amount,
            "Receipt created"
        );

        for payable in &created {
            if let Err(e) = self
                .payables
                .set_receipt_number(payable.id, &receipt.receipt_number)
                .await
            {
                tracing::error!(
                    payable_id = %payable.id,
                    receipt_number = %receipt.receipt_number,
                    error = %e,
                    "Failed to backfill receipt number, skipping"
                );
                report.record_failure(payable.source_record_id, &e);
            }
        }

        for payable in &created {
            let update = RecordStatusUpdate::request_generated(
                payable.source_record_id,
                receipt.receipt_number.clone(),
            );
            match self.records.update_status(&update).await {
                Ok(()) => report.record_success(),
                Err(e) => {
                    tracing::error!(
                        record_id = %payable.source_record_id,
                        error = %e,
                        "Failed to mark record REQUEST_GENERATED, skipping"
                    );
                    report.record_failure(payable.source_record_id, &e);
                }
            }
        }

        tracing::info!(
            file_id = %file_id,
            receipt_number = %receipt.receipt_number,
            processed = report.applied,
            failed = report.failures.len(),
            "Payment request generated"
        );

        Ok(GenerationReport { receipt, report })
    }
}
