//! Read-side views over files and their records.
//!
//! Nothing here changes state; the derived `overallStatus` is for reporting only and
//! never feeds back into a file's own status.

use payflow_core::models::{
    AppliedFilters, FileOverview, FileSortField, FileStatusSummary, FileSummary,
    FileSummaryQuery, NextAction, OverallStatus, Page, RecordQuery, RecordStatus,
    SortDirection, StatusCounts, UploadedFile, ValidationResults,
    ValidationResultsPage,
};
use payflow_core::AppError;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::service::PaymentFlowService;

impl PaymentFlowService {
    /// Record counts per status plus the derived workflow view.
    #[tracing::instrument(skip(self), fields(file_id = %file_id))]
    pub async fn get_file_status_summary(
        &self,
        file_id: Uuid,
    ) -> Result<FileStatusSummary, AppError> {
        let file = self.require_file(file_id).await?;
        let counts = self.stores.records.status_counts(file_id).await?;

        Ok(FileStatusSummary {
            file_id,
            total_records: counts.total(),
            counts,
            file_status: file.status,
            workflow_status: OverallStatus::derive(&counts),
            next_action: NextAction::from_counts(&counts),
        })
    }

    /// Records that passed (validated or already requested) and records that were rejected.
    #[tracing::instrument(skip(self), fields(file_id = %file_id))]
    pub async fn get_validation_results(
        &self,
        file_id: Uuid,
    ) -> Result<ValidationResults, AppError> {
        self.require_file(file_id).await?;
        let records = self.stores.records.find_by_file(file_id).await?;

        let mut passed_records = Vec::new();
        let mut failed_records = Vec::new();
        for record in &records {
            match record.status {
                RecordStatus::Validated | RecordStatus::RequestGenerated => {
                    passed_records.push(record.summary())
                }
                RecordStatus::Rejected => failed_records.push(record.summary()),
                RecordStatus::Uploaded => {}
            }
        }

        Ok(ValidationResults {
            file_id,
            passed_records,
            failed_records,
        })
    }

    #[tracing::instrument(skip(self, query), fields(file_id = %query.file_id))]
    pub async fn get_validation_results_paginated(
        &self,
        query: &RecordQuery,
    ) -> Result<ValidationResultsPage, AppError> {
        query.page.validate()?;
        self.require_file(query.file_id).await?;

        let page = self.stores.records.find_page(query).await?;

        Ok(ValidationResultsPage {
            file_id: query.file_id,
            records: page.map(|r| r.summary()),
            applied_filters: AppliedFilters {
                status: query
                    .status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "all".to_string()),
            },
        })
    }

    /// One summary per file that has records, filtered, sorted and paged.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_paginated_file_summaries(
        &self,
        query: &FileSummaryQuery,
    ) -> Result<Page<FileSummary>, AppError> {
        query.page.validate()?;

        let file_ids = match query.file_id {
            Some(id) => vec![id],
            None => self.stores.records.distinct_file_ids().await?,
        };
        let mut summaries = Vec::new();

        for file_id in file_ids {
            let Some(file) = self.stores.files.get(file_id).await? else {
                tracing::debug!(file_id = %file_id, "No file row for summary, skipping");
                continue;
            };
            if query
                .uploaded
                .is_some_and(|range| !range.contains(file.upload_date))
            {
                continue;
            }

            let counts = self.stores.records.status_counts(file.id).await?;
            if counts.total() == 0 {
                continue;
            }
            if query.status.is_some_and(|status| counts.get(status) == 0) {
                continue;
            }

            let total_validated_amount = self.validated_amount(file.id).await?;
            summaries.push(file_summary(&file, counts, total_validated_amount));
        }

        if let Some(field) = query.sort_by {
            sort_summaries(&mut summaries, field, query.sort_dir);
        }

        Ok(Page::from_full(summaries, query.page))
    }

    #[tracing::instrument(skip(self), fields(file_id = %file_id))]
    pub async fn get_file_overview(&self, file_id: Uuid) -> Result<FileOverview, AppError> {
        let file = self.require_file(file_id).await?;
        let counts = self.stores.records.status_counts(file_id).await?;
        let total_validated_amount = self.validated_amount(file_id).await?;

        Ok(FileOverview {
            file_id,
            file_name: file.filename,
            upload_date: file.upload_date,
            total_records: counts.total(),
            validated_count: counts.validated,
            total_validated_amount,
            status_summary: counts,
            file_status: file.status,
            ready_for_payment: counts.validated > 0,
        })
    }

    async fn validated_amount(&self, file_id: Uuid) -> Result<Decimal, AppError> {
        self.stores
            .records
            .sum_amount(file_id, RecordStatus::Validated)
            .await
    }
}

fn file_summary(
    file: &UploadedFile,
    counts: StatusCounts,
    total_validated_amount: Decimal,
) -> FileSummary {
    FileSummary {
        file_id: file.id,
        file_name: file.filename.clone(),
        upload_date: file.upload_date,
        total_records: counts.total(),
        validated_count: counts.validated,
        total_validated_amount,
        status_summary: counts,
        overall_status: OverallStatus::derive(&counts),
        ready_for_payment: counts.validated > 0,
    }
}

fn sort_summaries(summaries: &mut [FileSummary], field: FileSortField, dir: SortDirection) {
    summaries.sort_by(|a, b| {
        let ordering = match field {
            FileSortField::UploadDate => a.upload_date.cmp(&b.upload_date),
            FileSortField::TotalRecords => a.total_records.cmp(&b.total_records),
        };
        match dir {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

