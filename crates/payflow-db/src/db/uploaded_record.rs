use payflow_core::models::{
    Page, RecordQuery, RecordStatus, StatusCounts, TenantKeys, UploadedRecord, DAYS_PER_MONTH,
};
use payflow_core::AppError;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

use super::transaction::TransactionGuard;
use crate::repository_traits::RecordStatusUpdate;

const RECORD_COLUMNS: &str = "id, file_id, board_id, employer_id, toli_id, worker_id, employee_name, \
     employer_reg_no, toli_reg_no, month, days, total_days, amount, advance, net_payable, \
     payment_type, txn_ref, status_id, rejection_reason, receipt_number, created_at, updated_at";

const RECORD_FILTER: &str = "file_id = $1 \
     AND ($2::smallint IS NULL OR status_id = $2) \
     AND ($3::timestamptz IS NULL OR created_at >= $3) \
     AND ($4::timestamptz IS NULL OR created_at <= $4)";

/// Repository for normalized rows (`worker_uploaded_data`)
#[derive(Clone)]
pub struct UploadedRecordRepository {
    pool: PgPool,
}

impl UploadedRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert every record of a batch inside one transaction.
    #[tracing::instrument(skip(self, records), fields(db.table = "worker_uploaded_data", db.operation = "insert", count = records.len()))]
    pub async fn insert_records(&self, records: &[UploadedRecord]) -> Result<u64, AppError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let mut inserted = 0u64;

        for record in records {
            let days: Vec<Option<i32>> = record.days.to_vec();
            let result = sqlx::query(
                r#"
                INSERT INTO worker_uploaded_data (
                    id, file_id, board_id, employer_id, toli_id, worker_id, employee_name,
                    employer_reg_no, toli_reg_no, month, days, total_days, amount, advance,
                    net_payable, payment_type, txn_ref, status_id, rejection_reason,
                    receipt_number, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                        $16, $17, $18, $19, $20, $21, $22)
                "#,
            )
            .bind(record.id)
            .bind(record.file_id)
            .bind(record.tenant.board_id)
            .bind(record.tenant.employer_id)
            .bind(record.tenant.toli_id)
            .bind(&record.worker_id)
            .bind(&record.employee_name)
            .bind(&record.employer_reg_no)
            .bind(&record.toli_reg_no)
            .bind(&record.month)
            .bind(days)
            .bind(record.total_days)
            .bind(record.amount)
            .bind(record.advance)
            .bind(record.net_payable)
            .bind(&record.payment_type)
            .bind(&record.txn_ref)
            .bind(record.status.code())
            .bind(&record.rejection_reason)
            .bind(&record.receipt_number)
            .bind(record.created_at)
            .bind(record.updated_at)
            .execute(&mut **tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    #[tracing::instrument(skip(self), fields(db.table = "worker_uploaded_data", db.operation = "select", file_id = %file_id))]
    pub async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<UploadedRecord>, AppError> {
        let rows = sqlx::query::<Postgres>(&format!(
            "SELECT {} FROM worker_uploaded_data WHERE file_id = $1 ORDER BY created_at ASC, id ASC",
            RECORD_COLUMNS
        ))
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = "worker_uploaded_data", db.operation = "select", file_id = %file_id, status = %status))]
    pub async fn find_by_file_and_status(
        &self,
        file_id: Uuid,
        status: RecordStatus,
    ) -> Result<Vec<UploadedRecord>, AppError> {
        let rows = sqlx::query::<Postgres>(&format!(
            "SELECT {} FROM worker_uploaded_data WHERE file_id = $1 AND status_id = $2 \
             ORDER BY created_at ASC, id ASC",
            RECORD_COLUMNS
        ))
        .bind(file_id)
        .bind(status.code())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    /// Apply a forward-only status change. The row only matches while it still holds
    /// one of the target status's predecessors, so a concurrent run cannot move it twice.
    #[tracing::instrument(skip(self, update), fields(db.table = "worker_uploaded_data", db.operation = "update", db.record_id = %update.record_id))]
    pub async fn update_status(&self, update: &RecordStatusUpdate) -> Result<(), AppError> {
        let allowed: Vec<i16> = update
            .status
            .predecessors()
            .iter()
            .map(|s| s.code())
            .collect();

        let result = sqlx::query(
            r#"
            UPDATE worker_uploaded_data
            SET status_id = $2,
                rejection_reason = $3,
                receipt_number = COALESCE($4, receipt_number),
                updated_at = NOW()
            WHERE id = $1 AND status_id = ANY($5)
            "#,
        )
        .bind(update.record_id)
        .bind(update.status.code())
        .bind(&update.rejection_reason)
        .bind(&update.receipt_number)
        .bind(&allowed)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current = sqlx::query_scalar::<Postgres, i16>(
            "SELECT status_id FROM worker_uploaded_data WHERE id = $1",
        )
        .bind(update.record_id)
        .fetch_optional(&self.pool)
        .await?;

        match current {
            None => Err(AppError::NotFound(format!(
                "Record {} not found",
                update.record_id
            ))),
            Some(code) => {
                let from = RecordStatus::from_code(code)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| code.to_string());
                Err(AppError::InvalidTransition(format!(
                    "record {} is {} and cannot become {}",
                    update.record_id, from, update.status
                )))
            }
        }
    }

    #[tracing::instrument(skip(self), fields(db.table = "worker_uploaded_data", db.operation = "select", file_id = %file_id))]
    pub async fn status_counts(&self, file_id: Uuid) -> Result<StatusCounts, AppError> {
        let rows = sqlx::query_as::<Postgres, (i16, i64)>(
            "SELECT status_id, COUNT(*) FROM worker_uploaded_data WHERE file_id = $1 GROUP BY status_id",
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for (code, count) in rows {
            match RecordStatus::from_code(code) {
                Some(status) => counts.add(status, count),
                None => tracing::warn!(file_id = %file_id, code, "Ignoring unknown record status code"),
            }
        }
        Ok(counts)
    }

    #[tracing::instrument(skip(self), fields(db.table = "worker_uploaded_data", db.operation = "select", file_id = %file_id))]
    pub async fn sum_amount(
        &self,
        file_id: Uuid,
        status: RecordStatus,
    ) -> Result<Decimal, AppError> {
        let total = sqlx::query_scalar::<Postgres, Option<Decimal>>(
            "SELECT SUM(amount) FROM worker_uploaded_data WHERE file_id = $1 AND status_id = $2",
        )
        .bind(file_id)
        .bind(status.code())
        .fetch_one(&self.pool)
        .await?;

        Ok(total.unwrap_or(Decimal::ZERO))
    }

    #[tracing::instrument(skip(self, query), fields(db.table = "worker_uploaded_data", db.operation = "select", file_id = %query.file_id))]
    pub async fn find_page(&self, query: &RecordQuery) -> Result<Page<UploadedRecord>, AppError> {
        let status_code = query.status.map(RecordStatus::code);
        let start = query.created.map(|range| range.start_instant());
        let end = query.created.map(|range| range.end_instant());

        let total = sqlx::query_scalar::<Postgres, i64>(&format!(
            "SELECT COUNT(*) FROM worker_uploaded_data WHERE {}",
            RECORD_FILTER
        ))
        .bind(query.file_id)
        .bind(status_code)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        // Sort column comes from a closed enum, never from caller text.
        let rows = sqlx::query::<Postgres>(&format!(
            "SELECT {} FROM worker_uploaded_data WHERE {} ORDER BY {} {}, id ASC LIMIT $5 OFFSET $6",
            RECORD_COLUMNS,
            RECORD_FILTER,
            query.sort_by.column(),
            query.sort_dir
        ))
        .bind(query.file_id)
        .bind(status_code)
        .bind(start)
        .bind(end)
        .bind(i64::from(query.page.size))
        .bind(query.page.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(records, total.max(0) as u64, query.page))
    }

    #[tracing::instrument(skip(self), fields(db.table = "worker_uploaded_data", db.operation = "select"))]
    pub async fn distinct_file_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<Postgres, Uuid>(
            "SELECT file_id FROM worker_uploaded_data GROUP BY file_id ORDER BY MIN(created_at) DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    #[tracing::instrument(skip(self), fields(db.table = "worker_uploaded_data", db.operation = "delete", file_id = %file_id))]
    pub async fn delete_by_file(&self, file_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM worker_uploaded_data WHERE file_id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

fn record_from_row(row: &PgRow) -> Result<UploadedRecord, AppError> {
    let code: i16 = row.try_get("status_id")?;
    let status = RecordStatus::from_code(code)
        .ok_or_else(|| AppError::Internal(format!("Unknown record status code {}", code)))?;

    let stored_days: Vec<Option<i32>> = row.try_get("days")?;
    let mut days = [None; DAYS_PER_MONTH];
    for (slot, value) in days.iter_mut().zip(stored_days) {
        *slot = value;
    }

    Ok(UploadedRecord {
        id: row.try_get("id")?,
        file_id: row.try_get("file_id")?,
        tenant: TenantKeys {
            board_id: row.try_get("board_id")?,
            employer_id: row.try_get("employer_id")?,
            toli_id: row.try_get("toli_id")?,
        },
        worker_id: row.try_get("worker_id")?,
        employee_name: row.try_get("employee_name")?,
        employer_reg_no: row.try_get("employer_reg_no")?,
        toli_reg_no: row.try_get("toli_reg_no")?,
        month: row.try_get("month")?,
        days,
        total_days: row.try_get("total_days")?,
        amount: row.try_get("amount")?,
        advance: row.try_get("advance")?,
        net_payable: row.try_get("net_payable")?,
        payment_type: row.try_get("payment_type")?,
        txn_ref: row.try_get("txn_ref")?,
        status,
        rejection_reason: row.try_get("rejection_reason")?,
        receipt_number: row.try_get("receipt_number")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
