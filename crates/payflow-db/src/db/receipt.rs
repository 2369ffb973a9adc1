use chrono::{DateTime, Utc};
use payflow_core::models::{generate_receipt_number, NewReceipt, Receipt};
use payflow_core::AppError;
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::transaction::with_transaction;

/// Repository for payment receipts and the payables they cover
#[derive(Clone)]
pub struct ReceiptRepository {
    pool: PgPool,
}

impl ReceiptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert the receipt row and its item links atomically.
    ///
    /// `attempt` is the next free number for the file; `(file_id, attempt)` is unique
    /// in the schema, so two concurrent runs cannot both claim the same attempt.
    #[tracing::instrument(skip(self, new), fields(db.table = "worker_payment_receipts", db.operation = "insert", file_id = %new.file_id))]
    pub async fn create_receipt(&self, new: NewReceipt) -> Result<Receipt, AppError> {
        let now = Utc::now();
        let receipt_number = generate_receipt_number(now);
        let record_count = new.payable_ids.len() as i32;

        let number = receipt_number.clone();
        let payable_ids = new.payable_ids.clone();
        let file_id = new.file_id;
        let total_amount = new.total_amount;

        let attempt = with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                let attempt = sqlx::query_scalar::<Postgres, i32>(
                    r#"
                    INSERT INTO worker_payment_receipts
                        (receipt_number, file_id, attempt, record_count, total_amount, created_at)
                    SELECT $1, $2, COALESCE(MAX(attempt), 0) + 1, $3, $4, $5
                    FROM worker_payment_receipts WHERE file_id = $2
                    RETURNING attempt
                    "#,
                )
                .bind(&number)
                .bind(file_id)
                .bind(record_count)
                .bind(total_amount)
                .bind(now)
                .fetch_one(&mut **tx)
                .await?;

                for payable_id in &payable_ids {
                    sqlx::query(
                        "INSERT INTO worker_payment_receipt_items (receipt_number, payable_id) VALUES ($1, $2)",
                    )
                    .bind(&number)
                    .bind(payable_id)
                    .execute(&mut **tx)
                    .await?;
                }

                Ok::<_, sqlx::Error>(attempt)
            })
        })
        .await?;

        Ok(Receipt {
            receipt_number,
            file_id: new.file_id,
            attempt,
            payable_ids: new.payable_ids,
            record_count,
            total_amount: new.total_amount,
            created_at: now,
        })
    }

    #[tracing::instrument(skip(self), fields(db.table = "worker_payment_receipts", db.operation = "select", file_id = %file_id))]
    pub async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<Receipt>, AppError> {
        let rows = sqlx::query_as::<Postgres, (String, Uuid, i32, i32, Decimal, DateTime<Utc>)>(
            r#"
            SELECT receipt_number, file_id, attempt, record_count, total_amount, created_at
            FROM worker_payment_receipts
            WHERE file_id = $1
            ORDER BY attempt ASC
            "#,
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;

        let mut receipts = Vec::with_capacity(rows.len());
        for (receipt_number, file_id, attempt, record_count, total_amount, created_at) in rows {
            let payable_ids = sqlx::query_scalar::<Postgres, Uuid>(
                "SELECT payable_id FROM worker_payment_receipt_items WHERE receipt_number = $1",
            )
            .bind(&receipt_number)
            .fetch_all(&self.pool)
            .await?;

            receipts.push(Receipt {
                receipt_number,
                file_id,
                attempt,
                payable_ids,
                record_count,
                total_amount,
                created_at,
            });
        }

        Ok(receipts)
    }
}
