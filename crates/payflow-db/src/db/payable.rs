use payflow_core::models::{NewPayableRecord, PayableRecord, TenantKeys};
use payflow_core::AppError;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

const PAYABLE_COLUMNS: &str = "id, file_id, source_record_id, board_id, employer_id, toli_id, worker_id, \
     employee_name, employer_reg_no, toli_reg_no, month, total_days, basic_wages, advance, \
     gross_wages, levy, net_wages_payable, payment_type, txn_ref, receipt_number, created_at";

/// Repository for payable records (`worker_payments`)
#[derive(Clone)]
pub struct PayableRecordRepository {
    pool: PgPool,
}

impl PayableRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, new), fields(db.table = "worker_payments", db.operation = "insert", source_record_id = %new.source_record_id))]
    pub async fn insert_payable(&self, new: NewPayableRecord) -> Result<PayableRecord, AppError> {
        let payable = new.into_payable(Uuid::new_v4());

        sqlx::query(
            r#"
            INSERT INTO worker_payments (
                id, file_id, source_record_id, board_id, employer_id, toli_id, worker_id,
                employee_name, employer_reg_no, toli_reg_no, month, total_days, basic_wages,
                advance, gross_wages, levy, net_wages_payable, payment_type, txn_ref,
                receipt_number, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21)
            "#,
        )
        .bind(payable.id)
        .bind(payable.file_id)
        .bind(payable.source_record_id)
        .bind(payable.tenant.board_id)
        .bind(payable.tenant.employer_id)
        .bind(payable.tenant.toli_id)
        .bind(&payable.worker_id)
        .bind(&payable.employee_name)
        .bind(&payable.employer_reg_no)
        .bind(&payable.toli_reg_no)
        .bind(&payable.month)
        .bind(payable.total_days)
        .bind(payable.basic_wages)
        .bind(payable.advance)
        .bind(payable.gross_wages)
        .bind(payable.levy)
        .bind(payable.net_wages_payable)
        .bind(&payable.payment_type)
        .bind(&payable.txn_ref)
        .bind(&payable.receipt_number)
        .bind(payable.created_at)
        .execute(&self.pool)
        .await?;

        Ok(payable)
    }

    #[tracing::instrument(skip(self), fields(db.table = "worker_payments", db.operation = "update", db.record_id = %id))]
    pub async fn set_receipt_number(&self, id: Uuid, receipt_number: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE worker_payments SET receipt_number = $2 WHERE id = $1")
            .bind(id)
            .bind(receipt_number)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Payable {} not found", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "worker_payments", db.operation = "select", file_id = %file_id))]
    pub async fn find_by_file(&self, file_id: Uuid) -> Result<Vec<PayableRecord>, AppError> {
        let rows = sqlx::query::<Postgres>(&format!(
            "SELECT {} FROM worker_payments WHERE file_id = $1 ORDER BY created_at ASC",
            PAYABLE_COLUMNS
        ))
        .bind(file_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(payable_from_row).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = "worker_payments", db.operation = "select"))]
    pub async fn find_by_receipt(
        &self,
        receipt_number: &str,
    ) -> Result<Vec<PayableRecord>, AppError> {
        let rows = sqlx::query::<Postgres>(&format!(
            "SELECT {} FROM worker_payments WHERE receipt_number = $1 ORDER BY created_at ASC",
            PAYABLE_COLUMNS
        ))
        .bind(receipt_number)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(payable_from_row).collect()
    }
}

fn payable_from_row(row: &PgRow) -> Result<PayableRecord, AppError> {
    Ok(PayableRecord {
        id: row.try_get("id")?,
        file_id: row.try_get("file_id")?,
        source_record_id: row.try_get("source_record_id")?,
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
        total_days: row.try_get("total_days")?,
        basic_wages: row.try_get("basic_wages")?,
        advance: row.try_get("advance")?,
        gross_wages: row.try_get("gross_wages")?,
        levy: row.try_get("levy")?,
        net_wages_payable: row.try_get("net_wages_payable")?,
        payment_type: row.try_get("payment_type")?,
        txn_ref: row.try_get("txn_ref")?,
        receipt_number: row.try_get("receipt_number")?,
        created_at: row.try_get("created_at")?,
    })
}
