use payflow_core::models::{FileStatus, NewUploadedFile, TenantKeys, UploadedFile};
use payflow_core::AppError;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use uuid::Uuid;

const FILE_COLUMNS: &str = "id, filename, stored_path, file_hash, file_type, uploaded_by, upload_date, \
     board_id, employer_id, toli_id, total_records, success_count, failure_count, status, \
     file_reference_number";

/// Repository for uploaded files (one row per batch)
#[derive(Clone)]
pub struct UploadedFileRepository {
    pool: PgPool,
}

impl UploadedFileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, new), fields(db.table = "uploaded_files", db.operation = "insert", filename = %new.filename))]
    pub async fn create_file(&self, new: NewUploadedFile) -> Result<UploadedFile, AppError> {
        let file = UploadedFile::from_new(new);

        sqlx::query(
            r#"
            INSERT INTO uploaded_files (
                id, filename, stored_path, file_hash, file_type, uploaded_by, upload_date,
                board_id, employer_id, toli_id, total_records, success_count, failure_count,
                status, file_reference_number
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(file.id)
        .bind(&file.filename)
        .bind(&file.stored_path)
        .bind(&file.file_hash)
        .bind(&file.file_type)
        .bind(&file.uploaded_by)
        .bind(file.upload_date)
        .bind(file.tenant.board_id)
        .bind(file.tenant.employer_id)
        .bind(file.tenant.toli_id)
        .bind(file.total_records)
        .bind(file.success_count)
        .bind(file.failure_count)
        .bind(file.status.to_string())
        .bind(&file.file_reference_number)
        .execute(&self.pool)
        .await?;

        Ok(file)
    }

    #[tracing::instrument(skip(self), fields(db.table = "uploaded_files", db.operation = "select", db.record_id = %id))]
    pub async fn get_file(&self, id: Uuid) -> Result<Option<UploadedFile>, AppError> {
        let row = sqlx::query::<Postgres>(&format!(
            "SELECT {} FROM uploaded_files WHERE id = $1",
            FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(file_from_row).transpose()
    }

    #[tracing::instrument(skip(self, file), fields(db.table = "uploaded_files", db.operation = "update", db.record_id = %file.id))]
    pub async fn update_file(&self, file: &UploadedFile) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE uploaded_files
            SET total_records = $2, success_count = $3, failure_count = $4,
                status = $5, file_reference_number = $6
            WHERE id = $1
            "#,
        )
        .bind(file.id)
        .bind(file.total_records)
        .bind(file.success_count)
        .bind(file.failure_count)
        .bind(file.status.to_string())
        .bind(&file.file_reference_number)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {} not found", file.id)));
        }

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "uploaded_files", db.operation = "delete", db.record_id = %id))]
    pub async fn delete_file(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM uploaded_files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn file_from_row(row: &PgRow) -> Result<UploadedFile, AppError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<FileStatus>()
        .map_err(|e| AppError::Internal(format!("Corrupt file status: {}", e)))?;

    Ok(UploadedFile {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        stored_path: row.try_get("stored_path")?,
        file_hash: row.try_get("file_hash")?,
        file_type: row.try_get("file_type")?,
        uploaded_by: row.try_get("uploaded_by")?,
        upload_date: row.try_get("upload_date")?,
        tenant: TenantKeys {
            board_id: row.try_get("board_id")?,
            employer_id: row.try_get("employer_id")?,
            toli_id: row.try_get("toli_id")?,
        },
        total_records: row.try_get("total_records")?,
        success_count: row.try_get("success_count")?,
        failure_count: row.try_get("failure_count")?,
        status,
        file_reference_number: row.try_get("file_reference_number")?,
    })
}
