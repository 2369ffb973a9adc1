use payflow_core::AppError;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Executes the `payment_flow` stored procedures.
///
/// Each call runs on one pooled connection so the user context set beforehand
/// is visible to the procedure. The context is cleared again before the connection
/// goes back to the pool.
#[derive(Clone)]
pub struct PaymentProcedureExecutor {
    pool: PgPool,
}

impl PaymentProcedureExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.procedure = "payment_flow.validate_uploaded_data", file_id = %file_id))]
    pub async fn validate_uploaded_data(
        &self,
        file_id: Uuid,
        user_id: Option<i64>,
    ) -> Result<String, AppError> {
        let mut conn = self.acquire_with_context(user_id).await?;

        let result = sqlx::query_scalar::<Postgres, Option<String>>(
            "CALL payment_flow.validate_uploaded_data($1, NULL)",
        )
        .bind(file_id.to_string())
        .fetch_one(&mut *conn)
        .await;
        clear_context(&mut conn, user_id).await;
        let output = result.map_err(|e| AppError::ProcedureInvocation(e.to_string()))?;

        let output = output.unwrap_or_default();
        tracing::info!(file_id = %file_id, output = %output, "Validation procedure returned");
        Ok(output)
    }

    #[tracing::instrument(skip(self), fields(db.procedure = "payment_flow.create_payments", file_id = %file_id))]
    pub async fn create_payments(
        &self,
        file_id: Uuid,
        user_id: Option<i64>,
    ) -> Result<String, AppError> {
        let mut conn = self.acquire_with_context(user_id).await?;

        let result = sqlx::query_scalar::<Postgres, Option<String>>(
            "CALL payment_flow.create_payments($1, NULL)",
        )
        .bind(file_id.to_string())
        .fetch_one(&mut *conn)
        .await;
        clear_context(&mut conn, user_id).await;
        let receipt = result.map_err(|e| AppError::ProcedureInvocation(e.to_string()))?;

        receipt
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| {
                AppError::ProcedureInvocation(format!(
                    "create_payments returned no receipt for file {}",
                    file_id
                ))
            })
    }

    async fn acquire_with_context(
        &self,
        user_id: Option<i64>,
    ) -> Result<PoolConnection<Postgres>, AppError> {
        let mut conn = self.pool.acquire().await?;

        match user_id {
            Some(user_id) => {
                if let Err(e) = sqlx::query("SELECT auth.set_user_context($1)")
                    .bind(user_id)
                    .execute(&mut *conn)
                    .await
                {
                    tracing::error!(user_id, error = %e, "Failed to set user context, continuing without it");
                }
            }
            None => {
                tracing::debug!("No numeric user id available, calling procedure without user context");
            }
        }

        Ok(conn)
    }
}

/// Reset the session's user context after a call that set one. A connection whose
/// context cannot be reset is closed instead of being returned to the pool.
async fn clear_context(conn: &mut PoolConnection<Postgres>, user_id: Option<i64>) {
    if user_id.is_none() {
        return;
    }
    if let Err(e) = sqlx::query("SELECT auth.set_user_context($1)")
        .bind(None::<i64>)
        .execute(&mut **conn)
        .await
    {
        tracing::warn!(error = %e, "Failed to clear user context, closing the connection");
        conn.close_on_drop();
    }
}
