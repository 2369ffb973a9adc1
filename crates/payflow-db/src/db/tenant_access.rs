use payflow_core::models::{Principal, TenantKeys};
use payflow_core::AppError;
use sqlx::{PgPool, Postgres};

/// Looks up the board/employer/toli a user may upload for.
#[derive(Clone)]
pub struct TenantAccessRepository {
    pool: PgPool,
}

impl TenantAccessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// First assignment for the principal, matched by numeric id or by name.
    #[tracing::instrument(skip(self, principal), fields(db.table = "user_tenant_access", db.operation = "select", user = %principal.name))]
    pub async fn find_for_principal(
        &self,
        principal: &Principal,
    ) -> Result<Option<TenantKeys>, AppError> {
        if !principal.authenticated {
            return Ok(None);
        }

        let row = sqlx::query_as::<Postgres, (i64, Option<i64>, Option<i64>)>(
            r#"
            SELECT board_id, employer_id, toli_id
            FROM user_tenant_access
            WHERE ($1::bigint IS NOT NULL AND user_id = $1) OR user_name = $2
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(principal.numeric_user_id())
        .bind(&principal.name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(board_id, employer_id, toli_id)| TenantKeys {
            board_id,
            employer_id,
            toli_id,
        }))
    }
}
