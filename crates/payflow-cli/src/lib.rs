//! Shared wiring for the `payflow` binary: tracing, database setup, store assembly
//! and the query builders behind the listing commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use payflow_core::models::{
    DateRange, FileSortField, FileSummaryQuery, PageRequest, RecordQuery, RecordSortField,
    RecordStatus, SortDirection, TenantKeys,
};
use payflow_core::PayflowConfig;
use payflow_db::memory::{
    InMemoryFileStore, InMemoryPayableStore, InMemoryReceiptStore, InMemoryRecordStore,
    ScriptedProcedureGateway, StaticTenantResolver,
};
use payflow_db::{
    PayableRecordRepository, PaymentProcedureExecutor, ProcedureGateway, ReceiptRepository,
    TenantAccessRepository, UploadedFileRepository, UploadedRecordRepository,
};
use payflow_services::PayflowStores;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Connect to PostgreSQL and apply pending migrations.
pub async fn setup_database(config: &PayflowConfig) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(config.require_database_url()?)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database connected successfully"
    );

    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations");
    let migrator = sqlx::migrate::Migrator::new(migrations_dir)
        .await
        .context("Failed to load migrations")?;
    migrator
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

/// PostgreSQL-backed stores plus the stored-procedure gateway.
pub fn postgres_stores(pool: &PgPool) -> (PayflowStores, Arc<dyn ProcedureGateway>) {
    let stores = PayflowStores {
        files: Arc::new(UploadedFileRepository::new(pool.clone())),
        records: Arc::new(UploadedRecordRepository::new(pool.clone())),
        payables: Arc::new(PayableRecordRepository::new(pool.clone())),
        receipts: Arc::new(ReceiptRepository::new(pool.clone())),
        tenants: Arc::new(TenantAccessRepository::new(pool.clone())),
    };
    (stores, Arc::new(PaymentProcedureExecutor::new(pool.clone())))
}

/// Process-local stores for a dry run. Every authenticated user maps to `tenant`.
pub fn in_memory_stores(tenant: TenantKeys) -> (PayflowStores, Arc<dyn ProcedureGateway>) {
    let stores = PayflowStores {
        files: Arc::new(InMemoryFileStore::new()),
        records: Arc::new(InMemoryRecordStore::new()),
        payables: Arc::new(InMemoryPayableStore::new()),
        receipts: Arc::new(InMemoryReceiptStore::new()),
        tenants: Arc::new(StaticTenantResolver::new(Some(tenant))),
    };
    (stores, Arc::new(ScriptedProcedureGateway::new()))
}

/// Raw listing filters as typed on the command line.
#[derive(Debug, Clone, Default)]
pub struct ListingArgs {
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<String>,
    pub page: u32,
    pub size: u32,
}

impl ListingArgs {
    fn status(&self) -> Result<Option<RecordStatus>> {
        self.status
            .as_deref()
            .filter(|s| !s.trim().is_empty() && !s.trim().eq_ignore_ascii_case("all"))
            .map(str::parse::<RecordStatus>)
            .transpose()
    }

    fn date_range(&self) -> Result<Option<DateRange>> {
        let start = self.start_date.as_deref().map(parse_date).transpose()?;
        let end = self.end_date.as_deref().map(parse_date).transpose()?;
        Ok(DateRange::from_parts(start, end))
    }

    fn sort_dir(&self) -> Result<SortDirection> {
        match self.sort_dir.as_deref() {
            Some(raw) => raw.parse(),
            None => Ok(SortDirection::default()),
        }
    }

    fn page(&self) -> PageRequest {
        PageRequest::new(self.page, self.size)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))
}

/// Record listing for one file. Unknown sort keys fall back to creation time.
pub fn record_query(file_id: Uuid, args: &ListingArgs) -> Result<RecordQuery> {
    Ok(RecordQuery {
        file_id,
        status: args.status()?,
        created: args.date_range()?,
        sort_by: args
            .sort_by
            .as_deref()
            .map(RecordSortField::parse_or_default)
            .unwrap_or_default(),
        sort_dir: args.sort_dir()?,
        page: args.page(),
    })
}

pub fn file_summary_query(file_id: Option<Uuid>, args: &ListingArgs) -> Result<FileSummaryQuery> {
    Ok(FileSummaryQuery {
        file_id,
        status: args.status()?,
        uploaded: args.date_range()?,
        sort_by: args.sort_by.as_deref().and_then(FileSortField::parse),
        sort_dir: args.sort_dir()?,
        page: args.page(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ListingArgs {
        ListingArgs {
            page: 0,
            size: 20,
            ..Default::default()
        }
    }

    #[test]
    fn record_query_defaults() {
        let file_id = Uuid::new_v4();
        let query = record_query(file_id, &args()).unwrap();
        assert_eq!(query.file_id, file_id);
        assert_eq!(query.status, None);
        assert_eq!(query.created, None);
        assert_eq!(query.sort_by, RecordSortField::CreatedAt);
        assert_eq!(query.sort_dir, SortDirection::Desc);
        assert_eq!(query.page, PageRequest::new(0, 20));
    }

    #[test]
    fn record_query_parses_filters() {
        let listing = ListingArgs {
            status: Some("rejected".to_string()),
            start_date: Some("2024-01-01".to_string()),
            end_date: Some("2024-01-31".to_string()),
            sort_by: Some("employeeName".to_string()),
            sort_dir: Some("asc".to_string()),
            ..args()
        };
        let query = record_query(Uuid::new_v4(), &listing).unwrap();
        assert_eq!(query.status, Some(RecordStatus::Rejected));
        assert_eq!(query.sort_by, RecordSortField::EmployeeName);
        assert_eq!(query.sort_dir, SortDirection::Asc);
        let range = query.created.unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
    }

    #[test]
    fn status_all_means_no_filter() {
        let listing = ListingArgs {
            status: Some("ALL".to_string()),
            ..args()
        };
        assert_eq!(record_query(Uuid::new_v4(), &listing).unwrap().status, None);
    }

    #[test]
    fn half_open_date_range_is_ignored() {
        let listing = ListingArgs {
            start_date: Some("2024-01-01".to_string()),
            ..args()
        };
        assert_eq!(file_summary_query(None, &listing).unwrap().uploaded, None);
    }

    #[test]
    fn bad_inputs_are_rejected() {
        let bad_date = ListingArgs {
            start_date: Some("01/02/2024".to_string()),
            end_date: Some("2024-02-01".to_string()),
            ..args()
        };
        assert!(record_query(Uuid::new_v4(), &bad_date).is_err());

        let bad_status = ListingArgs {
            status: Some("PAID".to_string()),
            ..args()
        };
        assert!(file_summary_query(None, &bad_status).is_err());
    }

    #[test]
    fn file_summary_unknown_sort_keeps_order() {
        let listing = ListingArgs {
            sort_by: Some("filename".to_string()),
            ..args()
        };
        assert_eq!(file_summary_query(None, &listing).unwrap().sort_by, None);

        let listing = ListingArgs {
            sort_by: Some("totalRecords".to_string()),
            ..args()
        };
        assert_eq!(
            file_summary_query(None, &listing).unwrap().sort_by,
            Some(FileSortField::TotalRecords)
        );
    }
}
