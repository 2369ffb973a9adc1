//! Payflow CLI: drive the worker-payment upload pipeline from the shell.
//!
//! Reads configuration from the environment (DATABASE_URL, VALIDATION_MODE, ...).
//! `--in-memory` skips the database entirely; state then lives only for one command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use payflow_cli::{
    file_summary_query, in_memory_stores, init_tracing, postgres_stores, record_query,
    setup_database, ListingArgs,
};
use payflow_core::models::{FileStatus, Principal, TenantKeys};
use payflow_core::PayflowConfig;
use payflow_services::{FileUpload, LocalStorage, PaymentFlowService, Storage};
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "payflow", about = "Worker payment upload and request generation")]
struct Cli {
    /// Run against process-local stores instead of PostgreSQL
    #[arg(long, global = true)]
    in_memory: bool,

    /// Acting user name
    #[arg(long, env = "PAYFLOW_USER", global = true)]
    user: Option<String>,

    /// Acting user's numeric id, forwarded to the payment procedures
    #[arg(long, env = "PAYFLOW_USER_ID", global = true)]
    user_id: Option<i64>,

    /// Board assigned to every user in --in-memory mode
    #[arg(long, default_value = "1", global = true)]
    board_id: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a CSV or spreadsheet and validate its rows
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Generate the payment request straight after a successful validation
        #[arg(long)]
        generate: bool,
    },
    /// Upload a corrected file in place of an earlier one
    Reupload {
        /// UUID of the file being replaced
        previous_file_id: Uuid,
        /// Path to the corrected file
        file: PathBuf,
    },
    /// Validate the remaining uploaded records of a file
    Validate {
        /// File UUID
        file_id: Uuid,
    },
    /// Generate the payment request for a validated file
    Generate {
        /// File UUID
        file_id: Uuid,
    },
    /// Record counts and next action for a file
    Summary {
        /// File UUID
        file_id: Uuid,
    },
    /// Totals and payment readiness for a file
    Overview {
        /// File UUID
        file_id: Uuid,
    },
    /// Validation results for a file, all at once or paginated
    Results {
        /// File UUID
        file_id: Uuid,
        /// Return every passed and failed record without paging
        #[arg(long)]
        all: bool,
        #[command(flatten)]
        listing: ListingOpts,
    },
    /// Paginated summaries of uploaded files
    Files {
        /// Restrict to one file
        #[arg(long)]
        file_id: Option<Uuid>,
        #[command(flatten)]
        listing: ListingOpts,
    },
    /// Delete a file and its uploaded records
    Delete {
        /// File UUID
        file_id: Uuid,
    },
}

#[derive(Args)]
struct ListingOpts {
    /// Record status filter: UPLOADED, VALIDATED, REJECTED, REQUEST_GENERATED or all
    #[arg(long)]
    status: Option<String>,
    /// Start of the date filter (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<String>,
    /// End of the date filter (YYYY-MM-DD), inclusive
    #[arg(long)]
    end_date: Option<String>,
    /// Sort key
    #[arg(long)]
    sort_by: Option<String>,
    /// asc or desc
    #[arg(long)]
    sort_dir: Option<String>,
    /// Zero-based page number
    #[arg(long, default_value = "0")]
    page: u32,
    /// Page size
    #[arg(long, default_value = "20")]
    size: u32,
}

impl From<ListingOpts> for ListingArgs {
    fn from(opts: ListingOpts) -> Self {
        ListingArgs {
            status: opts.status,
            start_date: opts.start_date,
            end_date: opts.end_date,
            sort_by: opts.sort_by,
            sort_dir: opts.sort_dir,
            page: opts.page,
            size: opts.size,
        }
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn read_upload(path: &Path) -> anyhow::Result<FileUpload> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(FileUpload::new(filename, data))
}

async fn build_service(cli: &Cli, config: &PayflowConfig) -> anyhow::Result<PaymentFlowService> {
    let (stores, gateway) = if cli.in_memory {
        tracing::warn!("Running with in-memory stores; nothing is persisted");
        in_memory_stores(TenantKeys::new(cli.board_id, None, None))
    } else {
        let pool = setup_database(config).await?;
        postgres_stores(&pool)
    };

    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(config.local_storage_path())
            .await
            .context("Failed to create local storage")?,
    );

    Ok(PaymentFlowService::new(
        config,
        stores,
        storage,
        Some(gateway),
    )?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = PayflowConfig::from_env().context("Failed to load configuration")?;
    config.validate()?;

    let principal = match &cli.user {
        Some(name) => Principal::authenticated(name.clone(), cli.user_id),
        None => Principal::anonymous(),
    };

    let service = build_service(&cli, &config).await?;

    match cli.command {
        Commands::Upload { file, generate } => {
            let upload = read_upload(&file).await?;
            let response = service.handle_upload(upload, &principal).await?;
            print_json(&response)?;

            if generate && response.status == FileStatus::Validated {
                let generated = service.generate_request(response.file_id).await?;
                print_json(&generated)?;
            }
        }
        Commands::Reupload {
            previous_file_id,
            file,
        } => {
            let upload = read_upload(&file).await?;
            let response = service
                .reupload_file(previous_file_id, upload, &principal)
                .await?;
            print_json(&response)?;
        }
        Commands::Validate { file_id } => {
            let response = service.validate_file(file_id, &principal).await?;
            print_json(&response)?;
        }
        Commands::Generate { file_id } => {
            let response = service.generate_request(file_id).await?;
            print_json(&response)?;
        }
        Commands::Summary { file_id } => {
            let response = service.get_file_status_summary(file_id).await?;
            print_json(&response)?;
        }
        Commands::Overview { file_id } => {
            let response = service.get_file_overview(file_id).await?;
            print_json(&response)?;
        }
        Commands::Results {
            file_id,
            all,
            listing,
        } => {
            if all {
                let response = service.get_validation_results(file_id).await?;
                print_json(&response)?;
            } else {
                let query = record_query(file_id, &listing.into())?;
                let response = service.get_validation_results_paginated(&query).await?;
                print_json(&response)?;
            }
        }
        Commands::Files { file_id, listing } => {
            let query = file_summary_query(file_id, &listing.into())?;
            let response = service.get_paginated_file_summaries(&query).await?;
            print_json(&response)?;
        }
        Commands::Delete { file_id } => {
            let response = service.delete_file(file_id).await?;
            print_json(&response)?;
        }
    }

    Ok(())
}
