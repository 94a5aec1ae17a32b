//! Import existing images
//!
//! Registers every image found under a project's folder on the file server
//! that the project's database does not know yet. Runs the same scan, diff
//! and ingestion handlers as the HTTP API.
//!
//! Usage:
//!   import-images --project <name> [--dry-run]
//!
//! Reads the server configuration (`DATABASE_URL`, `AIDE_FILES_ROOT`,
//! `AIDE_IMAGE_EXTENSIONS`, ...) from the environment or a `.env` file.

use aide_common::logging::{init_logging, LogConfig, LogLevel};
use anyhow::{Context, Result};
use clap::Parser;
use mediator::AsyncMediator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use aide_server::auth::AdminTokenAccess;
use aide_server::config::Config;
use aide_server::cqrs::build_mediator;
use aide_server::db::{self, PgImageStore, ProjectName};
use aide_server::features::images::{AddExistingImagesCommand, ImageSelection, ScanImagesQuery};
use aide_server::features::FeatureState;
use aide_server::inventory::InventorySettings;

#[derive(Debug, Parser)]
#[command(name = "import-images")]
#[command(about = "Register images that exist on disk but not in a project's database")]
#[command(version)]
struct Args {
    /// Project whose image folder is imported
    #[arg(short, long, env = "AIDE_PROJECT")]
    project: String,

    /// Only report what would be imported
    #[arg(long, env = "AIDE_DRY_RUN")]
    dry_run: bool,

    /// Override the file-server root from the configuration
    #[arg(long)]
    files_root: Option<PathBuf>,

    /// Log every file, not just the summary
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (level, directives) = if args.verbose {
        (LogLevel::Debug, "aide_server=debug,sqlx=warn")
    } else {
        (LogLevel::Info, "aide_server=info,sqlx=warn")
    };
    let log_config = LogConfig::builder()
        .level(level)
        .log_file_prefix("import-images")
        .filter_directives(directives)
        .build()
        .merge_env()?;
    let _guard = init_logging(&log_config)?;

    let mut config = Config::load()?;
    if let Some(root) = args.files_root {
        config.files.root = root;
    }

    let project = ProjectName::parse(&args.project)
        .with_context(|| format!("Invalid project name '{}'", args.project))?;

    let pool = db::create_pool(&db::DbConfig::from(&config.database))
        .await
        .context("Failed to connect to the database")?;
    let store =
        PgImageStore::new(pool).with_insert_chunk_size(config.inventory.insert_chunk_size);
    let settings = InventorySettings::from_config(&config)?;

    info!(
        project = %project,
        folder = %settings.project_root(&project).display(),
        dry_run = args.dry_run,
        "Importing existing images"
    );

    let state = FeatureState {
        store: Arc::new(store),
        access: Arc::new(AdminTokenAccess::new(config.auth.admin_token.clone())),
        settings: Arc::new(settings),
    };
    let mut mediator = build_mediator(state);

    if args.dry_run {
        let scan = match mediator
            .send(ScanImagesQuery {
                project: project.clone(),
            })
            .await
        {
            Ok(result) => result.context("Scan failed")?,
            Err(_) => anyhow::bail!("No handler registered for image scans"),
        };

        for filename in &scan.images {
            tracing::debug!(filename = %filename, "Would import");
        }
        for filename in &scan.missing_on_disk {
            tracing::warn!(filename = %filename, "Registered but missing on disk");
        }
        info!(
            project = %project,
            new_images = scan.images.len(),
            missing_on_disk = scan.missing_on_disk.len(),
            "Dry run complete, nothing imported"
        );
        return Ok(());
    }

    let response = match mediator
        .send(AddExistingImagesCommand {
            project: project.clone(),
            images: ImageSelection::All,
        })
        .await
    {
        Ok(result) => result.context("Import failed")?,
        Err(_) => anyhow::bail!("No handler registered for image imports"),
    };

    for filename in &response.accepted {
        tracing::debug!(filename = %filename, "Imported");
    }
    for rejected in &response.rejected {
        tracing::warn!(
            filename = %rejected.filename,
            reason = ?rejected.reason,
            "{}",
            rejected.message
        );
    }
    info!(
        project = %project,
        imported = response.accepted.len(),
        rejected = response.rejected.len(),
        status = ?response.status,
        "Import complete"
    );

    Ok(())
}
