//! Common test utilities for AIDE server integration tests using testcontainers
//!
//! Starts a PostgreSQL container and provisions project schemas the way the
//! AIDE project setup does: one schema per project holding the `image`,
//! `image_user`, `annotation` and `prediction` tables.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestPostgres;
//!
//! #[tokio::test]
//! async fn test_with_postgres() {
//!     let pg = TestPostgres::start().await.expect("Failed to start PostgreSQL");
//!     pg.create_project("wildlife").await.expect("Failed to create project");
//! }
//! ```

#![allow(dead_code)]

use aide_server::db::{PgImageStore, ProjectName};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};
use uuid::Uuid;

const POSTGRES_TAG: &str = "16-alpine";

/// PostgreSQL test container with a connected pool.
///
/// The container is stopped when this value is dropped.
pub struct TestPostgres {
    #[allow(dead_code)]
    container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag(POSTGRES_TAG)
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { container, pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn store(&self) -> PgImageStore {
        PgImageStore::new(self.pool.clone())
    }

    /// Create the schema and tables of `project`.
    pub async fn create_project(&self, project: &str) -> Result<ProjectName> {
        let name = ProjectName::parse(project)?;
        let schema = name.schema();

        let statements = [
            format!("CREATE SCHEMA {}", schema),
            format!(
                "CREATE TABLE {}.image (
                    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                    filename text NOT NULL UNIQUE,
                    date_added timestamptz NOT NULL DEFAULT NOW()
                )",
                schema
            ),
            format!(
                "CREATE TABLE {schema}.image_user (
                    username text NOT NULL,
                    image uuid NOT NULL REFERENCES {schema}.image (id),
                    viewcount integer NOT NULL DEFAULT 1,
                    last_checked timestamptz,
                    PRIMARY KEY (username, image)
                )",
                schema = schema
            ),
            format!(
                "CREATE TABLE {schema}.annotation (
                    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                    image uuid NOT NULL REFERENCES {schema}.image (id),
                    username text NOT NULL DEFAULT 'annotator'
                )",
                schema = schema
            ),
            format!(
                "CREATE TABLE {schema}.prediction (
                    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                    image uuid NOT NULL REFERENCES {schema}.image (id),
                    confidence real
                )",
                schema = schema
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to provision project '{}'", project))?;
        }

        Ok(name)
    }

    /// Register `filename` directly, returning its id.
    pub async fn insert_image(
        &self,
        project: &ProjectName,
        filename: &str,
        date_added: DateTime<Utc>,
    ) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(&format!(
            "INSERT INTO {}.image (filename, date_added) VALUES ($1, $2) RETURNING id",
            project.schema()
        ))
        .bind(filename)
        .bind(date_added)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn add_view(
        &self,
        project: &ProjectName,
        image: Uuid,
        username: &str,
        viewcount: i32,
        last_checked: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO {}.image_user (username, image, viewcount, last_checked) \
             VALUES ($1, $2, $3, $4)",
            project.schema()
        ))
        .bind(username)
        .bind(image)
        .bind(viewcount)
        .bind(last_checked)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn add_annotation(&self, project: &ProjectName, image: Uuid) -> Result<()> {
        sqlx::query(&format!("INSERT INTO {}.annotation (image) VALUES ($1)", project.schema()))
            .bind(image)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_prediction(&self, project: &ProjectName, image: Uuid) -> Result<()> {
        sqlx::query(&format!("INSERT INTO {}.prediction (image) VALUES ($1)", project.schema()))
            .bind(image)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count(&self, project: &ProjectName, table: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM {}.{}",
            project.schema(),
            table
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

/// Initialize tracing for integration tests
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,aide_server=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}
