use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::db::{DbError, ProjectName};
use crate::error::AppError;
use crate::features::FeatureState;
use crate::inventory::{diff, ScanError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanImagesQuery {
    pub project: ProjectName,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanImagesResponse {
    /// Images on disk that are not registered, sorted.
    pub images: Vec<String>,
    /// Registered images whose file is missing, sorted. Reported only.
    pub missing_on_disk: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ScanImagesError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<ScanImagesError> for AppError {
    fn from(err: ScanImagesError) -> Self {
        match err {
            ScanImagesError::ProjectNotFound(_) => AppError::NotFound(err.to_string()),
            ScanImagesError::Scan(e) => e.into(),
            ScanImagesError::Database(e) => e.into(),
        }
    }
}

impl Request<Result<ScanImagesResponse, ScanImagesError>> for ScanImagesQuery {}

impl crate::cqrs::middleware::Query for ScanImagesQuery {}

#[tracing::instrument(skip(state))]
pub async fn handle(
    state: FeatureState,
    query: ScanImagesQuery,
) -> Result<ScanImagesResponse, ScanImagesError> {
    if !state.store.project_exists(&query.project).await? {
        return Err(ScanImagesError::ProjectNotFound(query.project.to_string()));
    }

    let on_disk = state.settings.scan_project(&query.project).await?;
    let registered = state.store.registered_filenames(&query.project).await?;
    let result = diff(&on_disk, &registered);

    if !result.db_only.is_empty() {
        tracing::warn!(
            missing = result.db_only.len(),
            "Registered images missing from disk"
        );
    }

    Ok(ScanImagesResponse {
        images: result.sorted_disk_only(),
        missing_on_disk: result.sorted_db_only(),
    })
}
