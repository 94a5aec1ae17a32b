use chrono::Utc;
use mediator::Request;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::db::{DbError, ImageSummary, ProjectName};
use crate::error::AppError;
use crate::features::FeatureState;
use crate::inventory::range_query::{OrderBy, SortOrder};
use crate::inventory::{QueryBuildError, RangeQueryParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListImagesQuery {
    pub project: ProjectName,
    pub params: RangeQueryParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListImagesResponse {
    pub images: Vec<ImageSummary>,
    pub order_by: OrderBy,
    pub order: SortOrder,
    pub limit: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ListImagesError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),
    #[error(transparent)]
    InvalidQuery(#[from] QueryBuildError),
    #[error("Image listing did not finish within {0:?}")]
    Timeout(Duration),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<ListImagesError> for AppError {
    fn from(err: ListImagesError) -> Self {
        match err {
            ListImagesError::ProjectNotFound(_) => AppError::NotFound(err.to_string()),
            ListImagesError::InvalidQuery(e) => e.into(),
            ListImagesError::Timeout(_) => AppError::Timeout(err.to_string()),
            ListImagesError::Database(e) => e.into(),
        }
    }
}

impl Request<Result<ListImagesResponse, ListImagesError>> for ListImagesQuery {}

impl crate::cqrs::middleware::Query for ListImagesQuery {}

/// List registered images matching range filters.
///
/// The request is validated into a plan before anything touches storage, so
/// a malformed filter or ordering never reaches the database.
#[tracing::instrument(skip(state, query), fields(project = %query.project))]
pub async fn handle(
    state: FeatureState,
    query: ListImagesQuery,
) -> Result<ListImagesResponse, ListImagesError> {
    let plan = query
        .params
        .build(&state.settings.query_limits, Utc::now())?;

    if !state.store.project_exists(&query.project).await? {
        return Err(ListImagesError::ProjectNotFound(query.project.to_string()));
    }

    let timeout = state.settings.query_timeout;
    let images = tokio::time::timeout(timeout, state.store.list_images(&query.project, &plan))
        .await
        .map_err(|_| ListImagesError::Timeout(timeout))??;

    tracing::debug!(count = images.len(), filters = plan.filters.len(), "Images listed");

    Ok(ListImagesResponse {
        images,
        order_by: plan.order_by,
        order: plan.order,
        limit: plan.limit,
    })
}
