use crate::api::response::ApiResponse;
use crate::auth::{ensure_access, Credentials};
use crate::db::ProjectName;
use crate::error::{ApiResult, AppError};
use crate::features::FeatureState;
use crate::inventory::RangeQueryParams;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{
    commands::{AddExistingImagesCommand, ImageSelection, RemoveImagesCommand},
    queries::{GetImageExtensionsQuery, GetImageMimeTypesQuery, ListImagesQuery, ScanImagesQuery},
};

/// Routes mounted under `/projects/:project/images`.
pub fn images_routes() -> Router<FeatureState> {
    Router::new()
        .route("/list", post(list_images))
        .route("/scan", get(scan_images))
        .route("/add-existing", post(add_existing_images))
        .route("/remove", post(remove_images))
}

/// Public routes mounted under `/formats`.
pub fn formats_routes() -> Router<FeatureState> {
    Router::new()
        .route("/extensions", get(get_image_extensions))
        .route("/mime-types", get(get_image_mime_types))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddExistingImagesBody {
    images: ImageSelection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveImagesBody {
    #[serde(alias = "imageIDs", alias = "images")]
    image_ids: Vec<Uuid>,
    #[serde(default)]
    force_remove: bool,
    #[serde(default)]
    delete_from_disk: bool,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::InvalidParameter(rejection.body_text()))
}

/// Validate the project segment and check admin access, in that order.
async fn authorize(
    state: &FeatureState,
    credentials: &Credentials,
    project: String,
) -> ApiResult<ProjectName> {
    let project = ProjectName::parse(&project)?;
    ensure_access(state.access.as_ref(), credentials, &project, true).await?;
    Ok(project)
}

#[tracing::instrument(skip(state, credentials, body), fields(project = %project))]
async fn list_images(
    State(state): State<FeatureState>,
    Path(project): Path<String>,
    credentials: Credentials,
    body: Result<Json<RangeQueryParams>, JsonRejection>,
) -> ApiResult<Response> {
    let project = authorize(&state, &credentials, project).await?;
    let params = json_body(body)?;

    let query = ListImagesQuery { project, params };
    let response = super::queries::list::handle(state, query).await?;

    tracing::debug!(count = response.images.len(), "Images listed via API");

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state, credentials), fields(project = %project))]
async fn scan_images(
    State(state): State<FeatureState>,
    Path(project): Path<String>,
    credentials: Credentials,
) -> ApiResult<Response> {
    let project = authorize(&state, &credentials, project).await?;

    let response = super::queries::scan::handle(state, ScanImagesQuery { project }).await?;

    tracing::debug!(
        new_images = response.images.len(),
        missing_on_disk = response.missing_on_disk.len(),
        "Images scanned via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state, credentials, body), fields(project = %project))]
async fn add_existing_images(
    State(state): State<FeatureState>,
    Path(project): Path<String>,
    credentials: Credentials,
    body: Result<Json<AddExistingImagesBody>, JsonRejection>,
) -> ApiResult<Response> {
    let project = authorize(&state, &credentials, project).await?;
    let body = json_body(body)?;

    let command = AddExistingImagesCommand {
        project,
        images: body.images,
    };
    let response = super::commands::add_existing::handle(state, command).await?;

    tracing::info!(
        accepted = response.accepted.len(),
        rejected = response.rejected.len(),
        "Existing images added via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state, credentials, body), fields(project = %project))]
async fn remove_images(
    State(state): State<FeatureState>,
    Path(project): Path<String>,
    credentials: Credentials,
    body: Result<Json<RemoveImagesBody>, JsonRejection>,
) -> ApiResult<Response> {
    let project = authorize(&state, &credentials, project).await?;
    let body = json_body(body)?;

    let command = RemoveImagesCommand {
        project,
        image_ids: body.image_ids,
        force_remove: body.force_remove,
        delete_from_disk: body.delete_from_disk,
    };
    let response = super::commands::remove::handle(state, command).await?;

    tracing::info!(
        removed = response.removed.len(),
        blocked = response.blocked.len(),
        "Images removed via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

async fn get_image_extensions(State(state): State<FeatureState>) -> Response {
    let query = GetImageExtensionsQuery;
    let response = match super::queries::formats::handle_extensions(state, query).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    (StatusCode::OK, Json(ApiResponse::success(response.formats))).into_response()
}

async fn get_image_mime_types(State(state): State<FeatureState>) -> Response {
    let query = GetImageMimeTypesQuery;
    let response = match super::queries::formats::handle_mime_types(state, query).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    (StatusCode::OK, Json(ApiResponse::success(response.formats))).into_response()
}
