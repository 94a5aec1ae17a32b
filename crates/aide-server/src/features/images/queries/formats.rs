use mediator::Request;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::features::FeatureState;

/// Extensions treated as images, e.g. `.jpg`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetImageExtensionsQuery;

/// MIME types accepted for images, e.g. `image/png`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetImageMimeTypesQuery;

#[derive(Debug, Clone, Serialize)]
pub struct SupportedFormatsResponse {
    pub formats: Vec<String>,
}

impl Request<Result<SupportedFormatsResponse, Infallible>> for GetImageExtensionsQuery {}

impl crate::cqrs::middleware::Query for GetImageExtensionsQuery {}

impl Request<Result<SupportedFormatsResponse, Infallible>> for GetImageMimeTypesQuery {}

impl crate::cqrs::middleware::Query for GetImageMimeTypesQuery {}

pub async fn handle_extensions(
    state: FeatureState,
    _query: GetImageExtensionsQuery,
) -> Result<SupportedFormatsResponse, Infallible> {
    let formats = state
        .settings
        .scanner
        .extensions()
        .iter()
        .map(str::to_string)
        .collect();
    Ok(SupportedFormatsResponse { formats })
}

pub async fn handle_mime_types(
    state: FeatureState,
    _query: GetImageMimeTypesQuery,
) -> Result<SupportedFormatsResponse, Infallible> {
    let formats = state.settings.mime_types.iter().map(str::to_string).collect();
    Ok(SupportedFormatsResponse { formats })
}
