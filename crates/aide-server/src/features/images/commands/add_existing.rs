use mediator::Request;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::db::{DbError, ProjectName};
use crate::error::{AppError, ErrorCode};
use crate::features::FeatureState;
use crate::inventory::paths::{resolve, validate_name};
use crate::inventory::{diff, ScanError};

/// Which images to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSelection", into = "RawSelection")]
pub enum ImageSelection {
    /// Every image on disk that is not registered yet.
    All,
    Named(Vec<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawSelection {
    Keyword(String),
    Names(Vec<String>),
}

impl TryFrom<RawSelection> for ImageSelection {
    type Error = String;

    fn try_from(raw: RawSelection) -> Result<Self, Self::Error> {
        match raw {
            RawSelection::Keyword(keyword) if keyword.eq_ignore_ascii_case("all") => {
                Ok(ImageSelection::All)
            },
            RawSelection::Keyword(other) => Err(format!(
                "expected \"all\" or a list of filenames, got \"{}\"",
                other
            )),
            RawSelection::Names(names) => Ok(ImageSelection::Named(names)),
        }
    }
}

impl From<ImageSelection> for RawSelection {
    fn from(selection: ImageSelection) -> Self {
        match selection {
            ImageSelection::All => RawSelection::Keyword("all".to_string()),
            ImageSelection::Named(names) => RawSelection::Names(names),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddExistingImagesCommand {
    pub project: ProjectName,
    pub images: ImageSelection,
}

/// Why a filename was not registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    /// Empty, absolute, or escaping the project folder.
    InvalidName,
    /// Already registered, or repeated within the request.
    Duplicate,
    /// No image file with an allowed extension at that path.
    NotOnDisk,
}

impl RejectReason {
    pub fn code(self) -> ErrorCode {
        match self {
            RejectReason::InvalidName => ErrorCode::InvalidParameter,
            RejectReason::Duplicate => ErrorCode::Duplicate,
            RejectReason::NotOnDisk => ErrorCode::NotFound,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedImage {
    pub filename: String,
    pub reason: RejectReason,
    pub code: ErrorCode,
    pub message: String,
}

impl RejectedImage {
    fn new(filename: &str, reason: RejectReason, message: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            reason,
            code: reason.code(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// Every requested image was registered.
    Complete,
    /// Some images were registered, some rejected.
    Partial,
    /// Nothing was registered.
    NothingAdded,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddExistingImagesResponse {
    pub status: IngestStatus,
    pub accepted: Vec<String>,
    pub rejected: Vec<RejectedImage>,
}

#[derive(Debug, thiserror::Error)]
pub enum AddExistingImagesError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),
    #[error("Image scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<AddExistingImagesError> for AppError {
    fn from(err: AddExistingImagesError) -> Self {
        match err {
            AddExistingImagesError::ProjectNotFound(_) => AppError::NotFound(err.to_string()),
            AddExistingImagesError::Scan(e) => e.into(),
            AddExistingImagesError::Database(e) => e.into(),
        }
    }
}

impl Request<Result<AddExistingImagesResponse, AddExistingImagesError>>
    for AddExistingImagesCommand
{
}

impl crate::cqrs::middleware::Command for AddExistingImagesCommand {}

/// Register images that already exist in the project folder.
///
/// Each named file is checked in order: name validity, repetition within the
/// request, presence on disk, then registration. The registered set is read
/// again right before the write so that names added since a scan are
/// reported as duplicates; a name that still slips in concurrently is
/// skipped by the store and reported the same way. The insert itself is one
/// transaction: if it fails, nothing from the batch is registered and the
/// whole call fails.
#[tracing::instrument(skip(state, command), fields(project = %command.project))]
pub async fn handle(
    state: FeatureState,
    command: AddExistingImagesCommand,
) -> Result<AddExistingImagesResponse, AddExistingImagesError> {
    let project = command.project;

    if !state.store.project_exists(&project).await? {
        return Err(AddExistingImagesError::ProjectNotFound(project.to_string()));
    }

    let mut rejected = Vec::new();
    let candidates = match command.images {
        ImageSelection::All => {
            let on_disk = state.settings.scan_project(&project).await?;
            let registered = state.store.registered_filenames(&project).await?;
            let mut valid = Vec::new();
            for name in diff(&on_disk, &registered).sorted_disk_only() {
                match validate_name(&name) {
                    Ok(()) => valid.push(name),
                    Err(e) => rejected.push(RejectedImage::new(
                        &name,
                        RejectReason::InvalidName,
                        e.to_string(),
                    )),
                }
            }
            valid
        },
        ImageSelection::Named(names) => check_named(&state, &project, names, &mut rejected).await,
    };

    let registered = state.store.registered_filenames(&project).await?;
    let (fresh, already): (Vec<String>, Vec<String>) = candidates
        .into_iter()
        .partition(|name| !registered.contains(name));
    for name in already {
        rejected.push(RejectedImage::new(
            &name,
            RejectReason::Duplicate,
            "Image is already registered",
        ));
    }

    let inserted = state.store.insert_images(&project, &fresh).await?;
    let inserted_set: HashSet<&String> = inserted.iter().collect();
    for name in fresh.iter().filter(|name| !inserted_set.contains(name)) {
        rejected.push(RejectedImage::new(
            name,
            RejectReason::Duplicate,
            "Image was registered concurrently",
        ));
    }

    for rejection in &rejected {
        tracing::debug!(
            filename = %rejection.filename,
            reason = ?rejection.reason,
            "Image not registered"
        );
    }

    let status = match (inserted.is_empty(), rejected.is_empty()) {
        (false, true) => IngestStatus::Complete,
        (false, false) => IngestStatus::Partial,
        (true, false) => IngestStatus::NothingAdded,
        (true, true) => IngestStatus::Complete,
    };

    tracing::info!(
        accepted = inserted.len(),
        rejected = rejected.len(),
        "Existing images registered"
    );

    Ok(AddExistingImagesResponse {
        status,
        accepted: inserted,
        rejected,
    })
}

/// Filter `names` down to valid, unique names of image files on disk,
/// recording every rejection.
async fn check_named(
    state: &FeatureState,
    project: &ProjectName,
    names: Vec<String>,
    rejected: &mut Vec<RejectedImage>,
) -> Vec<String> {
    let root = state.settings.project_root(project);
    let extensions = state.settings.scanner.extensions();
    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(names.len());

    for name in names {
        if let Err(e) = validate_name(&name) {
            rejected.push(RejectedImage::new(&name, RejectReason::InvalidName, e.to_string()));
            continue;
        }

        if !seen.insert(name.clone()) {
            rejected.push(RejectedImage::new(
                &name,
                RejectReason::Duplicate,
                "Image is listed more than once",
            ));
            continue;
        }

        let on_disk = match resolve(&root, &name) {
            Ok(path) if extensions.matches(&path) => tokio::fs::metadata(&path)
                .await
                .map(|metadata| metadata.is_file())
                .unwrap_or(false),
            _ => false,
        };
        if !on_disk {
            rejected.push(RejectedImage::new(
                &name,
                RejectReason::NotOnDisk,
                "No image file with an allowed extension at this path",
            ));
            continue;
        }

        candidates.push(name);
    }

    candidates
}
