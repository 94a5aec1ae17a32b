use mediator::Request;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::{DbError, ProjectName, RemovalStatus};
use crate::error::{AppError, ErrorCode};
use crate::features::FeatureState;
use crate::inventory::paths::resolve;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveImagesCommand {
    pub project: ProjectName,
    pub image_ids: Vec<Uuid>,
    /// Also delete annotations and predictions of the images.
    pub force_remove: bool,
    /// Also delete the image files once the records are gone.
    pub delete_from_disk: bool,
}

/// An image left in place because it has dependents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedImage {
    pub id: Uuid,
    pub code: ErrorCode,
    pub annotations: i64,
    pub predictions: i64,
}

/// A removed image whose file could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskFailure {
    pub id: Uuid,
    pub filename: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Outcome of a removal batch.
///
/// `removed` lists the images whose records were deleted. File deletion is
/// reported separately: a file that could not be deleted shows up in
/// `disk_failures` while its image still counts as removed, since the
/// database change is already committed by then.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoveImagesResponse {
    pub removed: Vec<Uuid>,
    pub blocked: Vec<BlockedImage>,
    pub missing: Vec<Uuid>,
    pub deleted_from_disk: Vec<Uuid>,
    pub disk_failures: Vec<DiskFailure>,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoveImagesError {
    #[error("Project '{0}' not found")]
    ProjectNotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<RemoveImagesError> for AppError {
    fn from(err: RemoveImagesError) -> Self {
        match err {
            RemoveImagesError::ProjectNotFound(_) => AppError::NotFound(err.to_string()),
            RemoveImagesError::Database(e) => e.into(),
        }
    }
}

impl Request<Result<RemoveImagesResponse, RemoveImagesError>> for RemoveImagesCommand {}

impl crate::cqrs::middleware::Command for RemoveImagesCommand {}

impl RemoveImagesCommand {
    /// Requested ids without repeats, in request order.
    fn unique_ids(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        self.image_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Remove registered images.
///
/// All record deletions happen in one storage transaction; if it fails
/// nothing is removed and the whole call fails. Ids that are not registered
/// are reported as missing, so repeating a removal is harmless. Files are
/// deleted only after the transaction commits, one by one, and a failure
/// there never brings a record back.
#[tracing::instrument(
    skip(state, command),
    fields(project = %command.project, count = command.image_ids.len())
)]
pub async fn handle(
    state: FeatureState,
    command: RemoveImagesCommand,
) -> Result<RemoveImagesResponse, RemoveImagesError> {
    if !state.store.project_exists(&command.project).await? {
        return Err(RemoveImagesError::ProjectNotFound(command.project.to_string()));
    }

    let ids = command.unique_ids();
    let mut response = RemoveImagesResponse::default();
    if ids.is_empty() {
        return Ok(response);
    }

    let outcomes = state
        .store
        .remove_images(&command.project, &ids, command.force_remove)
        .await?;

    let mut removed_files = Vec::new();
    for outcome in outcomes {
        match outcome.status {
            RemovalStatus::Removed { filename } => {
                response.removed.push(outcome.id);
                removed_files.push((outcome.id, filename));
            },
            RemovalStatus::Blocked {
                annotations,
                predictions,
            } => {
                tracing::info!(
                    image_id = %outcome.id,
                    annotations,
                    predictions,
                    "Image has dependents, not removed"
                );
                response.blocked.push(BlockedImage {
                    id: outcome.id,
                    code: ErrorCode::DependencyConflict,
                    annotations,
                    predictions,
                });
            },
            RemovalStatus::Missing => response.missing.push(outcome.id),
        }
    }

    if command.delete_from_disk {
        let root = state.settings.project_root(&command.project);
        for (id, filename) in removed_files {
            match delete_file(&root, &filename).await {
                Ok(()) => response.deleted_from_disk.push(id),
                Err(message) => {
                    tracing::warn!(
                        image_id = %id,
                        filename = %filename,
                        error = %message,
                        "Image record removed but file deletion failed"
                    );
                    response.disk_failures.push(DiskFailure {
                        id,
                        filename,
                        code: ErrorCode::DiskIoFailure,
                        message,
                    });
                },
            }
        }
    }

    tracing::info!(
        removed = response.removed.len(),
        blocked = response.blocked.len(),
        missing = response.missing.len(),
        disk_failures = response.disk_failures.len(),
        "Images removed"
    );

    Ok(response)
}

/// Delete `filename` under `root`. A file that is already gone counts as
/// deleted.
async fn delete_file(root: &std::path::Path, filename: &str) -> Result<(), String> {
    let path = resolve(root, filename).map_err(|e| format!("Refusing to delete file: {}", e))?;

    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(format!("Failed to delete '{}': {}", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::shared::test_helpers::*;
    use std::sync::Arc;

    fn setup(files: &[&str]) -> (Arc<InMemoryImageStore>, TestFiles, FeatureState) {
        let files = TestFiles::new("wildlife").with_files(files);
        let store = Arc::new(InMemoryImageStore::new().with_project("wildlife"));
        let state = test_state(store.clone(), &files);
        (store, files, state)
    }

    fn command(ids: &[Uuid], force_remove: bool, delete_from_disk: bool) -> RemoveImagesCommand {
        RemoveImagesCommand {
            project: project("wildlife"),
            image_ids: ids.to_vec(),
            force_remove,
            delete_from_disk,
        }
    }

    #[tokio::test]
    async fn test_removes_image_without_dependents() {
        let (store, files, state) = setup(&["a.jpg"]);
        let id = store.add_image("wildlife", TestImage::new("a.jpg"));

        let response = handle(state, command(&[id], false, false)).await.unwrap();

        assert_eq!(response.removed, vec![id]);
        assert!(store.image("wildlife", id).is_none());
        assert!(files.exists("a.jpg"));
        assert!(response.deleted_from_disk.is_empty());
    }

    #[tokio::test]
    async fn test_dependents_block_unforced_removal() {
        let (store, _files, state) = setup(&[]);
        let id = store.add_image("wildlife", TestImage::new("a.jpg").with_annotations(1));

        let response = handle(state, command(&[id], false, false)).await.unwrap();

        assert!(response.removed.is_empty());
        assert_eq!(
            response.blocked,
            vec![BlockedImage {
                id,
                code: ErrorCode::DependencyConflict,
                annotations: 1,
                predictions: 0,
            }]
        );
        assert!(store.image("wildlife", id).is_some());
    }

    #[tokio::test]
    async fn test_forced_removal_takes_dependents() {
        let (store, _files, state) = setup(&[]);
        let id = store.add_image(
            "wildlife",
            TestImage::new("a.jpg").with_annotations(1).with_predictions(3),
        );

        let response = handle(state, command(&[id], true, false)).await.unwrap();

        assert_eq!(response.removed, vec![id]);
        assert!(response.blocked.is_empty());
        assert!(store.image("wildlife", id).is_none());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_an_error() {
        let (_store, _files, state) = setup(&[]);
        let ghost = Uuid::new_v4();

        let response = handle(state, command(&[ghost], false, true)).await.unwrap();

        assert!(response.removed.is_empty());
        assert_eq!(response.missing, vec![ghost]);
    }

    #[tokio::test]
    async fn test_repeated_removal_is_idempotent() {
        let (store, _files, state) = setup(&["a.jpg"]);
        let id = store.add_image("wildlife", TestImage::new("a.jpg"));

        let first = handle(state.clone(), command(&[id, id], false, true)).await.unwrap();
        let second = handle(state, command(&[id], false, true)).await.unwrap();

        assert_eq!(first.removed, vec![id]);
        assert!(second.removed.is_empty());
        assert_eq!(second.missing, vec![id]);
    }

    #[tokio::test]
    async fn test_delete_from_disk() {
        let (store, files, state) = setup(&["a.jpg", "sub/b.jpg"]);
        let a = store.add_image("wildlife", TestImage::new("a.jpg"));
        let b = store.add_image("wildlife", TestImage::new("sub/b.jpg"));
        let gone = store.add_image("wildlife", TestImage::new("already-gone.jpg"));

        let response = handle(state, command(&[a, b, gone], false, true)).await.unwrap();

        assert_eq!(response.removed, vec![a, b, gone]);
        assert_eq!(response.deleted_from_disk, vec![a, b, gone]);
        assert!(response.disk_failures.is_empty());
        assert!(!files.exists("a.jpg"));
        assert!(!files.exists("sub/b.jpg"));
    }

    #[tokio::test]
    async fn test_disk_failure_keeps_database_removal() {
        let (store, files, state) = setup(&[]);
        // A directory in place of the file makes remove_file fail.
        std::fs::create_dir_all(files.project_root().join("stuck.jpg")).unwrap();
        let id = store.add_image("wildlife", TestImage::new("stuck.jpg"));

        let response = handle(state, command(&[id], false, true)).await.unwrap();

        assert_eq!(response.removed, vec![id]);
        assert_eq!(response.disk_failures.len(), 1);
        assert_eq!(response.disk_failures[0].code, ErrorCode::DiskIoFailure);
        assert!(store.image("wildlife", id).is_none());
    }

    #[tokio::test]
    async fn test_stored_name_outside_project_is_not_deleted() {
        let (store, files, state) = setup(&[]);
        std::fs::write(files.root().join("outside.jpg"), b"keep").unwrap();
        let id = store.add_image("wildlife", TestImage::new("../outside.jpg"));

        let response = handle(state, command(&[id], false, true)).await.unwrap();

        assert_eq!(response.removed, vec![id]);
        assert_eq!(response.disk_failures.len(), 1);
        assert!(files.root().join("outside.jpg").exists());
    }

    #[tokio::test]
    async fn test_storage_failure_removes_nothing() {
        let (store, files, state) = setup(&["a.jpg"]);
        let id = store.add_image("wildlife", TestImage::new("a.jpg"));
        store.fail_writes();

        let result = handle(state, command(&[id], true, true)).await;

        assert!(matches!(result, Err(RemoveImagesError::Database(_))));
        assert!(store.image("wildlife", id).is_some());
        assert!(files.exists("a.jpg"));
    }
}
