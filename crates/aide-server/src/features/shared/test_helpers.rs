//! Test helpers and fixtures for feature tests
//!
//! Provides an in-memory [`ImageStore`] with the same transactional contract
//! as the PostgreSQL store, plus on-disk project fixtures.
//!
//! # Examples
//!
//! ```rust,ignore
//! use aide_server::features::shared::test_helpers::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let files = TestFiles::new("wildlife").with_files(&["a.jpg", "sub/b.png"]);
//!     let store = Arc::new(InMemoryImageStore::new().with_project("wildlife"));
//!     store.add_image("wildlife", TestImage::new("a.jpg").with_annotations(2));
//!
//!     let state = test_state(store.clone(), &files);
//!     // ... test logic ...
//! }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;

use crate::auth::AdminTokenAccess;
use crate::config::{Config, FilesConfig};
use crate::db::{
    DbError, DbResult, ImageStore, ImageSummary, ProjectName, RemovalOutcome, RemovalStatus,
};
use crate::features::FeatureState;
use crate::inventory::range_query::ImageQueryPlan;
use crate::inventory::InventorySettings;

/// Token accepted by states built with [`test_state`].
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

/// Builder for registered test images
#[derive(Debug, Clone)]
pub struct TestImage {
    pub id: Uuid,
    pub filename: String,
    pub date_added: DateTime<Utc>,
    pub views: Vec<(String, i64, DateTime<Utc>)>,
    pub annotations: i64,
    pub predictions: i64,
}

impl TestImage {
    pub fn new(filename: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            date_added: Utc::now() - Duration::days(1),
            views: Vec::new(),
            annotations: 0,
            predictions: 0,
        }
    }

    pub fn added_at(mut self, date_added: DateTime<Utc>) -> Self {
        self.date_added = date_added;
        self
    }

    /// Record `viewcount` views by `username`, last one at `last_checked`.
    pub fn with_views(
        mut self,
        username: &str,
        viewcount: i64,
        last_checked: DateTime<Utc>,
    ) -> Self {
        self.views.push((username.to_string(), viewcount, last_checked));
        self
    }

    pub fn with_annotations(mut self, count: i64) -> Self {
        self.annotations = count;
        self
    }

    pub fn with_predictions(mut self, count: i64) -> Self {
        self.predictions = count;
        self
    }

    fn summary(&self) -> ImageSummary {
        ImageSummary {
            id: self.id,
            filename: self.filename.clone(),
            date_added: self.date_added,
            last_viewed: self.views.iter().map(|(_, _, at)| *at).max(),
            viewcount: self.views.iter().map(|(_, count, _)| count).sum(),
            num_annotations: self.annotations,
            num_predictions: self.predictions,
        }
    }
}

#[derive(Debug, Default)]
struct ProjectData {
    images: BTreeMap<Uuid, TestImage>,
}

/// In-memory [`ImageStore`].
///
/// Simulated write failures are raised before anything changes, matching a
/// rolled-back transaction.
#[derive(Debug, Default)]
pub struct InMemoryImageStore {
    projects: Mutex<HashMap<String, ProjectData>>,
    fail_writes: AtomicBool,
    /// Names registered "concurrently" right before the next insert.
    race_on_insert: Mutex<Vec<String>>,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(self, project: &str) -> Self {
        self.projects
            .lock()
            .unwrap()
            .insert(project.to_string(), ProjectData::default());
        self
    }

    pub fn add_image(&self, project: &str, image: TestImage) -> Uuid {
        let id = image.id;
        self.projects
            .lock()
            .unwrap()
            .entry(project.to_string())
            .or_default()
            .images
            .insert(id, image);
        id
    }

    /// Make every subsequent write fail without changing anything.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Register `filename` as if by a concurrent writer just before the next
    /// insert batch lands.
    pub fn race_next_insert(&self, filename: &str) {
        self.race_on_insert.lock().unwrap().push(filename.to_string());
    }

    pub fn filenames(&self, project: &str) -> Vec<String> {
        let projects = self.projects.lock().unwrap();
        let mut names: Vec<String> = projects
            .get(project)
            .map(|data| data.images.values().map(|i| i.filename.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn image(&self, project: &str, id: Uuid) -> Option<TestImage> {
        self.projects
            .lock()
            .unwrap()
            .get(project)
            .and_then(|data| data.images.get(&id).cloned())
    }

    fn storage_failure() -> DbError {
        DbError::Sqlx(sqlx::Error::PoolTimedOut)
    }

    fn missing_project(project: &ProjectName) -> DbError {
        DbError::not_found("Project", project.as_str())
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn project_exists(&self, project: &ProjectName) -> DbResult<bool> {
        Ok(self.projects.lock().unwrap().contains_key(project.as_str()))
    }

    async fn registered_filenames(&self, project: &ProjectName) -> DbResult<HashSet<String>> {
        let projects = self.projects.lock().unwrap();
        let data = projects
            .get(project.as_str())
            .ok_or_else(|| Self::missing_project(project))?;
        Ok(data.images.values().map(|i| i.filename.clone()).collect())
    }

    async fn insert_images(
        &self,
        project: &ProjectName,
        filenames: &[String],
    ) -> DbResult<Vec<String>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::storage_failure());
        }

        let raced: Vec<String> = std::mem::take(&mut *self.race_on_insert.lock().unwrap());
        let mut projects = self.projects.lock().unwrap();
        let data = projects
            .get_mut(project.as_str())
            .ok_or_else(|| Self::missing_project(project))?;

        for name in raced {
            let image = TestImage::new(&name);
            data.images.insert(image.id, image);
        }

        let mut existing: HashSet<String> =
            data.images.values().map(|i| i.filename.clone()).collect();
        let mut inserted = Vec::new();
        for filename in filenames {
            if existing.insert(filename.clone()) {
                let image = TestImage::new(filename).added_at(Utc::now());
                data.images.insert(image.id, image);
                inserted.push(filename.clone());
            }
        }

        Ok(inserted)
    }

    async fn remove_images(
        &self,
        project: &ProjectName,
        ids: &[Uuid],
        force: bool,
    ) -> DbResult<Vec<RemovalOutcome>> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::storage_failure());
        }

        let mut projects = self.projects.lock().unwrap();
        let data = projects
            .get_mut(project.as_str())
            .ok_or_else(|| Self::missing_project(project))?;

        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            let dependents = data
                .images
                .get(&id)
                .map(|image| (image.annotations, image.predictions));
            let status = match dependents {
                None => RemovalStatus::Missing,
                Some((annotations, predictions))
                    if (annotations > 0 || predictions > 0) && !force =>
                {
                    RemovalStatus::Blocked {
                        annotations,
                        predictions,
                    }
                },
                Some(_) => match data.images.remove(&id) {
                    Some(image) => RemovalStatus::Removed {
                        filename: image.filename,
                    },
                    None => RemovalStatus::Missing,
                },
            };
            outcomes.push(RemovalOutcome { id, status });
        }

        Ok(outcomes)
    }

    async fn list_images(
        &self,
        project: &ProjectName,
        plan: &ImageQueryPlan,
    ) -> DbResult<Vec<ImageSummary>> {
        let projects = self.projects.lock().unwrap();
        let data = projects
            .get(project.as_str())
            .ok_or_else(|| Self::missing_project(project))?;

        let mut images: Vec<ImageSummary> = data
            .images
            .values()
            .map(TestImage::summary)
            .filter(|summary| plan.matches(summary))
            .collect();
        images.sort_by(|a, b| plan.compare(a, b));
        images.truncate(usize::try_from(plan.limit).unwrap_or(usize::MAX));
        Ok(images)
    }
}

/// A temporary file-server root holding one project folder.
pub struct TestFiles {
    pub dir: TempDir,
    pub project: String,
}

impl TestFiles {
    pub fn new(project: &str) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(project)).unwrap();
        Self {
            dir,
            project: project.to_string(),
        }
    }

    pub fn with_files(self, files: &[&str]) -> Self {
        for file in files {
            self.write(file);
        }
        self
    }

    pub fn write(&self, relative: &str) {
        let path = self.project_root().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"image").unwrap();
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn project_root(&self) -> PathBuf {
        self.dir.path().join(&self.project)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.project_root().join(relative).exists()
    }
}

/// Inventory settings over `files` with default allow-lists and limits.
pub fn test_settings(files: &TestFiles) -> InventorySettings {
    let config = Config {
        files: FilesConfig {
            root: files.root().to_path_buf(),
            ..FilesConfig::default()
        },
        ..Config::default()
    };
    InventorySettings::from_config(&config).unwrap()
}

/// Feature state over `store` and `files`, accepting [`TEST_ADMIN_TOKEN`].
pub fn test_state(store: Arc<InMemoryImageStore>, files: &TestFiles) -> FeatureState {
    FeatureState {
        store,
        access: Arc::new(AdminTokenAccess::new(Some(TEST_ADMIN_TOKEN.to_string()))),
        settings: Arc::new(test_settings(files)),
    }
}

pub fn project(name: &str) -> ProjectName {
    ProjectName::parse(name).unwrap()
}
