//! PostgreSQL-backed image store
//!
//! Each project lives in its own schema, so table references are built from a
//! validated [`ProjectName`] and every value is bound as a parameter. Runtime
//! queries are used throughout since the schema is only known per request.
//!
//! Bulk inserts are chunked to stay below PostgreSQL's bind parameter limit.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::project::{ProjectName, ProjectTable};
use super::store::{ImageStore, ImageSummary, RemovalOutcome, RemovalStatus};
use super::DbResult;
use crate::inventory::range_query::{BoundValue, ImageQueryPlan};

/// Rows per `INSERT` statement when registering images.
pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct PgImageStore {
    pool: PgPool,
    insert_chunk_size: usize,
}

impl PgImageStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            insert_chunk_size: DEFAULT_INSERT_CHUNK_SIZE,
        }
    }

    pub fn with_insert_chunk_size(mut self, chunk_size: usize) -> Self {
        self.insert_chunk_size = chunk_size.max(1);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ImageStore for PgImageStore {
    #[tracing::instrument(skip(self), fields(project = %project))]
    async fn project_exists(&self, project: &ProjectName) -> DbResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = $1 AND table_name = $2
            )
            "#,
        )
        .bind(project.as_str())
        .bind(ProjectTable::Image.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    #[tracing::instrument(skip(self), fields(project = %project))]
    async fn registered_filenames(&self, project: &ProjectName) -> DbResult<HashSet<String>> {
        let sql = format!("SELECT filename FROM {}", project.table(ProjectTable::Image));
        let filenames = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(filenames.into_iter().collect())
    }

    #[tracing::instrument(skip(self, filenames), fields(project = %project, count = filenames.len()))]
    async fn insert_images(
        &self,
        project: &ProjectName,
        filenames: &[String],
    ) -> DbResult<Vec<String>> {
        if filenames.is_empty() {
            return Ok(Vec::new());
        }

        let table = project.table(ProjectTable::Image);
        let total_chunks = filenames.len().div_ceil(self.insert_chunk_size);
        let mut inserted = Vec::with_capacity(filenames.len());

        let mut tx = self.pool.begin().await?;

        for (chunk_idx, chunk) in filenames.chunks(self.insert_chunk_size).enumerate() {
            tracing::debug!(
                chunk = chunk_idx + 1,
                total_chunks,
                size = chunk.len(),
                "Inserting image chunk"
            );

            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new(format!("INSERT INTO {} (filename) ", table));
            query_builder.push_values(chunk.iter(), |mut b, filename| {
                b.push_bind(filename);
            });
            query_builder.push(" ON CONFLICT (filename) DO NOTHING RETURNING filename");

            let rows = query_builder
                .build_query_scalar::<String>()
                .fetch_all(&mut *tx)
                .await?;
            inserted.extend(rows);
        }

        tx.commit().await?;

        tracing::info!(
            requested = filenames.len(),
            inserted = inserted.len(),
            "Registered images"
        );

        Ok(inserted)
    }

    #[tracing::instrument(skip(self, ids), fields(project = %project, count = ids.len()))]
    async fn remove_images(
        &self,
        project: &ProjectName,
        ids: &[Uuid],
        force: bool,
    ) -> DbResult<Vec<RemovalOutcome>> {
        let image = project.table(ProjectTable::Image);
        let image_user = project.table(ProjectTable::ImageUser);
        let annotation = project.table(ProjectTable::Annotation);
        let prediction = project.table(ProjectTable::Prediction);

        let lock_sql = format!(
            "SELECT id, filename FROM {} WHERE id = ANY($1) ORDER BY id FOR UPDATE",
            image
        );
        let count_sql = format!(
            "SELECT (SELECT COUNT(*) FROM {} WHERE image = $1), \
             (SELECT COUNT(*) FROM {} WHERE image = $1)",
            annotation, prediction
        );
        let delete_annotations = format!("DELETE FROM {} WHERE image = $1", annotation);
        let delete_predictions = format!("DELETE FROM {} WHERE image = $1", prediction);
        let delete_views = format!("DELETE FROM {} WHERE image = $1", image_user);
        let delete_image = format!("DELETE FROM {} WHERE id = $1", image);

        let mut outcomes = Vec::with_capacity(ids.len());
        let mut tx = self.pool.begin().await?;

        // Row locks are taken in id order so overlapping removals cannot deadlock.
        let mut locked: HashMap<Uuid, String> = sqlx::query_as::<_, (Uuid, String)>(&lock_sql)
            .bind(ids)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .collect();

        for &id in ids {
            let Some(filename) = locked.remove(&id) else {
                outcomes.push(RemovalOutcome {
                    id,
                    status: RemovalStatus::Missing,
                });
                continue;
            };

            let (annotations, predictions) = sqlx::query_as::<_, (i64, i64)>(&count_sql)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

            if (annotations > 0 || predictions > 0) && !force {
                outcomes.push(RemovalOutcome {
                    id,
                    status: RemovalStatus::Blocked {
                        annotations,
                        predictions,
                    },
                });
                continue;
            }

            if force {
                sqlx::query(&delete_annotations).bind(id).execute(&mut *tx).await?;
                sqlx::query(&delete_predictions).bind(id).execute(&mut *tx).await?;
            }
            sqlx::query(&delete_views).bind(id).execute(&mut *tx).await?;
            sqlx::query(&delete_image).bind(id).execute(&mut *tx).await?;

            outcomes.push(RemovalOutcome {
                id,
                status: RemovalStatus::Removed { filename },
            });
        }

        tx.commit().await?;

        Ok(outcomes)
    }

    #[tracing::instrument(skip(self, plan), fields(project = %project, limit = plan.limit))]
    async fn list_images(
        &self,
        project: &ProjectName,
        plan: &ImageQueryPlan,
    ) -> DbResult<Vec<ImageSummary>> {
        let images = build_list_query(project, plan)
            .build_query_as::<ImageSummary>()
            .fetch_all(&self.pool)
            .await?;

        Ok(images)
    }
}

/// Render `plan` as a query over the project's inventory relation.
///
/// The relation joins every image with its aggregated view statistics and
/// annotation/prediction counts. Filters compare a column against two bound
/// parameters; never-viewed images carry a NULL `last_viewed` and so never
/// satisfy a filter on it.
pub(crate) fn build_list_query<'a>(
    project: &ProjectName,
    plan: &'a ImageQueryPlan,
) -> QueryBuilder<'a, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        r#"SELECT id, filename, date_added, last_viewed, viewcount, num_anno, num_pred FROM (
            SELECT img.id, img.filename, img.date_added,
                   iu.last_viewed,
                   COALESCE(iu.viewcount, 0)::BIGINT AS viewcount,
                   COALESCE(anno.cnt, 0)::BIGINT AS num_anno,
                   COALESCE(pred.cnt, 0)::BIGINT AS num_pred
            FROM {image} AS img
            LEFT JOIN (
                SELECT image, MAX(last_checked) AS last_viewed, SUM(viewcount) AS viewcount
                FROM {image_user} GROUP BY image
            ) AS iu ON iu.image = img.id
            LEFT JOIN (
                SELECT image, COUNT(*) AS cnt FROM {annotation} GROUP BY image
            ) AS anno ON anno.image = img.id
            LEFT JOIN (
                SELECT image, COUNT(*) AS cnt FROM {prediction} GROUP BY image
            ) AS pred ON pred.image = img.id
        ) AS inventory
        WHERE TRUE"#,
        image = project.table(ProjectTable::Image),
        image_user = project.table(ProjectTable::ImageUser),
        annotation = project.table(ProjectTable::Annotation),
        prediction = project.table(ProjectTable::Prediction),
    ));

    for filter in &plan.filters {
        query_builder
            .push(" AND ")
            .push(filter.field.column())
            .push(" BETWEEN ");
        push_bound(&mut query_builder, filter.min);
        query_builder.push(" AND ");
        push_bound(&mut query_builder, filter.max);
    }

    query_builder
        .push(" ORDER BY ")
        .push(plan.order_by.column())
        .push(" ")
        .push(plan.order.keyword())
        .push(" NULLS LAST, id ASC LIMIT ")
        .push_bind(plan.limit);

    query_builder
}

fn push_bound(query_builder: &mut QueryBuilder<'_, Postgres>, bound: BoundValue) {
    match bound {
        BoundValue::Instant(instant) => query_builder.push_bind(instant),
        BoundValue::Count(count) => query_builder.push_bind(count),
    };
}
