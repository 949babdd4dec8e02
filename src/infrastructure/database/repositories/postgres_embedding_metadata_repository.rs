use async_trait::async_trait;
use diesel::prelude::*;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use uuid::Uuid;

use super::postgres_outbox_repository::queue_point_deletions;
use crate::domain::entities::{EmbeddingMetadata, NewEmbeddingMetadata};
use crate::domain::repositories::{EmbeddingMetadataRepository, MetadataError, PointRef};
use crate::domain::value_objects::{EmbeddingKind, EntityKind, PointId};
use crate::infrastructure::database::errors::classify_record_error;
use crate::infrastructure::database::models::{EmbeddingModel, NewEmbeddingModel};
use crate::infrastructure::database::schema::{embeddings, entities};
use crate::infrastructure::database::{DbPool, with_connection};

const DEFAULT_PAGE_SIZE: i64 = 100;

pub struct PostgresEmbeddingMetadataRepository {
    pool: DbPool,
    page_size: i64,
}

impl PostgresEmbeddingMetadataRepository {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

fn to_metadata(model: EmbeddingModel) -> Result<EmbeddingMetadata, MetadataError> {
    EmbeddingMetadata::try_from(model).map_err(MetadataError::ValidationError)
}

/// Position of the `list_for` walk: kinds are visited in domain order and
/// chunks are paged within each kind.
#[derive(Debug, Clone, Copy)]
struct ListCursor {
    kind_index: usize,
    after_chunk: Option<i32>,
}

fn load_page(
    conn: &mut PgConnection,
    entity_uuid: Uuid,
    kind: EmbeddingKind,
    after_chunk: Option<i32>,
    limit: i64,
) -> QueryResult<Vec<EmbeddingModel>> {
    let mut query = embeddings::table
        .filter(embeddings::entity_uuid.eq(entity_uuid))
        .filter(embeddings::embedding_kind.eq(kind.as_str()))
        .into_boxed();

    if let Some(after_chunk) = after_chunk {
        query = query.filter(embeddings::chunk_index.gt(after_chunk));
    }

    query
        .order(embeddings::chunk_index.asc())
        .limit(limit)
        .select(EmbeddingModel::as_select())
        .load(conn)
}

fn entity_kind_of(
    conn: &mut PgConnection,
    entity_uuid: Uuid,
) -> Result<Option<EntityKind>, MetadataError> {
    entities::table
        .filter(entities::uuid.eq(entity_uuid))
        .select(entities::kind)
        .get_result::<String>(conn)
        .optional()?
        .map(|kind| EntityKind::from_string(&kind))
        .transpose()
        .map_err(MetadataError::ValidationError)
}

/// Deletes the entity's rows (one kind, or all) on the caller's connection and
/// queues a `point_delete` for each removed point. Points come back in slot
/// order.
pub(super) fn remove_rows(
    conn: &mut PgConnection,
    entity_uuid: Uuid,
    entity_kind: Option<EntityKind>,
    embedding_kind: Option<EmbeddingKind>,
) -> Result<Vec<PointId>, MetadataError> {
    let returned = (
        embeddings::embedding_kind,
        embeddings::chunk_index,
        embeddings::point_id,
    );
    let rows: Vec<(String, i32, Uuid)> = match embedding_kind {
        Some(kind) => diesel::delete(
            embeddings::table
                .filter(embeddings::entity_uuid.eq(entity_uuid))
                .filter(embeddings::embedding_kind.eq(kind.as_str())),
        )
        .returning(returned)
        .get_results(conn)?,
        None => diesel::delete(embeddings::table.filter(embeddings::entity_uuid.eq(entity_uuid)))
            .returning(returned)
            .get_results(conn)?,
    };

    let mut removed = rows
        .into_iter()
        .map(|(kind, chunk, point)| {
            EmbeddingKind::from_string(&kind).map(|kind| (kind, chunk, PointId::from_uuid(point)))
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(MetadataError::ValidationError)?;
    removed.sort();

    let points: Vec<PointId> = removed.into_iter().map(|(_, _, point)| point).collect();
    queue_point_deletions(conn, entity_uuid, entity_kind, &points)?;
    Ok(points)
}

fn invalidate_rows(
    conn: &mut PgConnection,
    entity_uuid: Uuid,
    embedding_kind: Option<EmbeddingKind>,
) -> Result<Vec<PointId>, MetadataError> {
    conn.transaction::<_, MetadataError, _>(|conn| {
        let entity_kind = entity_kind_of(conn, entity_uuid)?;
        remove_rows(conn, entity_uuid, entity_kind, embedding_kind)
    })
}

#[async_trait]
impl EmbeddingMetadataRepository for PostgresEmbeddingMetadataRepository {
    async fn record(
        &self,
        request: NewEmbeddingMetadata,
    ) -> Result<EmbeddingMetadata, MetadataError> {
        let model = NewEmbeddingModel::from(&EmbeddingMetadata::new(request.clone()));

        with_connection(&self.pool, move |conn| {
            conn.transaction::<_, MetadataError, _>(|conn| {
                let inserted = diesel::insert_into(embeddings::table)
                    .values(&model)
                    .returning(EmbeddingModel::as_returning())
                    .get_result(conn)
                    .map_err(|e| classify_record_error(e, &request))?;
                to_metadata(inserted)
            })
        })
        .await
    }

    fn list_for(&self, entity_uuid: Uuid) -> BoxStream<'static, Result<EmbeddingMetadata, MetadataError>> {
        let pool = self.pool.clone();
        let page_size = self.page_size;
        let start = ListCursor {
            kind_index: 0,
            after_chunk: None,
        };

        stream::try_unfold(Some(start), move |cursor| {
            let pool = pool.clone();
            async move {
                let Some(cursor) = cursor else {
                    return Ok::<_, MetadataError>(None);
                };
                let Some(&kind) = EmbeddingKind::ALL.get(cursor.kind_index) else {
                    return Ok(None);
                };

                let page = with_connection(&pool, move |conn| {
                    load_page(conn, entity_uuid, kind, cursor.after_chunk, page_size)
                        .map_err(MetadataError::from)
                })
                .await?;

                let next = match page.last() {
                    Some(last) if page.len() as i64 == page_size => ListCursor {
                        kind_index: cursor.kind_index,
                        after_chunk: Some(last.chunk_index),
                    },
                    _ => ListCursor {
                        kind_index: cursor.kind_index + 1,
                        after_chunk: None,
                    },
                };

                let rows: Vec<Result<EmbeddingMetadata, MetadataError>> =
                    page.into_iter().map(to_metadata).collect();
                Ok(Some((stream::iter(rows), Some(next))))
            }
        })
        .try_flatten()
        .boxed()
    }

    async fn invalidate(
        &self,
        entity_uuid: Uuid,
        embedding_kind: Option<EmbeddingKind>,
    ) -> Result<Vec<PointId>, MetadataError> {
        with_connection(&self.pool, move |conn| {
            invalidate_rows(conn, entity_uuid, embedding_kind)
        })
        .await
    }

    async fn delete_all_for(&self, entity_uuid: Uuid) -> Result<Vec<PointId>, MetadataError> {
        with_connection(&self.pool, move |conn| invalidate_rows(conn, entity_uuid, None)).await
    }

    async fn find_by_point_id(
        &self,
        point_id: PointId,
    ) -> Result<Option<EmbeddingMetadata>, MetadataError> {
        with_connection(&self.pool, move |conn| {
            embeddings::table
                .filter(embeddings::point_id.eq(point_id.as_uuid()))
                .select(EmbeddingModel::as_select())
                .first(conn)
                .optional()?
                .map(to_metadata)
                .transpose()
        })
        .await
    }

    async fn list_point_ids(
        &self,
        after: Option<PointId>,
        limit: i64,
    ) -> Result<Vec<PointRef>, MetadataError> {
        with_connection(&self.pool, move |conn| {
            let mut query = embeddings::table.into_boxed();
            if let Some(after) = after {
                query = query.filter(embeddings::point_id.gt(after.as_uuid()));
            }

            query
                .order(embeddings::point_id.asc())
                .limit(limit)
                .select((
                    embeddings::point_id,
                    embeddings::entity_uuid,
                    embeddings::embedding_kind,
                ))
                .load::<(Uuid, Uuid, String)>(conn)?
                .into_iter()
                .map(|(point_id, entity_uuid, kind)| {
                    EmbeddingKind::from_string(&kind)
                        .map(|embedding_kind| PointRef {
                            point_id: PointId::from_uuid(point_id),
                            entity_uuid,
                            embedding_kind,
                        })
                        .map_err(MetadataError::ValidationError)
                })
                .collect()
        })
        .await
    }

    async fn count(&self) -> Result<i64, MetadataError> {
        with_connection(&self.pool, move |conn| {
            embeddings::table
                .count()
                .get_result(conn)
                .map_err(MetadataError::from)
        })
        .await
    }

    async fn count_by_model(&self, model_name: &str) -> Result<i64, MetadataError> {
        let model_name = model_name.to_string();

        with_connection(&self.pool, move |conn| {
            embeddings::table
                .filter(embeddings::model_name.eq(model_name))
                .count()
                .get_result(conn)
                .map_err(MetadataError::from)
        })
        .await
    }
}
