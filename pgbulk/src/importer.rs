//! Entry point sequencing staging, loading and reconciliation.

use std::sync::Arc;

use futures::Stream;
use postgres::types::TableName;
use tracing::{debug, info};

use crate::bulk_error;
use crate::codec::{CodecRegistry, ValueCodec};
use crate::config::ImportConfig;
use crate::error::{BulkError, BulkResult};
use crate::load::{BulkLoadExecutor, EntitySource};
use crate::reconcile::{SetOperationExecutor, UpdatePlan, UpsertPlan};
use crate::session::BulkSession;
use crate::staging::{StagingHandle, StagingManager};
use crate::types::{TableMapping, TypeKey};

/// Bulk imports entities through `COPY`.
///
/// `insert` loads straight into the target relation. `update` and `upsert` load into a staging
/// relation first and reconcile it into the target with one set based statement. Empty input
/// returns `0` without issuing any statement.
///
/// The importer holds no per-call state and is cheap to clone.
#[derive(Debug, Clone)]
pub struct BulkImporter {
    config: Arc<ImportConfig>,
    registry: Arc<CodecRegistry>,
}

impl BulkImporter {
    /// Creates an importer using the shared built-in codecs.
    pub fn new(config: ImportConfig) -> BulkImporter {
        Self::with_registry(config, CodecRegistry::shared_default())
    }

    pub fn with_registry(config: ImportConfig, registry: Arc<CodecRegistry>) -> BulkImporter {
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CodecRegistry> {
        &self.registry
    }

    /// Registers a codec for this importer only. Other importers sharing the registry are not
    /// affected.
    pub fn register_codec<K, C>(&mut self, key: K, codec: C)
    where
        K: Into<TypeKey>,
        C: ValueCodec + 'static,
    {
        Arc::make_mut(&mut self.registry).register(key, codec);
    }

    /// Inserts every entity into the mapped relation and returns the number of rows loaded.
    pub async fn insert<S, T, I>(
        &self,
        session: &mut S,
        mapping: &Arc<TableMapping<T>>,
        entities: I,
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        self.insert_source(session, mapping, EntitySource::from_entities(entities))
            .await
    }

    /// Like [`BulkImporter::insert`], polling entities from a stream.
    pub async fn insert_stream<S, T, St>(
        &self,
        session: &mut S,
        mapping: &Arc<TableMapping<T>>,
        entities: St,
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
        St: Stream<Item = T> + Send + 'static,
    {
        self.insert_source(session, mapping, EntitySource::from_stream(entities))
            .await
    }

    /// Updates the target rows matching each entity and returns the number of rows updated.
    pub async fn update<S, T, I>(
        &self,
        session: &mut S,
        mapping: &Arc<TableMapping<T>>,
        entities: I,
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        self.update_source(session, mapping, EntitySource::from_entities(entities))
            .await
    }

    /// Like [`BulkImporter::update`], polling entities from a stream.
    pub async fn update_stream<S, T, St>(
        &self,
        session: &mut S,
        mapping: &Arc<TableMapping<T>>,
        entities: St,
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
        St: Stream<Item = T> + Send + 'static,
    {
        self.update_source(session, mapping, EntitySource::from_stream(entities))
            .await
    }

    /// Inserts entities, resolving conflicts with the configured conflict mode.
    ///
    /// Returns the inserted plus updated row count reported by the server.
    pub async fn upsert<S, T, I>(
        &self,
        session: &mut S,
        mapping: &Arc<TableMapping<T>>,
        entities: I,
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        self.upsert_source(session, mapping, EntitySource::from_entities(entities))
            .await
    }

    /// Like [`BulkImporter::upsert`], polling entities from a stream.
    pub async fn upsert_stream<S, T, St>(
        &self,
        session: &mut S,
        mapping: &Arc<TableMapping<T>>,
        entities: St,
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
        St: Stream<Item = T> + Send + 'static,
    {
        self.upsert_source(session, mapping, EntitySource::from_stream(entities))
            .await
    }

    async fn insert_source<S, T>(
        &self,
        session: &mut S,
        mapping: &Arc<TableMapping<T>>,
        source: EntitySource<T>,
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
    {
        let target = self.config.resolve_target(mapping.table_name());
        let Some(source) = source.peeked().await else {
            debug!(%target, "no entities to insert");
            return Ok(0);
        };

        self.loader().load(session, &target, mapping, source).await
    }

    async fn update_source<S, T>(
        &self,
        session: &mut S,
        mapping: &Arc<TableMapping<T>>,
        source: EntitySource<T>,
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
    {
        let target = self.config.resolve_target(mapping.table_name());
        let plan = UpdatePlan::resolve(mapping, &self.config)?;
        let Some(source) = source.peeked().await else {
            debug!(%target, "no entities to update");
            return Ok(0);
        };

        let staging = StagingManager::new(&self.config);
        let mut handle = staging.create(session, &target).await?;

        let result: BulkResult<u64> = async {
            self.load_staging(session, &mut handle, mapping, source, &plan.match_columns)
                .await?;
            SetOperationExecutor
                .update(session, &target, handle.name(), &plan)
                .await
        }
        .await;

        staging.drop(session, handle).await;

        let rows = result?;
        info!(%target, rows, "update completed");

        Ok(rows)
    }

    async fn upsert_source<S, T>(
        &self,
        session: &mut S,
        mapping: &Arc<TableMapping<T>>,
        source: EntitySource<T>,
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
    {
        let target = self.config.resolve_target(mapping.table_name());
        let plan = UpsertPlan::resolve(mapping, &self.config)?;
        let Some(source) = source.peeked().await else {
            debug!(%target, "no entities to upsert");
            return Ok(0);
        };

        let staging = StagingManager::new(&self.config);
        let mut handle = staging.create(session, &target).await?;

        let result: BulkResult<u64> = async {
            self.load_staging(session, &mut handle, mapping, source, &plan.detect_columns)
                .await?;
            SetOperationExecutor
                .upsert(session, &target, handle.name(), &plan)
                .await
        }
        .await;

        staging.drop(session, handle).await;

        let rows = result?;
        info!(%target, rows, mode = %plan.mode, "upsert completed");

        Ok(rows)
    }

    /// Loads `source` into the staging relation and indexes it if configured.
    async fn load_staging<S, T>(
        &self,
        session: &mut S,
        handle: &mut StagingHandle,
        mapping: &Arc<TableMapping<T>>,
        source: EntitySource<T>,
        index_columns: &[String],
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
    {
        let relation: TableName = handle.relation().clone();
        let rows = self
            .loader()
            .load(session, &relation, mapping, source)
            .await
            .map_err(|err| staging_load_error(handle, err))?;
        handle.mark_populated();

        if self.config.index_staging() && !index_columns.is_empty() {
            StagingManager::new(&self.config)
                .create_index(session, handle, index_columns)
                .await?;
        }

        Ok(rows)
    }

    fn loader(&self) -> BulkLoadExecutor<'_> {
        BulkLoadExecutor::new(&self.config, &self.registry)
    }
}

/// Names the target relation in a failed staging load, keeping the kind of `err`.
fn staging_load_error(handle: &StagingHandle, err: BulkError) -> BulkError {
    let cause = err.detail().unwrap_or(err.description()).to_string();

    bulk_error!(
        err.kind(),
        "Bulk load into staging relation failed",
        format!(
            "Loading staging relation '{}' for '{}' failed: {cause}",
            handle.relation(),
            handle.target()
        ),
        source: err
    )
}
