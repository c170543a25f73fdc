//! Lifecycle of the staging relations backing updates and upserts.

use chrono::{DateTime, Utc};
use postgres::identifier::{quote_identifier, quote_identifiers};
use postgres::staging::{staging_index_name, staging_table_name};
use postgres::types::TableName;
use tracing::{debug, warn};

use crate::bulk_error;
use crate::config::ImportConfig;
use crate::error::{BulkError, BulkResult, ErrorKind};
use crate::session::BulkSession;

/// Whether a staging relation has received its load yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingState {
    Empty,
    Populated,
}

/// A staging relation created for one operation.
///
/// Consumed by [`StagingManager::drop`]. A handle that is never dropped leaves the relation to
/// session teardown.
#[derive(Debug)]
pub struct StagingHandle {
    name: String,
    relation: TableName,
    target: TableName,
    created_at: DateTime<Utc>,
    state: StagingState,
}

impl StagingHandle {
    /// Generated, unqualified name of the staging relation.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn relation(&self) -> &TableName {
        &self.relation
    }

    /// The relation this staging relation mirrors.
    pub fn target(&self) -> &TableName {
        &self.target
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> StagingState {
        self.state
    }

    pub fn mark_populated(&mut self) {
        self.state = StagingState::Populated;
    }
}

/// Creates and drops staging relations.
#[derive(Debug, Clone, Copy)]
pub struct StagingManager<'a> {
    config: &'a ImportConfig,
}

impl<'a> StagingManager<'a> {
    pub fn new(config: &'a ImportConfig) -> StagingManager<'a> {
        Self { config }
    }

    /// Creates an empty relation with the columns of `target` and no `NOT NULL` constraints.
    ///
    /// If any step fails the partially created relation is dropped before the error is returned.
    pub async fn create<S: BulkSession>(
        &self,
        session: &mut S,
        target: &TableName,
    ) -> BulkResult<StagingHandle> {
        let name = staging_table_name(self.config.staging_prefix(), &target.name)?;
        let quoted_name = quote_identifier(&name)?;
        let quoted_target = target.as_quoted_identifier()?;

        let create = format!(
            "CREATE {} TABLE {quoted_name} (LIKE {quoted_target})",
            self.config.staging_kind().keyword()
        );
        debug!(%target, staging = %name, statement = %create, "creating staging relation");
        session
            .execute(&create)
            .await
            .map_err(|err| creation_error(target, &name, err))?;

        if let Err(err) = self.relax_not_null(session, &name, &quoted_name).await {
            let drop = drop_statement(&quoted_name);
            if let Err(drop_err) = session.execute(&drop).await {
                warn!(staging = %name, error = %drop_err.description(), "failed to drop partially created staging relation");
            }

            return Err(creation_error(target, &name, err));
        }

        Ok(StagingHandle {
            relation: TableName::unqualified(name.clone()),
            name,
            target: target.clone(),
            created_at: Utc::now(),
            state: StagingState::Empty,
        })
    }

    async fn relax_not_null<S: BulkSession>(
        &self,
        session: &mut S,
        name: &str,
        quoted_name: &str,
    ) -> BulkResult<()> {
        let query = not_null_columns_query(name);
        let columns = session.query_column(&query).await?;

        for column in columns {
            let statement = format!(
                "ALTER TABLE {quoted_name} ALTER COLUMN {} DROP NOT NULL",
                quote_identifier(&column)?
            );
            session.execute(&statement).await?;
        }

        Ok(())
    }

    /// Builds an index over `columns` of a populated staging relation.
    pub async fn create_index<S: BulkSession>(
        &self,
        session: &mut S,
        handle: &StagingHandle,
        columns: &[String],
    ) -> BulkResult<()> {
        let statement = format!(
            "CREATE INDEX {} ON {} ({})",
            quote_identifier(&staging_index_name(handle.name()))?,
            quote_identifier(handle.name())?,
            quote_identifiers(columns)?
        );
        debug!(staging = %handle.name(), statement = %statement, "indexing staging relation");

        session
            .execute(&statement)
            .await
            .map_err(|err| creation_error(handle.target(), handle.name(), err))?;

        Ok(())
    }

    /// Drops the staging relation. Never fails: errors are logged and the relation is left to
    /// session teardown. Does nothing when auto cleanup is disabled.
    pub async fn drop<S: BulkSession>(&self, session: &mut S, handle: StagingHandle) {
        if !self.config.auto_cleanup() {
            debug!(staging = %handle.name(), "auto cleanup disabled, keeping staging relation");
            return;
        }

        let statement = match quote_identifier(handle.name()) {
            Ok(quoted) => drop_statement(&quoted),
            Err(err) => {
                let err = cleanup_error(&handle, err.into());
                warn!(error = %err.detail().unwrap_or_default(), "failed to drop staging relation");
                return;
            }
        };

        match session.execute(&statement).await {
            Ok(_) => debug!(staging = %handle.name(), "dropped staging relation"),
            Err(err) => {
                let err = cleanup_error(&handle, err);
                warn!(error = %err.detail().unwrap_or_default(), "failed to drop staging relation");
            }
        }
    }
}

/// Query listing the `NOT NULL` columns of the relation called `name`.
pub fn not_null_columns_query(name: &str) -> String {
    format!(
        "SELECT column_name FROM information_schema.columns WHERE table_name = {} AND is_nullable = 'NO'",
        pg_escape::quote_literal(name)
    )
}

fn drop_statement(quoted_name: &str) -> String {
    format!("DROP TABLE IF EXISTS {quoted_name}")
}

fn creation_error(target: &TableName, name: &str, err: BulkError) -> BulkError {
    let cause = err.detail().unwrap_or(err.description()).to_string();

    bulk_error!(
        ErrorKind::StagingCreationFailed,
        "Staging relation could not be created",
        format!("Staging relation '{name}' for '{target}' failed: {cause}"),
        source: err
    )
}

fn cleanup_error(handle: &StagingHandle, err: BulkError) -> BulkError {
    let cause = err.detail().unwrap_or(err.description()).to_string();

    bulk_error!(
        ErrorKind::StagingCleanupFailed,
        "Staging relation could not be dropped",
        format!(
            "Staging relation '{}' for '{}' was left behind: {cause}",
            handle.name(),
            handle.target()
        ),
        source: err
    )
}
