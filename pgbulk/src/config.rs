//! Validated import configuration.

use std::time::Duration;

use config::shared::{ConflictMode, ImportSettings, NullMode, StagingKind};
use postgres::identifier::validate_identifier;
use postgres::types::TableName;

use crate::bulk_error;
use crate::error::{BulkError, BulkResult, ErrorKind};

/// Immutable configuration shared by every operation of an importer.
///
/// Built from [`ImportSettings`] with [`ImportConfig::try_from`] or through
/// [`ImportConfig::builder`]. Invalid combinations are rejected here, never when an operation runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportConfig {
    settings: ImportSettings,
}

impl ImportConfig {
    pub fn builder() -> ImportConfigBuilder {
        ImportConfigBuilder {
            settings: ImportSettings::default(),
        }
    }

    pub fn conflict_mode(&self) -> ConflictMode {
        self.settings.conflict_mode
    }

    pub fn conflict_columns(&self) -> &[String] {
        &self.settings.conflict_columns
    }

    pub fn update_columns(&self) -> &[String] {
        &self.settings.update_columns
    }

    pub fn match_columns(&self) -> &[String] {
        &self.settings.match_columns
    }

    pub fn staging_prefix(&self) -> &str {
        &self.settings.staging_prefix
    }

    pub fn staging_kind(&self) -> StagingKind {
        self.settings.staging_kind
    }

    pub fn auto_cleanup(&self) -> bool {
        self.settings.auto_cleanup
    }

    pub fn index_staging(&self) -> bool {
        self.settings.index_staging
    }

    pub fn null_mode(&self) -> NullMode {
        self.settings.null_mode
    }

    pub fn schema(&self) -> Option<&str> {
        self.settings.schema.as_deref()
    }

    pub fn producer_join_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.producer_join_timeout_ms)
    }

    /// Returns the relation an operation on `table` writes to, applying the schema override.
    pub fn resolve_target(&self, table: &TableName) -> TableName {
        match self.schema() {
            Some(schema) => table.with_schema(schema),
            None => table.clone(),
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }
}

impl TryFrom<ImportSettings> for ImportConfig {
    type Error = BulkError;

    fn try_from(settings: ImportSettings) -> BulkResult<Self> {
        settings.validate()?;

        if let Some(schema) = &settings.schema {
            validate_identifier(schema).map_err(config_error)?;
        }

        for column in settings
            .conflict_columns
            .iter()
            .chain(&settings.update_columns)
            .chain(&settings.match_columns)
        {
            validate_identifier(column).map_err(config_error)?;
        }

        Ok(Self { settings })
    }
}

fn config_error(err: postgres::identifier::IdentifierError) -> BulkError {
    bulk_error!(
        ErrorKind::ConfigError,
        "Import configuration names an invalid identifier",
        err.to_string(),
        source: err
    )
}

/// Builder for [`ImportConfig`], starting from the default settings.
#[derive(Debug, Clone)]
pub struct ImportConfigBuilder {
    settings: ImportSettings,
}

impl ImportConfigBuilder {
    pub fn conflict_mode(mut self, mode: ConflictMode) -> Self {
        self.settings.conflict_mode = mode;
        self
    }

    pub fn conflict_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.conflict_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn update_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.update_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn match_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings.match_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn staging_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.settings.staging_prefix = prefix.into();
        self
    }

    pub fn staging_kind(mut self, kind: StagingKind) -> Self {
        self.settings.staging_kind = kind;
        self
    }

    pub fn auto_cleanup(mut self, auto_cleanup: bool) -> Self {
        self.settings.auto_cleanup = auto_cleanup;
        self
    }

    pub fn index_staging(mut self, index_staging: bool) -> Self {
        self.settings.index_staging = index_staging;
        self
    }

    pub fn null_mode(mut self, null_mode: NullMode) -> Self {
        self.settings.null_mode = null_mode;
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.settings.schema = Some(schema.into());
        self
    }

    pub fn producer_join_timeout(mut self, timeout: Duration) -> Self {
        self.settings.producer_join_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> BulkResult<ImportConfig> {
        ImportConfig::try_from(self.settings)
    }
}
