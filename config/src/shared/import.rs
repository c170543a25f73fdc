use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Longest staging prefix accepted.
///
/// Staging names are capped at 60 bytes (the identifier limit minus an index suffix) and must
/// still fit at least one character of the table name, an underscore and an 8 character suffix.
pub const MAX_STAGING_PREFIX_LENGTH: usize = 50;

/// Policy for rows whose conflict columns collide with an existing row during an upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictMode {
    /// No conflict clause, a duplicate raises a constraint violation.
    #[default]
    Fail,
    /// Conflicting rows are ignored.
    Skip,
    /// Conflicting rows get every non-identifier column refreshed.
    ReplaceAll,
    /// Conflicting rows get only the configured update columns refreshed.
    ReplaceSpecified,
}

impl ConflictMode {
    /// Returns `true` when the mode emits an `ON CONFLICT ... DO UPDATE` clause.
    pub fn refreshes_rows(&self) -> bool {
        matches!(self, ConflictMode::ReplaceAll | ConflictMode::ReplaceSpecified)
    }
}

impl fmt::Display for ConflictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConflictMode::Fail => "fail",
            ConflictMode::Skip => "skip",
            ConflictMode::ReplaceAll => "replace_all",
            ConflictMode::ReplaceSpecified => "replace_specified",
        };

        f.write_str(name)
    }
}

/// How null values are spelled in the `COPY` stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullMode {
    /// Unquoted empty field, the csv format default.
    #[default]
    Empty,
    /// The `\N` sentinel.
    Sentinel,
    /// The bare word `NULL`.
    Word,
}

impl NullMode {
    /// Returns the literal token written for a null value.
    pub fn token(&self) -> &'static str {
        match self {
            NullMode::Empty => "",
            NullMode::Sentinel => "\\N",
            NullMode::Word => "NULL",
        }
    }
}

/// Kind of relation created for staging data before reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StagingKind {
    /// Session scoped `TEMP` table.
    #[default]
    Temporary,
    /// `UNLOGGED` table, visible to other sessions until dropped.
    Unlogged,
}

impl StagingKind {
    /// Returns the keyword used in `CREATE ... TABLE`.
    pub fn keyword(&self) -> &'static str {
        match self {
            StagingKind::Temporary => "TEMP",
            StagingKind::Unlogged => "UNLOGGED",
        }
    }
}

/// Settings controlling how entities are imported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ImportSettings {
    /// Policy applied when an upserted row collides with an existing one.
    #[serde(default)]
    pub conflict_mode: ConflictMode,
    /// Columns used to detect conflicts during an upsert.
    #[serde(default)]
    pub conflict_columns: Vec<String>,
    /// Columns refreshed on conflict or by a plain update.
    #[serde(default)]
    pub update_columns: Vec<String>,
    /// Columns used to match staging rows against target rows during a plain update.
    #[serde(default)]
    pub match_columns: Vec<String>,
    /// Prefix of generated staging relation names.
    #[serde(default = "default_staging_prefix")]
    pub staging_prefix: String,
    /// Kind of staging relation to create.
    #[serde(default)]
    pub staging_kind: StagingKind,
    /// Whether staging relations are dropped once the operation ends.
    #[serde(default = "default_auto_cleanup")]
    pub auto_cleanup: bool,
    /// Whether an index is built on the staging relation before reconciliation.
    #[serde(default)]
    pub index_staging: bool,
    /// Spelling of null values in the `COPY` stream.
    #[serde(default)]
    pub null_mode: NullMode,
    /// Schema overriding the one declared by table mappings.
    #[serde(default)]
    pub schema: Option<String>,
    /// Maximum time, in milliseconds, to wait for the row encoder once a load has ended.
    #[serde(default = "default_producer_join_timeout_ms")]
    pub producer_join_timeout_ms: u64,
}

impl ImportSettings {
    /// Default prefix of staging relation names.
    pub const DEFAULT_STAGING_PREFIX: &'static str = "bulk_staging_";

    /// Default cleanup behavior for staging relations.
    pub const DEFAULT_AUTO_CLEANUP: bool = true;

    /// Default wait for the row encoder in milliseconds.
    pub const DEFAULT_PRODUCER_JOIN_TIMEOUT_MS: u64 = 30_000;

    /// Validates the settings.
    ///
    /// Refreshing conflict modes need conflict columns, `replace_specified` also needs update
    /// columns, the staging prefix must be able to start an identifier and the join timeout must
    /// be positive.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.conflict_mode.refreshes_rows() && self.conflict_columns.is_empty() {
            return Err(ValidationError::MissingConflictColumns(
                self.conflict_mode.to_string(),
            ));
        }

        if self.conflict_mode == ConflictMode::ReplaceSpecified && self.update_columns.is_empty()
        {
            return Err(ValidationError::MissingUpdateColumns);
        }

        validate_staging_prefix(&self.staging_prefix)?;

        if self.producer_join_timeout_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "producer_join_timeout_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            conflict_mode: ConflictMode::default(),
            conflict_columns: Vec::new(),
            update_columns: Vec::new(),
            match_columns: Vec::new(),
            staging_prefix: default_staging_prefix(),
            staging_kind: StagingKind::default(),
            auto_cleanup: default_auto_cleanup(),
            index_staging: false,
            null_mode: NullMode::default(),
            schema: None,
            producer_join_timeout_ms: default_producer_join_timeout_ms(),
        }
    }
}

fn validate_staging_prefix(prefix: &str) -> Result<(), ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidStagingPrefix {
        prefix: prefix.to_string(),
        reason: reason.to_string(),
    };

    let Some(first) = prefix.chars().next() else {
        return Err(invalid("must not be empty"));
    };

    if !(first.is_ascii_alphabetic() || first == '_') {
        return Err(invalid("must start with a letter or an underscore"));
    }

    if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("may only contain letters, digits and underscores"));
    }

    if prefix.len() > MAX_STAGING_PREFIX_LENGTH {
        return Err(invalid(&format!(
            "must be at most {MAX_STAGING_PREFIX_LENGTH} characters long"
        )));
    }

    Ok(())
}

fn default_staging_prefix() -> String {
    ImportSettings::DEFAULT_STAGING_PREFIX.to_string()
}

fn default_auto_cleanup() -> bool {
    ImportSettings::DEFAULT_AUTO_CLEANUP
}

fn default_producer_join_timeout_ms() -> u64 {
    ImportSettings::DEFAULT_PRODUCER_JOIN_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = ImportSettings::default();

        assert_eq!(settings.conflict_mode, ConflictMode::Fail);
        assert_eq!(settings.staging_prefix, "bulk_staging_");
        assert!(settings.auto_cleanup);
        assert_eq!(settings.null_mode, NullMode::Empty);
        assert_eq!(settings.schema, None);
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn empty_json_deserializes_to_defaults() {
        let settings: ImportSettings = serde_json::from_str("{}").unwrap();

        assert_eq!(settings, ImportSettings::default());
    }

    #[test]
    fn enums_use_snake_case() {
        let settings: ImportSettings = serde_json::from_str(
            r#"{
                "conflict_mode": "replace_specified",
                "conflict_columns": ["id"],
                "update_columns": ["name"],
                "null_mode": "sentinel",
                "staging_kind": "unlogged"
            }"#,
        )
        .unwrap();

        assert_eq!(settings.conflict_mode, ConflictMode::ReplaceSpecified);
        assert_eq!(settings.null_mode, NullMode::Sentinel);
        assert_eq!(settings.staging_kind, StagingKind::Unlogged);
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn replace_modes_require_conflict_columns() {
        for mode in [ConflictMode::ReplaceAll, ConflictMode::ReplaceSpecified] {
            let settings = ImportSettings {
                conflict_mode: mode,
                update_columns: vec!["name".to_string()],
                ..ImportSettings::default()
            };

            assert_eq!(
                settings.validate(),
                Err(ValidationError::MissingConflictColumns(mode.to_string()))
            );
        }
    }

    #[test]
    fn replace_specified_requires_update_columns() {
        let settings = ImportSettings {
            conflict_mode: ConflictMode::ReplaceSpecified,
            conflict_columns: vec!["id".to_string()],
            ..ImportSettings::default()
        };

        assert_eq!(
            settings.validate(),
            Err(ValidationError::MissingUpdateColumns)
        );
    }

    #[test]
    fn skip_does_not_require_columns() {
        let settings = ImportSettings {
            conflict_mode: ConflictMode::Skip,
            ..ImportSettings::default()
        };

        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn staging_prefix_must_start_an_identifier() {
        for prefix in ["", "1staging", "stag ing", "stag;ing", &"s".repeat(51)] {
            let settings = ImportSettings {
                staging_prefix: prefix.to_string(),
                ..ImportSettings::default()
            };

            assert!(matches!(
                settings.validate(),
                Err(ValidationError::InvalidStagingPrefix { .. })
            ));
        }
    }

    #[test]
    fn zero_join_timeout_is_rejected() {
        let settings = ImportSettings {
            producer_join_timeout_ms: 0,
            ..ImportSettings::default()
        };

        assert!(matches!(
            settings.validate(),
            Err(ValidationError::InvalidFieldValue { .. })
        ));
    }

    #[test]
    fn null_mode_tokens() {
        assert_eq!(NullMode::Empty.token(), "");
        assert_eq!(NullMode::Sentinel.token(), "\\N");
        assert_eq!(NullMode::Word.token(), "NULL");
    }
}
