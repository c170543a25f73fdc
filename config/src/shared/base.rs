use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// A conflict mode that refreshes rows was selected without conflict columns.
    #[error("conflict mode `{0}` requires at least one entry in `conflict_columns`")]
    MissingConflictColumns(String),
    /// `replace_specified` was selected without any column to refresh.
    #[error("conflict mode `replace_specified` requires at least one entry in `update_columns`")]
    MissingUpdateColumns,
    /// The staging prefix cannot start a valid identifier.
    #[error("Invalid staging prefix `{prefix}`: {reason}")]
    InvalidStagingPrefix { prefix: String, reason: String },
    /// A field has a value outside its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
