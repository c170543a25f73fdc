//! Error types and result definitions for bulk import operations.
//!
//! [`BulkError`] carries a classification ([`ErrorKind`]), a static description, optional dynamic
//! detail and the originating error, together with the callsite and a backtrace.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

use config::shared::ValidationError;
use postgres::identifier::IdentifierError;
use tokio_postgres::error::SqlState;

/// Result type for bulk import operations.
pub type BulkResult<T> = Result<T, BulkError>;

/// Detailed payload stored for every [`BulkError`].
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for bulk import operations.
#[derive(Debug, Clone)]
pub struct BulkError {
    payload: Box<ErrorPayload>,
}

/// Categories of failures that can occur while importing.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration & Mapping Errors
    ConfigError,
    InvalidMapping,
    InvalidIdentifier,

    // Import Stage Errors
    EncodingFailed,
    LoadFailed,
    CopyNotSupported,
    ReconciliationFailed,
    StagingCreationFailed,
    StagingCleanupFailed,

    // Engine Errors
    ConnectionFailed,
    AuthenticationError,
    ConstraintViolation,
    InvalidData,
    SchemaObjectMissing,
    PermissionDenied,
    QueryFailed,

    // IO & Security Errors
    IoError,
    EncryptionError,

    // Unknown / Uncategorized
    Unknown,
}

impl BulkError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.payload.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.payload.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.payload.detail.as_deref()
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> &Backtrace {
        self.payload.backtrace.as_ref()
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.payload.location
    }

    /// Returns the SQLSTATE reported by the server anywhere in the source chain.
    pub fn sql_state(&self) -> Option<&SqlState> {
        let mut current: Option<&(dyn error::Error + 'static)> = Some(self);
        while let Some(err) = current {
            if let Some(pg_error) = err.downcast_ref::<tokio_postgres::Error>() {
                if let Some(code) = pg_error.code() {
                    return Some(code);
                }
            }
            current = err.source();
        }

        None
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.payload.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`BulkError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        BulkError {
            payload: Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for BulkError {
    fn eq(&self, other: &BulkError) -> bool {
        self.payload.kind == other.payload.kind
    }
}

impl Hash for BulkError {
    /// Hashes only the kind and static description so equal categories group together.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.payload.kind.hash(state);
        self.payload.description.hash(state);
    }
}

impl fmt::Display for BulkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let payload = &self.payload;
        let location = payload.location;
        write!(
            f,
            "[{:?}] {} @ {}:{}:{}",
            payload.kind,
            payload.description,
            location.file(),
            location.line(),
            location.column()
        )?;

        write_detail(payload.detail.as_deref(), f)?;
        write_backtrace(payload.backtrace.as_ref(), f)?;

        Ok(())
    }
}

impl error::Error for BulkError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.payload
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

fn write_backtrace(backtrace: &Backtrace, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() {
        write!(f, "\n  Backtrace:")?;
        for line in rendered_backtrace.lines() {
            write!(f, "\n    {line}")?;
        }
    }

    Ok(())
}

fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(detail) = detail {
        if detail.trim().is_empty() {
            write!(f, "\n  Detail: <empty>")?;
        } else {
            write!(f, "\n  Detail:")?;
            for line in detail.lines() {
                write!(f, "\n    {line}")?;
            }
        }
    }

    Ok(())
}

/// Creates a [`BulkError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for BulkError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> BulkError {
        BulkError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`BulkError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for BulkError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> BulkError {
        BulkError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Converts a source error into a [`BulkError`] keeping its message as detail.
#[track_caller]
fn wrap<E>(kind: ErrorKind, description: &'static str, err: E) -> BulkError
where
    E: error::Error + Send + Sync + 'static,
{
    let detail = err.to_string();
    BulkError::from_components(
        kind,
        Cow::Borrowed(description),
        Some(Cow::Owned(detail)),
        Some(Arc::new(err)),
    )
}

impl From<std::io::Error> for BulkError {
    #[track_caller]
    fn from(err: std::io::Error) -> BulkError {
        wrap(ErrorKind::IoError, "I/O operation failed", err)
    }
}

impl From<csv::Error> for BulkError {
    #[track_caller]
    fn from(err: csv::Error) -> BulkError {
        wrap(ErrorKind::EncodingFailed, "CSV record could not be written", err)
    }
}

impl From<serde_json::Error> for BulkError {
    #[track_caller]
    fn from(err: serde_json::Error) -> BulkError {
        wrap(ErrorKind::EncodingFailed, "JSON serialization failed", err)
    }
}

impl From<IdentifierError> for BulkError {
    #[track_caller]
    fn from(err: IdentifierError) -> BulkError {
        wrap(ErrorKind::InvalidIdentifier, "Identifier is not safe to quote", err)
    }
}

impl From<ValidationError> for BulkError {
    #[track_caller]
    fn from(err: ValidationError) -> BulkError {
        wrap(ErrorKind::ConfigError, "Import configuration is invalid", err)
    }
}

impl From<rustls::Error> for BulkError {
    #[track_caller]
    fn from(err: rustls::Error) -> BulkError {
        wrap(ErrorKind::EncryptionError, "TLS configuration failed", err)
    }
}

/// Converts [`tokio_postgres::Error`] to [`BulkError`] classifying it by SQLSTATE.
impl From<tokio_postgres::Error> for BulkError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> BulkError {
        let (kind, description) = match err.code() {
            Some(sqlstate) => match *sqlstate {
                // Connection errors (08xxx)
                SqlState::CONNECTION_EXCEPTION
                | SqlState::CONNECTION_DOES_NOT_EXIST
                | SqlState::CONNECTION_FAILURE
                | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
                | SqlState::ADMIN_SHUTDOWN
                | SqlState::CRASH_SHUTDOWN
                | SqlState::CANNOT_CONNECT_NOW
                | SqlState::TOO_MANY_CONNECTIONS => (
                    ErrorKind::ConnectionFailed,
                    "PostgreSQL connection failed",
                ),

                // Authentication errors (28xxx)
                SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                    ErrorKind::AuthenticationError,
                    "PostgreSQL authentication failed",
                ),

                // Data integrity violations (23xxx)
                SqlState::INTEGRITY_CONSTRAINT_VIOLATION
                | SqlState::NOT_NULL_VIOLATION
                | SqlState::FOREIGN_KEY_VIOLATION
                | SqlState::UNIQUE_VIOLATION
                | SqlState::CHECK_VIOLATION
                | SqlState::EXCLUSION_VIOLATION => (
                    ErrorKind::ConstraintViolation,
                    "PostgreSQL constraint violation",
                ),

                // Data errors (22xxx), including malformed COPY input
                SqlState::DATA_EXCEPTION
                | SqlState::INVALID_TEXT_REPRESENTATION
                | SqlState::INVALID_DATETIME_FORMAT
                | SqlState::DATETIME_FIELD_OVERFLOW
                | SqlState::NUMERIC_VALUE_OUT_OF_RANGE
                | SqlState::STRING_DATA_RIGHT_TRUNCATION
                | SqlState::BAD_COPY_FILE_FORMAT
                | SqlState::INVALID_BINARY_REPRESENTATION
                | SqlState::ARRAY_ELEMENT_ERROR
                | SqlState::INVALID_JSON_TEXT => {
                    (ErrorKind::InvalidData, "PostgreSQL rejected the data")
                }

                // Schema objects not found (42xxx)
                SqlState::UNDEFINED_TABLE
                | SqlState::UNDEFINED_COLUMN
                | SqlState::UNDEFINED_SCHEMA
                | SqlState::UNDEFINED_OBJECT
                | SqlState::INVALID_COLUMN_REFERENCE => (
                    ErrorKind::SchemaObjectMissing,
                    "PostgreSQL schema object not found",
                ),

                // Access errors (42xxx)
                SqlState::INSUFFICIENT_PRIVILEGE => (
                    ErrorKind::PermissionDenied,
                    "PostgreSQL permission denied",
                ),

                // Syntax errors (42xxx)
                SqlState::SYNTAX_ERROR | SqlState::SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION => {
                    (ErrorKind::QueryFailed, "PostgreSQL syntax error")
                }

                // Transaction state errors (25xxx, 40xxx)
                SqlState::ACTIVE_SQL_TRANSACTION
                | SqlState::NO_ACTIVE_SQL_TRANSACTION
                | SqlState::IN_FAILED_SQL_TRANSACTION
                | SqlState::READ_ONLY_SQL_TRANSACTION
                | SqlState::T_R_SERIALIZATION_FAILURE
                | SqlState::T_R_DEADLOCK_DETECTED => {
                    (ErrorKind::QueryFailed, "PostgreSQL transaction state error")
                }

                // Feature not supported (0Axxx)
                SqlState::FEATURE_NOT_SUPPORTED => {
                    (ErrorKind::QueryFailed, "PostgreSQL feature not supported")
                }

                SqlState::IO_ERROR | SqlState::DISK_FULL => {
                    (ErrorKind::IoError, "PostgreSQL I/O error")
                }

                _ => (ErrorKind::QueryFailed, "PostgreSQL error"),
            },
            // No SQL state means the connection itself failed.
            None => (
                ErrorKind::ConnectionFailed,
                "PostgreSQL connection failed",
            ),
        };

        wrap(kind, description, err)
    }
}
