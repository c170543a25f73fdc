//! Bulk imports into PostgreSQL over `COPY FROM STDIN`.
//!
//! Entities are described by a [`TableMapping`], encoded row by row into a csv stream and
//! streamed into the server while encoding is still in progress. Plain inserts load straight
//! into the target relation. Updates and upserts load into a temporary staging relation and
//! reconcile it into the target with a single set based statement.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use pgbulk::{BulkImporter, ColumnMapping, ImportConfig, TableMapping, ValueKind};
//! # async fn run(client: &mut tokio_postgres::Client) -> pgbulk::BulkResult<()> {
//! struct Reading {
//!     sensor: i64,
//!     value: f64,
//! }
//!
//! let mapping = Arc::new(
//!     TableMapping::builder("readings")
//!         .column(ColumnMapping::new("sensor", ValueKind::I64, |r: &Reading| r.sensor).identifier())
//!         .column(ColumnMapping::new("value", ValueKind::F64, |r: &Reading| r.value))
//!         .build()?,
//! );
//!
//! let importer = BulkImporter::new(ImportConfig::default());
//! let readings = vec![Reading { sensor: 1, value: 0.5 }];
//! importer.upsert(client, &mapping, readings).await?;
//! # Ok(())
//! # }
//! ```

mod macros;

pub mod codec;
pub mod config;
pub mod connect;
pub mod encoder;
pub mod error;
pub mod importer;
pub mod load;
pub mod reconcile;
pub mod session;
pub mod staging;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;

pub use crate::codec::{CodecRegistry, EncodeContext, FnCodec, ValueCodec};
pub use crate::config::{ImportConfig, ImportConfigBuilder};
pub use crate::connect::connect;
pub use crate::error::{BulkError, BulkResult, ErrorKind};
pub use crate::importer::BulkImporter;
pub use crate::session::{BulkSession, CopyOutcome};
pub use crate::types::{
    ColumnMapping, CustomValue, EnumMember, PgNumeric, TableMapping, TableName, TypeKey, Value,
    ValueKind,
};
pub use ::config::shared::{ConflictMode, NullMode, StagingKind};
