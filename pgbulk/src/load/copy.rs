use std::sync::Arc;

use config::shared::NullMode;
use postgres::identifier::quote_identifiers;
use postgres::types::TableName;
use tracing::{debug, info, warn};

use crate::bail;
use crate::bulk_error;
use crate::codec::CodecRegistry;
use crate::config::ImportConfig;
use crate::encoder::RowEncoder;
use crate::error::{BulkError, BulkResult, ErrorKind};
use crate::load::pipe::pipe;
use crate::load::producer::join_producer;
use crate::load::source::EntitySource;
use crate::session::{BulkSession, CopyOutcome};
use crate::types::TableMapping;

/// Builds `COPY <table> (<columns>) FROM STDIN WITH (FORMAT csv[, NULL '<token>'])`.
///
/// The `NULL` option is omitted for [`NullMode::Empty`], which is the csv default.
pub fn copy_statement<I, S>(table: &TableName, columns: I, null_mode: NullMode) -> BulkResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let table = table.as_quoted_identifier()?;
    let columns = quote_identifiers(columns)?;

    let options = match null_mode {
        NullMode::Empty => "FORMAT csv".to_string(),
        NullMode::Sentinel | NullMode::Word => format!("FORMAT csv, NULL '{}'", null_mode.token()),
    };

    Ok(format!("COPY {table} ({columns}) FROM STDIN WITH ({options})"))
}

/// Streams encoded entities into a relation with one `COPY`.
///
/// Encoding runs on a separate task feeding a bounded pipe, so at most a few chunks of encoded
/// records are held in memory whatever the input size.
#[derive(Debug)]
pub struct BulkLoadExecutor<'a> {
    config: &'a ImportConfig,
    registry: &'a Arc<CodecRegistry>,
}

impl<'a> BulkLoadExecutor<'a> {
    pub fn new(config: &'a ImportConfig, registry: &'a Arc<CodecRegistry>) -> BulkLoadExecutor<'a> {
        Self { config, registry }
    }

    /// Loads every entity of `source` into `target` and returns the server reported row count.
    ///
    /// Exactly one error is returned on failure: the encoder's if it aborted the copy, otherwise
    /// the server's.
    pub async fn load<S, T>(
        &self,
        session: &mut S,
        target: &TableName,
        mapping: &Arc<TableMapping<T>>,
        source: EntitySource<T>,
    ) -> BulkResult<u64>
    where
        S: BulkSession,
        T: Send + 'static,
    {
        if !session.supports_copy() {
            bail!(
                ErrorKind::CopyNotSupported,
                "Connection does not support COPY FROM STDIN",
                format!("Cannot bulk load into '{target}'")
            );
        }

        let null_mode = self.config.null_mode();
        let statement = copy_statement(target, mapping.column_names(), null_mode)?;
        debug!(%target, %statement, "starting copy");

        let (writer, reader) = pipe();
        let encoder = RowEncoder::new(Arc::clone(mapping), Arc::clone(self.registry), null_mode);
        let producer = source.spawn_producer(encoder, writer);

        let copy_result = session.copy_in(&statement, reader).await;
        let produced = join_producer(producer, self.config.producer_join_timeout()).await;

        match copy_result {
            Ok(CopyOutcome::Completed(rows)) => {
                match produced {
                    Some(Ok(encoded)) if encoded != rows => {
                        warn!(%target, encoded, rows, "server row count differs from encoded rows");
                    }
                    Some(Err(err)) => return Err(load_error(target, err)),
                    _ => {}
                }

                info!(%target, rows, "copy completed");
                Ok(rows)
            }
            Ok(CopyOutcome::Aborted) => match produced {
                Some(Err(err)) => Err(encoding_error(target, err)),
                _ => bail!(
                    ErrorKind::LoadFailed,
                    "Row encoder stopped without finishing",
                    format!("Copy into '{target}' was aborted")
                ),
            },
            Err(err) => {
                if let Some(Err(producer_err)) = produced {
                    debug!(%target, error = %producer_err.description(), "row encoder stopped after copy failure");
                }

                Err(load_error(target, err))
            }
        }
    }
}

fn encoding_error(target: &TableName, err: BulkError) -> BulkError {
    let cause = err.detail().unwrap_or(err.description()).to_string();

    bulk_error!(
        ErrorKind::EncodingFailed,
        "Entities could not be encoded for bulk load",
        format!("Copy into '{target}' aborted: {cause}"),
        source: err
    )
}

fn load_error(target: &TableName, err: BulkError) -> BulkError {
    let kind = match err.kind() {
        ErrorKind::CopyNotSupported => ErrorKind::CopyNotSupported,
        _ => ErrorKind::LoadFailed,
    };
    let cause = err.detail().unwrap_or(err.description()).to_string();

    bulk_error!(
        kind,
        "Bulk load failed",
        format!("Copy into '{target}' failed: {cause}"),
        source: err
    )
}
