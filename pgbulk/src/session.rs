//! The connection seam bulk operations run against.

use std::future::Future;
use std::pin::pin;

use bytes::Bytes;
use futures::SinkExt;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, CopyInSink, SimpleQueryMessage, Transaction};
use tracing::debug;

use crate::bulk_error;
use crate::error::{BulkError, BulkResult, ErrorKind};
use crate::load::{PipeEvent, PipeReader};

/// How a `COPY ... FROM STDIN` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The server accepted the stream and reported this many rows.
    Completed(u64),
    /// The producer aborted and the copy was cancelled.
    Aborted,
}

/// A database session able to run statements and bulk loads.
///
/// Operations take the session by `&mut` so that only one statement runs on it at a time.
/// Implemented for [`Client`] and [`Transaction`]; with a transaction, every statement of an
/// operation joins the caller's transaction.
pub trait BulkSession: Send + Sync {
    /// Returns whether the session can run `COPY ... FROM STDIN`.
    fn supports_copy(&self) -> bool {
        true
    }

    /// Runs a single statement and returns the number of affected rows.
    fn execute(&mut self, statement: &str) -> impl Future<Output = BulkResult<u64>> + Send;

    /// Runs a query and returns the text of its first column for every row.
    fn query_column(
        &mut self,
        query: &str,
    ) -> impl Future<Output = BulkResult<Vec<String>>> + Send;

    /// Runs a `COPY ... FROM STDIN` statement, streaming everything `reader` yields.
    fn copy_in(
        &mut self,
        statement: &str,
        reader: PipeReader,
    ) -> impl Future<Output = BulkResult<CopyOutcome>> + Send;
}

macro_rules! impl_bulk_session {
    ($ty:ty) => {
        impl BulkSession for $ty {
            async fn execute(&mut self, statement: &str) -> BulkResult<u64> {
                Ok(<$ty>::execute(self, statement, &[]).await?)
            }

            async fn query_column(&mut self, query: &str) -> BulkResult<Vec<String>> {
                let messages = <$ty>::simple_query(self, query).await?;

                let mut values = Vec::new();
                for message in messages {
                    if let SimpleQueryMessage::Row(row) = message {
                        if let Some(value) = row.get(0) {
                            values.push(value.to_string());
                        }
                    }
                }

                Ok(values)
            }

            async fn copy_in(
                &mut self,
                statement: &str,
                reader: PipeReader,
            ) -> BulkResult<CopyOutcome> {
                let sink = <$ty>::copy_in::<_, Bytes>(self, statement)
                    .await
                    .map_err(copy_start_error)?;

                drive_copy(sink, reader).await
            }
        }
    };
}

impl_bulk_session!(Client);
impl_bulk_session!(Transaction<'_>);

fn copy_start_error(err: tokio_postgres::Error) -> BulkError {
    if err.code() == Some(&SqlState::FEATURE_NOT_SUPPORTED) {
        let detail = err.to_string();
        return bulk_error!(
            ErrorKind::CopyNotSupported,
            "Connection does not support COPY FROM STDIN",
            detail = detail,
            source: err
        );
    }

    err.into()
}

/// Forwards pipe chunks into `sink` until the producer finishes or aborts.
///
/// Dropping an unfinished sink makes the server discard the whole copy.
pub async fn drive_copy(sink: CopyInSink<Bytes>, mut reader: PipeReader) -> BulkResult<CopyOutcome> {
    let mut sink = pin!(sink);

    loop {
        match reader.next().await {
            PipeEvent::Data(chunk) => sink.send(chunk).await?,
            PipeEvent::Finished => {
                let rows = sink.as_mut().finish().await?;
                return Ok(CopyOutcome::Completed(rows));
            }
            PipeEvent::Aborted => {
                debug!("copy aborted by the producer");
                return Ok(CopyOutcome::Aborted);
            }
        }
    }
}
