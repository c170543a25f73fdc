//! Background encoder feeding the copy pipe.

use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bulk_error;
use crate::encoder::{RecordWriter, RowEncoder};
use crate::error::{BulkResult, ErrorKind};
use crate::load::pipe::{ChunkBuffer, PIPE_CHUNK_SIZE, PipeWriter};

/// Handle to a running producer. Resolves to the number of records it encoded.
pub(crate) type ProducerHandle = JoinHandle<BulkResult<u64>>;

/// Encodes `entities` on the blocking pool.
pub(crate) fn spawn_iter_producer<T, I>(
    entities: I,
    mut encoder: RowEncoder<T>,
    writer: PipeWriter,
) -> ProducerHandle
where
    T: Send + 'static,
    I: Iterator<Item = T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        match encode_iter(entities, &mut encoder, &writer) {
            Ok(rows) => {
                writer.blocking_finish()?;
                Ok(rows)
            }
            Err(err) => {
                writer.blocking_abort();
                Err(err)
            }
        }
    })
}

fn encode_iter<T, I>(entities: I, encoder: &mut RowEncoder<T>, writer: &PipeWriter) -> BulkResult<u64>
where
    I: Iterator<Item = T>,
{
    let mut records = RecordWriter::new(ChunkBuffer::with_capacity(PIPE_CHUNK_SIZE));

    for entity in entities {
        encoder.encode(&entity, &mut records)?;

        if records.get_ref()?.len() >= PIPE_CHUNK_SIZE {
            writer.blocking_send(records.with_inner(ChunkBuffer::take)?)?;
        }
    }

    let chunk = records.with_inner(ChunkBuffer::take)?;
    if !chunk.is_empty() {
        writer.blocking_send(chunk)?;
    }

    Ok(encoder.rows())
}

/// Encodes `entities` on an async task.
pub(crate) fn spawn_stream_producer<T, S>(
    entities: S,
    mut encoder: RowEncoder<T>,
    writer: PipeWriter,
) -> ProducerHandle
where
    T: Send + 'static,
    S: Stream<Item = T> + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        match encode_stream(entities, &mut encoder, &writer).await {
            Ok(rows) => {
                writer.finish().await?;
                Ok(rows)
            }
            Err(err) => {
                writer.abort().await;
                Err(err)
            }
        }
    })
}

async fn encode_stream<T, S>(
    mut entities: S,
    encoder: &mut RowEncoder<T>,
    writer: &PipeWriter,
) -> BulkResult<u64>
where
    S: Stream<Item = T> + Unpin,
{
    let mut records = RecordWriter::new(ChunkBuffer::with_capacity(PIPE_CHUNK_SIZE));

    while let Some(entity) = entities.next().await {
        encoder.encode(&entity, &mut records)?;

        if records.get_ref()?.len() >= PIPE_CHUNK_SIZE {
            let chunk = records.with_inner(ChunkBuffer::take)?;
            writer.send(chunk).await?;
        }
    }

    let chunk = records.with_inner(ChunkBuffer::take)?;
    if !chunk.is_empty() {
        writer.send(chunk).await?;
    }

    Ok(encoder.rows())
}

/// Waits up to `timeout` for the producer to end.
///
/// Returns `None` if the producer did not end in time, in which case it is aborted.
pub(crate) async fn join_producer(
    handle: ProducerHandle,
    timeout: Duration,
) -> Option<BulkResult<u64>> {
    let abort_handle = handle.abort_handle();

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => {
            debug!(ok = result.is_ok(), "producer joined");
            Some(result)
        }
        Ok(Err(err)) => {
            let err = if err.is_cancelled() {
                bulk_error!(ErrorKind::EncodingFailed, "Row encoder was cancelled", err)
            } else {
                bulk_error!(ErrorKind::EncodingFailed, "Row encoder panicked", err)
            };
            Some(Err(err))
        }
        Err(_) => {
            abort_handle.abort();
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "row encoder did not terminate in time and was interrupted"
            );
            None
        }
    }
}
