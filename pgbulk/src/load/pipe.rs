//! Bounded single-producer single-consumer pipe carrying the `COPY` byte stream.

use std::io;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::bulk_error;
use crate::error::{BulkError, BulkResult, ErrorKind};

/// Size at which the producer hands a chunk of encoded records to the pipe.
pub const PIPE_CHUNK_SIZE: usize = 64 * 1024;

/// Number of chunks the pipe holds before the producer waits, about 1 MiB in total.
pub const PIPE_CAPACITY: usize = 16;

#[derive(Debug)]
enum PipeMessage {
    Data(Bytes),
    Finish,
    Abort,
}

/// What the consuming side observes next.
#[derive(Debug, PartialEq, Eq)]
pub enum PipeEvent {
    Data(Bytes),
    /// The producer wrote every record.
    Finished,
    /// The producer failed or went away without finishing.
    Aborted,
}

/// Creates a connected writer and reader.
pub fn pipe() -> (PipeWriter, PipeReader) {
    let (tx, rx) = mpsc::channel(PIPE_CAPACITY);

    (PipeWriter { tx }, PipeReader { rx, done: false })
}

/// Producing half of the pipe.
#[derive(Debug)]
pub struct PipeWriter {
    tx: mpsc::Sender<PipeMessage>,
}

impl PipeWriter {
    /// Sends a chunk, waiting while the pipe is full.
    pub async fn send(&self, chunk: Bytes) -> BulkResult<()> {
        self.tx
            .send(PipeMessage::Data(chunk))
            .await
            .map_err(|_| reader_gone())
    }

    /// Sends a chunk from a blocking context.
    pub fn blocking_send(&self, chunk: Bytes) -> BulkResult<()> {
        self.tx
            .blocking_send(PipeMessage::Data(chunk))
            .map_err(|_| reader_gone())
    }

    /// Marks the stream as complete.
    pub async fn finish(self) -> BulkResult<()> {
        self.tx
            .send(PipeMessage::Finish)
            .await
            .map_err(|_| reader_gone())
    }

    pub fn blocking_finish(self) -> BulkResult<()> {
        self.tx
            .blocking_send(PipeMessage::Finish)
            .map_err(|_| reader_gone())
    }

    /// Tells the reader to abandon the stream. A reader that is already gone is ignored.
    pub async fn abort(self) {
        let _ = self.tx.send(PipeMessage::Abort).await;
    }

    pub fn blocking_abort(self) {
        let _ = self.tx.blocking_send(PipeMessage::Abort);
    }
}

fn reader_gone() -> BulkError {
    bulk_error!(
        ErrorKind::LoadFailed,
        "Copy stream closed by the consumer",
        "The bulk load stopped reading before all rows were written"
    )
}

/// Consuming half of the pipe.
#[derive(Debug)]
pub struct PipeReader {
    rx: mpsc::Receiver<PipeMessage>,
    done: bool,
}

impl PipeReader {
    /// Waits for the next event. After the stream ended every call returns [`PipeEvent::Aborted`].
    pub async fn next(&mut self) -> PipeEvent {
        if self.done {
            return PipeEvent::Aborted;
        }

        match self.rx.recv().await {
            Some(PipeMessage::Data(chunk)) => PipeEvent::Data(chunk),
            Some(PipeMessage::Finish) => {
                self.done = true;
                self.rx.close();
                PipeEvent::Finished
            }
            Some(PipeMessage::Abort) | None => {
                self.done = true;
                self.rx.close();
                PipeEvent::Aborted
            }
        }
    }

    /// Reads everything up to the end of the stream.
    ///
    /// Returns `None` if the stream was aborted.
    pub async fn read_to_end(&mut self) -> Option<Bytes> {
        let mut buffer = BytesMut::new();
        loop {
            match self.next().await {
                PipeEvent::Data(chunk) => buffer.extend_from_slice(&chunk),
                PipeEvent::Finished => return Some(buffer.freeze()),
                PipeEvent::Aborted => return None,
            }
        }
    }
}

/// In-memory sink the CSV writer writes encoded records into.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    buffer: BytesMut,
}

impl ChunkBuffer {
    pub fn with_capacity(capacity: usize) -> ChunkBuffer {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Takes the buffered bytes, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }
}

impl io::Write for ChunkBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn delivers_chunks_then_finish() {
        let (writer, mut reader) = pipe();

        let producer = tokio::spawn(async move {
            writer.send(Bytes::from_static(b"1,a\n")).await.unwrap();
            writer.send(Bytes::from_static(b"2,b\n")).await.unwrap();
            writer.finish().await.unwrap();
        });

        assert_eq!(reader.read_to_end().await.unwrap(), Bytes::from_static(b"1,a\n2,b\n"));
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn explicit_abort_is_observed() {
        let (writer, mut reader) = pipe();
        writer.send(Bytes::from_static(b"1\n")).await.unwrap();
        writer.abort().await;

        assert_eq!(reader.next().await, PipeEvent::Data(Bytes::from_static(b"1\n")));
        assert_eq!(reader.next().await, PipeEvent::Aborted);
        assert_eq!(reader.next().await, PipeEvent::Aborted);
    }

    #[tokio::test]
    async fn dropped_writer_counts_as_abort() {
        let (writer, mut reader) = pipe();
        drop(writer);

        assert!(reader.read_to_end().await.is_none());
    }

    #[tokio::test]
    async fn send_fails_once_reader_is_gone() {
        let (writer, reader) = pipe();
        drop(reader);

        let err = writer.send(Bytes::from_static(b"x")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LoadFailed);
    }

    #[tokio::test]
    async fn full_pipe_holds_the_writer_back() {
        let (writer, mut reader) = pipe();
        for _ in 0..PIPE_CAPACITY {
            writer.send(Bytes::from_static(b"1\n")).await.unwrap();
        }

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            writer.send(Bytes::from_static(b"2\n")),
        )
        .await;
        assert!(blocked.is_err());

        assert_eq!(reader.next().await, PipeEvent::Data(Bytes::from_static(b"1\n")));
        writer.send(Bytes::from_static(b"2\n")).await.unwrap();
    }

    #[test]
    fn chunk_buffer_take_empties_buffer() {
        let mut buffer = ChunkBuffer::default();
        buffer.write_all(b"abc").unwrap();

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.take(), Bytes::from_static(b"abc"));
        assert!(buffer.is_empty());
    }
}
