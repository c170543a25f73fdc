//! Bulk loading through `COPY ... FROM STDIN`.

mod copy;
mod pipe;
mod producer;
mod source;

pub use copy::{BulkLoadExecutor, copy_statement};
pub use pipe::{
    ChunkBuffer, PIPE_CAPACITY, PIPE_CHUNK_SIZE, PipeEvent, PipeReader, PipeWriter, pipe,
};
pub use source::EntitySource;
