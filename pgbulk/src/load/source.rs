use std::fmt;

use futures::stream::{BoxStream, Stream, StreamExt};

use crate::encoder::RowEncoder;
use crate::load::pipe::PipeWriter;
use crate::load::producer::{ProducerHandle, spawn_iter_producer, spawn_stream_producer};

/// Entities to import, either pulled from an iterator or polled from a stream.
///
/// Iterators are encoded on the blocking pool, streams on an async task. Neither is collected.
pub enum EntitySource<T> {
    Iter(Box<dyn Iterator<Item = T> + Send>),
    Stream(BoxStream<'static, T>),
}

impl<T> EntitySource<T>
where
    T: Send + 'static,
{
    /// Creates a source from a materialized collection or a lazy iterator.
    pub fn from_entities<I>(entities: I) -> EntitySource<T>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: Send + 'static,
    {
        EntitySource::Iter(Box::new(entities.into_iter()))
    }

    pub fn from_stream<S>(entities: S) -> EntitySource<T>
    where
        S: Stream<Item = T> + Send + 'static,
    {
        EntitySource::Stream(entities.boxed())
    }

    /// Pulls the first entity ahead of time. Returns `None` if the source is empty.
    pub async fn peeked(self) -> Option<EntitySource<T>> {
        match self {
            EntitySource::Iter(entities) => {
                let mut entities = entities.peekable();
                entities.peek()?;

                Some(EntitySource::Iter(Box::new(entities)))
            }
            EntitySource::Stream(entities) => {
                let mut entities = entities.peekable();
                std::pin::Pin::new(&mut entities).peek().await?;

                Some(EntitySource::Stream(entities.boxed()))
            }
        }
    }

    pub(crate) fn spawn_producer(self, encoder: RowEncoder<T>, writer: PipeWriter) -> ProducerHandle {
        match self {
            EntitySource::Iter(entities) => spawn_iter_producer(entities, encoder, writer),
            EntitySource::Stream(entities) => spawn_stream_producer(entities, encoder, writer),
        }
    }
}

impl<T> fmt::Debug for EntitySource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntitySource::Iter(_) => f.write_str("EntitySource::Iter"),
            EntitySource::Stream(_) => f.write_str("EntitySource::Stream"),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    #[tokio::test]
    async fn empty_sources_peek_to_none() {
        assert!(EntitySource::from_entities(Vec::<u8>::new()).peeked().await.is_none());
        assert!(EntitySource::from_stream(stream::empty::<u8>()).peeked().await.is_none());
    }

    #[tokio::test]
    async fn peeking_keeps_every_entity() {
        let Some(EntitySource::Iter(entities)) =
            EntitySource::from_entities(vec![1, 2, 3]).peeked().await
        else {
            panic!("expected a non-empty iterator source");
        };
        assert_eq!(entities.collect::<Vec<_>>(), vec![1, 2, 3]);

        let Some(EntitySource::Stream(entities)) =
            EntitySource::from_stream(stream::iter(vec![4, 5])).peeked().await
        else {
            panic!("expected a non-empty stream source");
        };
        assert_eq!(entities.collect::<Vec<_>>().await, vec![4, 5]);
    }
}
