// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Source normalization.
//!
//! A [`Source`] is built from one of three shapes:
//!
//! - a synchronous iterator ([`Source::iter`]),
//! - an asynchronous stream ([`Source::stream`], [`Source::try_stream`],
//!   [`Source::async_read`]),
//! - a [`ReadableStream`] whose reader is acquired once and pulled with
//!   [`StreamReader::read`] until [`ReadResult::Done`].
//!
//! At run start the shape is resolved into a single [`ChunkSource`], which
//! the task pulls from one chunk at a time.

use std::{any::Any, fmt};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{
    StreamExt, TryStreamExt,
    stream::{self, BoxStream, Stream},
};
use tokio::{io::AsyncRead, sync::mpsc};
use tokio_util::io::ReaderStream;
use tracing::warn;

use crate::error::{BoxError, ReadError};

/// An item a source may yield.
///
/// `None` marks an item that is not a byte sequence.
pub trait IntoChunk: Send + 'static {
    fn into_chunk(self) -> Option<Bytes>;
}

impl IntoChunk for Bytes {
    fn into_chunk(self) -> Option<Bytes> { Some(self) }
}

impl IntoChunk for BytesMut {
    fn into_chunk(self) -> Option<Bytes> { Some(self.freeze()) }
}

impl IntoChunk for Vec<u8> {
    fn into_chunk(self) -> Option<Bytes> { Some(Bytes::from(self)) }
}

impl IntoChunk for Box<[u8]> {
    fn into_chunk(self) -> Option<Bytes> { Some(Bytes::from(self)) }
}

impl IntoChunk for &'static [u8] {
    fn into_chunk(self) -> Option<Bytes> { Some(Bytes::from_static(self)) }
}

impl<const N: usize> IntoChunk for [u8; N] {
    fn into_chunk(self) -> Option<Bytes> { Some(Bytes::copy_from_slice(&self)) }
}

/// Dynamically typed items are accepted if they hold one of the byte types
/// above.
impl IntoChunk for Box<dyn Any + Send> {
    fn into_chunk(self) -> Option<Bytes> {
        let item = match self.downcast::<Bytes>() {
            Ok(bytes) => return Some(*bytes),
            Err(item) => item,
        };
        let item = match item.downcast::<Vec<u8>>() {
            Ok(vec) => return Some(Bytes::from(*vec)),
            Err(item) => item,
        };
        let item = match item.downcast::<BytesMut>() {
            Ok(bytes) => return Some(bytes.freeze()),
            Err(item) => item,
        };
        item.downcast::<&'static [u8]>()
            .ok()
            .map(|slice| Bytes::from_static(*slice))
    }
}

/// One step of a [`StreamReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult<T> {
    Chunk(T),
    Done,
}

/// Pull side of a [`ReadableStream`].
#[async_trait]
pub trait StreamReader: Send + 'static {
    type Chunk: IntoChunk;

    async fn read(&mut self) -> Result<ReadResult<Self::Chunk>, BoxError>;

    /// Tells the producer that no more chunks will be read because the read
    /// failed.
    async fn cancel(&mut self, _reason: &ReadError) -> Result<(), BoxError> { Ok(()) }

    /// Gives the reader back. Called once when reading ends, on success and
    /// failure alike.
    fn release_lock(&mut self) {}
}

/// A stream that hands out exactly one reader.
pub trait ReadableStream: Send + 'static {
    type Reader: StreamReader;

    fn get_reader(self) -> Result<Self::Reader, BoxError>;
}

/// Reader over a channel fed by a producer task.
#[derive(Debug)]
pub struct ReceiverReader<C> {
    rx: mpsc::Receiver<C>,
}

#[async_trait]
impl<C: IntoChunk> StreamReader for ReceiverReader<C> {
    type Chunk = C;

    async fn read(&mut self) -> Result<ReadResult<C>, BoxError> {
        Ok(self.rx.recv().await.map_or(ReadResult::Done, ReadResult::Chunk))
    }

    async fn cancel(&mut self, _reason: &ReadError) -> Result<(), BoxError> {
        self.rx.close();
        Ok(())
    }
}

impl<C: IntoChunk> ReadableStream for mpsc::Receiver<C> {
    type Reader = ReceiverReader<C>;

    fn get_reader(self) -> Result<Self::Reader, BoxError> { Ok(ReceiverReader { rx: self }) }
}

/// Pull interface the read loop drives.
#[async_trait]
pub(crate) trait ChunkSource<C>: Send {
    async fn next_chunk(&mut self) -> Result<Option<C>, BoxError>;

    async fn cancel(&mut self, reason: &ReadError);

    fn release(&mut self);
}

/// Adapter for iterator and stream shapes.
struct IterSource<C> {
    inner: Option<BoxStream<'static, Result<C, BoxError>>>,
}

#[async_trait]
impl<C: IntoChunk> ChunkSource<C> for IterSource<C> {
    async fn next_chunk(&mut self) -> Result<Option<C>, BoxError> {
        match self.inner.as_mut() {
            Some(inner) => inner.next().await.transpose(),
            None => Ok(None),
        }
    }

    async fn cancel(&mut self, _reason: &ReadError) { self.inner = None; }

    fn release(&mut self) { self.inner = None; }
}

/// Adapter for the reader shape.
struct ReaderSource<R> {
    reader: Option<R>,
}

#[async_trait]
impl<R: StreamReader> ChunkSource<R::Chunk> for ReaderSource<R> {
    async fn next_chunk(&mut self) -> Result<Option<R::Chunk>, BoxError> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        match reader.read().await? {
            ReadResult::Chunk(chunk) => Ok(Some(chunk)),
            ReadResult::Done => Ok(None),
        }
    }

    async fn cancel(&mut self, reason: &ReadError) {
        if let Some(reader) = self.reader.as_mut() {
            if let Err(err) = reader.cancel(reason).await {
                warn!(error = %err, "Failed to cancel stream reader");
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.release_lock();
        }
    }
}

type Acquire<C> = Box<dyn FnOnce() -> Result<Box<dyn ChunkSource<C>>, BoxError> + Send>;

enum Shape<C> {
    Iterable(BoxStream<'static, Result<C, BoxError>>),
    Readable(Acquire<C>),
}

/// A producer of chunks, consumed by exactly one run.
pub struct Source<C = Bytes> {
    shape: Shape<C>,
}

impl<C: IntoChunk> Source<C> {
    /// Synchronous iterable.
    pub fn iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = C>,
        I::IntoIter: Send + 'static,
    {
        Self::try_stream(stream::iter(items.into_iter().map(Ok::<C, BoxError>)))
    }

    /// Asynchronous iterable.
    pub fn stream<S>(items: S) -> Self
    where
        S: Stream<Item = C> + Send + 'static,
    {
        Self::try_stream(items.map(Ok::<C, BoxError>))
    }

    /// Asynchronous iterable that may fail. An `Err` item fails the run.
    pub fn try_stream<S, E>(items: S) -> Self
    where
        S: Stream<Item = Result<C, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        Self {
            shape: Shape::Iterable(items.map_err(Into::<BoxError>::into).boxed()),
        }
    }

    /// Stream with a reader. The reader is acquired when the run starts.
    pub fn readable<S>(stream: S) -> Self
    where
        S: ReadableStream,
        S::Reader: StreamReader<Chunk = C>,
    {
        let acquire: Acquire<C> = Box::new(move || {
            let reader = stream.get_reader()?;
            Ok(Box::new(ReaderSource {
                reader: Some(reader),
            }) as Box<dyn ChunkSource<C>>)
        });
        Self {
            shape: Shape::Readable(acquire),
        }
    }

    pub(crate) fn into_chunk_source(self) -> Result<Box<dyn ChunkSource<C>>, BoxError> {
        match self.shape {
            Shape::Iterable(inner) => Ok(Box::new(IterSource { inner: Some(inner) })),
            Shape::Readable(acquire) => acquire(),
        }
    }
}

impl Source<Bytes> {
    /// Reads an [`AsyncRead`] to its end. I/O errors fail the run.
    pub fn async_read<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::try_stream(ReaderStream::new(reader))
    }
}

impl<C> fmt::Debug for Source<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.shape {
            Shape::Iterable(_) => "iterable",
            Shape::Readable(_) => "readable",
        };
        f.debug_struct("Source").field("shape", &shape).finish()
    }
}
