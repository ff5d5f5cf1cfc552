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

use std::{
    fmt,
    sync::{
        Arc, Mutex, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use snafu::{OptionExt, ResultExt};
use tracing::{debug, trace, warn};

use crate::{
    buffer::GrowableBuffer,
    clock::Clock,
    config::{BufferConfig, ReadingOptions},
    error::{InvalidStateSnafu, InvalidTypeSnafu, OutOfRangeSnafu, ReadError, Result, SourceSnafu},
    progress::{Progress, ProgressEvent, ProgressEventKind, ProgressListener},
    signal::{AbortReason, AbortSignal},
    source::{ChunkSource, IntoChunk, Source},
    state::{StateCell, TaskState},
    throttle::ProgressThrottle,
};

/// Drains a [`Source`] into one contiguous byte sequence.
///
/// A task runs at most once. [`ReadingTask::run`] pulls chunks one at a
/// time, appends them to a buffer sized by the total hint, checks the abort
/// signal before consuming every pulled chunk and notifies listeners:
///
/// - `loadstart` once before the first pull,
/// - `progress` after appends, at most once per throttle interval,
/// - `loadend` once, after the final state is set.
///
/// Because `progress` is throttled, the last one may report less than the
/// final length. Read the result or [`ReadingTask::loaded`] instead.
///
/// # Example
///
/// ```rust
/// use bytes_stream::{ReadingOptions, ReadingTask, Source, TaskState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), bytes_stream::ReadError> {
/// let source = Source::iter(vec![vec![1u8], vec![2, 3]]);
/// let task = ReadingTask::new(source, ReadingOptions::default())?;
///
/// let bytes = task.run().await?;
/// assert_eq!(&bytes[..], &[1, 2, 3]);
/// assert_eq!(task.state(), TaskState::Completed);
/// # Ok(())
/// # }
/// ```
pub struct ReadingTask<C = Bytes> {
    source:           Mutex<Option<Source<C>>>,
    total:            Option<u64>,
    initial_capacity: Option<usize>,
    signal:           Option<AbortSignal>,
    buffer_config:    BufferConfig,
    clock:            Arc<dyn Clock>,
    state:            StateCell,
    loaded:           AtomicU64,
    throttle:         Mutex<ProgressThrottle>,
    listeners:        RwLock<Vec<Arc<dyn ProgressListener>>>,
}

impl<C: IntoChunk> ReadingTask<C> {
    /// Creates a task in the `ready` state.
    ///
    /// Fails with a range error if the total hint cannot be allocated on this
    /// platform.
    pub fn new(source: Source<C>, options: ReadingOptions) -> Result<Self> {
        let initial_capacity = match options.total_byte_length {
            Some(total) => Some(
                usize::try_from(total)
                    .ok()
                    .filter(|&capacity| isize::try_from(capacity).is_ok())
                    .context(OutOfRangeSnafu {
                        name:  "options.total_byte_length",
                        value: total,
                    })?,
            ),
            None => None,
        };

        Ok(Self {
            source: Mutex::new(Some(source)),
            total: options.total_byte_length,
            initial_capacity,
            signal: options.signal,
            buffer_config: options.buffer,
            clock: options.clock,
            state: StateCell::new(),
            loaded: AtomicU64::new(0),
            throttle: Mutex::new(ProgressThrottle::new(options.throttle.interval)),
            listeners: RwLock::new(Vec::new()),
        })
    }

    /// Same as [`ReadingTask::new`].
    pub fn create(source: Source<C>, options: ReadingOptions) -> Result<Self> { Self::new(source, options) }

    #[must_use]
    pub fn state(&self) -> TaskState { self.state.get() }

    /// Live snapshot of the consumption.
    #[must_use]
    pub fn progress(&self) -> Progress {
        Progress {
            loaded:            self.loaded(),
            total:             self.total(),
            length_computable: self.length_computable(),
        }
    }

    /// Bytes appended so far.
    #[must_use]
    pub fn loaded(&self) -> u64 { self.loaded.load(Ordering::Acquire) }

    /// The total hint, or 0 without one.
    #[must_use]
    pub fn total(&self) -> u64 { self.total.unwrap_or(0) }

    #[must_use]
    pub const fn length_computable(&self) -> bool { self.total.is_some() }

    /// Registers a listener for `loadstart`, `progress` and `loadend`.
    pub fn subscribe(&self, listener: impl ProgressListener + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Reads the whole source.
    ///
    /// Fails with an invalid-state error unless the task is `ready`. Any
    /// other failure leaves the task `aborted` (abort and timeout errors) or
    /// `error` (everything else) and is returned unchanged.
    ///
    /// A run whose future is dropped before it finishes settles as `aborted`
    /// and still emits `loadend`.
    pub async fn run(&self) -> Result<Bytes> {
        self.state.transition(TaskState::Running)?;
        debug!(
            total = ?self.total,
            signal = self.signal.is_some(),
            "Reading task started"
        );

        let mut guard = RunGuard {
            task:  self,
            armed: true,
        };
        let result = self.read_all().await;
        guard.armed = false;

        let next = match &result {
            Ok(_) => TaskState::Completed,
            Err(err) => err.terminal_state(),
        };
        match &result {
            Ok(bytes) => debug!(loaded = bytes.len(), "Reading task completed"),
            Err(err) => debug!(
                error = %err,
                kind = %err.kind(),
                state = %next,
                loaded = self.loaded(),
                "Reading task failed"
            ),
        }
        self.settle(next);
        result
    }

    async fn read_all(&self) -> Result<Bytes> {
        self.check_signal(true)?;

        let source = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .context(InvalidStateSnafu {
                state: TaskState::Running,
            })?;
        let mut chunks = ReleaseGuard(source.into_chunk_source().context(SourceSnafu)?);

        let result = self.consume(chunks.0.as_mut()).await;
        if let Err(err) = &result {
            chunks.0.cancel(err).await;
        }
        drop(chunks);
        result
    }

    async fn consume(&self, chunks: &mut dyn ChunkSource<C>) -> Result<Bytes> {
        let mut buffer = GrowableBuffer::with_config(self.initial_capacity, &self.buffer_config)?;
        self.notify(ProgressEventKind::LoadStart);
        self.pump(chunks, &mut buffer).await?;
        Ok(buffer.into_bytes())
    }

    async fn pump(&self, chunks: &mut dyn ChunkSource<C>, buffer: &mut GrowableBuffer) -> Result<()> {
        while let Some(item) = chunks.next_chunk().await.context(SourceSnafu)? {
            self.check_signal(false)?;

            let chunk = item
                .into_chunk()
                .context(InvalidTypeSnafu { name: "source" })?;
            buffer.append(&chunk)?;
            self.loaded.store(buffer.position() as u64, Ordering::Release);
            trace!(
                chunk = chunk.len(),
                loaded = buffer.position(),
                "Appended chunk"
            );

            self.notify_progress();
        }
        Ok(())
    }

    /// Stores the terminal state, then emits `loadend`.
    fn settle(&self, next: TaskState) {
        if let Err(err) = self.state.transition(next) {
            warn!(error = %err, "Reading task state moved concurrently");
        }
        self.notify(ProgressEventKind::LoadEnd);
    }

    fn check_signal(&self, at_start: bool) -> Result<()> {
        let Some(reason) = self.signal.as_ref().and_then(AbortSignal::reason) else {
            return Ok(());
        };
        Err(match (reason, at_start) {
            (AbortReason::Aborted, true) => ReadError::Aborted {
                message: "already aborted",
            },
            (AbortReason::Aborted, false) => ReadError::Aborted { message: "aborted" },
            (AbortReason::TimedOut, true) => ReadError::TimedOut {
                message: "already timed out",
            },
            (AbortReason::TimedOut, false) => ReadError::TimedOut {
                message: "timed out",
            },
        })
    }

    fn notify_progress(&self) {
        let now = self.clock.now();
        let emit = self
            .throttle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_acquire(now);
        if emit {
            self.notify(ProgressEventKind::Progress);
        }
    }

    fn notify(&self, kind: ProgressEventKind) {
        let event = ProgressEvent {
            kind,
            progress: self.progress(),
        };
        // Listeners may subscribe from inside a callback.
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener.on_event(&event);
        }
    }
}

/// Settles a run whose future was dropped before it finished.
struct RunGuard<'a, C: IntoChunk> {
    task:  &'a ReadingTask<C>,
    armed: bool,
}

impl<C: IntoChunk> Drop for RunGuard<'_, C> {
    fn drop(&mut self) {
        if self.armed {
            debug!(loaded = self.task.loaded(), "Reading task dropped while running");
            self.task.settle(TaskState::Aborted);
        }
    }
}

/// Releases the resolved source on every exit from the read, including a
/// dropped future.
struct ReleaseGuard<C>(Box<dyn ChunkSource<C>>);

impl<C> Drop for ReleaseGuard<C> {
    fn drop(&mut self) { self.0.release(); }
}

impl<C> fmt::Debug for ReadingTask<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadingTask")
            .field("state", &self.state.get())
            .field("loaded", &self.loaded.load(Ordering::Acquire))
            .field("total", &self.total)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_initial_state() {
        let task = ReadingTask::new(Source::iter(Vec::<Bytes>::new()), ReadingOptions::default()).unwrap();
        assert_eq!(task.state(), TaskState::Ready);
        assert_eq!(
            task.progress(),
            Progress {
                loaded:            0,
                total:             0,
                length_computable: false,
            }
        );
    }

    #[tokio::test]
    async fn test_hint_makes_length_computable() {
        let options = ReadingOptions::builder().total_byte_length(3).build();
        let task = ReadingTask::new(Source::iter(vec![vec![1u8, 2, 3]]), options).unwrap();
        assert!(task.length_computable());
        assert_eq!(task.total(), 3);

        let bytes = task.run().await.unwrap();
        assert_eq!(&bytes[..], &[1, 2, 3]);
        assert_eq!(task.progress().loaded, 3);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_unallocatable_hint_is_out_of_range() {
        let options = ReadingOptions::builder().total_byte_length(u64::MAX).build();
        let err = ReadingTask::new(Source::iter(Vec::<Bytes>::new()), options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(err.to_string().contains("options.total_byte_length"));
    }

    #[tokio::test]
    async fn test_create_alias() {
        let task = ReadingTask::create(Source::iter(vec![vec![9u8]]), ReadingOptions::default()).unwrap();
        assert_eq!(task.run().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_debug_output() {
        let task = ReadingTask::new(Source::iter(Vec::<Bytes>::new()), ReadingOptions::default()).unwrap();
        let debug = format!("{task:?}");
        assert!(debug.contains("Ready"));
    }
}
