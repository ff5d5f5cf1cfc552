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

//! Drain a byte source of unknown length into one contiguous buffer.
//!
//! - [`ReadingTask`]: run-once task with a `ready -> running -> {completed |
//!   aborted | error}` lifecycle
//! - [`Source`]: iterators, streams, [`AsyncRead`](tokio::io::AsyncRead)ers
//!   and [`ReadableStream`]s behind a single pull loop
//! - [`GrowableBuffer`]: append-only accumulator with geometric growth
//! - [`AbortController`] / [`AbortSignal`]: cooperative cancellation and
//!   timeouts
//! - [`ProgressListener`]: `loadstart`, throttled `progress`, `loadend`

mod buffer;
mod clock;
mod config;
mod error;
mod progress;
mod signal;
mod source;
mod state;
mod task;
mod throttle;

pub use buffer::{DEFAULT_BUFFER_SIZE, DEFAULT_GROWTH_FACTOR, GrowableBuffer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BufferConfig, DEFAULT_PROGRESS_INTERVAL, ReadingOptions, ThrottleConfig};
pub use error::{BoxError, ErrorKind, ReadError, Result};
pub use progress::{ChannelListener, Progress, ProgressEvent, ProgressEventKind, ProgressListener};
pub use signal::{AbortController, AbortReason, AbortSignal};
pub use source::{IntoChunk, ReadResult, ReadableStream, ReceiverReader, Source, StreamReader};
pub use state::TaskState;
pub use task::ReadingTask;
pub use throttle::ProgressThrottle;
