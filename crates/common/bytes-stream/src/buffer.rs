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

use std::ops::{Bound, RangeBounds};

use bytes::Bytes;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    config::BufferConfig,
    error::{AllocationSnafu, Result},
};

/// Initial allocation used when no size hint is supplied (1 MiB).
pub const DEFAULT_BUFFER_SIZE: usize = 1_048_576;

/// Multiplier applied to the growth extent on reallocation.
///
/// Picked empirically; there is no measured optimum behind it.
pub const DEFAULT_GROWTH_FACTOR: usize = 10;

/// Append-only byte accumulator with geometric growth.
///
/// Bytes in `[0, position)` are written data, bytes in `[position, capacity)`
/// are reserved slack. Every allocation is fallible, so an oversized hint or
/// growth step surfaces as
/// [`ReadError::Allocation`](crate::ReadError::Allocation) instead of aborting.
#[derive(Debug)]
pub struct GrowableBuffer {
    storage:       Vec<u8>,
    capacity:      usize,
    default_size:  usize,
    growth_factor: usize,
}

impl GrowableBuffer {
    /// Allocates `size_hint` bytes, or [`DEFAULT_BUFFER_SIZE`] when absent.
    pub fn with_capacity(size_hint: Option<usize>) -> Result<Self> {
        Self::with_config(size_hint, &BufferConfig::default())
    }

    pub fn with_config(size_hint: Option<usize>, config: &BufferConfig) -> Result<Self> {
        let capacity = size_hint.unwrap_or(config.default_size);
        Ok(Self {
            storage: reserve(capacity)?,
            capacity,
            default_size: config.default_size,
            growth_factor: config.growth_factor.max(1),
        })
    }

    /// Allocated size of the storage.
    #[must_use]
    pub const fn capacity(&self) -> usize { self.capacity }

    /// Number of bytes written so far.
    #[must_use]
    pub fn position(&self) -> usize { self.storage.len() }

    #[must_use]
    pub fn len(&self) -> usize { self.storage.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.storage.is_empty() }

    /// Copies `chunk` behind the written data, reallocating first if it does
    /// not fit. Fails only if the reallocation cannot be served.
    pub fn append(&mut self, chunk: &[u8]) -> Result<()> {
        if self.position().saturating_add(chunk.len()) > self.capacity {
            self.grow(chunk.len())?;
        }
        self.storage.extend_from_slice(chunk);
        Ok(())
    }

    fn grow(&mut self, incoming: usize) -> Result<()> {
        let extent = incoming.max(self.default_size);
        let new_capacity = self
            .position()
            .saturating_add(extent.saturating_mul(self.growth_factor));
        debug!(
            from = self.capacity,
            to = new_capacity,
            written = self.position(),
            "Growing buffer"
        );

        let mut storage = reserve(new_capacity)?;
        storage.extend_from_slice(&self.storage);
        self.storage = storage;
        self.capacity = new_capacity;
        Ok(())
    }

    /// Zero-copy window over the storage. `..` selects the written data.
    ///
    /// # Panics
    ///
    /// Panics if the range ends past the written data or starts after its
    /// end.
    #[must_use]
    pub fn view(&self, range: impl RangeBounds<usize>) -> &[u8] {
        let (begin, end) = self.bounds(range);
        &self.storage[begin..end]
    }

    /// Owned copy of the selected range.
    ///
    /// # Panics
    ///
    /// Same as [`GrowableBuffer::view`].
    #[must_use]
    pub fn copy(&self, range: impl RangeBounds<usize>) -> Bytes {
        Bytes::copy_from_slice(self.view(range))
    }

    /// Finalizes the buffer.
    ///
    /// Hands the storage over without copying when it holds no slack,
    /// otherwise returns a compacted copy of the written data so the unused
    /// tail is released with the buffer.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        if self.capacity == self.position() {
            Bytes::from(self.storage)
        } else {
            self.copy(..)
        }
    }

    fn bounds(&self, range: impl RangeBounds<usize>) -> (usize, usize) {
        let written = self.position();
        let begin = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&end) => end.saturating_add(1),
            Bound::Excluded(&end) => end,
            Bound::Unbounded => written,
        };
        assert!(
            end <= written,
            "range end {end} exceeds written length {written}"
        );
        assert!(begin <= end, "range start {begin} is after range end {end}");
        (begin, end)
    }
}

fn reserve(capacity: usize) -> Result<Vec<u8>> {
    let mut storage = Vec::new();
    storage
        .try_reserve_exact(capacity)
        .context(AllocationSnafu {
            requested: capacity,
        })?;
    Ok(storage)
}
