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

use std::{sync::Arc, time::Duration};

use bon::Builder;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::{
    buffer::{DEFAULT_BUFFER_SIZE, DEFAULT_GROWTH_FACTOR},
    clock::{Clock, SystemClock},
    signal::AbortSignal,
};

/// Minimum spacing between two emitted `progress` notifications.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(50);

/// Allocation policy of the accumulation buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct BufferConfig {
    /// Initial allocation without a size hint, and the minimum growth extent
    /// (default: 1 MiB)
    #[default(DEFAULT_BUFFER_SIZE)]
    #[builder(default = DEFAULT_BUFFER_SIZE)]
    pub default_size:  usize,
    /// Multiplier applied to the growth extent (default: 10). Zero is treated
    /// as 1.
    #[default(DEFAULT_GROWTH_FACTOR)]
    #[builder(default = DEFAULT_GROWTH_FACTOR)]
    pub growth_factor: usize,
}

/// Rate limit for `progress` notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Default: 50ms
    #[default(DEFAULT_PROGRESS_INTERVAL)]
    #[builder(default = DEFAULT_PROGRESS_INTERVAL)]
    pub interval: Duration,
}

/// Options accepted by [`ReadingTask::new`](crate::ReadingTask::new)
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct ReadingOptions {
    /// Total number of bytes the source is expected to yield. Sizes the
    /// initial allocation and makes progress length-computable; it never
    /// truncates or pads the result.
    pub total_byte_length: Option<u64>,

    /// Cooperative cancellation signal
    pub signal: Option<AbortSignal>,

    #[builder(default)]
    pub buffer: BufferConfig,

    #[builder(default)]
    pub throttle: ThrottleConfig,

    /// Time source used for progress throttling
    #[default(Arc::new(SystemClock))]
    #[builder(default = Arc::new(SystemClock))]
    pub clock: Arc<dyn Clock>,
}
