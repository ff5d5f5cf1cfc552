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

use std::time::Duration;

use tokio::time::Instant;

/// Lets at most one event through per `interval`.
///
/// The first call always passes. Later calls pass once `interval` has
/// elapsed since the last one that passed.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval:     Duration,
    last_emitted: Option<Instant>,
}

impl ProgressThrottle {
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted: None,
        }
    }

    #[must_use]
    pub const fn interval(&self) -> Duration { self.interval }

    /// Returns `true` and records `now` if an event may be emitted.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_emitted {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_emitted = Some(now);
        true
    }
}
