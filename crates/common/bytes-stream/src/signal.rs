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

//! Cooperative cancellation for reading tasks.
//!
//! An [`AbortSignal`] wraps a [`CancellationToken`] and remembers why it was
//! signaled. A timeout is a deadline armed on the signal up front; once the
//! deadline passes the signal reads as aborted with
//! [`AbortReason::TimedOut`].

use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use strum_macros::Display;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Why a signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AbortReason {
    /// Explicit cancellation by the caller.
    Aborted,
    /// A time budget expired.
    TimedOut,
}

/// Read side of a cancellation. Clones observe the same cancellation.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    token:    CancellationToken,
    reason:   Arc<OnceLock<AbortReason>>,
    deadline: Option<Instant>,
}

impl AbortSignal {
    fn with_deadline(deadline: Option<Instant>) -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
            deadline,
        }
    }

    /// A signal that fires on its own once `duration` has elapsed.
    #[must_use]
    pub fn timeout(duration: Duration) -> Self { Self::with_deadline(Some(Instant::now() + duration)) }

    /// A signal that is already aborted with `reason`.
    #[must_use]
    pub fn aborted(reason: AbortReason) -> Self {
        let signal = Self::with_deadline(None);
        signal.fire(reason);
        signal
    }

    fn fire(&self, reason: AbortReason) {
        // First reason wins.
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    fn deadline_passed(&self) -> bool { self.deadline.is_some_and(|deadline| Instant::now() >= deadline) }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        if self.deadline_passed() {
            self.fire(AbortReason::TimedOut);
            return true;
        }
        false
    }

    /// `None` while the signal has not fired.
    #[must_use]
    pub fn reason(&self) -> Option<AbortReason> {
        if !self.is_aborted() {
            return None;
        }
        Some(
            self.reason
                .get()
                .copied()
                .unwrap_or(AbortReason::Aborted),
        )
    }

    /// Waits for the signal, e.g. to stop a producer that feeds a channel
    /// source. Reading tasks only poll [`AbortSignal::reason`] between pulls.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    () = self.token.cancelled() => {}
                    () = sleep_until(deadline) => self.fire(AbortReason::TimedOut),
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// The underlying token, e.g. to derive child tokens.
    #[must_use]
    pub const fn token(&self) -> &CancellationToken { &self.token }
}

impl From<CancellationToken> for AbortSignal {
    fn from(token: CancellationToken) -> Self {
        Self {
            token,
            reason: Arc::new(OnceLock::new()),
            deadline: None,
        }
    }
}

/// Write side of a cancellation.
#[derive(Debug, Clone)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            signal: AbortSignal::with_deadline(None),
        }
    }

    /// A controller whose signal also fires after `duration`.
    #[must_use]
    pub fn timeout(duration: Duration) -> Self {
        Self {
            signal: AbortSignal::timeout(duration),
        }
    }

    #[must_use]
    pub fn signal(&self) -> AbortSignal { self.signal.clone() }

    pub fn abort(&self) { self.abort_with(AbortReason::Aborted); }

    /// Fires the signal. Later calls keep the first reason.
    pub fn abort_with(&self, reason: AbortReason) { self.signal.fire(reason); }
}

impl Default for AbortController {
    fn default() -> Self { Self::new() }
}
