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

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tokio::sync::mpsc;

/// Consumption so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    /// Bytes appended so far
    pub loaded:            u64,
    /// The size hint, or 0 without one
    pub total:             u64,
    /// Whether a size hint was supplied
    pub length_computable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProgressEventKind {
    /// Emitted once before the first pull
    LoadStart,
    /// Emitted after appends, throttled
    Progress,
    /// Emitted once as the last action of a run
    LoadEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub kind:     ProgressEventKind,
    pub progress: Progress,
}

/// Receives the notifications of a reading task.
///
/// Called inline from the read loop, so implementations should return
/// quickly.
pub trait ProgressListener: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressListener for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) { self(event) }
}

/// Forwards events into an unbounded channel. Events sent after the receiver
/// is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelListener {
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<ProgressEvent>) -> Self { Self { tx } }

    /// Creates a listener together with the receiving end.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ProgressListener for ChannelListener {
    fn on_event(&self, event: &ProgressEvent) { let _ = self.tx.send(*event); }
}
