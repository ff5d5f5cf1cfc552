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

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};
use snafu::ensure;
use strum_macros::{Display, EnumString};

use crate::error::{InvalidStateSnafu, ReadError};

/// Lifecycle of a [`ReadingTask`](crate::ReadingTask).
///
/// `Ready -> Running -> {Completed | Aborted | Error}`; terminal states are
/// final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum TaskState {
    Ready,
    Running,
    Completed,
    Aborted,
    Error,
}

impl TaskState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Error)
    }

    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Ready, Self::Running)
                | (Self::Running, Self::Completed | Self::Aborted | Self::Error)
        )
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Ready,
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Aborted,
            _ => Self::Error,
        }
    }
}

/// Atomic cell holding a [`TaskState`]; every change goes through
/// [`StateCell::transition`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new() -> Self { Self(AtomicU8::new(TaskState::Ready as u8)) }

    pub(crate) fn get(&self) -> TaskState { TaskState::from_u8(self.0.load(Ordering::Acquire)) }

    /// Moves to `next`, failing with the observed state if the move is
    /// illegal or another caller won the race.
    pub(crate) fn transition(&self, next: TaskState) -> Result<(), ReadError> {
        let current = self.get();
        ensure!(
            current.can_transition_to(next),
            InvalidStateSnafu { state: current }
        );
        self.0
            .compare_exchange(
                current as u8,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|observed| ReadError::InvalidState {
                state: TaskState::from_u8(observed),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_state_strings() {
        assert_eq!(TaskState::Ready.to_string(), "ready");
        assert_eq!(TaskState::Running.to_string(), "running");
        assert_eq!(TaskState::Completed.to_string(), "completed");
        assert_eq!(TaskState::Aborted.to_string(), "aborted");
        assert_eq!(TaskState::Error.to_string(), "error");
        assert_eq!(TaskState::from_str("aborted").unwrap(), TaskState::Aborted);
    }

    #[test]
    fn test_legal_transitions() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), TaskState::Ready);
        cell.transition(TaskState::Running).unwrap();
        cell.transition(TaskState::Completed).unwrap();
        assert_eq!(cell.get(), TaskState::Completed);
    }

    #[test]
    fn test_ready_cannot_skip_running() {
        let cell = StateCell::new();
        let err = cell.transition(TaskState::Completed).unwrap_err();
        assert!(matches!(
            err,
            ReadError::InvalidState {
                state: TaskState::Ready
            }
        ));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [TaskState::Completed, TaskState::Aborted, TaskState::Error] {
            let cell = StateCell::new();
            cell.transition(TaskState::Running).unwrap();
            cell.transition(terminal).unwrap();

            for next in [
                TaskState::Ready,
                TaskState::Running,
                TaskState::Completed,
                TaskState::Aborted,
                TaskState::Error,
            ] {
                let err = cell.transition(next).unwrap_err();
                assert!(matches!(err, ReadError::InvalidState { state } if state == terminal));
            }
            assert!(terminal.is_terminal());
        }
    }

    #[test]
    fn test_running_rejects_second_start() {
        let cell = StateCell::new();
        cell.transition(TaskState::Running).unwrap();
        let err = cell.transition(TaskState::Running).unwrap_err();
        assert!(matches!(
            err,
            ReadError::InvalidState {
                state: TaskState::Running
            }
        ));
    }
}
