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

use std::collections::TryReserveError;

use snafu::Snafu;
use strum_macros::Display;

use crate::state::TaskState;

/// Boxed error produced by a source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = ReadError> = std::result::Result<T, E>;

/// Coarse classification of a [`ReadError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    #[strum(serialize = "TypeError")]
    Type,
    #[strum(serialize = "RangeError")]
    Range,
    #[strum(serialize = "InvalidStateError")]
    InvalidState,
    #[strum(serialize = "AbortError")]
    Abort,
    #[strum(serialize = "TimeoutError")]
    Timeout,
    #[strum(serialize = "Error")]
    Other,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ReadError {
    /// An argument or a pulled chunk has the wrong type.
    #[snafu(display("{name}"))]
    InvalidType { name: &'static str },

    #[snafu(display("{name} is out of range: {value}"))]
    OutOfRange { name: &'static str, value: u64 },

    /// The buffer could not reserve the requested capacity.
    #[snafu(display("failed to allocate {requested} bytes"))]
    Allocation {
        requested: usize,
        source:    TryReserveError,
    },

    #[snafu(display("state is not ready: {state}"))]
    InvalidState { state: TaskState },

    #[snafu(display("{message}"))]
    Aborted { message: &'static str },

    #[snafu(display("{message}"))]
    TimedOut { message: &'static str },

    #[snafu(display("Source error: {source}"))]
    Source { source: BoxError },
}

impl ReadError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidType { .. } => ErrorKind::Type,
            Self::OutOfRange { .. } | Self::Allocation { .. } => ErrorKind::Range,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Aborted { .. } => ErrorKind::Abort,
            Self::TimedOut { .. } => ErrorKind::Timeout,
            Self::Source { .. } => ErrorKind::Other,
        }
    }

    /// Terminal state a running task settles in after failing with this
    /// error. Timeouts settle as aborted.
    #[must_use]
    pub const fn terminal_state(&self) -> TaskState {
        match self.kind() {
            ErrorKind::Abort | ErrorKind::Timeout => TaskState::Aborted,
            _ => TaskState::Error,
        }
    }

    #[must_use]
    pub const fn is_abort(&self) -> bool { matches!(self.kind(), ErrorKind::Abort | ErrorKind::Timeout) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(ErrorKind::Type.to_string(), "TypeError");
        assert_eq!(ErrorKind::Range.to_string(), "RangeError");
        assert_eq!(ErrorKind::InvalidState.to_string(), "InvalidStateError");
        assert_eq!(ErrorKind::Abort.to_string(), "AbortError");
        assert_eq!(ErrorKind::Timeout.to_string(), "TimeoutError");
    }

    #[test]
    fn test_terminal_state_classification() {
        let aborted = ReadError::Aborted { message: "aborted" };
        assert_eq!(aborted.terminal_state(), TaskState::Aborted);
        assert!(aborted.is_abort());

        let timed_out = ReadError::TimedOut {
            message: "timed out",
        };
        assert_eq!(timed_out.kind(), ErrorKind::Timeout);
        assert_eq!(timed_out.terminal_state(), TaskState::Aborted);

        let mut storage = Vec::<u8>::new();
        let allocation = ReadError::Allocation {
            requested: usize::MAX,
            source:    storage.try_reserve_exact(usize::MAX).unwrap_err(),
        };
        assert_eq!(allocation.kind(), ErrorKind::Range);
        assert_eq!(allocation.terminal_state(), TaskState::Error);

        let invalid = ReadError::InvalidType { name: "source" };
        assert_eq!(invalid.terminal_state(), TaskState::Error);

        let source = ReadError::Source {
            source: "boom".into(),
        };
        assert_eq!(source.kind(), ErrorKind::Other);
        assert_eq!(source.terminal_state(), TaskState::Error);
        assert_eq!(source.to_string(), "Source error: boom");
    }

    #[test]
    fn test_messages() {
        let err = ReadError::InvalidState {
            state: TaskState::Completed,
        };
        assert_eq!(err.to_string(), "state is not ready: completed");

        let err = ReadError::OutOfRange {
            name:  "options.total_byte_length",
            value: u64::MAX,
        };
        assert!(err.to_string().starts_with("options.total_byte_length"));
    }
}
