//! Store lifecycle
//!
//! ```text
//! idle ──open──▶ opening ──ok──▶ open ──close──▶ closing ──▶ closed
//!                   │                                          ▲
//!                   └──────────────failed──────────────────────┘
//! ```
//!
//! `closed` is terminal: a store instance is never reopened.

use std::fmt;

use crate::error::{LevelError, Result};

/// Lifecycle state of a [`Store`](super::Store)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Opening,
    Open,
    Closing,
    Closed,
}

impl LifecycleState {
    /// `idle → opening`
    pub(crate) fn begin_open(&mut self) -> Result<()> {
        match self {
            LifecycleState::Idle => {
                *self = LifecycleState::Opening;
                Ok(())
            }
            LifecycleState::Opening | LifecycleState::Open => Err(LevelError::AlreadyOpen),
            LifecycleState::Closing | LifecycleState::Closed => Err(LevelError::AlreadyClosed),
        }
    }

    /// `opening → open`, or `opening → closed` when the engine failed to open
    pub(crate) fn finish_open(&mut self, opened: bool) {
        debug_assert_eq!(*self, LifecycleState::Opening);
        *self = if opened {
            LifecycleState::Open
        } else {
            LifecycleState::Closed
        };
    }

    /// `open → closing`
    pub(crate) fn begin_close(&mut self) -> Result<()> {
        match self {
            LifecycleState::Open => {
                *self = LifecycleState::Closing;
                Ok(())
            }
            LifecycleState::Idle | LifecycleState::Opening => Err(LevelError::NotOpen),
            LifecycleState::Closing | LifecycleState::Closed => Err(LevelError::AlreadyClosed),
        }
    }

    /// `closing → closed`
    pub(crate) fn finish_close(&mut self) {
        debug_assert_eq!(*self, LifecycleState::Closing);
        *self = LifecycleState::Closed;
    }

    pub fn is_open(self) -> bool {
        self == LifecycleState::Open
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Opening => "opening",
            LifecycleState::Open => "open",
            LifecycleState::Closing => "closing",
            LifecycleState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State plus the engine handle it guards
pub(crate) struct Lifecycle<E> {
    pub(crate) state: LifecycleState,
    pub(crate) engine: Option<E>,
}

impl<E> Lifecycle<E> {
    pub(crate) fn new() -> Self {
        Self {
            state: LifecycleState::Idle,
            engine: None,
        }
    }

    /// The engine, if the store is open
    pub(crate) fn engine(&self) -> Result<&E> {
        match (&self.state, &self.engine) {
            (LifecycleState::Open, Some(engine)) => Ok(engine),
            _ => Err(LevelError::NotOpen),
        }
    }
}
