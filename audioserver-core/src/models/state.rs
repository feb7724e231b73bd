use std::sync::atomic::{AtomicU8, Ordering};

/// Session lifecycle.
///
/// State transitions:
/// ```text
/// New → Initialising → Active → Closing → Terminated
///            │            ↑         ↑
///            ├────────────┼─────────┘   (shutdown requested)
///            └────────────┴──────────→ Terminated (initialisation failed)
/// ```
///
/// Terminated is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum SessionState {
    New = 0,
    Initialising = 1,
    Active = 2,
    Closing = 3,
    Terminated = 4,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn is_shutting_down(&self) -> bool {
        matches!(self, Self::Closing | Self::Terminated)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::New,
            1 => Self::Initialising,
            2 => Self::Active,
            3 => Self::Closing,
            _ => Self::Terminated,
        }
    }
}

/// Lock-free cell holding a `SessionState`.
///
/// Readable from the real-time thread; every transition is a
/// compare-and-set so concurrent writers cannot interleave.
#[derive(Debug)]
pub struct AtomicSessionState(AtomicU8);

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempt `current → new`. Returns the observed value on failure.
    pub fn compare_exchange(
        &self,
        current: SessionState,
        new: SessionState,
    ) -> Result<SessionState, SessionState> {
        self.0
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(SessionState::from_u8)
            .map_err(SessionState::from_u8)
    }

    /// Unconditionally store `new`, returning the previous value.
    pub fn swap(&self, new: SessionState) -> SessionState {
        SessionState::from_u8(self.0.swap(new as u8, Ordering::AcqRel))
    }
}
