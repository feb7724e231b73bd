use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::error::ServerError;
use crate::models::state::{AtomicSessionState, SessionState};

/// Session state machine.
///
/// The state itself is a lock-free atomic so the real-time thread can read
/// it. The monitor/condvar pair exists only to park the controlling thread
/// while the session is Active and to wake waiters on termination; no
/// transition ever waits on it.
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicSessionState,
    monitor: Mutex<()>,
    changed: Condvar,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicSessionState::new(SessionState::New),
            monitor: Mutex::new(()),
            changed: Condvar::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.load()
    }

    /// Active or Closing: the session still owns native resources.
    pub fn is_active(&self) -> bool {
        matches!(self.state(), SessionState::Active | SessionState::Closing)
    }

    /// New → Initialising. Fails if the session was already started.
    pub fn begin(&self) -> Result<(), ServerError> {
        self.state
            .compare_exchange(SessionState::New, SessionState::Initialising)
            .map(|_| ())
            .map_err(ServerError::IllegalLifecycle)
    }

    /// Initialising → Active. Returns `false` if a shutdown got there first.
    pub fn enter_active(&self) -> bool {
        let entered = self
            .state
            .compare_exchange(SessionState::Initialising, SessionState::Active)
            .is_ok();
        if !entered {
            self.notify();
        }
        entered
    }

    /// Ask the session to close. Safe to call from any thread, any number
    /// of times. Returns the state this call moved the session to, or
    /// `None` if nothing changed.
    pub fn request_shutdown(&self) -> Option<SessionState> {
        let mut current = self.state.load();
        loop {
            let next = match current {
                SessionState::New => SessionState::Terminated,
                SessionState::Initialising | SessionState::Active => SessionState::Closing,
                SessionState::Closing | SessionState::Terminated => return None,
            };
            match self.state.compare_exchange(current, next) {
                Ok(_) => {
                    self.notify();
                    return Some(next);
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Initialisation failed: go straight to Terminated.
    pub fn abort(&self) -> bool {
        self.terminate()
    }

    /// Move to Terminated. Returns `true` only for the call that performed
    /// the transition.
    pub fn terminate(&self) -> bool {
        let previous = self.state.swap(SessionState::Terminated);
        self.notify();
        previous != SessionState::Terminated
    }

    /// Park the calling thread while the session is Active.
    pub fn wait_while_active(&self) {
        let mut guard = self.monitor.lock();
        while self.state().is_active() {
            self.changed.wait(&mut guard);
        }
    }

    /// Wait until the session is Terminated or `timeout` elapses. Returns
    /// whether the session terminated.
    pub fn wait_for_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.monitor.lock();
        while !self.state().is_terminal() {
            if self.changed.wait_until(&mut guard, deadline).timed_out() {
                return self.state().is_terminal();
            }
        }
        true
    }

    fn notify(&self) {
        let _guard = self.monitor.lock();
        self.changed.notify_all();
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
