use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::audio_models::{DiagnosticCounters, LatencyCell};
use crate::models::config::SessionConfig;
use crate::models::state::SessionState;
use crate::session::config_cell::ConfigCell;
use crate::session::lifecycle::Lifecycle;
use crate::traits::server_delegate::ServerDelegate;

/// State shared by the controlling thread, the real-time bridge, the
/// driver notification entry points and the event worker.
///
/// Everything the real-time thread touches is lock-free. The delegate
/// slot is behind a lock and is only read off the real-time thread.
pub struct SessionShared {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) config: ConfigCell,
    pub(crate) latency: LatencyCell,
    pub(crate) counters: DiagnosticCounters,
    delegate: RwLock<Option<Arc<dyn ServerDelegate>>>,
}

impl SessionShared {
    pub(crate) fn new(config: SessionConfig) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            config: ConfigCell::new(config),
            latency: LatencyCell::new(),
            counters: DiagnosticCounters::default(),
            delegate: RwLock::new(None),
        }
    }

    pub(crate) fn set_delegate(&self, delegate: Option<Arc<dyn ServerDelegate>>) {
        *self.delegate.write() = delegate;
    }

    pub(crate) fn delegate(&self) -> Option<Arc<dyn ServerDelegate>> {
        self.delegate.read().clone()
    }

    pub(crate) fn notify_state(&self, state: SessionState) {
        log::debug!("session state: {:?}", state);
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(state);
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
