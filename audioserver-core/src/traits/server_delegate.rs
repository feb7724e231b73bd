use crate::models::audio_models::LatencyReport;
use crate::models::config::SessionConfig;
use crate::models::state::SessionState;

/// Observer for session notifications.
///
/// Methods are called from the controlling thread, the event worker or a
/// backend notification thread, never from the real-time thread.
/// Implementations should return quickly.
pub trait ServerDelegate: Send + Sync {
    /// Called after every lifecycle transition.
    fn on_state_changed(&self, _state: SessionState) {}

    /// Called after the client accepted a reconfiguration.
    fn on_config_changed(&self, _config: &SessionConfig) {}

    /// Called when the driver reports new latencies.
    fn on_latency_changed(&self, _latency: LatencyReport) {}

    /// A port appeared on (or vanished from) the backend.
    fn on_port_registration(&self, _port: &str, _registered: bool) {}

    /// Another client connected to (or left) the backend.
    fn on_client_registration(&self, _client: &str, _registered: bool) {}
}
