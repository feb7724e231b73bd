use crate::models::audio_models::{DeviceInfo, NegotiatedFormat, OpenRequest, PortDirection};
use crate::models::error::BackendError;
use crate::processing::bridge::ProcessBridge;
use crate::session::reconfigure::DriverEvents;

/// Native driver capability a session runs on.
///
/// Implemented by:
/// - `JackBackend` (audioserver-jack)
///
/// All methods are called from the controlling thread. Once `activate`
/// returns, the backend invokes the `ProcessBridge` from its real-time
/// thread and the `DriverEvents` entry points from whatever threads it
/// delivers notifications on, until `close` returns.
pub trait AudioBackend {
    /// Name of the native library, e.g. "JACK".
    fn library_name(&self) -> &str;

    /// Enumerate devices the backend can open.
    fn devices(&mut self) -> Result<Vec<DeviceInfo>, BackendError>;

    /// Open a session and register its ports.
    ///
    /// Ports are registered in index order: input `i` feeds client input
    /// channel `i`, client output channel `i` feeds output port `i`.
    fn open(&mut self, request: &OpenRequest) -> Result<NegotiatedFormat, BackendError>;

    /// Register the process and notification callbacks and start the
    /// driver.
    fn activate(&mut self, bridge: ProcessBridge, events: DriverEvents)
        -> Result<(), BackendError>;

    /// Physical (hardware) ports the session's ports can be wired to.
    /// `Input` means capture ports, which feed session inputs.
    fn physical_ports(&self, direction: PortDirection) -> Vec<String>;

    /// Full names of the session's own ports, in index order.
    fn port_names(&self, direction: PortDirection) -> Vec<String>;

    /// Connect `source` to `destination`.
    fn connect(&mut self, source: &str, destination: &str) -> Result<(), BackendError>;

    /// Disconnect `source` from `destination`.
    fn disconnect(&mut self, source: &str, destination: &str) -> Result<(), BackendError>;

    /// Stop callbacks and release the native session. After this returns
    /// the backend no longer calls into the bridge.
    fn close(&mut self) -> Result<(), BackendError>;
}
