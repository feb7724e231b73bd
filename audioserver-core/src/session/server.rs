use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::audio_models::{
    DeviceInfo, LatencyReport, OpenRequest, PortDirection, ServerDiagnostics,
};
use crate::models::config::{BackendIdentity, ServerOptions, SessionConfig};
use crate::models::error::{ChannelDirection, ConfigurationError, ServerError};
use crate::models::state::SessionState;
use crate::processing::bridge::ProcessBridge;
use crate::session::reconfigure::DriverEvents;
use crate::session::shared::{panic_message, SessionShared};
use crate::session::worker::EventWorker;
use crate::traits::audio_client::AudioClient;
use crate::traits::backend::AudioBackend;
use crate::traits::server_delegate::ServerDelegate;

/// One driver session bridging a backend to a client.
///
/// Data flow while Active:
/// ```text
/// [Backend RT thread] → ProcessBridge ──try_lock──→ [AudioClient::process]
/// [Backend notify]    → DriverEvents ──queue──→ EventWorker → [AudioClient::configure]
/// [Any thread]        → ServerHandle::request_shutdown ──→ run() returns
/// ```
///
/// `run` blocks the calling thread for the life of the session. Every
/// other method takes `&self`, so the server can be shared (for example
/// in an `Arc`) to wire ports while it runs.
pub struct AudioServer<B: AudioBackend> {
    backend: Mutex<B>,
    shared: Arc<SessionShared>,
    client: Arc<Mutex<dyn AudioClient>>,
    options: ServerOptions,
    device: DeviceInfo,
}

impl<B: AudioBackend> AudioServer<B> {
    /// Create a session with default options.
    pub fn create<C>(backend: B, config: SessionConfig, client: C) -> Result<Self, ServerError>
    where
        C: AudioClient + 'static,
    {
        Self::create_with_options(backend, config, client, ServerOptions::default())
    }

    /// Select a device and check it can carry `config`. The session is
    /// left in New; nothing native is opened until `run`.
    pub fn create_with_options<C>(
        mut backend: B,
        config: SessionConfig,
        client: C,
        options: ServerOptions,
    ) -> Result<Self, ServerError>
    where
        C: AudioClient + 'static,
    {
        config.validate()?;

        let devices = backend.devices()?;
        let device = select_device(devices, options.device.as_deref())?;
        check_channels(&device, &config)?;

        log::info!(
            "{} session on '{}': {} in / {} out @ {} Hz",
            backend.library_name(),
            device.name,
            config.input_channels,
            config.output_channels,
            config.sample_rate
        );

        Ok(Self {
            backend: Mutex::new(backend),
            shared: Arc::new(SessionShared::new(config)),
            client: Arc::new(Mutex::new(client)),
            options,
            device,
        })
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn set_delegate(&self, delegate: Arc<dyn ServerDelegate>) {
        self.shared.set_delegate(Some(delegate));
    }

    pub fn clear_delegate(&self) {
        self.shared.set_delegate(None);
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn state(&self) -> SessionState {
        self.shared.lifecycle.state()
    }

    /// Run the session on the calling thread until it is shut down.
    ///
    /// Fails with `IllegalLifecycle` if the session was already started.
    /// Initialisation failures are returned after the session has been
    /// cleaned up and Terminated. Once `run` returns, the session is
    /// Terminated.
    pub fn run(&self) -> Result<(), ServerError> {
        self.shared.lifecycle.begin()?;
        self.shared.notify_state(SessionState::Initialising);

        if let Err(e) = self.initialise() {
            log::error!("session initialisation failed: {}", e);
            self.shared.lifecycle.abort();
            self.close_backend();
            self.shutdown_client();
            self.shared.notify_state(SessionState::Terminated);
            return Err(e);
        }

        let mut result = Ok(());
        let mut worker = None;

        if self.shared.lifecycle.enter_active() {
            self.shared.notify_state(SessionState::Active);
            match self.activate() {
                Ok(w) => {
                    worker = Some(w);
                    log::info!("session active");
                    self.shared.lifecycle.wait_while_active();
                }
                Err(e) => {
                    log::error!("session activation failed: {}", e);
                    self.shared.lifecycle.request_shutdown();
                    result = Err(e);
                }
            }
        }

        if self.shared.lifecycle.state() == SessionState::Closing {
            self.shared.notify_state(SessionState::Closing);
        }
        self.finish(worker);
        result
    }

    /// Connect two ports by full name.
    pub fn connect_ports(&self, source: &str, destination: &str) -> Result<(), ServerError> {
        self.backend.lock().connect(source, destination)?;
        log::debug!("connected {} -> {}", source, destination);
        Ok(())
    }

    /// Disconnect two ports by full name.
    pub fn disconnect_ports(&self, source: &str, destination: &str) -> Result<(), ServerError> {
        self.backend.lock().disconnect(source, destination)?;
        log::debug!("disconnected {} -> {}", source, destination);
        Ok(())
    }

    /// Full names of the session's own ports.
    pub fn port_names(&self, direction: PortDirection) -> Vec<String> {
        self.backend.lock().port_names(direction)
    }

    /// Full names of the backend's physical ports.
    pub fn physical_ports(&self, direction: PortDirection) -> Vec<String> {
        self.backend.lock().physical_ports(direction)
    }

    fn initialise(&self) -> Result<(), ServerError> {
        let requested = self.shared.config.load();
        let request = OpenRequest {
            client_id: self.options.client_id.clone(),
            device: Some(self.device.name.clone()),
            sample_rate: requested.sample_rate,
            input_channels: requested.input_channels,
            output_channels: requested.output_channels,
            block_size: requested.block_size,
            allow_server_start: self.options.connections.any(),
        };

        let mut backend = self.backend.lock();
        let format = backend.open(&request)?;
        log::debug!(
            "opened {} as '{}': {} Hz, {} frames",
            backend.library_name(),
            format.client_name,
            format.sample_rate,
            format.block_size
        );

        let identity = BackendIdentity {
            library: backend.library_name().to_string(),
            client_name: format.client_name,
            device: Some(self.device.name.clone()),
        };
        drop(backend);

        let negotiated = requested
            .with_sample_rate(format.sample_rate)
            .with_block_size(format.block_size)
            .with_backend(identity);
        negotiated.validate()?;
        let config = self.shared.config.publish(negotiated);

        let configured =
            panic::catch_unwind(AssertUnwindSafe(|| self.client.lock().configure(&config)));
        match configured {
            Ok(result) => result?,
            Err(payload) => {
                return Err(ConfigurationError(format!(
                    "client panicked: {}",
                    panic_message(&*payload)
                ))
                .into())
            }
        }
        Ok(())
    }

    fn activate(&self) -> Result<EventWorker, ServerError> {
        let worker = EventWorker::spawn(Arc::clone(&self.shared), Arc::clone(&self.client))?;
        let bridge = ProcessBridge::new(Arc::clone(&self.shared), Arc::clone(&self.client));
        let events = DriverEvents::new(Arc::clone(&self.shared), worker.sender());

        let mut backend = self.backend.lock();
        backend.activate(bridge, events)?;
        auto_connect(&mut *backend, self.options.connections.connect_inputs, PortDirection::Input);
        auto_connect(&mut *backend, self.options.connections.connect_outputs, PortDirection::Output);
        Ok(worker)
    }

    fn finish(&self, worker: Option<EventWorker>) {
        self.close_backend();
        if let Some(mut worker) = worker {
            worker.stop();
        }
        self.shutdown_client();
        if self.shared.lifecycle.terminate() {
            self.shared.notify_state(SessionState::Terminated);
            log::info!("session terminated");
        }
    }

    fn close_backend(&self) {
        if let Err(e) = self.backend.lock().close() {
            log::warn!("error closing backend: {}", e);
        }
    }

    fn shutdown_client(&self) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.client.lock().shutdown()));
        if let Err(payload) = result {
            log::warn!("client panicked during shutdown: {}", panic_message(&*payload));
        }
    }
}

/// Cheap, cloneable view of a session for other threads.
#[derive(Clone)]
pub struct ServerHandle {
    shared: Arc<SessionShared>,
}

impl ServerHandle {
    /// Active or Closing.
    pub fn is_active(&self) -> bool {
        self.shared.lifecycle.is_active()
    }

    pub fn state(&self) -> SessionState {
        self.shared.lifecycle.state()
    }

    /// Ask the session to close. Idempotent; never waits for teardown.
    pub fn request_shutdown(&self) {
        if let Some(state) = self.shared.lifecycle.request_shutdown() {
            log::info!("shutdown requested");
            if state == SessionState::Terminated {
                self.shared.notify_state(state);
            }
        }
    }

    pub fn latency_report(&self) -> LatencyReport {
        self.shared.latency.load()
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<SessionConfig> {
        self.shared.config.load()
    }

    pub fn diagnostics(&self) -> ServerDiagnostics {
        self.shared.counters.snapshot()
    }

    /// Block until the session is Terminated or `timeout` elapses.
    pub fn wait_for_termination(&self, timeout: Duration) -> bool {
        self.shared.lifecycle.wait_for_termination(timeout)
    }
}

fn select_device(devices: Vec<DeviceInfo>, name: Option<&str>) -> Result<DeviceInfo, ServerError> {
    if devices.is_empty() {
        return Err(ServerError::NoDeviceAvailable);
    }
    match name {
        Some(name) => devices
            .into_iter()
            .find(|d| d.name == name)
            .ok_or(ServerError::NoDeviceAvailable),
        None => {
            let index = devices.iter().position(|d| d.is_default).unwrap_or(0);
            devices.into_iter().nth(index).ok_or(ServerError::NoDeviceAvailable)
        }
    }
}

fn check_channels(device: &DeviceInfo, config: &SessionConfig) -> Result<(), ServerError> {
    if config.input_channels > device.max_input_channels {
        return Err(ServerError::InsufficientChannels {
            direction: ChannelDirection::Input,
            requested: config.input_channels,
            available: device.max_input_channels,
        });
    }
    if config.output_channels > device.max_output_channels {
        return Err(ServerError::InsufficientChannels {
            direction: ChannelDirection::Output,
            requested: config.output_channels,
            available: device.max_output_channels,
        });
    }
    Ok(())
}

/// Pair the session's ports with physical ports by index.
fn auto_connect<B: AudioBackend + ?Sized>(backend: &mut B, enabled: bool, direction: PortDirection) {
    if !enabled {
        return;
    }
    let ours = backend.port_names(direction);
    let physical = backend.physical_ports(direction);
    for (own, hw) in ours.iter().zip(physical.iter()) {
        let (source, destination) = match direction {
            PortDirection::Input => (hw, own),
            PortDirection::Output => (own, hw),
        };
        match backend.connect(source, destination) {
            Ok(()) => log::debug!("connected {} -> {}", source, destination),
            Err(e) => log::warn!("auto-connect {} -> {} failed: {}", source, destination, e),
        }
    }
}
