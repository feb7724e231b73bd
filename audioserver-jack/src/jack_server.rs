//! JACK audio server backend.
//!
//! Opens one JACK client per session and registers `Input_N` / `Output_N`
//! audio ports in channel order. The process callback hands the port
//! buffers straight to the `ProcessBridge` as planar slices; JACK
//! notifications are forwarded to `DriverEvents`.
//!
//! ```text
//! ┌──────────────────┐  process()   ┌────────────────┐
//! │  JACK RT thread  │─────────────►│ ProcessBridge  │──► AudioClient
//! └──────────────────┘              └────────────────┘
//! ┌──────────────────┐  sample_rate, buffer_size, xrun,
//! │ JACK notif. thr. │  latency, registrations, shutdown
//! └──────────────────┘─────────────►  DriverEvents ──► event worker
//! ```

use std::mem;

use jack::{
    AsyncClient, AudioIn, AudioOut, Client, ClientOptions, ClientStatus, Control, Frames,
    LatencyType, Port, PortFlags, PortId, ProcessScope,
};
use smallvec::SmallVec;

use audioserver_core::{
    AudioBackend, BackendError, CallbackAction, DeviceInfo, DriverEvents, NativeInputs,
    NativeOutputs, NegotiatedFormat, OpenRequest, PortDirection, ProcessBridge,
};

use crate::ports;

/// Native library name reported in the session's backend identity.
pub const LIBRARY_NAME: &str = "JACK";

/// Upper bound on ports per session. The server enforces its own limit
/// when ports are registered.
const MAX_PORTS: usize = 256;

/// Port buffers gathered per callback without touching the heap.
const INLINE_PORTS: usize = 16;

/// Regex matched against JACK port types to select audio ports.
const AUDIO_TYPE: &str = "audio";

/// JACK process handler. Owns the session's ports.
struct JackProcessor {
    bridge: ProcessBridge,
    events: DriverEvents,
    inputs: Vec<Port<AudioIn>>,
    outputs: Vec<Port<AudioOut>>,
}

impl jack::ProcessHandler for JackProcessor {
    fn process(&mut self, client: &Client, ps: &ProcessScope) -> Control {
        // JACK time is in microseconds.
        let timestamp = i64::try_from(client.time())
            .unwrap_or(i64::MAX)
            .saturating_mul(1_000);

        let inputs: SmallVec<[&[f32]; INLINE_PORTS]> =
            self.inputs.iter().map(|port| port.as_slice(ps)).collect();
        let mut outputs: SmallVec<[&mut [f32]; INLINE_PORTS]> = self
            .outputs
            .iter_mut()
            .map(|port| port.as_mut_slice(ps))
            .collect();

        let action = self.bridge.process(
            timestamp,
            Some(ps.n_frames() as usize),
            NativeInputs::Planar(&inputs[..]),
            NativeOutputs::Planar(&mut outputs[..]),
        );

        match action {
            CallbackAction::Continue => Control::Continue,
            CallbackAction::Stop => Control::Quit,
        }
    }

    fn buffer_size(&mut self, _client: &Client, size: Frames) -> Control {
        // JACK also calls this once on activation with the current size.
        if self.events.config().block_size != size as usize {
            self.events.block_size_changed(size as usize);
        }
        Control::Continue
    }
}

/// JACK notification handler.
struct JackNotifications {
    events: DriverEvents,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl jack::NotificationHandler for JackNotifications {
    unsafe fn shutdown(&mut self, _status: ClientStatus, reason: &str) {
        self.events.shutdown_requested(reason);
    }

    fn sample_rate(&mut self, _client: &Client, srate: Frames) -> Control {
        let sample_rate = srate as f32;
        if self.events.config().sample_rate != sample_rate {
            self.events.sample_rate_changed(sample_rate);
        }
        Control::Continue
    }

    fn client_registration(&mut self, _client: &Client, name: &str, is_registered: bool) {
        self.events.client_registration(name, is_registered);
    }

    fn port_registration(&mut self, client: &Client, port_id: PortId, is_registered: bool) {
        match client.port_by_id(port_id).map(|port| port.name()) {
            Some(Ok(name)) => self.events.port_registration(&name, is_registered),
            _ => log::debug!("port {} registration changed, name unavailable", port_id),
        }
    }

    fn xrun(&mut self, _client: &Client) -> Control {
        self.events.xrun();
        Control::Continue
    }

    fn latency(&mut self, client: &Client, _mode: LatencyType) {
        let input = max_latency(client, &self.inputs, PortDirection::Input);
        let output = max_latency(client, &self.outputs, PortDirection::Output);
        self.events.latencies_changed(input, output);
    }
}

fn latency_mode(direction: PortDirection) -> LatencyType {
    match direction {
        PortDirection::Input => LatencyType::Capture,
        PortDirection::Output => LatencyType::Playback,
    }
}

/// Worst-case latency over the session's ports in one direction.
fn max_latency(client: &Client, port_names: &[String], direction: PortDirection) -> u32 {
    port_names
        .iter()
        .filter_map(|name| client.port_by_name(name))
        .map(|port| port.get_latency_range(latency_mode(direction)).1)
        .max()
        .unwrap_or(0)
}

enum Session {
    Idle,
    Open {
        client: Client,
        inputs: Vec<Port<AudioIn>>,
        outputs: Vec<Port<AudioOut>>,
    },
    Active(AsyncClient<JackNotifications, JackProcessor>),
}

/// `AudioBackend` over a JACK server.
///
/// JACK has a single "device": the running server. Channel counts are
/// not tied to hardware; any number of ports can be registered and wired
/// to physical ports afterwards.
pub struct JackBackend {
    session: Session,
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl JackBackend {
    pub fn new() -> Self {
        Self {
            session: Session::Idle,
            input_names: Vec::new(),
            output_names: Vec::new(),
        }
    }

    fn client(&self) -> Option<&Client> {
        match &self.session {
            Session::Idle => None,
            Session::Open { client, .. } => Some(client),
            Session::Active(active) => Some(active.as_client()),
        }
    }

    fn open_client(&self) -> Result<&Client, BackendError> {
        self.client()
            .ok_or_else(|| BackendError::InvalidState("JACK client not open".into()))
    }
}

impl Default for JackBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for JackBackend {
    fn library_name(&self) -> &str {
        LIBRARY_NAME
    }

    fn devices(&mut self) -> Result<Vec<DeviceInfo>, BackendError> {
        Ok(vec![DeviceInfo {
            name: LIBRARY_NAME.into(),
            max_input_channels: MAX_PORTS,
            max_output_channels: MAX_PORTS,
            is_default: true,
        }])
    }

    fn open(&mut self, request: &OpenRequest) -> Result<NegotiatedFormat, BackendError> {
        if !matches!(self.session, Session::Idle) {
            return Err(BackendError::InvalidState("JACK client already open".into()));
        }

        let options = if request.allow_server_start {
            ClientOptions::empty()
        } else {
            ClientOptions::NO_START_SERVER
        };
        let (client, status) = Client::new(request.client_id.as_str(), options)
            .map_err(|e| BackendError::OpenFailed(format!("JACK client: {}", e)))?;
        log::debug!("JACK client created, status {:?}", status);

        let client_name = client.name().to_string();

        let inputs = (0..request.input_channels)
            .map(|i| client.register_port(&ports::input_port_name(i), AudioIn::default()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::PortRegistration(e.to_string()))?;
        let outputs = (0..request.output_channels)
            .map(|i| client.register_port(&ports::output_port_name(i), AudioOut::default()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BackendError::PortRegistration(e.to_string()))?;

        self.input_names = (0..request.input_channels)
            .map(|i| ports::full_name(&client_name, &ports::input_port_name(i)))
            .collect();
        self.output_names = (0..request.output_channels)
            .map(|i| ports::full_name(&client_name, &ports::output_port_name(i)))
            .collect();

        let format = NegotiatedFormat {
            client_name,
            sample_rate: client.sample_rate() as f32,
            block_size: client.buffer_size() as usize,
        };
        log::info!(
            "JACK client '{}' open ({} Hz, {} frames, {} in / {} out)",
            format.client_name,
            format.sample_rate,
            format.block_size,
            inputs.len(),
            outputs.len()
        );

        self.session = Session::Open {
            client,
            inputs,
            outputs,
        };
        Ok(format)
    }

    fn activate(&mut self, bridge: ProcessBridge, events: DriverEvents) -> Result<(), BackendError> {
        let (client, inputs, outputs) = match mem::replace(&mut self.session, Session::Idle) {
            Session::Open {
                client,
                inputs,
                outputs,
            } => (client, inputs, outputs),
            other => {
                self.session = other;
                return Err(BackendError::InvalidState(
                    "JACK client not open or already active".into(),
                ));
            }
        };

        let notifications = JackNotifications {
            events: events.clone(),
            inputs: self.input_names.clone(),
            outputs: self.output_names.clone(),
        };
        let processor = JackProcessor {
            bridge,
            events,
            inputs,
            outputs,
        };

        let active = client
            .activate_async(notifications, processor)
            .map_err(|e| BackendError::Activation(e.to_string()))?;
        log::info!("JACK client activated");

        self.session = Session::Active(active);
        Ok(())
    }

    fn physical_ports(&self, direction: PortDirection) -> Vec<String> {
        let Some(client) = self.client() else {
            return Vec::new();
        };
        // Capture ports are outputs from JACK's point of view.
        let flags = match direction {
            PortDirection::Input => PortFlags::IS_OUTPUT | PortFlags::IS_PHYSICAL,
            PortDirection::Output => PortFlags::IS_INPUT | PortFlags::IS_PHYSICAL,
        };
        client.ports(None, Some(AUDIO_TYPE), flags)
    }

    fn port_names(&self, direction: PortDirection) -> Vec<String> {
        match direction {
            PortDirection::Input => self.input_names.clone(),
            PortDirection::Output => self.output_names.clone(),
        }
    }

    fn connect(&mut self, source: &str, destination: &str) -> Result<(), BackendError> {
        check_port_names(source, destination)?;
        self.open_client()?
            .connect_ports_by_name(source, destination)
            .map_err(|e| BackendError::Connection(format!("{} -> {}: {}", source, destination, e)))
    }

    fn disconnect(&mut self, source: &str, destination: &str) -> Result<(), BackendError> {
        check_port_names(source, destination)?;
        self.open_client()?
            .disconnect_ports_by_name(source, destination)
            .map_err(|e| BackendError::Connection(format!("{} -/> {}: {}", source, destination, e)))
    }

    fn close(&mut self) -> Result<(), BackendError> {
        let result = match mem::replace(&mut self.session, Session::Idle) {
            Session::Idle => Ok(()),
            Session::Open { .. } => Ok(()),
            Session::Active(active) => active
                .deactivate()
                .map(|_| ())
                .map_err(|e| BackendError::Close(e.to_string())),
        };
        self.input_names.clear();
        self.output_names.clear();
        log::info!("JACK client closed");
        result
    }
}

fn check_port_names(source: &str, destination: &str) -> Result<(), BackendError> {
    for name in [source, destination] {
        if ports::split_full_name(name).is_none() {
            return Err(BackendError::Connection(format!(
                "'{}' is not a full client:port name",
                name
            )));
        }
    }
    Ok(())
}
