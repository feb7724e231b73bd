//! Fixtures for audioserver-core integration tests: a scripted in-memory
//! backend whose "driver" is driven by the test with manual cycle control,
//! and a recording client.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use audioserver_core::{
    AudioBackend, AudioClient, BackendError, CallbackAction, ConfigurationError, DeviceInfo,
    DriverEvents, InputBuffers, LatencyReport, NativeInputs, NativeOutputs, NegotiatedFormat,
    OpenRequest, OutputBuffers, PortDirection, ProcessBridge, ProcessingError, ServerDelegate,
    SessionConfig, SessionState,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn device(name: &str, inputs: usize, outputs: usize) -> DeviceInfo {
    DeviceInfo {
        name: name.into(),
        max_input_channels: inputs,
        max_output_channels: outputs,
        is_default: true,
    }
}

/// Poll `condition` until it holds or `WAIT` elapses.
pub fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// What the backend does at each step.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub devices: Vec<DeviceInfo>,
    pub fail_devices: bool,
    pub fail_open: bool,
    pub fail_activate: bool,
    pub fail_close: bool,
    /// Overrides the requested sample rate/block size on open.
    pub negotiated: Option<(f32, usize)>,
    pub physical_inputs: Vec<String>,
    pub physical_outputs: Vec<String>,
}

/// The "driver" side of the scripted backend, shared with the test.
#[derive(Default)]
pub struct Driver {
    bridge: Mutex<Option<ProcessBridge>>,
    events: Mutex<Option<DriverEvents>>,
    activated: Mutex<bool>,
    activated_changed: Condvar,
    pub opened_with: Mutex<Option<OpenRequest>>,
    pub connections: Mutex<Vec<(String, String)>>,
    pub closes: Mutex<usize>,
    /// Runs inside `open`, after the request is recorded.
    pub on_open: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl Driver {
    pub fn wait_activated(&self) -> bool {
        let deadline = Instant::now() + WAIT;
        let mut activated = self.activated.lock();
        while !*activated {
            if self.activated_changed.wait_until(&mut activated, deadline).timed_out() {
                return *activated;
            }
        }
        true
    }

    pub fn is_activated(&self) -> bool {
        *self.activated.lock()
    }

    pub fn events(&self) -> DriverEvents {
        self.events
            .lock()
            .clone()
            .expect("backend not activated")
    }

    /// Run one planar cycle. `None` once the backend is closed.
    pub fn cycle(
        &self,
        timestamp: i64,
        frames: Option<usize>,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
    ) -> Option<CallbackAction> {
        let mut bridge = self.bridge.lock();
        let bridge = bridge.as_mut()?;
        let inputs = if inputs.is_empty() {
            NativeInputs::None
        } else {
            NativeInputs::Planar(inputs)
        };
        Some(bridge.process(timestamp, frames, inputs, NativeOutputs::Planar(outputs)))
    }

    /// Run one interleaved cycle.
    pub fn cycle_interleaved(
        &self,
        frames: usize,
        input: &[f32],
        input_channels: usize,
        output: &mut [f32],
        output_channels: usize,
    ) -> Option<CallbackAction> {
        let mut bridge = self.bridge.lock();
        let bridge = bridge.as_mut()?;
        Some(bridge.process(
            0,
            Some(frames),
            NativeInputs::Interleaved {
                samples: input,
                channels: input_channels,
            },
            NativeOutputs::Interleaved {
                samples: output,
                channels: output_channels,
            },
        ))
    }

    pub fn is_closed(&self) -> bool {
        *self.closes.lock() > 0
    }
}

pub struct ScriptedBackend {
    pub script: Script,
    pub driver: Arc<Driver>,
    request: Option<OpenRequest>,
}

impl ScriptedBackend {
    pub fn new(script: Script) -> (Self, Arc<Driver>) {
        let driver = Arc::new(Driver::default());
        (
            Self {
                script,
                driver: Arc::clone(&driver),
                request: None,
            },
            driver,
        )
    }

    /// One default device with plenty of channels.
    pub fn standard() -> (Self, Arc<Driver>) {
        Self::new(Script {
            devices: vec![device("scripted", 8, 8)],
            ..Script::default()
        })
    }
}

impl AudioBackend for ScriptedBackend {
    fn library_name(&self) -> &str {
        "Scripted"
    }

    fn devices(&mut self) -> Result<Vec<DeviceInfo>, BackendError> {
        if self.script.fail_devices {
            return Err(BackendError::Unavailable("scripted".into()));
        }
        Ok(self.script.devices.clone())
    }

    fn open(&mut self, request: &OpenRequest) -> Result<NegotiatedFormat, BackendError> {
        if self.script.fail_open {
            return Err(BackendError::OpenFailed("scripted".into()));
        }
        *self.driver.opened_with.lock() = Some(request.clone());
        if let Some(hook) = self.driver.on_open.lock().as_mut() {
            hook();
        }
        self.request = Some(request.clone());
        let (sample_rate, block_size) = self
            .script
            .negotiated
            .unwrap_or((request.sample_rate, request.block_size));
        Ok(NegotiatedFormat {
            client_name: format!("{}-1", request.client_id),
            sample_rate,
            block_size,
        })
    }

    fn activate(&mut self, bridge: ProcessBridge, events: DriverEvents) -> Result<(), BackendError> {
        if self.script.fail_activate {
            return Err(BackendError::Activation("scripted".into()));
        }
        *self.driver.bridge.lock() = Some(bridge);
        *self.driver.events.lock() = Some(events);
        *self.driver.activated.lock() = true;
        self.driver.activated_changed.notify_all();
        Ok(())
    }

    fn physical_ports(&self, direction: PortDirection) -> Vec<String> {
        match direction {
            PortDirection::Input => self.script.physical_inputs.clone(),
            PortDirection::Output => self.script.physical_outputs.clone(),
        }
    }

    fn port_names(&self, direction: PortDirection) -> Vec<String> {
        let Some(request) = &self.request else {
            return Vec::new();
        };
        match direction {
            PortDirection::Input => (0..request.input_channels)
                .map(|i| format!("{}:Input_{}", request.client_id, i + 1))
                .collect(),
            PortDirection::Output => (0..request.output_channels)
                .map(|i| format!("{}:Output_{}", request.client_id, i + 1))
                .collect(),
        }
    }

    fn connect(&mut self, source: &str, destination: &str) -> Result<(), BackendError> {
        self.driver
            .connections
            .lock()
            .push((source.to_string(), destination.to_string()));
        Ok(())
    }

    fn disconnect(&mut self, source: &str, destination: &str) -> Result<(), BackendError> {
        let mut connections = self.driver.connections.lock();
        let before = connections.len();
        connections.retain(|(s, d)| !(s == source && d == destination));
        if connections.len() == before {
            return Err(BackendError::Connection(format!("{} -> {}", source, destination)));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackendError> {
        *self.driver.bridge.lock() = None;
        *self.driver.events.lock() = None;
        *self.driver.closes.lock() += 1;
        if self.script.fail_close {
            return Err(BackendError::Close("scripted".into()));
        }
        Ok(())
    }
}

/// How the test client behaves in `process`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behaviour {
    /// Copy input `i` to output `i`.
    Passthrough,
    /// Write `value` on the first block only, nothing afterwards.
    FirstBlockOnly(f32),
    /// Fail every block.
    Fail,
    /// Panic in every block.
    Panic,
}

#[derive(Debug, Default)]
pub struct ClientLog {
    pub configs: Vec<SessionConfig>,
    pub frames: Vec<usize>,
    pub output_frames: Vec<usize>,
    pub timestamps: Vec<i64>,
    pub shutdowns: usize,
}

pub struct TestClient {
    pub behaviour: Behaviour,
    pub reject_configure: bool,
    pub panic_on_configure: bool,
    pub log: Arc<Mutex<ClientLog>>,
    /// Driver entry points to poke while a block is in flight.
    pub mid_block: Arc<Mutex<Option<Box<dyn FnMut() + Send>>>>,
    blocks: usize,
}

impl TestClient {
    pub fn new(behaviour: Behaviour) -> (Self, Arc<Mutex<ClientLog>>) {
        let log = Arc::new(Mutex::new(ClientLog::default()));
        (
            Self {
                behaviour,
                reject_configure: false,
                panic_on_configure: false,
                log: Arc::clone(&log),
                mid_block: Arc::new(Mutex::new(None)),
                blocks: 0,
            },
            log,
        )
    }
}

impl AudioClient for TestClient {
    fn configure(&mut self, config: &SessionConfig) -> Result<(), ConfigurationError> {
        if self.panic_on_configure {
            panic!("scripted configure panic");
        }
        if self.reject_configure {
            return Err(ConfigurationError("unsupported".into()));
        }
        self.log.lock().configs.push(config.clone());
        Ok(())
    }

    fn process(
        &mut self,
        timestamp: i64,
        inputs: &InputBuffers<'_>,
        outputs: &mut OutputBuffers<'_>,
        frames: usize,
    ) -> Result<(), ProcessingError> {
        if let Some(poke) = self.mid_block.lock().as_mut() {
            poke();
        }
        {
            let mut log = self.log.lock();
            log.frames.push(frames);
            log.output_frames.push(outputs.frames());
            log.timestamps.push(timestamp);
        }
        self.blocks += 1;

        match self.behaviour {
            Behaviour::Passthrough => {
                for (input, mut output) in inputs.iter().zip(outputs.iter_mut()) {
                    for (o, i) in output.iter_mut().zip(input.iter()) {
                        *o = *i;
                    }
                }
                Ok(())
            }
            Behaviour::FirstBlockOnly(value) => {
                if self.blocks == 1 {
                    outputs.fill(value);
                }
                Ok(())
            }
            Behaviour::Fail => Err(ProcessingError("scripted failure".into())),
            Behaviour::Panic => panic!("scripted panic"),
        }
    }

    fn shutdown(&mut self) {
        self.log.lock().shutdowns += 1;
    }
}

/// Delegate that records everything it is told.
#[derive(Default)]
pub struct RecordingDelegate {
    pub states: Mutex<Vec<SessionState>>,
    pub configs: Mutex<Vec<SessionConfig>>,
    pub latencies: Mutex<Vec<LatencyReport>>,
    pub ports: Mutex<Vec<(String, bool)>>,
    pub clients: Mutex<Vec<(String, bool)>>,
}

impl ServerDelegate for RecordingDelegate {
    fn on_state_changed(&self, state: SessionState) {
        self.states.lock().push(state);
    }

    fn on_config_changed(&self, config: &SessionConfig) {
        self.configs.lock().push(config.clone());
    }

    fn on_latency_changed(&self, latency: LatencyReport) {
        self.latencies.lock().push(latency);
    }

    fn on_port_registration(&self, port: &str, registered: bool) {
        self.ports.lock().push((port.to_string(), registered));
    }

    fn on_client_registration(&self, client: &str, registered: bool) {
        self.clients.lock().push((client.to_string(), registered));
    }
}
