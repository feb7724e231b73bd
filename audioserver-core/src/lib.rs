//! # audioserver-core
//!
//! Platform-agnostic bridge between real-time audio/MIDI drivers and a
//! single client processing routine.
//!
//! A client implements `AudioClient` once. Native backends (JACK today)
//! implement `AudioBackend`/`MidiBackend` and plug into the generic
//! `AudioServer` and `MidiDevice`.
//!
//! ## Architecture
//!
//! ```text
//! audioserver-core (this crate)
//! ├── traits/       ← AudioClient, AudioBackend, ServerDelegate, MidiBackend, MidiReceiver
//! ├── models/       ← SessionConfig, SessionState, ServerError, LatencyReport, MidiMessage, etc.
//! ├── processing/   ← ProcessBridge (real-time callback), buffer views, interleave helpers
//! ├── session/      ← AudioServer, lifecycle, DriverEvents, config snapshots
//! └── midi/         ← MidiDevice, MidiProcessor, MidiTransmitter
//! ```

pub mod midi;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use midi::device::MidiDevice;
pub use midi::processor::MidiProcessor;
pub use midi::transmitter::MidiTransmitter;
pub use models::audio_models::{
    DeviceInfo, LatencyReport, NegotiatedFormat, OpenRequest, PortDirection, ServerDiagnostics,
};
pub use models::config::{BackendIdentity, ClientId, Connections, ServerOptions, SessionConfig};
pub use models::error::{
    BackendError, ChannelDirection, ConfigurationError, MidiError, ProcessingError, ServerError,
};
pub use models::midi_models::{MidiBytes, MidiDirection, MidiEvent, MidiMessage, RawMidiEvent};
pub use models::state::SessionState;
pub use processing::bridge::{CallbackAction, NativeInputs, NativeOutputs, ProcessBridge};
pub use processing::buffer_view::{BufferView, BufferViewMut, InputBuffers, OutputBuffers};
pub use session::reconfigure::DriverEvents;
pub use session::server::{AudioServer, ServerHandle};
pub use traits::audio_client::AudioClient;
pub use traits::backend::AudioBackend;
pub use traits::midi::{MidiBackend, MidiOutputBuffer, MidiReceiver};
pub use traits::server_delegate::ServerDelegate;
