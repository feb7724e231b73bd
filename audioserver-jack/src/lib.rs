//! # audioserver-jack
//!
//! JACK backend for audioserver-core.
//!
//! Provides:
//! - `JackBackend`: `AudioBackend` over a JACK server, one client per session
//! - `JackMidiBackend`: `MidiBackend` with a "MIDI in" / "MIDI out" port pair
//! - `ports`: session port naming
//!
//! ## Platform Requirements
//! - Linux with libjack (JACK2 or PipeWire's JACK layer)
//!
//! ## Usage
//! ```ignore
//! use audioserver_core::{AudioServer, SessionConfig};
//! use audioserver_jack::JackBackend;
//!
//! let server = AudioServer::create(JackBackend::new(), SessionConfig::new(48000.0, 2, 2, 256), client)?;
//! let handle = server.handle();
//! std::thread::spawn(move || server.run());
//! ```

pub mod ports;

#[cfg(target_os = "linux")]
pub mod jack_midi;
#[cfg(target_os = "linux")]
pub mod jack_server;

#[cfg(target_os = "linux")]
pub use jack_midi::JackMidiBackend;
#[cfg(target_os = "linux")]
pub use jack_server::JackBackend;
