//! Port naming for JACK sessions.
//!
//! Session ports are numbered from 1 in registration order, so client
//! channel `i` always maps to `Input_{i+1}` / `Output_{i+1}`.

/// Short name of the MIDI input port registered by a MIDI device.
pub const MIDI_IN: &str = "MIDI in";

/// Short name of the MIDI output port registered by a MIDI device.
pub const MIDI_OUT: &str = "MIDI out";

/// Short name of audio input port `index` (zero-based).
pub fn input_port_name(index: usize) -> String {
    format!("Input_{}", index + 1)
}

/// Short name of audio output port `index` (zero-based).
pub fn output_port_name(index: usize) -> String {
    format!("Output_{}", index + 1)
}

/// Full `client:port` name as JACK reports it.
pub fn full_name(client: &str, port: &str) -> String {
    format!("{}:{}", client, port)
}

/// Split a full port name into `(client, port)`. Client names may not
/// contain ':', port names may.
pub fn split_full_name(name: &str) -> Option<(&str, &str)> {
    name.split_once(':')
        .filter(|(client, port)| !client.is_empty() && !port.is_empty())
}
