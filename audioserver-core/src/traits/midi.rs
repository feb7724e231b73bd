use crate::midi::processor::MidiProcessor;
use crate::models::error::MidiError;
use crate::models::midi_models::{MidiDirection, MidiMessage};

/// Destination for incoming MIDI messages. Called on the transmitter's
/// consumer thread, one message at a time, in arrival order.
pub trait MidiReceiver: Send + Sync {
    fn send(&self, message: &MidiMessage, timestamp: i64);
}

/// Native MIDI output buffer for one callback.
pub trait MidiOutputBuffer {
    /// Write `bytes` at `frame_offset` within the current block.
    fn write(&mut self, frame_offset: u32, bytes: &[u8]) -> Result<(), MidiError>;
}

/// Native MIDI device capability.
pub trait MidiBackend {
    /// Open the native device and start calling `processor` once per
    /// driver cycle.
    fn open(
        &mut self,
        name: &str,
        direction: MidiDirection,
        processor: MidiProcessor,
    ) -> Result<(), MidiError>;

    /// Stop callbacks and release the native device.
    fn close(&mut self) -> Result<(), MidiError>;
}
