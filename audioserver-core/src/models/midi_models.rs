use smallvec::SmallVec;

/// Inline capacity for MIDI payloads. Channel voice messages fit without
/// touching the heap; SysEx spills.
pub type MidiBytes = SmallVec<[u8; 3]>;

/// Which directions a MIDI device is opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiDirection {
    pub input: bool,
    pub output: bool,
}

impl MidiDirection {
    pub const INPUT: Self = Self {
        input: true,
        output: false,
    };

    pub const OUTPUT: Self = Self {
        input: false,
        output: true,
    };

    pub const DUPLEX: Self = Self {
        input: true,
        output: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.input && !self.output
    }
}

/// A hardware MIDI event as the backend exposes it during a callback.
/// Borrowed from the native buffer; only valid for that callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMidiEvent<'a> {
    pub frame_offset: u32,
    pub bytes: &'a [u8],
}

/// A MIDI event copied out of the native buffer, owned by the transmitter
/// queue until the consumer takes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiEvent {
    pub payload: MidiBytes,
    pub frame_offset: u32,
}

impl MidiEvent {
    pub fn copy_from(raw: &RawMidiEvent<'_>) -> Self {
        Self {
            payload: MidiBytes::from_slice(raw.bytes),
            frame_offset: raw.frame_offset,
        }
    }
}

/// A MIDI message delivered to receivers or queued for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiMessage {
    bytes: MidiBytes,
}

impl MidiMessage {
    pub fn new(bytes: &[u8]) -> Self {
        Self {
            bytes: MidiBytes::from_slice(bytes),
        }
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F])
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(&[0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Status byte, if any.
    pub fn status(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    /// Channel (0-15) for channel voice/mode messages.
    pub fn channel(&self) -> Option<u8> {
        match self.status() {
            Some(status) if (0x80..0xF0).contains(&status) => Some(status & 0x0F),
            _ => None,
        }
    }
}

impl From<MidiEvent> for MidiMessage {
    fn from(event: MidiEvent) -> Self {
        Self {
            bytes: event.payload,
        }
    }
}
