//! JACK MIDI device backend.
//!
//! Each MIDI device is its own JACK client with a "MIDI in" and/or
//! "MIDI out" port. Input events and queued outbound messages are both
//! serviced in every process cycle by the device's `MidiProcessor`.

use jack::{AsyncClient, Client, ClientOptions, Control, MidiIn, MidiOut, Port, ProcessScope, RawMidi};

use audioserver_core::{
    CallbackAction, MidiBackend, MidiDirection, MidiError, MidiOutputBuffer, MidiProcessor,
    RawMidiEvent,
};

use crate::ports;

struct MidiHandler {
    processor: MidiProcessor,
    input: Option<Port<MidiIn>>,
    output: Option<Port<MidiOut>>,
}

impl jack::ProcessHandler for MidiHandler {
    fn process(&mut self, _client: &Client, ps: &ProcessScope) -> Control {
        // Creating the writer clears last cycle's output buffer.
        let mut writer = self.output.as_mut().map(|port| JackMidiWriter {
            writer: port.writer(ps),
        });
        let output = writer.as_mut().map(|w| w as &mut dyn MidiOutputBuffer);

        let action = match &self.input {
            Some(port) => {
                let events = port.iter(ps).map(|raw| RawMidiEvent {
                    frame_offset: raw.time,
                    bytes: raw.bytes,
                });
                self.processor.process(events, output)
            }
            None => self.processor.process(std::iter::empty(), output),
        };

        match action {
            CallbackAction::Continue => Control::Continue,
            CallbackAction::Stop => Control::Quit,
        }
    }
}

struct JackMidiWriter<'a> {
    writer: jack::MidiWriter<'a>,
}

impl MidiOutputBuffer for JackMidiWriter<'_> {
    fn write(&mut self, frame_offset: u32, bytes: &[u8]) -> Result<(), MidiError> {
        self.writer
            .write(&RawMidi {
                time: frame_offset,
                bytes,
            })
            .map_err(|e| MidiError::WriteFailed(e.to_string()))
    }
}

/// `MidiBackend` over a JACK server. Never starts a server.
#[derive(Default)]
pub struct JackMidiBackend {
    client: Option<AsyncClient<(), MidiHandler>>,
}

impl JackMidiBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name JACK granted the device's client, if open.
    pub fn client_name(&self) -> Option<&str> {
        self.client.as_ref().map(|active| active.as_client().name())
    }
}

impl MidiBackend for JackMidiBackend {
    fn open(
        &mut self,
        name: &str,
        direction: MidiDirection,
        processor: MidiProcessor,
    ) -> Result<(), MidiError> {
        if self.client.is_some() {
            return Err(MidiError::AlreadyOpen);
        }
        let unavailable = |e: jack::Error| MidiError::DeviceUnavailable(format!("{}: {}", name, e));

        let (client, _status) =
            Client::new(name, ClientOptions::NO_START_SERVER).map_err(unavailable)?;
        let input = if direction.input {
            Some(
                client
                    .register_port(ports::MIDI_IN, MidiIn::default())
                    .map_err(unavailable)?,
            )
        } else {
            None
        };
        let output = if direction.output {
            Some(
                client
                    .register_port(ports::MIDI_OUT, MidiOut::default())
                    .map_err(unavailable)?,
            )
        } else {
            None
        };

        let handler = MidiHandler {
            processor,
            input,
            output,
        };
        let active = client.activate_async((), handler).map_err(unavailable)?;
        log::debug!("JACK MIDI client '{}' active", active.as_client().name());
        self.client = Some(active);
        Ok(())
    }

    fn close(&mut self) -> Result<(), MidiError> {
        let Some(active) = self.client.take() else {
            return Ok(());
        };
        active
            .deactivate()
            .map(|_| ())
            .map_err(|e| MidiError::DeviceUnavailable(e.to_string()))
    }
}
