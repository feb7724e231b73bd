//! Stereo passthrough over JACK, with a MIDI monitor.
//!
//! ```text
//! cargo run -p audioserver-jack --example passthrough -- [seconds] [options.json]
//! ```
//!
//! Runs for `seconds` (default 10), copying each input to the matching
//! output. Incoming MIDI on "passthrough-midi:MIDI in" is logged, and one
//! note is sent on "passthrough-midi:MIDI out" at startup.

#[cfg(target_os = "linux")]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    demo::run()
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("the JACK backend is only built on Linux");
}

#[cfg(target_os = "linux")]
mod demo {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use audioserver_core::{
        AudioClient, AudioServer, ConfigurationError, InputBuffers, LatencyReport, MidiDevice,
        MidiDirection, MidiMessage, MidiReceiver, OutputBuffers, ProcessingError, ServerDelegate,
        ServerOptions, SessionConfig, SessionState,
    };
    use audioserver_jack::{JackBackend, JackMidiBackend};

    struct Passthrough;

    impl AudioClient for Passthrough {
        fn configure(&mut self, config: &SessionConfig) -> Result<(), ConfigurationError> {
            log::info!(
                "configured: {} Hz, {} frames, client '{}'",
                config.sample_rate,
                config.block_size,
                config.backend.client_name
            );
            Ok(())
        }

        fn process(
            &mut self,
            _timestamp: i64,
            inputs: &InputBuffers<'_>,
            outputs: &mut OutputBuffers<'_>,
            _frames: usize,
        ) -> Result<(), ProcessingError> {
            for (input, mut output) in inputs.iter().zip(outputs.iter_mut()) {
                for (o, i) in output.iter_mut().zip(input.iter()) {
                    *o = *i;
                }
            }
            Ok(())
        }

        fn shutdown(&mut self) {
            log::info!("client shut down");
        }
    }

    struct LogDelegate;

    impl ServerDelegate for LogDelegate {
        fn on_state_changed(&self, state: SessionState) {
            log::info!("session state: {:?}", state);
        }

        fn on_latency_changed(&self, latency: LatencyReport) {
            log::info!(
                "latency: {} in / {} out frames",
                latency.input_frames,
                latency.output_frames
            );
        }

        fn on_client_registration(&self, client: &str, registered: bool) {
            log::debug!("client '{}' registered: {}", client, registered);
        }
    }

    struct MidiMonitor;

    impl MidiReceiver for MidiMonitor {
        fn send(&self, message: &MidiMessage, timestamp: i64) {
            log::info!("MIDI {:02X?} at frame {}", message.as_bytes(), timestamp);
        }
    }

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        env_logger::init();

        let mut args = std::env::args().skip(1);
        let seconds: u64 = args.next().map(|s| s.parse()).transpose()?.unwrap_or(10);
        let options = match args.next() {
            Some(path) => ServerOptions::from_json(&std::fs::read_to_string(path)?)?,
            None => ServerOptions::default(),
        };

        let server = AudioServer::create_with_options(
            JackBackend::new(),
            SessionConfig::new(48_000.0, 2, 2, 256),
            Passthrough,
            options,
        )?;
        server.set_delegate(Arc::new(LogDelegate));

        let mut midi = MidiDevice::new(JackMidiBackend::new(), "passthrough-midi");
        match midi.open(MidiDirection::DUPLEX) {
            Ok(()) => {
                midi.attach_receiver(Arc::new(MidiMonitor));
                midi.open_transmitter()?;
                midi.enqueue_outbound(MidiMessage::note_on(0, 60, 100))?;
                midi.enqueue_outbound(MidiMessage::note_off(0, 60, 0))?;
            }
            Err(e) => log::warn!("MIDI disabled: {}", e),
        }

        let handle = server.handle();
        let watchdog = thread::spawn(move || {
            if !handle.wait_for_termination(Duration::from_secs(seconds)) {
                handle.request_shutdown();
            }
            handle.diagnostics()
        });

        let result = server.run();

        midi.close()?;
        if let Ok(diagnostics) = watchdog.join() {
            log::info!("diagnostics: {:?}", diagnostics);
        }
        result?;
        Ok(())
    }
}
