use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::config::SessionConfig;
use crate::processing::buffer_view::{InputBuffers, OutputBuffers};
use crate::processing::interleave;
use crate::session::shared::{panic_message, SessionShared};
use crate::traits::audio_client::AudioClient;

/// Input buffers as the backend delivers them for one callback.
#[derive(Debug, Clone, Copy)]
pub enum NativeInputs<'a> {
    /// No input channels this callback.
    None,
    /// One slice per channel. Handed to the client without copying.
    Planar(&'a [&'a [f32]]),
    /// Frame-interleaved samples.
    Interleaved { samples: &'a [f32], channels: usize },
}

/// Output buffers as the backend delivers them for one callback.
#[derive(Debug)]
pub enum NativeOutputs<'a, 'b> {
    None,
    Planar(&'a mut [&'b mut [f32]]),
    Interleaved { samples: &'a mut [f32], channels: usize },
}

impl NativeOutputs<'_, '_> {
    fn silence(self) {
        match self {
            Self::None => {}
            Self::Planar(channels) => interleave::silence_planar(channels),
            Self::Interleaved { samples, .. } => interleave::silence(samples),
        }
    }

    fn write_from(self, scratch: &[Vec<f32>], frames: usize) {
        match self {
            Self::None => {}
            Self::Planar(channels) => interleave::copy_planar_from(scratch, frames, channels),
            Self::Interleaved { samples, channels } => {
                interleave::interleave_from(scratch, frames, samples, channels)
            }
        }
    }
}

/// What the backend should do after a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// Keep calling.
    Continue,
    /// The session is ending; stop calling the bridge.
    Stop,
}

/// Real-time side of a session, handed to the backend on activation.
///
/// The backend calls `process` once per driver cycle from its real-time
/// thread. The bridge never blocks: the client is reached with
/// `try_lock`, the configuration with a lock-free snapshot load, and
/// scratch memory is only allocated when a block is larger than any seen
/// before.
pub struct ProcessBridge {
    shared: Arc<SessionShared>,
    client: Arc<Mutex<dyn AudioClient>>,
    input_scratch: Vec<Vec<f32>>,
    output_scratch: Vec<Vec<f32>>,
}

impl ProcessBridge {
    pub(crate) fn new(shared: Arc<SessionShared>, client: Arc<Mutex<dyn AudioClient>>) -> Self {
        let config = shared.config.load();
        let mut bridge = Self {
            shared,
            client,
            input_scratch: Vec::new(),
            output_scratch: Vec::new(),
        };
        bridge.reserve(config.input_channels, config.output_channels, config.block_size);
        bridge
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<SessionConfig> {
        self.shared.config.load()
    }

    /// Run one block.
    ///
    /// `frames` is the block length the driver reports, or `None` to use
    /// the published block size. The configuration is read once, so a
    /// block size change published during this call applies to the next
    /// block.
    pub fn process(
        &mut self,
        timestamp: i64,
        frames: Option<usize>,
        inputs: NativeInputs<'_>,
        outputs: NativeOutputs<'_, '_>,
    ) -> CallbackAction {
        if !self.shared.lifecycle.state().is_active() {
            outputs.silence();
            return CallbackAction::Stop;
        }

        let (input_channels, output_channels, frames) = {
            let config = self.shared.config.peek();
            (
                config.input_channels,
                config.output_channels,
                frames.unwrap_or(config.block_size),
            )
        };
        self.reserve(input_channels, output_channels, frames);

        let Self {
            shared,
            client,
            input_scratch,
            output_scratch,
        } = self;

        let Some(mut client) = client.try_lock() else {
            shared.counters.block_skipped();
            outputs.silence();
            return CallbackAction::Continue;
        };

        let inputs = match inputs {
            NativeInputs::None => InputBuffers::empty(frames),
            NativeInputs::Planar(channels) => {
                InputBuffers::native(channels, input_channels, frames)
            }
            NativeInputs::Interleaved { samples, channels } => {
                let scratch = &mut input_scratch[..input_channels];
                interleave::deinterleave_into(samples, channels, frames, scratch);
                InputBuffers::scratch(&input_scratch[..], input_channels, frames)
            }
        };

        let output_scratch = &mut output_scratch[..output_channels];
        for channel in output_scratch.iter_mut() {
            interleave::silence(&mut channel[..frames]);
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut buffers = OutputBuffers::new(&mut *output_scratch, frames);
            client.process(timestamp, &inputs, &mut buffers, frames)
        }));
        drop(client);

        let failure = match result {
            Ok(Ok(())) => {
                outputs.write_from(output_scratch, frames);
                shared.counters.block_processed();
                return CallbackAction::Continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("client panicked: {}", panic_message(&*payload)),
        };

        shared.lifecycle.request_shutdown();
        shared.counters.process_failed();
        outputs.silence();
        log::error!("process callback failed, shutting down: {}", failure);
        CallbackAction::Stop
    }

    fn reserve(&mut self, inputs: usize, outputs: usize, frames: usize) {
        interleave::ensure_capacity(&mut self.input_scratch, inputs, frames);
        interleave::ensure_capacity(&mut self.output_scratch, outputs, frames);
    }
}
