use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::midi::transmitter::{FeedSlot, TransmitterItem};
use crate::models::midi_models::{MidiEvent, MidiMessage, RawMidiEvent};
use crate::processing::bridge::CallbackAction;
use crate::traits::midi::MidiOutputBuffer;

/// Real-time side of a MIDI device, handed to the backend on open.
///
/// Every callback services both directions: incoming events are copied
/// into the transmitter queue (when a transmitter is open) and queued
/// outbound messages are written into the native output buffer. Nothing
/// here blocks.
pub struct MidiProcessor {
    feed: FeedSlot,
    outbound: Receiver<MidiMessage>,
    dropped: Arc<AtomicU64>,
}

impl MidiProcessor {
    pub(crate) fn new(
        feed: FeedSlot,
        outbound: Receiver<MidiMessage>,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        Self {
            feed,
            outbound,
            dropped,
        }
    }

    /// Run one driver cycle.
    ///
    /// `output` is `None` for devices opened without an output. Returns
    /// `Stop` once the owning device is gone.
    pub fn process<'a, I>(
        &mut self,
        input: I,
        output: Option<&mut dyn MidiOutputBuffer>,
    ) -> CallbackAction
    where
        I: IntoIterator<Item = RawMidiEvent<'a>>,
    {
        if let Some(feed) = &*self.feed.load() {
            for raw in input {
                let _ = feed.send(TransmitterItem::Event(MidiEvent::copy_from(&raw)));
            }
        }

        let Some(output) = output else {
            return CallbackAction::Continue;
        };

        loop {
            let message = match self.outbound.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) => return CallbackAction::Continue,
                Err(TryRecvError::Disconnected) => return CallbackAction::Stop,
            };
            if message.is_empty() {
                continue;
            }
            if output.write(0, message.as_bytes()).is_err() {
                let dropped = 1 + self.outbound.try_iter().count() as u64;
                self.dropped.fetch_add(dropped, Ordering::Relaxed);
                return CallbackAction::Continue;
            }
        }
    }
}
