use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use arc_swap::ArcSwapOption;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;

use crate::models::error::MidiError;
use crate::models::midi_models::{MidiEvent, MidiMessage};
use crate::session::shared::panic_message;
use crate::traits::midi::MidiReceiver;

/// Items on the transmitter queue.
#[derive(Debug)]
pub(crate) enum TransmitterItem {
    Event(MidiEvent),
    /// Wakes the consumer so it can exit.
    Close,
}

/// Where the real-time side pushes incoming events. Empty while the
/// transmitter is closed.
pub(crate) type FeedSlot = Arc<ArcSwapOption<Sender<TransmitterItem>>>;

type ReceiverSlot = Arc<RwLock<Option<Arc<dyn MidiReceiver>>>>;

/// Delivers incoming MIDI to an attached receiver on its own thread.
///
/// While open, the device's real-time callback copies every incoming
/// event into an unbounded queue; a consumer thread turns each event into
/// a `MidiMessage` and hands it to the receiver, in arrival order.
/// Messages that arrive with no receiver attached are dropped.
pub struct MidiTransmitter {
    feed: FeedSlot,
    receiver: ReceiverSlot,
    queue: Option<Sender<TransmitterItem>>,
    consumer: Option<thread::JoinHandle<()>>,
}

impl MidiTransmitter {
    pub(crate) fn new(feed: FeedSlot) -> Self {
        Self {
            feed,
            receiver: Arc::new(RwLock::new(None)),
            queue: None,
            consumer: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.consumer.is_some()
    }

    /// Start the consumer. Opening an open transmitter does nothing.
    pub fn open(&mut self) -> Result<(), MidiError> {
        if self.is_open() {
            return Ok(());
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let receiver = Arc::clone(&self.receiver);
        let consumer = thread::Builder::new()
            .name("midi-transmitter".into())
            .spawn(move || consume(rx, receiver))
            .map_err(|e| MidiError::Thread(e.to_string()))?;

        self.feed.store(Some(Arc::new(tx.clone())));
        self.queue = Some(tx);
        self.consumer = Some(consumer);
        log::debug!("MIDI transmitter open");
        Ok(())
    }

    /// Stop feeding the queue, wake the consumer and wait for it. Events
    /// still queued behind the close marker are dropped.
    pub fn close(&mut self) {
        self.feed.store(None);
        if let Some(queue) = self.queue.take() {
            let _ = queue.send(TransmitterItem::Close);
        }
        if let Some(consumer) = self.consumer.take() {
            if consumer.join().is_err() {
                log::error!("MIDI transmitter thread panicked");
            }
            log::debug!("MIDI transmitter closed");
        }
    }

    pub fn attach_receiver(&self, receiver: Arc<dyn MidiReceiver>) {
        *self.receiver.write() = Some(receiver);
    }

    pub fn detach_receiver(&self) {
        *self.receiver.write() = None;
    }

    pub fn has_receiver(&self) -> bool {
        self.receiver.read().is_some()
    }
}

impl Drop for MidiTransmitter {
    fn drop(&mut self) {
        self.close();
    }
}

fn consume(queue: Receiver<TransmitterItem>, receiver: ReceiverSlot) {
    while let Ok(item) = queue.recv() {
        let event = match item {
            TransmitterItem::Event(event) => event,
            TransmitterItem::Close => break,
        };
        if event.payload.is_empty() {
            continue;
        }
        let Some(target) = receiver.read().clone() else {
            continue;
        };

        let timestamp = i64::from(event.frame_offset);
        let message = MidiMessage::from(event);
        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| target.send(&message, timestamp)))
        {
            log::error!("MIDI receiver panicked: {}", panic_message(&*payload));
        }
    }
}
