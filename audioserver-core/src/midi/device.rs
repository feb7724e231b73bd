use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::midi::processor::MidiProcessor;
use crate::midi::transmitter::{FeedSlot, MidiTransmitter};
use crate::models::error::MidiError;
use crate::models::midi_models::{MidiDirection, MidiMessage};
use crate::traits::midi::{MidiBackend, MidiReceiver};

/// A MIDI endpoint on a native backend.
///
/// ```text
/// [native in]  → MidiProcessor ──feed──→ MidiTransmitter thread → [MidiReceiver]
/// [client]     → enqueue_outbound ──queue──→ MidiProcessor → [native out]
/// ```
pub struct MidiDevice<B: MidiBackend> {
    backend: B,
    name: String,
    direction: Option<MidiDirection>,
    transmitter: MidiTransmitter,
    outbound: Option<Sender<MidiMessage>>,
    dropped: Arc<AtomicU64>,
    feed: FeedSlot,
}

impl<B: MidiBackend> MidiDevice<B> {
    pub fn new(backend: B, name: impl Into<String>) -> Self {
        let feed: FeedSlot = Arc::default();
        Self {
            backend,
            name: name.into(),
            direction: None,
            transmitter: MidiTransmitter::new(Arc::clone(&feed)),
            outbound: None,
            dropped: Arc::new(AtomicU64::new(0)),
            feed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.direction.is_some()
    }

    /// Directions the device was opened for, if open.
    pub fn direction(&self) -> Option<MidiDirection> {
        self.direction
    }

    /// Open the native device.
    pub fn open(&mut self, direction: MidiDirection) -> Result<(), MidiError> {
        if self.is_open() {
            return Err(MidiError::AlreadyOpen);
        }
        if direction.is_empty() {
            return Err(MidiError::DeviceUnavailable(format!(
                "{}: no direction requested",
                self.name
            )));
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        let processor = MidiProcessor::new(Arc::clone(&self.feed), rx, Arc::clone(&self.dropped));

        self.backend
            .open(&self.name, direction, processor)
            .map_err(|e| match e {
                MidiError::DeviceUnavailable(_) => e,
                other => MidiError::DeviceUnavailable(format!("{}: {}", self.name, other)),
            })?;

        self.outbound = Some(tx);
        self.direction = Some(direction);
        log::info!("MIDI device '{}' open", self.name);
        Ok(())
    }

    /// Close the transmitter and the native device. Closing a closed
    /// device does nothing.
    pub fn close(&mut self) -> Result<(), MidiError> {
        if !self.is_open() {
            return Ok(());
        }
        self.transmitter.close();
        self.outbound = None;
        self.direction = None;
        let result = self.backend.close();
        log::info!("MIDI device '{}' closed", self.name);
        result
    }

    /// Start delivering input to the attached receiver.
    pub fn open_transmitter(&mut self) -> Result<&MidiTransmitter, MidiError> {
        let direction = self.direction.ok_or(MidiError::NotOpen)?;
        if !direction.input {
            return Err(MidiError::NoInput);
        }
        self.transmitter.open()?;
        Ok(&self.transmitter)
    }

    pub fn close_transmitter(&mut self) {
        self.transmitter.close();
    }

    pub fn transmitter(&self) -> &MidiTransmitter {
        &self.transmitter
    }

    pub fn attach_receiver(&self, receiver: Arc<dyn MidiReceiver>) {
        self.transmitter.attach_receiver(receiver);
    }

    pub fn detach_receiver(&self) {
        self.transmitter.detach_receiver();
    }

    /// Queue a message for the next driver cycle. Never blocks.
    pub fn enqueue_outbound(&self, message: MidiMessage) -> Result<(), MidiError> {
        let direction = self.direction.ok_or(MidiError::NotOpen)?;
        if !direction.output {
            return Err(MidiError::NoOutput);
        }
        let outbound = self.outbound.as_ref().ok_or(MidiError::NotOpen)?;
        outbound.send(message).map_err(|_| MidiError::NotOpen)
    }

    /// Outbound messages discarded after a native write failure.
    pub fn dropped_outbound(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<B: MidiBackend> Drop for MidiDevice<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("error closing MIDI device '{}': {}", self.name, e);
        }
    }
}
