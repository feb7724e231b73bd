//! Non-owning per-channel views handed to the client for one block.
//!
//! Views borrow either the backend's own channel buffers or the bridge's
//! preallocated scratch; the lifetimes keep them from outliving the
//! `process` call they were created for.

use std::ops::{Deref, DerefMut};

/// Read-only view of one channel for one block.
#[derive(Debug, Clone, Copy)]
pub struct BufferView<'a> {
    samples: &'a [f32],
}

impl<'a> BufferView<'a> {
    pub fn new(samples: &'a [f32]) -> Self {
        Self { samples }
    }
}

impl Deref for BufferView<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.samples
    }
}

/// Writable view of one channel for one block.
#[derive(Debug)]
pub struct BufferViewMut<'a> {
    samples: &'a mut [f32],
}

impl<'a> BufferViewMut<'a> {
    pub fn new(samples: &'a mut [f32]) -> Self {
        Self { samples }
    }
}

impl Deref for BufferViewMut<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        self.samples
    }
}

impl DerefMut for BufferViewMut<'_> {
    fn deref_mut(&mut self) -> &mut [f32] {
        self.samples
    }
}

#[derive(Debug, Clone, Copy)]
enum InputSource<'a> {
    /// Backend-owned planar buffers, wrapped without copying.
    Native(&'a [&'a [f32]]),
    /// Bridge scratch holding de-interleaved samples.
    Scratch(&'a [Vec<f32>]),
}

/// Ordered input channels for one block.
#[derive(Debug, Clone, Copy)]
pub struct InputBuffers<'a> {
    source: InputSource<'a>,
    channels: usize,
    frames: usize,
}

impl<'a> InputBuffers<'a> {
    pub(crate) fn native(buffers: &'a [&'a [f32]], channels: usize, frames: usize) -> Self {
        Self {
            source: InputSource::Native(buffers),
            channels: channels.min(buffers.len()),
            frames,
        }
    }

    pub(crate) fn scratch(buffers: &'a [Vec<f32>], channels: usize, frames: usize) -> Self {
        Self {
            source: InputSource::Scratch(buffers),
            channels: channels.min(buffers.len()),
            frames,
        }
    }

    /// A set with no channels, for sessions without inputs.
    pub fn empty(frames: usize) -> Self {
        Self {
            source: InputSource::Native(&[]),
            channels: 0,
            frames,
        }
    }

    pub fn len(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.channels == 0
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn get(&self, channel: usize) -> Option<BufferView<'a>> {
        if channel >= self.channels {
            return None;
        }
        let samples: &'a [f32] = match self.source {
            InputSource::Native(buffers) => buffers[channel],
            InputSource::Scratch(buffers) => &buffers[channel],
        };
        Some(BufferView::new(&samples[..self.frames.min(samples.len())]))
    }

    pub fn iter(&self) -> impl Iterator<Item = BufferView<'a>> + '_ {
        (0..self.channels).filter_map(move |channel| self.get(channel))
    }
}

/// Ordered output channels for one block. Pre-filled with silence.
#[derive(Debug)]
pub struct OutputBuffers<'a> {
    buffers: &'a mut [Vec<f32>],
    frames: usize,
}

impl<'a> OutputBuffers<'a> {
    pub(crate) fn new(buffers: &'a mut [Vec<f32>], frames: usize) -> Self {
        Self { buffers, frames }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn get_mut(&mut self, channel: usize) -> Option<BufferViewMut<'_>> {
        let frames = self.frames;
        self.buffers
            .get_mut(channel)
            .map(|buffer| BufferViewMut::new(&mut buffer[..frames]))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = BufferViewMut<'_>> + '_ {
        let frames = self.frames;
        self.buffers
            .iter_mut()
            .map(move |buffer| BufferViewMut::new(&mut buffer[..frames]))
    }

    /// Fill every channel with `value`.
    pub fn fill(&mut self, value: f32) {
        for mut channel in self.iter_mut() {
            channel.fill(value);
        }
    }
}
