//! Conversion between interleaved native buffers and per-channel scratch.
//!
//! Every function writes into storage the caller already owns; none of
//! them allocate, so they are safe to call from the real-time thread.

/// Split `frames` frames of an interleaved buffer into per-channel scratch.
///
/// Only the first `min(channels, scratch.len())` channels are copied.
/// Frames missing from a short native buffer are read as silence.
pub fn deinterleave_into(
    interleaved: &[f32],
    channels: usize,
    frames: usize,
    scratch: &mut [Vec<f32>],
) {
    if channels == 0 {
        for buffer in scratch.iter_mut() {
            silence(&mut buffer[..frames]);
        }
        return;
    }

    for (ch, buffer) in scratch.iter_mut().enumerate() {
        let buffer = &mut buffer[..frames];
        if ch >= channels {
            silence(buffer);
            continue;
        }
        for (frame, sample) in buffer.iter_mut().enumerate() {
            *sample = interleaved.get(frame * channels + ch).copied().unwrap_or(0.0);
        }
    }
}

/// Write per-channel scratch into an interleaved native buffer.
///
/// Native channels with no scratch counterpart are silenced, as is any
/// tail of the native buffer past `frames`.
pub fn interleave_from(
    scratch: &[Vec<f32>],
    frames: usize,
    interleaved: &mut [f32],
    channels: usize,
) {
    if channels == 0 {
        return;
    }

    let frames_available = interleaved.len() / channels;
    let frames_written = frames.min(frames_available);

    for (frame, native) in interleaved
        .chunks_exact_mut(channels)
        .take(frames_written)
        .enumerate()
    {
        for (ch, sample) in native.iter_mut().enumerate() {
            *sample = scratch.get(ch).map_or(0.0, |buffer| buffer[frame]);
        }
    }

    silence(&mut interleaved[frames_written * channels..]);
}

/// Copy per-channel scratch into planar native buffers, silencing the rest.
pub fn copy_planar_from(scratch: &[Vec<f32>], frames: usize, native: &mut [&mut [f32]]) {
    for (ch, out) in native.iter_mut().enumerate() {
        let n = frames.min(out.len());
        match scratch.get(ch) {
            Some(buffer) => {
                out[..n].copy_from_slice(&buffer[..n]);
                silence(&mut out[n..]);
            }
            None => silence(out),
        }
    }
}

/// Fill with zeros.
pub fn silence(samples: &mut [f32]) {
    samples.fill(0.0);
}

/// Silence every planar channel.
pub fn silence_planar(native: &mut [&mut [f32]]) {
    for channel in native.iter_mut() {
        silence(channel);
    }
}

/// Make sure `scratch` holds `channels` buffers of at least `frames`
/// samples. Returns `true` if anything had to be allocated.
pub fn ensure_capacity(scratch: &mut Vec<Vec<f32>>, channels: usize, frames: usize) -> bool {
    let mut grew = false;
    if scratch.len() < channels {
        scratch.resize_with(channels, Vec::new);
        grew = true;
    }
    for buffer in scratch.iter_mut() {
        if buffer.len() < frames {
            buffer.resize(frames, 0.0);
            grew = true;
        }
    }
    grew
}
