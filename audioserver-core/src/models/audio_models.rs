use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::config::ClientId;

/// An audio device (or server) a backend can open a session on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub max_input_channels: usize,
    pub max_output_channels: usize,
    pub is_default: bool,
}

/// Which way a port carries audio, seen from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

/// Parameters the server hands to `AudioBackend::open`.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub client_id: ClientId,
    pub device: Option<String>,
    pub sample_rate: f32,
    pub input_channels: usize,
    pub output_channels: usize,
    pub block_size: usize,

    /// Whether the backend may start a server process if none is running.
    pub allow_server_start: bool,
}

/// What the backend actually granted when the session was opened.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiatedFormat {
    pub client_name: String,
    pub sample_rate: f32,
    pub block_size: usize,
}

/// Last-reported driver latency, in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LatencyReport {
    pub input_frames: u32,
    pub output_frames: u32,
}

impl LatencyReport {
    /// Nothing reported yet.
    pub const UNKNOWN: Self = Self {
        input_frames: u32::MAX,
        output_frames: u32::MAX,
    };

    pub fn new(input_frames: u32, output_frames: u32) -> Self {
        Self {
            input_frames,
            output_frames,
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }

    fn pack(self) -> u64 {
        ((self.input_frames as u64) << 32) | self.output_frames as u64
    }

    fn unpack(raw: u64) -> Self {
        Self {
            input_frames: (raw >> 32) as u32,
            output_frames: raw as u32,
        }
    }
}

impl Default for LatencyReport {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Last-writer-wins latency store. Both halves live in one word so a
/// reader never sees the input latency of one report paired with the
/// output latency of another.
#[derive(Debug)]
pub struct LatencyCell(AtomicU64);

impl LatencyCell {
    pub fn new() -> Self {
        Self(AtomicU64::new(LatencyReport::UNKNOWN.pack()))
    }

    pub fn store(&self, report: LatencyReport) {
        self.0.store(report.pack(), Ordering::Release);
    }

    pub fn load(&self) -> LatencyReport {
        LatencyReport::unpack(self.0.load(Ordering::Acquire))
    }
}

impl Default for LatencyCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Counters for debugging a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDiagnostics {
    pub blocks_processed: u64,
    /// Blocks rendered as silence because a reconfiguration held the client.
    pub blocks_skipped: u64,
    pub process_failures: u64,
    pub xruns: u64,
    pub reconfigurations: u64,
}

/// Live counters behind `ServerDiagnostics`. Relaxed increments only, so
/// the real-time thread can update them freely.
#[derive(Debug, Default)]
pub struct DiagnosticCounters {
    blocks_processed: AtomicU64,
    blocks_skipped: AtomicU64,
    process_failures: AtomicU64,
    xruns: AtomicU64,
    reconfigurations: AtomicU64,
}

impl DiagnosticCounters {
    pub fn block_processed(&self) {
        self.blocks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn block_skipped(&self) {
        self.blocks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn process_failed(&self) {
        self.process_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn xrun(&self) {
        self.xruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reconfigured(&self) {
        self.reconfigurations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServerDiagnostics {
        ServerDiagnostics {
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            blocks_skipped: self.blocks_skipped.load(Ordering::Relaxed),
            process_failures: self.process_failures.load(Ordering::Relaxed),
            xruns: self.xruns.load(Ordering::Relaxed),
            reconfigurations: self.reconfigurations.load(Ordering::Relaxed),
        }
    }
}
