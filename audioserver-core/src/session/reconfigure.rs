use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::models::audio_models::LatencyReport;
use crate::models::config::SessionConfig;
use crate::models::state::SessionState;
use crate::session::shared::{panic_message, SessionShared};
use crate::session::worker::WorkerJob;

/// Entry points a backend calls when the driver reports something.
///
/// Cheap to clone; every clone talks to the same session. Meant for driver
/// notification threads, not the real-time callback. Each entry point
/// returns promptly: anything that needs the client or a teardown is
/// queued to the session's event worker. A panic inside an entry point is
/// turned into a shutdown request instead of unwinding into the driver.
#[derive(Clone)]
pub struct DriverEvents {
    shared: Arc<SessionShared>,
    jobs: Sender<WorkerJob>,
}

impl DriverEvents {
    pub(crate) fn new(shared: Arc<SessionShared>, jobs: Sender<WorkerJob>) -> Self {
        Self { shared, jobs }
    }

    pub fn state(&self) -> SessionState {
        self.shared.lifecycle.state()
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<SessionConfig> {
        self.shared.config.load()
    }

    /// The driver switched sample rate.
    pub fn sample_rate_changed(&self, sample_rate: f32) {
        self.guarded("sample_rate_changed", || {
            if !sample_rate.is_finite() || sample_rate <= 0.0 {
                log::warn!("ignoring invalid sample rate from driver: {}", sample_rate);
                return;
            }
            let snapshot = self.shared.config.update(|c| c.with_sample_rate(sample_rate));
            log::info!("driver sample rate changed to {} Hz", sample_rate);
            self.reconfigure(snapshot);
        });
    }

    /// The driver switched block size. Blocks already in flight keep
    /// their size.
    pub fn block_size_changed(&self, block_size: usize) {
        self.guarded("block_size_changed", || {
            if block_size == 0 {
                log::warn!("ignoring zero block size from driver");
                return;
            }
            let snapshot = self.shared.config.update(|c| c.with_block_size(block_size));
            log::info!("driver block size changed to {} frames", block_size);
            self.reconfigure(snapshot);
        });
    }

    /// The driver wants the session torn down and rebuilt. The teardown
    /// runs on the event worker, never on the calling thread.
    pub fn reset_requested(&self) {
        self.guarded("reset_requested", || {
            if self.jobs.send(WorkerJob::Reset).is_err() {
                self.shared.lifecycle.request_shutdown();
            }
        });
    }

    /// The driver lost sample-position sync. Nothing to do but note it.
    pub fn resync_requested(&self) {
        self.guarded("resync_requested", || {
            log::info!("driver requested resync");
        });
    }

    /// The driver reported new input/output latencies, in frames.
    pub fn latencies_changed(&self, input_frames: u32, output_frames: u32) {
        self.guarded("latencies_changed", || {
            let report = LatencyReport::new(input_frames, output_frames);
            self.shared.latency.store(report);
            log::debug!("latency: in {} / out {} frames", input_frames, output_frames);
            if let Some(delegate) = self.shared.delegate() {
                delegate.on_latency_changed(report);
            }
        });
    }

    /// The backend itself went away (server shut down, device unplugged).
    pub fn shutdown_requested(&self, reason: &str) {
        self.guarded("shutdown_requested", || {
            log::warn!("backend shut down: {}", reason);
            self.shared.lifecycle.request_shutdown();
        });
    }

    /// An overrun or underrun happened.
    pub fn xrun(&self) {
        self.shared.counters.xrun();
    }

    pub fn port_registration(&self, port: &str, registered: bool) {
        self.guarded("port_registration", || {
            if let Some(delegate) = self.shared.delegate() {
                delegate.on_port_registration(port, registered);
            }
        });
    }

    pub fn client_registration(&self, client: &str, registered: bool) {
        self.guarded("client_registration", || {
            if let Some(delegate) = self.shared.delegate() {
                delegate.on_client_registration(client, registered);
            }
        });
    }

    fn reconfigure(&self, snapshot: Arc<SessionConfig>) {
        self.shared.counters.reconfigured();
        if self.jobs.send(WorkerJob::Configure(snapshot)).is_err() {
            log::warn!("event worker gone, client not reconfigured");
        }
    }

    fn guarded<F: FnOnce()>(&self, entry_point: &str, f: F) {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
            log::error!(
                "{} panicked, shutting down: {}",
                entry_point,
                panic_message(&*payload)
            );
            self.shared.lifecycle.request_shutdown();
        }
    }
}
