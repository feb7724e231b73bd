use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::models::config::SessionConfig;
use crate::models::error::ServerError;
use crate::session::shared::{panic_message, SessionShared};
use crate::traits::audio_client::AudioClient;

/// Work deferred from driver threads.
#[derive(Debug)]
pub(crate) enum WorkerJob {
    /// Hand a freshly published snapshot to the client.
    Configure(Arc<SessionConfig>),
    /// The driver asked for a reset; end the session.
    Reset,
    Stop,
}

/// Per-session thread that runs everything a driver notification must not
/// run inline: client reconfiguration (which has to wait for the client
/// lock) and teardown requested by the driver being torn down.
pub(crate) struct EventWorker {
    jobs: Sender<WorkerJob>,
    handle: Option<thread::JoinHandle<()>>,
}

impl EventWorker {
    pub(crate) fn spawn(
        shared: Arc<SessionShared>,
        client: Arc<Mutex<dyn AudioClient>>,
    ) -> Result<Self, ServerError> {
        let (jobs, queue) = crossbeam_channel::unbounded();

        let handle = thread::Builder::new()
            .name("audioserver-events".into())
            .spawn(move || run(queue, &shared, &client))
            .map_err(|e| ServerError::Thread(e.to_string()))?;

        Ok(Self {
            jobs,
            handle: Some(handle),
        })
    }

    pub(crate) fn sender(&self) -> Sender<WorkerJob> {
        self.jobs.clone()
    }

    /// Finish queued work and join the thread.
    pub(crate) fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.jobs.send(WorkerJob::Stop);
        if handle.join().is_err() {
            log::error!("event worker panicked");
        }
    }
}

impl Drop for EventWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(queue: Receiver<WorkerJob>, shared: &SessionShared, client: &Mutex<dyn AudioClient>) {
    while let Ok(job) = queue.recv() {
        match job {
            WorkerJob::Configure(config) => configure(shared, client, &config),
            WorkerJob::Reset => {
                log::info!("driver requested a reset, closing session");
                shared.lifecycle.request_shutdown();
            }
            WorkerJob::Stop => break,
        }
    }
    log::debug!("event worker exiting");
}

fn configure(shared: &SessionShared, client: &Mutex<dyn AudioClient>, config: &Arc<SessionConfig>) {
    if shared.lifecycle.state().is_shutting_down() {
        return;
    }
    // A newer snapshot is queued behind this one.
    if !Arc::ptr_eq(config, &shared.config.load()) {
        return;
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| client.lock().configure(config)));
    match result {
        Ok(Ok(())) => {
            log::debug!(
                "client reconfigured: {} Hz, {} frames",
                config.sample_rate,
                config.block_size
            );
            if let Some(delegate) = shared.delegate() {
                delegate.on_config_changed(config);
            }
        }
        Ok(Err(e)) => log::warn!("client kept running after failed reconfiguration: {}", e),
        Err(payload) => {
            log::error!(
                "client panicked during reconfiguration: {}",
                panic_message(&*payload)
            );
            shared.lifecycle.request_shutdown();
        }
    }
}
