use crate::models::config::SessionConfig;
use crate::models::error::{ConfigurationError, ProcessingError};
use crate::processing::buffer_view::{InputBuffers, OutputBuffers};

/// The processing routine a session drives.
///
/// One implementation runs unmodified against every backend. The server
/// owns the client for the whole session and guarantees that `configure`
/// and `process` never run at the same time.
pub trait AudioClient: Send {
    /// Apply a new configuration.
    ///
    /// Called once before the first `process`, then again from the event
    /// worker whenever the driver changes sample rate or block size. An
    /// error during a live reconfiguration is logged and the session keeps
    /// running.
    fn configure(&mut self, config: &SessionConfig) -> Result<(), ConfigurationError>;

    /// Render one block.
    ///
    /// Runs on the backend's real-time thread: no blocking, no unbounded
    /// allocation. `outputs` arrive zeroed. The views are only valid for
    /// this call. Returning an error (or panicking) ends the session.
    fn process(
        &mut self,
        timestamp: i64,
        inputs: &InputBuffers<'_>,
        outputs: &mut OutputBuffers<'_>,
        frames: usize,
    ) -> Result<(), ProcessingError>;

    /// Release client resources. Called exactly once, while the session
    /// tears down.
    fn shutdown(&mut self);
}
