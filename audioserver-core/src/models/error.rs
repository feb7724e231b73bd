use std::fmt;

use thiserror::Error;

use super::state::SessionState;

/// Which side of the session a channel count refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelDirection {
    Input,
    Output,
}

impl fmt::Display for ChannelDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Errors surfaced synchronously by the session API.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServerError {
    #[error("no audio device available")]
    NoDeviceAvailable,

    #[error("not enough {direction} channels: requested {requested}, device provides {available}")]
    InsufficientChannels {
        direction: ChannelDirection,
        requested: usize,
        available: usize,
    },

    #[error("illegal lifecycle transition from {0:?}")]
    IllegalLifecycle(SessionState),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("failed to spawn thread: {0}")]
    Thread(String),
}

/// Failures reported by a native backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("failed to open backend session: {0}")]
    OpenFailed(String),

    #[error("failed to register port: {0}")]
    PortRegistration(String),

    #[error("failed to activate backend: {0}")]
    Activation(String),

    #[error("port connection failed: {0}")]
    Connection(String),

    #[error("failed to close backend: {0}")]
    Close(String),

    #[error("backend in wrong state: {0}")]
    InvalidState(String),
}

/// Raised by a client that cannot accept a configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("client rejected configuration: {0}")]
pub struct ConfigurationError(pub String);

/// Raised by a client that failed to render a block.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("processing failed: {0}")]
pub struct ProcessingError(pub String);

/// Errors from MIDI endpoints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MidiError {
    #[error("MIDI device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("MIDI device already open")]
    AlreadyOpen,

    #[error("MIDI device not open")]
    NotOpen,

    #[error("MIDI device has no input")]
    NoInput,

    #[error("MIDI device has no output")]
    NoOutput,

    #[error("MIDI write failed: {0}")]
    WriteFailed(String),

    #[error("failed to spawn MIDI thread: {0}")]
    Thread(String),
}
