use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ServerError;

/// Identity of the native backend a session runs against.
///
/// Opaque to clients: it is carried through `SessionConfig` so a client
/// can log or display where it is running, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BackendIdentity {
    /// Native library name, e.g. "JACK".
    pub library: String,

    /// Client name actually granted by the backend (may differ from the
    /// requested `ClientId`).
    pub client_name: String,

    /// Selected device, if the backend distinguishes devices.
    pub device: Option<String>,
}

impl fmt::Display for BackendIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.device {
            Some(device) => write!(f, "{}:{} ({})", self.library, self.client_name, device),
            None => write!(f, "{}:{}", self.library, self.client_name),
        }
    }
}

/// Immutable snapshot of the session's audio format.
///
/// A published snapshot is never mutated. Reconfiguration derives a new
/// value with one of the `with_*` methods and publishes that instead, so
/// a reader always sees a self-consistent set of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sample rate in Hz.
    pub sample_rate: f32,

    /// Number of input channels handed to the client.
    pub input_channels: usize,

    /// Number of output channels the client renders.
    pub output_channels: usize,

    /// Frames per processing block (> 0).
    pub block_size: usize,

    /// Backend the session is bound to.
    #[serde(default)]
    pub backend: BackendIdentity,
}

impl SessionConfig {
    pub fn new(
        sample_rate: f32,
        input_channels: usize,
        output_channels: usize,
        block_size: usize,
    ) -> Self {
        Self {
            sample_rate,
            input_channels,
            output_channels,
            block_size,
            backend: BackendIdentity::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(ServerError::InvalidConfiguration(format!(
                "sample rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.block_size == 0 {
            return Err(ServerError::InvalidConfiguration(
                "block size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn with_sample_rate(&self, sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..self.clone()
        }
    }

    pub fn with_block_size(&self, block_size: usize) -> Self {
        Self {
            block_size,
            ..self.clone()
        }
    }

    pub fn with_channels(&self, input_channels: usize, output_channels: usize) -> Self {
        Self {
            input_channels,
            output_channels,
            ..self.clone()
        }
    }

    pub fn with_backend(&self, backend: BackendIdentity) -> Self {
        Self {
            backend,
            ..self.clone()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(48000.0, 2, 2, 256)
    }
}

/// Requested client name for backends that name their clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new("audioserver")
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Auto-connection of the session's ports to the backend's physical ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Connections {
    #[serde(default)]
    pub connect_inputs: bool,

    #[serde(default)]
    pub connect_outputs: bool,
}

impl Connections {
    pub const ALL: Self = Self {
        connect_inputs: true,
        connect_outputs: true,
    };

    pub fn any(&self) -> bool {
        self.connect_inputs || self.connect_outputs
    }
}

/// Server-level options that are not part of the audio format.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerOptions {
    #[serde(default)]
    pub client_id: ClientId,

    #[serde(default)]
    pub connections: Connections,

    /// Device to open, by name. `None` selects the default device, or the
    /// first enumerated one if the backend reports no default.
    #[serde(default)]
    pub device: Option<String>,
}

impl ServerOptions {
    pub fn from_json(json: &str) -> Result<Self, ServerError> {
        serde_json::from_str(json)
            .map_err(|e| ServerError::InvalidConfiguration(format!("bad server options: {}", e)))
    }
}
