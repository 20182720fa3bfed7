//! Dispatcher error types

use std::path::PathBuf;

use contracts::SensorKind;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Output directory could not be prepared
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Frame file write error
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Image encode error
    #[error("failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Packet routed to a writer of another sensor kind
    #[error("{writer} writer received a {received} packet (frame {frame})")]
    WrongSensor {
        writer: SensorKind,
        received: SensorKind,
        frame: u64,
    },

    /// Payload layout does not match its declared shape
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

impl DispatcherError {
    /// Create an encode error
    pub fn encode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Encode {
            path: path.into(),
            message: message.into(),
        }
    }
}
