//! Audio subsystem errors.
//!
//! Everything here is a startup failure: once a session is running the mixer
//! has no fallible operations, so none of these cross into the callback.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::drum::Drum;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Failed to get device config: {0}")]
    Config(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Failed to start audio stream: {0}")]
    StreamPlay(String),

    #[error("Failed to pause audio stream: {0}")]
    StreamPause(String),

    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Malformed waveform '{name}': {reason}")]
    Waveform { name: String, reason: String },

    #[error("Failed to decode track '{name}': {reason}")]
    Decoder { name: String, reason: String },

    #[error("No sample variants loaded for {0:?}")]
    MissingVariants(Drum),

    #[error("Resampler error: {0}")]
    Resample(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type AudioResult<T> = Result<T, AudioError>;
