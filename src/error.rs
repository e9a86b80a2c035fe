//! Failure taxonomy for the engine core.
//!
//! Every variant of [`EngineError`] is recoverable at the session
//! boundary: it becomes the terminal result text sent back over IPC, and
//! the service keeps running. The `Display` strings are exactly what the
//! user sees.

use thiserror::Error;

use crate::language::Language;

/// Terminal failure of one speak/stop cycle.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Type text first.")]
    EmptyText,

    #[error("Already speaking, wait for it to finish.")]
    AlreadySpeaking,

    #[error("Voice model for {0} is not installed.")]
    ModelMissing(Language),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Audio playback failed: {0}")]
    Playback(#[from] PlaybackError),
}

/// Faults raised while loading a model or running inference. Zero-length
/// output is its own variant but surfaces through the same
/// `Speech synthesis failed` category as a thrown fault.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("model load failed: {0}")]
    Load(String),

    #[error("{0}")]
    Engine(String),

    #[error("synthesis produced no audio")]
    EmptyOutput,
}

/// Faults raised by the playback controller or the scratch sink.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("no audio output: {0}")]
    Output(String),

    #[error("could not decode scratch audio: {0}")]
    Decode(String),

    #[error("{0}")]
    Io(String),
}

/// Client-binding failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The daemon is absent, dead, or the connection went stale. The
    /// binding rebinds automatically on the next use.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The OS refused the binding outright (for a Unix socket, permission
    /// denied). Terminal; the client does not retry.
    #[error("engine refused the connection")]
    Refused,
}
