//! Engine error type.
//!
//! Messages are written for the host: the C boundary copies `Display` output
//! verbatim into its last-error buffer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The script is wrong: syntax, unknown names, bad arguments, `throw`.
    #[error("{0}")]
    Script(String),
    /// Anything else that went wrong while computing (resource limits, bugs).
    #[error("{0}")]
    Internal(String),
    /// The instance could not be constructed or configured.
    #[error("{0}")]
    Config(String),
    /// Rendering to an output device failed.
    #[error("{0}")]
    Playback(String),
    /// Writing the native signal to disk failed.
    #[error("wave file error: {0}")]
    Wav(#[from] hound::Error),
    #[error("{0}")]
    NoSignal(&'static str),
}

impl EngineError {
    /// True for failures the script author caused, as opposed to the engine.
    #[inline]
    pub fn is_script(&self) -> bool {
        matches!(self, EngineError::Script(_))
    }
}
