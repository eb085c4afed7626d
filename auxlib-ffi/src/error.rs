//! Boundary error type and its mapping onto C sentinels.

use auxlib_engine::EngineError;
use thiserror::Error;

/// Everything a façade call can fail with.
#[derive(Debug, Error)]
pub enum AuxError {
    #[error("AUXLib error: Invalid handle.")]
    InvalidHandle,
    #[error("AUXLib error: Invalid handle - already deleted.")]
    DeletedHandle,
    #[error("AUXLib error: Invalid property name was passed to AUXGetInfo().")]
    UnknownProperty,
    /// A pointer argument was null where required, or a string was not UTF-8.
    #[error("AUXLib error: {0}")]
    BadArgument(&'static str),
    /// Every non-negative handle value is taken.
    #[error("AUXLib error: No free handles left.")]
    HandlesExhausted,
    /// Engine failure; the message is the engine's own.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// A panic caught at the boundary, with its payload when it was a string.
    #[error("{}", .0.as_deref().unwrap_or(UNKNOWN_ERROR))]
    Panic(Option<String>),
}

/// Used when a failure carries no message of its own.
pub const UNKNOWN_ERROR: &str = "AUXLib error: Unknown error.";

/// Evaluate sentinels.
pub const EVAL_EMPTY: i32 = 0;
pub const EVAL_INVALID_HANDLE: i32 = -1;
pub const EVAL_SCRIPT_ERROR: i32 = -2;
pub const EVAL_OTHER_ERROR: i32 = -3;

impl AuxError {
    /// Sentinel returned by `aux_eval` for this failure.
    pub fn code(&self) -> i32 {
        match self {
            AuxError::InvalidHandle | AuxError::DeletedHandle => EVAL_INVALID_HANDLE,
            AuxError::Engine(e) if e.is_script() => EVAL_SCRIPT_ERROR,
            _ => EVAL_OTHER_ERROR,
        }
    }

    /// Wrap a `catch_unwind` payload.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned());
        AuxError::Panic(msg)
    }
}
