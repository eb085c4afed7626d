//! AUXLib Engine: scripted signal computation behind the C façade.
//!
//! Crate layout:
//! - [`engine`]   : `SignalEngine` contract and the Rhai-backed `AuxEngine`
//! - [`script`]   : interpreter setup, built-ins, error classification
//! - [`nodes`]    : oscillators, noise, pan law
//! - [`wav`]      : wave/data file I/O
//! - [`playback`] : device output (feature `realtime`)
//! - [`config`]   : JSON engine configuration
//!
//! An instance owns one native signal: the result of its last successful
//! `compute`. Playback and file output always act on that signal.

pub mod config;
pub mod engine;
pub mod error;
pub mod nodes;
pub mod playback;
pub mod script;
pub mod wav;

pub use config::{EngineConfig, ScriptLimits, CONFIG_ENV};
pub use engine::{AuxEngine, PathCategory, SignalEngine};
pub use error::EngineError;
pub use playback::output_devices;

pub use auxlib_core::Signals;
