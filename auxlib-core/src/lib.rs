//! AUXLib Core: the signal container and the DSP primitives behind the
//! script built-ins.
//!
//! Features
//! - `fast-math`: polynomial sine for oscillators instead of `f64::sin`
//!
//! Modules
//! - [`signals`]   : `Signals`, the linked/chainless multi-channel container
//! - [`dsp`]       : math helpers (db/lin, ms/samples, coefficients, shaping)
//! - [`envelopes`] : linear ADSR and fades
//! - [`filters`]   : one-pole LP/HP, TPT SVF
//!
//! Samples are `f64` throughout; the host reads them as `double`.

pub mod dsp;
pub mod envelopes;
pub mod filters;
pub mod signals;

pub use signals::{Segment, SignalError, Signals};

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{
        db_to_lin, kill_denormals, lerp, lin_to_db, ms_to_samples, one_pole_coeff_hz,
        one_pole_coeff_ms, peak, samples_to_ms, soft_clip, tpt_g, TAU,
    };
    pub use crate::envelopes::{fade_in, fade_out, AdsrLinear};
    pub use crate::filters::{OnePoleHP, OnePoleLP, SvfMode, SvfTpt};
    pub use crate::signals::{Segment, SignalError, Signals};
}
