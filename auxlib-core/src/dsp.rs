//! Generic DSP utilities and math helpers.
//!
//! Everything here works on whole sample values (`f64` in the engine) and is
//! side-effect free, so the script built-ins can compose these freely.
//!
//! Features used by this file:
//! - `fast-math` : polynomial sine for the oscillators (faster, approx.)

#![allow(clippy::excessive_precision)]

use core::f64::consts::PI;

use cfg_if::cfg_if;
use num_traits::Float;

// --------------------------------- Constants -------------------------------------

/// 2π
pub const TAU: f64 = 2.0 * PI;

/// Values below this magnitude are flushed to zero.
pub const EPS_SMALL: f64 = 1.0e-30;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn lerp<T: Float>(a: T, b: T, t: T) -> T {
    a + (b - a) * t
}

/// Wrap phase into [0, 1).
#[inline]
pub fn wrap_phase01(p: f64) -> f64 {
    let w = p - p.floor();
    if w >= 1.0 { 0.0 } else { w }
}

/// Kill denormal/subnormal values. Returns 0.0 if |x| < EPS_SMALL.
#[inline]
pub fn kill_denormals(x: f64) -> f64 {
    if x.abs() < EPS_SMALL { 0.0 } else { x }
}

/// Milliseconds to a whole number of samples at `fs` (rounded, never negative).
#[inline]
pub fn ms_to_samples(ms: f64, fs: u32) -> usize {
    if !ms.is_finite() || ms <= 0.0 {
        return 0;
    }
    (ms * f64::from(fs) / 1000.0).round() as usize
}

/// Samples to milliseconds at `fs`.
#[inline]
pub fn samples_to_ms(n: usize, fs: u32) -> f64 {
    n as f64 * 1000.0 / f64::from(fs.max(1))
}

// --------------------------------- dB / linear -----------------------------------

/// Convert dB to linear gain: lin = 10^(db/20).
#[inline]
pub fn db_to_lin<T: Float>(db: T) -> T {
    let floor = <T as num_traits::NumCast>::from(-120.0).unwrap_or_else(T::neg_infinity);
    if db <= floor {
        T::zero()
    } else {
        let k = <T as num_traits::NumCast>::from(0.11512925464970229).unwrap_or_else(T::one); // ln(10)/20
        (k * db).exp()
    }
}

/// Convert linear gain to dB: db = 20*log10(lin).
#[inline]
pub fn lin_to_db<T: Float>(lin: T) -> T {
    let floor = <T as num_traits::NumCast>::from(-120.0).unwrap_or_else(T::neg_infinity);
    if lin <= T::epsilon() {
        floor
    } else {
        <T as num_traits::NumCast>::from(8.685889638065036553).unwrap_or_else(T::one) * lin.ln() // 20/ln(10)
    }
}

// --------------------------------- Trig ------------------------------------------

/// Sine of `x` radians. With `fast-math`, a 7th-order Taylor fit after range
/// reduction into [-π, π]; otherwise exact.
#[inline]
pub fn sin(x: f64) -> f64 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let k = (x / TAU).round();
            let xr = x - k * TAU;
            // fold into [-π/2, π/2] where the polynomial is accurate
            let xr = if xr > PI / 2.0 { PI - xr } else if xr < -PI / 2.0 { -PI - xr } else { xr };
            let x2 = xr * xr;
            let x3 = x2 * xr;
            xr - x3 / 6.0 + x3 * x2 / 120.0 - x3 * x2 * x2 / 5040.0
        } else {
            x.sin()
        }
    }
}

// --------------------------------- Coefficients ----------------------------------

/// One-pole coefficient from a time constant in milliseconds: `exp(-1/(tau*sr))`.
#[inline]
pub fn one_pole_coeff_ms(t_ms: f64, sr: f64) -> f64 {
    let t = (t_ms.max(0.001)) * 0.001;
    (-1.0 / (t * sr.max(1.0))).exp()
}

/// One-pole coefficient from a cutoff in Hz: `exp(-2π fc / sr)`.
#[inline]
pub fn one_pole_coeff_hz(fc: f64, sr: f64) -> f64 {
    (-TAU * fc.max(0.0) / sr.max(1.0)).exp()
}

/// TPT prewarped gain `tan(π fc / sr)`, with the cutoff kept below Nyquist.
#[inline]
pub fn tpt_g(fc: f64, sr: f64) -> f64 {
    let sr = sr.max(1.0);
    let fc = fc.clamp(0.0, 0.49 * sr);
    (PI * fc / sr).tan()
}

// --------------------------------- Shaping ---------------------------------------

/// Smooth saturator bounded to (-1, 1).
#[inline]
pub fn soft_clip(x: f64) -> f64 {
    x.tanh()
}

/// Peak absolute value of a block.
#[inline]
pub fn peak(block: &[f64]) -> f64 {
    block.iter().fold(0.0, |m, s| m.max(s.abs()))
}

// --------------------------------- Tests -----------------------------------------
