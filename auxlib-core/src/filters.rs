//! Filters: one-pole low/high-pass and a TPT state-variable filter.
//!
//! Contents
//! - `OnePoleLP`  : RC-style one-pole low-pass
//! - `OnePoleHP`  : leaky-integrator one-pole high-pass
//! - `SvfMode`    : LP/HP/BP/Notch taps for the SVF
//! - `SvfTpt`     : state-variable filter via Topology Preserving Transform
//!
//! Every filter also has `process_block`, which runs the filter over a whole
//! channel in place. That is how the script built-ins use them.

use crate::dsp::{kill_denormals, one_pole_coeff_hz, tpt_g};
use core::fmt::Debug;

/// One-pole low-pass `y += a * (x - y)` with `a = 1 - exp(-2π fc / sr)`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleLP {
    a: f64,
    y: f64,
}

impl OnePoleLP {
    #[inline]
    pub fn new(cut_hz: f64, sr: f64) -> Self {
        Self { a: 1.0 - one_pole_coeff_hz(cut_hz, sr), y: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        self.y += self.a * (x - self.y);
        self.y = kill_denormals(self.y);
        self.y
    }

    #[inline]
    pub fn process_block(&mut self, block: &mut [f64]) {
        for s in block.iter_mut() {
            *s = self.process(*s);
        }
    }
}

/// One-pole high-pass: `y[n] = x[n] - x[n-1] + b * y[n-1]`, `b = exp(-2π fc / sr)`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleHP {
    b: f64,
    x1: f64,
    y1: f64,
}

impl OnePoleHP {
    #[inline]
    pub fn new(cut_hz: f64, sr: f64) -> Self {
        Self { b: one_pole_coeff_hz(cut_hz, sr), x1: 0.0, y1: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, x: f64) -> f64 {
        let y = kill_denormals(x - self.x1 + self.b * self.y1);
        self.x1 = x;
        self.y1 = y;
        y
    }

    #[inline]
    pub fn process_block(&mut self, block: &mut [f64]) {
        for s in block.iter_mut() {
            *s = self.process(*s);
        }
    }
}

/// SVF output tap selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SvfMode {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
}

/// Topology-Preserving Transform SVF (Zavalishin).
///
/// - `g = tan(π fc / sr)`
/// - `R = 1 / (2Q)`
#[derive(Copy, Clone, Debug)]
pub struct SvfTpt {
    g: f64,
    r: f64,
    ic1eq: f64,
    ic2eq: f64,
}

impl SvfTpt {
    #[inline]
    pub fn new(cut_hz: f64, q: f64, sr: f64) -> Self {
        Self {
            g: tpt_g(cut_hz, sr),
            r: 1.0 / (2.0 * q.max(1e-4)),
            ic1eq: 0.0,
            ic2eq: 0.0,
        }
    }

    /// One sample in, `(lp, bp, hp, notch)` out.
    #[inline]
    pub fn process_all(&mut self, x: f64) -> (f64, f64, f64, f64) {
        // Solve the zero-delay feedback loop for v1 (bandpass) first.
        let g = self.g;
        let v1 = (g * (x - self.ic2eq) + self.ic1eq) / (1.0 + g * (g + 2.0 * self.r));
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = kill_denormals(2.0 * v1 - self.ic1eq);
        self.ic2eq = kill_denormals(2.0 * v2 - self.ic2eq);

        let lp = v2;
        let bp = v1;
        let hp = x - 2.0 * self.r * v1 - v2;
        (lp, bp, hp, lp + hp)
    }

    #[inline]
    pub fn process(&mut self, x: f64, mode: SvfMode) -> f64 {
        let (lp, bp, hp, n) = self.process_all(x);
        match mode {
            SvfMode::Lowpass => lp,
            SvfMode::Highpass => hp,
            SvfMode::Bandpass => bp,
            SvfMode::Notch => n,
        }
    }

    #[inline]
    pub fn process_block(&mut self, block: &mut [f64], mode: SvfMode) {
        for s in block.iter_mut() {
            *s = self.process(*s, mode);
        }
    }
}

// ------------------------------------ Tests --------------------------------------
