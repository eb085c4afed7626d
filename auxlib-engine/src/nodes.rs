//! Sound sources behind the generator built-ins.
//!
//! Contents:
//! - `Wave`, `Osc` : periodic oscillators (Sine/Tri/Saw/Square) with stable phase wrap
//! - `white_noise` : uniform noise in [-1, 1]
//! - `PanLaw`      : constant-power panning gains
//!
//! Frequency is Hz; everything renders whole blocks at a fixed sample rate.

use auxlib_core::dsp::{self, TAU};
use core::fmt::Debug;
use rand::Rng;

/// Oscillator waveform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wave { Sine, Tri, Saw, Square }

#[inline]
fn osc_sample(phase01: f64, wave: Wave) -> f64 {
    match wave {
        Wave::Sine   => dsp::sin(TAU * phase01),
        Wave::Tri    => 1.0 - 4.0 * (phase01 - 0.5).abs(),
        Wave::Saw    => 2.0 * phase01 - 1.0,
        Wave::Square => if phase01 < 0.5 { 1.0 } else { -1.0 },
    }
}

/// Free-running naive oscillator. Starts at phase 0, so a sine starts at 0.
#[derive(Copy, Clone, Debug)]
pub struct Osc {
    phase: f64,   // [0,1)
    freq:  f64,   // Hz
    wave:  Wave,
}

impl Osc {
    #[inline] pub fn new(freq_hz: f64, wave: Wave) -> Self { Self { phase: 0.0, freq: freq_hz.max(0.0), wave } }

    /// Current sample, then advance one step.
    #[inline]
    pub fn next(&mut self, sr: f64) -> f64 {
        let s = osc_sample(self.phase, self.wave);
        self.phase = dsp::wrap_phase01(self.phase + self.freq / sr);
        s
    }

    /// Render `n` samples at `sr`.
    pub fn render(mut self, n: usize, sr: f64) -> Vec<f64> {
        (0..n).map(|_| self.next(sr)).collect()
    }
}

/// `n` samples of uniform white noise in [-1, 1].
pub fn white_noise(n: usize) -> Vec<f64> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen_range(-1.0..=1.0)).collect()
}

/// Constant-power panner helper.
#[derive(Copy, Clone, Debug)]
pub struct PanLaw;
impl PanLaw {
    /// (left, right) gains for `pan` in [-1..1], -1 = hard left, +1 = hard right.
    #[inline]
    pub fn gains(pan: f64) -> (f64, f64) {
        let p = (pan.clamp(-1.0, 1.0) + 1.0) * 0.25 * core::f64::consts::PI; // map to [0, π/2]
        (p.cos(), p.sin())
    }
}
