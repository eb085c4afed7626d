//! Amplitude envelopes applied over whole signals.
//!
//! - `AdsrLinear` : ADSR with linear segments, stepped one sample at a time
//! - `fade_in` / `fade_out` : linear ramps applied in place to a block
//!
//! Times are in milliseconds; the sample rate is fixed at construction.

use core::fmt::Debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AdsrStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Linear ADSR envelope. Sustain is [0,1].
#[derive(Copy, Clone, Debug)]
pub struct AdsrLinear {
    sus: f64,
    env: f64,
    gate: bool,
    stage: AdsrStage,
    a_inc: f64,
    d_dec: f64,
    r_dec: f64,
}

impl AdsrLinear {
    pub fn new(atk_ms: f64, dec_ms: f64, sus: f64, rel_ms: f64, sr: f64) -> Self {
        let sr = sr.max(1.0);
        let sus = sus.clamp(0.0, 1.0);
        let per_ms = |ms: f64, span: f64| if ms <= 0.0 { 1.0 } else { span / (ms * 0.001 * sr) };
        Self {
            sus,
            env: 0.0,
            gate: false,
            stage: AdsrStage::Idle,
            a_inc: per_ms(atk_ms, 1.0),
            d_dec: per_ms(dec_ms, 1.0 - sus),
            r_dec: per_ms(rel_ms, sus.max(f64::EPSILON)),
        }
    }

    #[inline]
    pub fn gate_on(&mut self) {
        self.gate = true;
        self.stage = AdsrStage::Attack;
    }

    #[inline]
    pub fn gate_off(&mut self) {
        self.gate = false;
        self.stage = AdsrStage::Release;
    }

    /// Advance by one sample.
    #[inline]
    pub fn next(&mut self) -> f64 {
        match self.stage {
            AdsrStage::Idle => self.env = 0.0,
            AdsrStage::Attack => {
                self.env += self.a_inc;
                if self.env >= 1.0 {
                    self.env = 1.0;
                    self.stage = AdsrStage::Decay;
                }
            }
            AdsrStage::Decay => {
                self.env -= self.d_dec;
                if self.env <= self.sus {
                    self.env = self.sus;
                    self.stage = AdsrStage::Sustain;
                }
            }
            AdsrStage::Sustain => self.env = self.sus,
            AdsrStage::Release => {
                self.env -= self.r_dec;
                if self.env <= 0.0 {
                    self.env = 0.0;
                    self.stage = AdsrStage::Idle;
                }
            }
        }
        self.env
    }

    #[inline] pub fn value(&self) -> f64 { self.env }

    /// Shape `block` with this envelope: gate on at the first sample, gate off
    /// `release_samples` before the end.
    pub fn apply(mut self, block: &mut [f64], release_samples: usize) {
        let release_at = block.len().saturating_sub(release_samples);
        self.gate_on();
        for (i, s) in block.iter_mut().enumerate() {
            if i == release_at && self.gate {
                self.gate_off();
            }
            *s *= self.next();
        }
    }
}

/// Linear fade from silence over the first `n` samples.
pub fn fade_in(block: &mut [f64], n: usize) {
    let n = n.min(block.len());
    for (i, s) in block.iter_mut().take(n).enumerate() {
        *s *= i as f64 / n as f64;
    }
}

/// Linear fade to silence over the last `n` samples.
pub fn fade_out(block: &mut [f64], n: usize) {
    let len = block.len();
    let n = n.min(len);
    for (i, s) in block[len - n..].iter_mut().enumerate() {
        *s *= (n - 1 - i) as f64 / n as f64;
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adsr_linear_reaches_sustain_and_releases() {
        let sr = 48000.0;
        let mut env = AdsrLinear::new(10.0, 50.0, 0.5, 200.0, sr);
        env.gate_on();
        for _ in 0..(sr as usize / 2) { env.next(); }
        assert!((env.value() - 0.5).abs() < 1e-9, "v={}", env.value());
        env.gate_off();
        for _ in 0..(sr as usize) { env.next(); }
        assert_eq!(env.value(), 0.0);
    }

    #[test]
    fn apply_shapes_a_constant_block() {
        let sr = 1000.0;
        let mut block = vec![1.0; 1000];
        AdsrLinear::new(10.0, 10.0, 0.5, 100.0, sr).apply(&mut block, 100);
        assert!(block[0] > 0.0 && block[0] < 0.2);
        assert!((block[500] - 0.5).abs() < 1e-9);
        assert!(block[999] < 0.01);
    }

    #[test]
    fn fades_hit_the_edges() {
        let mut block = vec![1.0; 10];
        fade_in(&mut block, 5);
        assert_eq!(block[0], 0.0);
        assert_eq!(block[5], 1.0);
        fade_out(&mut block, 5);
        assert_eq!(block[9], 0.0);
        assert!((block[4] - 0.8).abs() < 1e-12);
    }
}
