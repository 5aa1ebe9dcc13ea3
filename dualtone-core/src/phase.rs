//! Phase accumulators.
//!
//! A frequency change only swaps the per-sample increment; the running phase
//! is carried over untouched, so retuning a live voice never jumps the
//! waveform. The only way back to zero is an explicit [`PhaseAccumulator::reset`].

use crate::dsp::{phase_increment, TAU};

/// Running angular position in `[0, 2π)`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PhaseAccumulator {
    phase: f64,
    inc: f64,
}

impl PhaseAccumulator {
    #[inline]
    pub fn new() -> Self { Self { phase: 0.0, inc: 0.0 } }

    /// Retune. The current phase is kept.
    #[inline]
    pub fn set_frequency(&mut self, freq_hz: f64, sample_rate: f64) {
        self.inc = phase_increment(freq_hz, sample_rate);
    }

    #[inline] pub fn phase(&self) -> f64 { self.phase }
    #[inline] pub fn increment(&self) -> f64 { self.inc }

    /// Step by the current increment and wrap.
    #[inline]
    pub fn advance(&mut self) {
        self.phase += self.inc;
        while self.phase >= TAU {
            self.phase -= TAU;
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

/// The two accumulators a tone voice runs.
///
/// In binaural/generator mode `a` drives the left ear and `b` the right; in
/// isochronic mode `a` is the carrier and `b` the pulse gate. The struct
/// itself is role-agnostic; the renderer decides what each one means.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PhasePair {
    pub a: PhaseAccumulator,
    pub b: PhaseAccumulator,
}

impl PhasePair {
    #[inline]
    pub fn new() -> Self { Self::default() }

    #[inline]
    pub fn retune(&mut self, a_hz: f64, b_hz: f64, sample_rate: f64) {
        self.a.set_frequency(a_hz, sample_rate);
        self.b.set_frequency(b_hz, sample_rate);
    }

    #[inline]
    pub fn advance(&mut self) {
        self.a.advance();
        self.b.advance();
    }

    #[inline]
    pub fn phases(&self) -> (f64, f64) { (self.a.phase(), self.b.phase()) }

    #[inline]
    pub fn reset(&mut self) {
        self.a.reset();
        self.b.reset();
    }
}
